use crate::config::ElevatorConfig;
use crate::elevator::approach_slot::{ApproachSlot, FaultFlags};
use crate::elevator::motor::ElevatorMotor;
use crate::elevator::request_queue::RequestQueue;
use crate::shared::{
    ApproachEvent, AssignmentRequest, Direction, DoorState, ElevatorStatus, Fault, MovementState, Origin,
    StopRequest, SystemEvent,
};
use crossbeam_channel as cbc;
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Attempts after the first failed door change before the doors count as broken.
const DOOR_RETRIES: u32 = 1;

/**
 * Controls one simulated elevator.
 *
 * The `ElevatorFSM` owns the elevator's request queue, motor and doors and is the only writer of its
 * status. It runs on its own thread, takes assignments from the elevator subsystem, and for every
 * floor it moves asks for an approach confirmation which comes back through the `ApproachSlot`.
 *
 * # Fields
 * - `request_rx`:      Receives assignments for this elevator.
 * - `event_tx`:        Sends approach events and status snapshots to the elevator subsystem.
 * - `terminate_rx`:    Stops the control loop.
 * - `approach_slot`:   Single-slot handoff the subsystem writes confirmations into.
 * - `fault_flags`:     Door / cart malfunction switches toggled from outside.
 * - `travel_time`:     Bound on the wait for a confirmation. `None` waits forever.
 * - `door_time`:       Time one door change takes. `None` is instantaneous.
 * - `peeked_floor`:    Floor of the queue head the elevator is currently serving.
 * - `destinations`:    Drop-off stops keyed by pickup floor, queued once that floor is served.
 * - `retired`:         Set once the elevator is shut down; never cleared.
 */
pub struct ElevatorFSM {
    // Subsystem channels
    request_rx: cbc::Receiver<AssignmentRequest>,
    event_tx: cbc::Sender<SystemEvent>,
    terminate_rx: cbc::Receiver<()>,
    approach_slot: Arc<ApproachSlot>,
    fault_flags: Arc<FaultFlags>,

    // Private fields
    id: u8,
    n_floors: u8,
    current_floor: u8,
    service_direction: Direction,
    fault: Fault,
    current_request: Option<StopRequest>,
    peeked_floor: Option<u8>,
    destinations: BTreeMap<u8, Vec<StopRequest>>,
    queue: RequestQueue,
    motor: ElevatorMotor,
    door_state: DoorState,
    travel_time: Option<Duration>,
    door_time: Option<Duration>,
    retired: bool,
    terminated: bool,
}

enum Event {
    RequestReceived(AssignmentRequest),
    Terminate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElevatorError {
    /// The elevator was shut down with the given fault.
    Retired(Fault),
    /// The request removed from the queue was not the one being served.
    QueueCorrupted { peeked: u8, removed: Option<u8> },
    InvalidDoorTarget(DoorState),
}

impl fmt::Display for ElevatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElevatorError::Retired(fault) => write!(f, "elevator retired with fault {}", fault),
            ElevatorError::QueueCorrupted { peeked, removed } => write!(
                f,
                "floor peeked {} but floor removed {:?}, queue was modified while a request was served",
                peeked, removed
            ),
            ElevatorError::InvalidDoorTarget(state) => write!(f, "doors cannot be driven to {:?}", state),
        }
    }
}

impl std::error::Error for ElevatorError {}

impl ElevatorFSM {
    pub fn new(
        id: u8,
        config: &ElevatorConfig,
        request_rx: cbc::Receiver<AssignmentRequest>,
        event_tx: cbc::Sender<SystemEvent>,
        terminate_rx: cbc::Receiver<()>,
        approach_slot: Arc<ApproachSlot>,
        fault_flags: Arc<FaultFlags>,
    ) -> ElevatorFSM {
        ElevatorFSM {
            request_rx,
            event_tx,
            terminate_rx,
            approach_slot,
            fault_flags,
            id,
            n_floors: config.n_floors,
            current_floor: 1,
            service_direction: Direction::Up,
            fault: Fault::None,
            current_request: None,
            peeked_floor: None,
            destinations: BTreeMap::new(),
            queue: RequestQueue::new(),
            motor: ElevatorMotor::new(),
            door_state: DoorState::Open,
            travel_time: config.travel_time(),
            door_time: config.door_time(),
            retired: false,
            terminated: false,
        }
    }

    pub fn run(mut self) {
        info!("Elevator #{} started on floor {}", self.id, self.current_floor);
        self.publish_status();

        while !self.retired && !self.terminated {
            if self.queue.is_empty() {
                match self.wait_for_event() {
                    Event::RequestReceived(request) => self.add_assignment(request),
                    Event::Terminate => break,
                }
            }
            self.drain_requests();

            if let Err(e) = self.move_elevator_while_possible() {
                error!("Elevator #{}: {}", self.id, e);
            }
        }

        info!("Elevator #{} control loop terminated", self.id);
    }

    fn wait_for_event(&self) -> Event {
        cbc::select! {
            recv(self.request_rx) -> request => {
                match request {
                    Ok(request) => Event::RequestReceived(request),
                    Err(_) => {
                        warn!("Elevator #{} request channel closed", self.id);
                        Event::Terminate
                    }
                }
            },
            recv(self.terminate_rx) -> _ => Event::Terminate,
        }
    }

    fn terminate_requested(&mut self) -> bool {
        if !self.terminated {
            self.terminated = !matches!(self.terminate_rx.try_recv(), Err(cbc::TryRecvError::Empty));
        }
        self.terminated
    }

    /// Queues everything already waiting on the request channel.
    pub fn drain_requests(&mut self) {
        while let Ok(request) = self.request_rx.try_recv() {
            self.add_assignment(request);
        }
    }

    /// Queues the pickup now. The destination is held back until the pickup floor has been served.
    pub fn add_assignment(&mut self, assignment: AssignmentRequest) {
        let [pickup, destination] = assignment.stops();
        if destination.floor < 1 || destination.floor > self.n_floors {
            warn!(
                "Elevator #{} ignoring assignment to nonexistent floor {}",
                self.id, destination.floor
            );
            return;
        }
        if self.retired || pickup.floor < 1 || pickup.floor > self.n_floors {
            self.add_request(pickup);
            return;
        }

        if destination.floor != pickup.floor {
            debug!(
                "Elevator #{} holds floor {} until floor {} is served",
                self.id, destination.floor, pickup.floor
            );
            self.destinations.entry(pickup.floor).or_default().push(destination);
        }
        self.add_request(pickup);
    }

    /// Queues a stop for this elevator relative to where it is right now.
    pub fn add_request(&mut self, request: StopRequest) {
        if self.retired {
            debug!("Elevator #{} is retired, dropping request for floor {}", self.id, request.floor);
            return;
        }
        if request.floor < 1 || request.floor > self.n_floors {
            warn!("Elevator #{} ignoring request for nonexistent floor {}", self.id, request.floor);
            return;
        }

        debug!("Elevator #{} queued floor {} ({})", self.id, request.floor, request.direction);
        self.queue.add_request(self.current_floor, self.service_direction, request);
        self.publish_status();
    }

    /// Serves requests until the queue runs dry.
    pub fn move_elevator_while_possible(&mut self) -> Result<(), ElevatorError> {
        while !self.queue.is_empty() {
            self.current_request = None;
            self.swap_service_direction_if_necessary();

            while !self.queue.is_current_queue_empty() {
                if self.terminate_requested() {
                    return Ok(());
                }
                self.respond_to_request()?;
                self.drain_requests();
                self.publish_status();
            }
        }
        Ok(())
    }

    fn swap_service_direction_if_necessary(&mut self) {
        if self.queue.swap_queues() {
            self.service_direction = self.service_direction.opposite();
            info!(
                "Elevator #{} swapped queues, service direction is now {}",
                self.id, self.service_direction
            );
        }
    }

    /// One step towards the floor at the head of the current queue.
    pub fn respond_to_request(&mut self) -> Result<(), ElevatorError> {
        let request = match self.queue.peek_next_request() {
            Some(request) => request.clone(),
            None => return Ok(()),
        };
        let target = request.floor;
        self.peeked_floor = Some(target);
        self.current_request = Some(request.clone());
        debug!(
            "Elevator #{} [current, target]: [{}, {}] [{} {:?} {} {:?} {}] {}",
            self.id,
            self.current_floor,
            target,
            self.service_direction,
            self.motor.movement_state(),
            self.motor.direction(),
            self.door_state,
            self.fault,
            self.queue
        );

        match (self.motor.movement_state(), self.current_floor == target) {
            (MovementState::Stuck, _) => Err(ElevatorError::Retired(self.fault)),
            (_, true) => self.stop_at_floor(target),
            (MovementState::Idle, false) => {
                let next_floor = self.motor.next_floor(self.current_floor, target);
                self.start_moving_to_floor(next_floor)?;
                self.travel_one_floor(&request)
            }
            (MovementState::Active, false) => self.travel_one_floor(&request),
        }
    }

    fn travel_one_floor(&mut self, request: &StopRequest) -> Result<(), ElevatorError> {
        self.move_to_next_floor(request)?;
        if self.current_floor == request.floor {
            self.stop_at_floor(request.floor)?;
        }
        Ok(())
    }

    /**
     * Moves one floor towards `request`.
     *
     * Sends an approach event for the next floor and waits for its confirmation. Without a travel
     * time the wait is unbounded. With one, a missing confirmation retires the elevator with
     * `ArrivalSensorFail`, and a cart malfunction seen after the wait retires it with `ElevatorStuck`.
     */
    pub fn move_to_next_floor(&mut self, request: &StopRequest) -> Result<(), ElevatorError> {
        let next_floor = self.motor.next_floor(self.current_floor, request.floor);

        // A confirmation left over from an earlier floor must not authorize this move
        self.approach_slot.clear();
        self.emit(SystemEvent::Approach(ApproachEvent {
            time: request.time,
            floor: next_floor,
            direction: request.direction,
            elevator_id: self.id,
            origin: Origin::ElevatorSystem,
        }));

        let confirmation = match self.travel_time {
            None => Some(self.approach_slot.wait()),
            Some(travel_time) => self.approach_slot.wait_timeout(travel_time),
        };

        let confirmation = match confirmation {
            Some(confirmation) => confirmation,
            None => {
                warn!(
                    "Elevator #{} did not receive an approach confirmation within {:?}",
                    self.id, self.travel_time
                );
                return Err(self.retire(Fault::ArrivalSensorFail));
            }
        };
        if self.fault_flags.cart_malfunctioning() {
            warn!("Elevator #{} is stuck, the cart is malfunctioning", self.id);
            return Err(self.retire(Fault::ElevatorStuck));
        }
        if confirmation.floor != next_floor {
            warn!(
                "Elevator #{} approaching floor {} got a confirmation for floor {}",
                self.id, next_floor, confirmation.floor
            );
        }

        self.motor.change_direction(self.current_floor, next_floor);
        if next_floor != self.current_floor {
            info!("Elevator #{} moved to floor {}", self.id, next_floor);
        } else {
            info!("Elevator #{} stayed on floor {}", self.id, next_floor);
        }
        self.current_floor = next_floor;
        Ok(())
    }

    fn start_moving_to_floor(&mut self, next_floor: u8) -> Result<(), ElevatorError> {
        self.operate_doors(DoorState::Closed)?;
        info!("Elevator #{} closed its doors", self.id);

        self.motor.start_moving();
        self.motor.change_direction(self.current_floor, next_floor);
        self.publish_status();
        Ok(())
    }

    fn stop_at_floor(&mut self, target: u8) -> Result<(), ElevatorError> {
        self.attempt_to_remove_floor(target)?;
        self.motor.stop();
        self.publish_status();
        info!("Elevator #{} reached floor {}", self.id, target);

        self.operate_doors(DoorState::Open)?;
        info!("Elevator #{} opened its doors", self.id);
        self.publish_status();
        Ok(())
    }

    /// Pops the queue head and checks it is the floor that was peeked. Anything else means the
    /// queue changed underneath the elevator, which retires it with `ElevatorStuck`.
    pub fn attempt_to_remove_floor(&mut self, peeked: u8) -> Result<(), ElevatorError> {
        let removed = self.queue.remove_request().map(|request| request.floor);
        if removed == Some(peeked) {
            self.current_request = None;
            self.peeked_floor = None;
            self.release_destinations(peeked);
            return Ok(());
        }

        let e = ElevatorError::QueueCorrupted { peeked, removed };
        error!("Elevator #{}: {}", self.id, e);
        self.retire(Fault::ElevatorStuck);
        Err(e)
    }

    fn release_destinations(&mut self, floor: u8) {
        for destination in self.destinations.remove(&floor).unwrap_or_default() {
            self.add_request(destination);
        }
    }

    /// Drives the doors to `target`, retrying once after a transient malfunction.
    pub fn operate_doors(&mut self, target: DoorState) -> Result<(), ElevatorError> {
        for attempt in 0..=DOOR_RETRIES {
            if self.change_door_state(target)? {
                return Ok(());
            }
            if attempt < DOOR_RETRIES {
                warn!("Elevator #{} failed to make doors {:?}, trying again", self.id, target);
            }
        }

        error!("Elevator #{} doors are still stuck after retrying", self.id);
        Err(self.retire(Fault::DoorStuck))
    }

    /// Returns false when the doors jammed. The malfunction flag is consumed by the failure, so the
    /// next attempt succeeds unless the flag is raised again.
    pub fn change_door_state(&mut self, target: DoorState) -> Result<bool, ElevatorError> {
        if target == DoorState::Stuck {
            return Err(ElevatorError::InvalidDoorTarget(target));
        }
        if let Some(door_time) = self.door_time {
            thread::sleep(door_time);
        }

        if self.fault_flags.take_doors_malfunction() {
            warn!("Elevator #{} doors are malfunctioning", self.id);
            self.door_state = DoorState::Stuck;
            self.set_fault(Fault::DoorStuck);
            return Ok(false);
        }

        if self.door_state == DoorState::Stuck {
            self.set_fault(Fault::None);
            info!("Elevator #{} door fault cleared", self.id);
        }
        self.door_state = target;
        Ok(true)
    }

    pub fn set_fault(&mut self, fault: Fault) {
        self.fault = fault;
        match fault {
            Fault::None => info!("Elevator #{} fault: {}", self.id, fault),
            _ => warn!("Elevator #{} fault: {}", self.id, fault),
        }
        if fault == Fault::ElevatorStuck {
            self.motor.jam();
        }
        self.publish_status();
    }

    fn retire(&mut self, fault: Fault) -> ElevatorError {
        self.set_fault(fault);
        self.shut_down_elevator();
        ElevatorError::Retired(fault)
    }

    /// Drops all pending work and stops the elevator for good.
    pub fn shut_down_elevator(&mut self) {
        self.motor.jam();
        self.approach_slot.clear();
        let dropped = self.queue.clear() + self.destinations.values().map(Vec::len).sum::<usize>();
        self.destinations.clear();
        self.current_request = None;
        self.peeked_floor = None;
        self.retired = true;

        warn!("Elevator #{} was shut down, {} requests dropped", self.id, dropped);
        self.publish_status();
    }

    pub fn make_status(&self) -> ElevatorStatus {
        let door_overhead = self.door_time.unwrap_or(Duration::ZERO) * 2;
        let travel_time = self.travel_time.unwrap_or(Duration::ZERO);

        ElevatorStatus {
            elevator_id: self.id,
            current_floor: self.current_floor,
            service_direction: self.service_direction,
            movement_state: self.motor.movement_state(),
            motor_direction: self.motor.direction(),
            door_state: self.door_state,
            fault: self.fault,
            no_pending_work: self.queue.is_empty() && self.destinations.is_empty(),
            estimated_queue_time: self.queue.get_expected_time(self.current_floor, door_overhead, travel_time),
            current_request: self.current_request.clone(),
            origin: Origin::ElevatorSystem,
        }
    }

    fn publish_status(&self) {
        self.emit(SystemEvent::Status(self.make_status()));
    }

    fn emit(&self, event: SystemEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("Elevator #{} has no subsystem to publish to", self.id);
        }
    }

    pub fn current_floor(&self) -> u8 {
        self.current_floor
    }

    pub fn service_direction(&self) -> Direction {
        self.service_direction
    }

    pub fn fault(&self) -> Fault {
        self.fault
    }

    pub fn movement_state(&self) -> MovementState {
        self.motor.movement_state()
    }

    pub fn door_state(&self) -> DoorState {
        self.door_state
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }
}

/***************************************/
/*          Test accessors             */
/***************************************/
#[cfg(test)]
impl ElevatorFSM {
    pub fn test_set_floor(&mut self, floor: u8) {
        self.current_floor = floor;
    }

    pub fn test_queue_mut(&mut self) -> &mut RequestQueue {
        &mut self.queue
    }
}
