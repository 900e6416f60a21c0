/***************************************/
/*        3rd party libraries          */
/***************************************/
use crossbeam_channel as cbc;
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/***************************************/
/*           Local modules             */
/***************************************/
use crate::shared::{
    AssignmentRequest, Direction, ElevatorStatus, MovementState, Origin, SystemEvent,
};

/***************************************/
/*               Enums                 */
/***************************************/
enum Event {
    Received(SystemEvent),
    Terminate,
}

/// How well a moving elevator fits a request. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    /// Same direction, request still ahead.
    Best = 0,
    /// Serving the other direction.
    Ok = 1,
    /// Same direction, request already passed.
    Worst = 2,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Only floor and elevator traffic can be routed; anything else is a protocol violation.
    InvalidOrigin(Origin),
    NoEligibleElevator { floor: u8, direction: Direction },
    /// A status from an elevator id outside the configured fleet.
    UnknownElevator(u8),
    ChannelClosed(Origin),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::InvalidOrigin(origin) => write!(f, "event with origin {:?} cannot be routed", origin),
            DispatchError::NoEligibleElevator { floor, direction } => {
                write!(f, "no elevator can serve floor {} ({})", floor, direction)
            }
            DispatchError::UnknownElevator(id) => write!(f, "no elevator #{} in this building", id),
            DispatchError::ChannelClosed(origin) => {
                write!(f, "outbound link for {:?} traffic is closed", origin)
            }
        }
    }
}

impl std::error::Error for DispatchError {}

/***************************************/
/*             Public API              */
/***************************************/

/**
 * Routes traffic between the floor and elevator subsystems and assigns requests to elevators.
 *
 * The dispatcher keeps the latest status of every elevator and uses it to choose who serves a new
 * request. Every event that passes through has its origin flipped, so the receiving side sees who
 * it is addressed to.
 *
 * # Fields
 * - `elevator_views`:          Latest status per elevator id. Replaced wholesale on every update.
 * - `floor_inbound_rx`:        Events from the floor-facing host.
 * - `elevator_inbound_rx`:     Events from the elevator-facing host.
 * - `floor_outbound_tx`:       Events queued for the floor subsystem.
 * - `elevator_outbound_tx`:    Events queued for the elevator subsystem.
 * - `terminate_rx`:            Stops the dispatch loop.
 */
pub struct Dispatcher {
    // Private fields
    elevator_views: BTreeMap<u8, ElevatorStatus>,

    // Router channels
    floor_inbound_rx: cbc::Receiver<SystemEvent>,
    elevator_inbound_rx: cbc::Receiver<SystemEvent>,
    floor_outbound_tx: cbc::Sender<SystemEvent>,
    elevator_outbound_tx: cbc::Sender<SystemEvent>,
    terminate_rx: cbc::Receiver<()>,
}

impl Dispatcher {
    pub fn new(
        n_elevators: u8,

        floor_inbound_rx: cbc::Receiver<SystemEvent>,
        elevator_inbound_rx: cbc::Receiver<SystemEvent>,
        floor_outbound_tx: cbc::Sender<SystemEvent>,
        elevator_outbound_tx: cbc::Sender<SystemEvent>,

        terminate_rx: cbc::Receiver<()>,
    ) -> Dispatcher {
        Dispatcher {
            elevator_views: (1..=n_elevators).map(|id| (id, ElevatorStatus::new(id))).collect(),

            floor_inbound_rx,
            elevator_inbound_rx,
            floor_outbound_tx,
            elevator_outbound_tx,
            terminate_rx,
        }
    }

    pub fn run(&mut self) {
        info!("Dispatcher tracking {} elevators", self.elevator_views.len());
        loop {
            match self.wait_for_event() {
                Event::Received(event) => self.handle_event(event),
                Event::Terminate => {
                    info!("Dispatcher terminated");
                    return;
                }
            }
        }
    }

    fn handle_event(&mut self, event: SystemEvent) {
        match self.process_data(event) {
            Ok(()) => {}
            Err(e @ DispatchError::InvalidOrigin(_)) => error!("Protocol violation: {}", e),
            Err(e @ DispatchError::NoEligibleElevator { .. }) => error!("Request dropped: {}", e),
            Err(e @ DispatchError::UnknownElevator(_)) => warn!("Status dropped: {}", e),
            Err(e @ DispatchError::ChannelClosed(_)) => warn!("{}", e),
        }
    }

    fn wait_for_event(&self) -> Event {
        cbc::select! {
            recv(self.floor_inbound_rx) -> event => match event {
                Ok(event) => Event::Received(event),
                Err(_) => Event::Terminate,
            },
            recv(self.elevator_inbound_rx) -> event => match event {
                Ok(event) => Event::Received(event),
                Err(_) => Event::Terminate,
            },
            recv(self.terminate_rx) -> _ => Event::Terminate,
        }
    }

    /**
     * Routes one event to the other side.
     *
     * Elevator statuses refresh the cache before they go on to the floor side. Floor requests are
     * assigned an elevator first; a plain stop request is turned into an assignment whose
     * destination is its own floor. An origin that cannot be flipped is rejected before any state
     * is touched.
     */
    pub fn process_data(&mut self, event: SystemEvent) -> Result<(), DispatchError> {
        let origin = event.origin();
        let flipped = origin.flipped().ok_or(DispatchError::InvalidOrigin(origin))?;

        let mut event = match (origin, event) {
            (Origin::ElevatorSystem, SystemEvent::Status(status)) => {
                self.update_view(&status)?;
                SystemEvent::Status(status)
            }
            (Origin::FloorSystem, SystemEvent::Assignment(request)) => SystemEvent::Assignment(self.assign(request)?),
            (Origin::FloorSystem, SystemEvent::Stop(request)) => {
                SystemEvent::Assignment(self.assign(AssignmentRequest::from(request))?)
            }
            (_, event) => event,
        };
        event.set_origin(flipped);

        let outbound = match origin {
            Origin::FloorSystem => &self.elevator_outbound_tx,
            _ => &self.floor_outbound_tx,
        };
        outbound.send(event).map_err(|_| DispatchError::ChannelClosed(origin))
    }

    fn assign(&self, mut request: AssignmentRequest) -> Result<AssignmentRequest, DispatchError> {
        let id = self.choose_elevator(&request).ok_or(DispatchError::NoEligibleElevator {
            floor: request.floor,
            direction: request.direction,
        })?;
        info!(
            "Assigned floor {} ({}) -> {} to elevator #{}",
            request.floor, request.direction, request.destination_floor, id
        );
        request.elevator_id = Some(id);
        Ok(request)
    }

    fn update_view(&mut self, status: &ElevatorStatus) -> Result<(), DispatchError> {
        let view = self
            .elevator_views
            .get_mut(&status.elevator_id)
            .ok_or(DispatchError::UnknownElevator(status.elevator_id))?;
        debug!("{}", status);
        *view = status.clone();
        Ok(())
    }

    /**
     * Picks the elevator to serve `request`.
     *
     * The first idle elevator by id wins outright. Stuck or faulted elevators never serve. Among
     * moving elevators the best tier wins, and inside a tier the shortest estimated queue time,
     * with ties going to the lower id.
     */
    pub fn choose_elevator(&self, request: &AssignmentRequest) -> Option<u8> {
        let mut candidates: [Option<(Duration, u8)>; 3] = [None; 3];

        for (id, view) in &self.elevator_views {
            if view.fault.is_terminal() {
                continue;
            }
            match view.movement_state {
                MovementState::Idle => return Some(*id),
                MovementState::Stuck => continue,
                MovementState::Active => {}
            }

            let slot = &mut candidates[Self::tier_for(view, request) as usize];
            if slot.map_or(true, |(time, _)| view.estimated_queue_time < time) {
                *slot = Some((view.estimated_queue_time, *id));
            }
        }

        candidates.iter().flatten().next().map(|(_, id)| *id)
    }

    /// Ranks a moving elevator, judged from the floor it will reach next.
    pub fn tier_for(view: &ElevatorStatus, request: &AssignmentRequest) -> Tier {
        if view.service_direction != request.direction {
            return Tier::Ok;
        }

        let projected = match view.service_direction {
            Direction::Up => view.current_floor.saturating_add(1),
            Direction::Down => view.current_floor.saturating_sub(1),
            Direction::None => view.current_floor,
        };
        let ahead = match request.direction {
            Direction::Up => projected < request.floor,
            Direction::Down => projected > request.floor,
            Direction::None => true,
        };

        if ahead {
            Tier::Best
        } else {
            Tier::Worst
        }
    }

    pub fn elevator_view(&self, id: u8) -> Option<&ElevatorStatus> {
        self.elevator_views.get(&id)
    }
}
