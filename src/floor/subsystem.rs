/***************************************/
/*        3rd party libraries          */
/***************************************/
use crossbeam_channel as cbc;
use log::{debug, info, trace, warn};
use std::collections::VecDeque;

/***************************************/
/*           Local modules             */
/***************************************/
use crate::network::Endpoint;
use crate::shared::{
    ApproachEvent, AssignmentRequest, Direction, ElevatorStatus, Origin, StopRequest, SystemEvent,
};

/// Confirms that an elevator is at the floor the sensor is mounted on.
#[derive(Debug, Clone)]
pub struct ArrivalSensor {
    floor: u8,
}

impl ArrivalSensor {
    pub fn new(floor: u8) -> ArrivalSensor {
        ArrivalSensor { floor }
    }

    pub fn detects(&self, approach: &ApproachEvent) -> bool {
        approach.floor == self.floor
    }
}

/**
 * The building side of the system.
 *
 * Passenger requests come in on `request_rx` and are pushed to the dispatcher. Approach events
 * coming back are checked against the arrival sensor of their floor and echoed as confirmations.
 * Elevator statuses end up on `status_tx` for display.
 *
 * # Fields
 * - `sensors`:     One arrival sensor per floor, index 0 is floor 1.
 * - `pending`:     Events waiting for the poller.
 * - `request_rx`:  Requests entering the building.
 * - `status_tx`:   Status snapshots for whoever displays them.
 */
pub struct FloorSubsystem {
    sensors: Vec<ArrivalSensor>,
    pending: VecDeque<SystemEvent>,
    request_rx: cbc::Receiver<SystemEvent>,
    status_tx: cbc::Sender<ElevatorStatus>,
}

impl FloorSubsystem {
    pub fn new(
        n_floors: u8,
        request_rx: cbc::Receiver<SystemEvent>,
        status_tx: cbc::Sender<ElevatorStatus>,
    ) -> FloorSubsystem {
        FloorSubsystem {
            sensors: (1..=n_floors).map(ArrivalSensor::new).collect(),
            pending: VecDeque::new(),
            request_rx,
            status_tx,
        }
    }

    fn sensor(&self, floor: u8) -> Option<&ArrivalSensor> {
        floor.checked_sub(1).and_then(|index| self.sensors.get(index as usize))
    }

    fn accept_request(&mut self, event: SystemEvent) {
        let floor = match &event {
            SystemEvent::Stop(request) => request.floor,
            SystemEvent::Assignment(request) => request.floor,
            other => {
                warn!("Floor subsystem only submits requests, dropping {:?}", other);
                return;
            }
        };
        if self.sensor(floor).is_none() {
            warn!("Request for nonexistent floor {} dropped", floor);
            return;
        }
        info!("Request submitted at floor {}", floor);
        self.pending.push_back(event);
    }

    fn process_approach_event(&mut self, approach: ApproachEvent) {
        match self.sensor(approach.floor) {
            Some(sensor) if sensor.detects(&approach) => {
                trace!("Floor {} confirms elevator #{}", approach.floor, approach.elevator_id);
                self.pending.push_back(SystemEvent::Approach(approach));
            }
            _ => warn!(
                "Elevator #{} approaching floor {} which has no sensor",
                approach.elevator_id, approach.floor
            ),
        }
    }
}

impl Endpoint for FloorSubsystem {
    fn next_outbound(&mut self) -> Option<SystemEvent> {
        while let Ok(event) = self.request_rx.try_recv() {
            self.accept_request(event);
        }
        self.pending.pop_front()
    }

    fn deliver(&mut self, event: SystemEvent) {
        match event {
            SystemEvent::Approach(approach) => self.process_approach_event(approach),
            SystemEvent::Status(status) => {
                if self.status_tx.send(status).is_err() {
                    debug!("No status display attached");
                }
            }
            other => debug!("Floor subsystem ignoring {:?}", other),
        }
    }
}

/**
 * Parses `FLOOR:DIRECTION[:DESTINATION]` into a floor request.
 *
 * Without a destination the result is a plain stop request; the dispatcher turns it into an
 * assignment for that floor only.
 */
pub fn parse_request(text: &str) -> Result<SystemEvent, String> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    let (floor, direction, destination) = match parts.as_slice() {
        [floor, direction] => (*floor, *direction, None),
        [floor, direction, destination] => (*floor, *direction, Some(*destination)),
        _ => return Err(format!("Expected FLOOR:DIRECTION[:DESTINATION], got '{}'", text)),
    };

    let floor: u8 = floor.parse().map_err(|_| format!("Invalid floor '{}'", floor))?;
    let direction = match direction.to_ascii_lowercase().as_str() {
        "up" => Direction::Up,
        "down" => Direction::Down,
        _ => return Err(format!("Invalid direction '{}', expected up or down", direction)),
    };

    match destination {
        None => Ok(SystemEvent::Stop(StopRequest::new(floor, direction, Origin::FloorSystem))),
        Some(destination) => {
            let destination: u8 = destination
                .parse()
                .map_err(|_| format!("Invalid destination floor '{}'", destination))?;
            Ok(SystemEvent::Assignment(AssignmentRequest::new(
                floor,
                direction,
                destination,
                Origin::FloorSystem,
            )))
        }
    }
}
