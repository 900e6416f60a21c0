/***************************************/
/*        3rd party libraries          */
/***************************************/
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, SystemTime};

/***************************************/
/*       Public data structures        */
/***************************************/
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    None,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match *self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::None => Direction::None,
        }
    }

    /// Direction of travel from `from` towards `to`.
    pub fn between(from: u8, to: u8) -> Direction {
        if to > from {
            Direction::Up
        } else if to < from {
            Direction::Down
        } else {
            Direction::None
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
            Direction::None => write!(f, "NONE"),
        }
    }
}

/// The subsystem an event was last emitted by.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    FloorSystem,
    ElevatorSystem,
    Scheduler,
}

impl Origin {
    /// Origin seen by the receiving side after the dispatcher forwards an event.
    /// The dispatcher itself is never on either end of a forward.
    pub fn flipped(&self) -> Option<Origin> {
        match *self {
            Origin::FloorSystem => Some(Origin::ElevatorSystem),
            Origin::ElevatorSystem => Some(Origin::FloorSystem),
            Origin::Scheduler => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MovementState {
    Idle,
    Active,
    Stuck,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    Open,
    Closed,
    Stuck,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    None,
    DoorStuck,
    ElevatorStuck,
    ArrivalSensorFail,
}

impl Fault {
    /// Faults that permanently retire an elevator.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Fault::ElevatorStuck | Fault::ArrivalSensorFail)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::None => write!(f, "NONE"),
            Fault::DoorStuck => write!(f, "DOOR_STUCK"),
            Fault::ElevatorStuck => write!(f, "ELEVATOR_STUCK"),
            Fault::ArrivalSensorFail => write!(f, "ARRIVAL_SENSOR_FAIL"),
        }
    }
}

/// A plain request for an elevator to stop at `floor`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StopRequest {
    pub time: SystemTime,
    pub floor: u8,
    pub direction: Direction,
    pub origin: Origin,
}

impl StopRequest {
    pub fn new(floor: u8, direction: Direction, origin: Origin) -> StopRequest {
        StopRequest {
            time: SystemTime::now(),
            floor,
            direction,
            origin,
        }
    }
}

/// A pickup at `floor` travelling to `destination_floor`. The dispatcher fills in
/// `elevator_id` once an elevator has been chosen.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AssignmentRequest {
    pub time: SystemTime,
    pub floor: u8,
    pub direction: Direction,
    #[serde(rename = "destinationFloor")]
    pub destination_floor: u8,
    #[serde(rename = "elevatorId")]
    pub elevator_id: Option<u8>,
    pub origin: Origin,
}

impl AssignmentRequest {
    pub fn new(floor: u8, direction: Direction, destination_floor: u8, origin: Origin) -> AssignmentRequest {
        AssignmentRequest {
            time: SystemTime::now(),
            floor,
            direction,
            destination_floor,
            elevator_id: None,
            origin,
        }
    }

    /// Queue entries the assigned elevator has to serve: pickup, then destination.
    pub fn stops(&self) -> [StopRequest; 2] {
        [
            StopRequest {
                time: self.time,
                floor: self.floor,
                direction: self.direction,
                origin: self.origin,
            },
            StopRequest {
                time: self.time,
                floor: self.destination_floor,
                direction: self.direction,
                origin: self.origin,
            },
        ]
    }
}

impl From<StopRequest> for AssignmentRequest {
    fn from(request: StopRequest) -> Self {
        AssignmentRequest {
            time: request.time,
            floor: request.floor,
            direction: request.direction,
            destination_floor: request.floor,
            elevator_id: None,
            origin: request.origin,
        }
    }
}

/// Sent by an elevator before it passes or stops at `floor`; echoed back as the
/// confirmation that lets it proceed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApproachEvent {
    pub time: SystemTime,
    pub floor: u8,
    pub direction: Direction,
    #[serde(rename = "elevatorId")]
    pub elevator_id: u8,
    pub origin: Origin,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ElevatorStatus {
    #[serde(rename = "elevatorId")]
    pub elevator_id: u8,
    #[serde(rename = "currentFloor")]
    pub current_floor: u8,
    #[serde(rename = "serviceDirection")]
    pub service_direction: Direction,
    #[serde(rename = "movementState")]
    pub movement_state: MovementState,
    #[serde(rename = "motorDirection")]
    pub motor_direction: Direction,
    #[serde(rename = "doorState")]
    pub door_state: DoorState,
    pub fault: Fault,
    #[serde(rename = "noPendingWork")]
    pub no_pending_work: bool,
    #[serde(rename = "estimatedQueueTime")]
    pub estimated_queue_time: Duration,
    #[serde(rename = "currentRequest")]
    pub current_request: Option<StopRequest>,
    pub origin: Origin,
}

impl ElevatorStatus {
    /// Snapshot of an elevator that has not reported yet.
    pub fn new(elevator_id: u8) -> ElevatorStatus {
        ElevatorStatus {
            elevator_id,
            current_floor: 1,
            service_direction: Direction::None,
            movement_state: MovementState::Idle,
            motor_direction: Direction::None,
            door_state: DoorState::Open,
            fault: Fault::None,
            no_pending_work: true,
            estimated_queue_time: Duration::ZERO,
            current_request: None,
            origin: Origin::ElevatorSystem,
        }
    }
}

impl fmt::Display for ElevatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} floor {} [{} {:?} {} {:?} {}] queue {:.2}s",
            self.elevator_id,
            self.current_floor,
            self.service_direction,
            self.movement_state,
            self.motor_direction,
            self.door_state,
            self.fault,
            self.estimated_queue_time.as_secs_f64(),
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum SystemEvent {
    Stop(StopRequest),
    Assignment(AssignmentRequest),
    Approach(ApproachEvent),
    Status(ElevatorStatus),
}

impl SystemEvent {
    pub fn origin(&self) -> Origin {
        match self {
            SystemEvent::Stop(request) => request.origin,
            SystemEvent::Assignment(request) => request.origin,
            SystemEvent::Approach(event) => event.origin,
            SystemEvent::Status(status) => status.origin,
        }
    }

    pub fn set_origin(&mut self, origin: Origin) {
        match self {
            SystemEvent::Stop(request) => request.origin = origin,
            SystemEvent::Assignment(request) => request.origin = origin,
            SystemEvent::Approach(event) => event.origin = origin,
            SystemEvent::Status(status) => status.origin = origin,
        }
    }
}
