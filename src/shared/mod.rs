pub mod macros;
pub mod structs;

pub use structs::ApproachEvent;
pub use structs::AssignmentRequest;
pub use structs::Direction;
pub use structs::DoorState;
pub use structs::ElevatorStatus;
pub use structs::Fault;
pub use structs::MovementState;
pub use structs::Origin;
pub use structs::StopRequest;
pub use structs::SystemEvent;
