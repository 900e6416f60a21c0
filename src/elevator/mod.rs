pub mod approach_slot;
pub mod fsm;
pub mod motor;
pub mod request_queue;
pub mod subsystem;

pub mod subsystem_tests;

pub use fsm::ElevatorFSM;
pub use request_queue::RequestQueue;
pub use subsystem::{ElevatorSubsystem, FaultInjector};
