pub mod subsystem;


pub use subsystem::{parse_request, ArrivalSensor, FloorSubsystem};
