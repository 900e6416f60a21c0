pub mod client;
pub mod host;
pub mod message;
pub mod sock;


pub use client::{Endpoint, PollOutcome, Poller, RouterClient};
pub use host::RouterHost;
pub use message::{decode, encode, Message, TransportError, MAX_PAYLOAD_SIZE};
