use crate::shared::SystemEvent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// Largest datagram either side sends or accepts.
pub const MAX_PAYLOAD_SIZE: usize = 1400;

/**
 * Everything that travels between a router host and its client.
 *
 * `Event` carries domain traffic, the rest is control. `Text` is whatever arrived that was not a
 * serialized message; it goes out as raw bytes.
 */
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Message {
    Event(SystemEvent),
    Probe,
    EmptyQueue,
    Acknowledge,
    Text(String),
}

#[derive(Debug)]
pub enum TransportError {
    Io(io::Error),
    Encode(serde_json::Error),
    Oversized(usize),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "socket error: {}", e),
            TransportError::Encode(e) => write!(f, "failed to serialize message: {}", e),
            TransportError::Oversized(size) => {
                write!(f, "message of {} bytes exceeds the {} byte limit", size, MAX_PAYLOAD_SIZE)
            }
        }
    }
}

impl std::error::Error for TransportError {}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(e)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Encode(e)
    }
}

pub fn encode(message: &Message) -> Result<Vec<u8>, TransportError> {
    let bytes = match message {
        Message::Text(text) => text.as_bytes().to_vec(),
        _ => serde_json::to_vec(message)?,
    };
    if bytes.len() > MAX_PAYLOAD_SIZE {
        return Err(TransportError::Oversized(bytes.len()));
    }
    Ok(bytes)
}

/// Never fails: bytes that are not a serialized message come back as `Message::Text`.
pub fn decode(bytes: &[u8]) -> Message {
    match serde_json::from_slice::<Message>(bytes) {
        Ok(message) => message,
        Err(_) => Message::Text(String::from_utf8_lossy(bytes).trim().to_string()),
    }
}
