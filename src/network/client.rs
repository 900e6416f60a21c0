/***************************************/
/*        3rd party libraries          */
/***************************************/
use crossbeam_channel as cbc;
use log::{debug, info, trace, warn};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::Duration;

/***************************************/
/*           Local modules             */
/***************************************/
use crate::network::message::{decode, encode, Message, TransportError, MAX_PAYLOAD_SIZE};
use crate::network::sock;
use crate::shared::SystemEvent;

/// Subsystem-side end of one link. Every request waits for exactly one reply.
pub struct RouterClient {
    socket: UdpSocket,
    host: SocketAddr,
}

impl RouterClient {
    pub fn new(local: SocketAddr, host: SocketAddr, reply_timeout: Duration) -> Result<RouterClient, TransportError> {
        let socket = sock::new_socket(local)?;
        socket.set_read_timeout(Some(reply_timeout))?;
        Ok(RouterClient { socket, host })
    }

    /// Sends `message` and waits for the reply. `Ok(None)` means the reply never came, which the
    /// protocol treats as a lost datagram.
    pub fn send_and_receive_reply(&self, message: &Message) -> Result<Option<Message>, TransportError> {
        let bytes = encode(message)?;
        self.socket.send_to(&bytes, self.host)?;

        let mut buf = [0u8; MAX_PAYLOAD_SIZE];
        match self.socket.recv_from(&mut buf) {
            Ok((n, _)) => Ok(Some(decode(&buf[..n]))),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::ConnectionRefused
                ) =>
            {
                warn!("No reply from {}: {}", self.host, e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// A subsystem as seen by its poller.
pub trait Endpoint {
    /// The next event produced locally, if any is waiting.
    fn next_outbound(&mut self) -> Option<SystemEvent>;

    /// Handles an event the dispatcher sent.
    fn deliver(&mut self, event: SystemEvent);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollOutcome {
    Sent,
    Received,
    Idle,
}

/**
 * Drives a subsystem's side of the link.
 *
 * Each round pushes one pending local event if there is one, otherwise it probes the host for
 * dispatcher traffic. An empty probe backs off for `poll_interval`.
 */
pub struct Poller {
    client: RouterClient,
    poll_interval: Duration,
    terminate_rx: cbc::Receiver<()>,
}

impl Poller {
    pub fn new(client: RouterClient, poll_interval: Duration, terminate_rx: cbc::Receiver<()>) -> Poller {
        Poller {
            client,
            poll_interval,
            terminate_rx,
        }
    }

    pub fn run<E: Endpoint>(&self, endpoint: &mut E) -> Result<(), TransportError> {
        loop {
            if !matches!(self.terminate_rx.try_recv(), Err(cbc::TryRecvError::Empty)) {
                info!("Poller terminated");
                return Ok(());
            }
            self.poll_once(endpoint)?;
        }
    }

    /**
     * Runs one round.
     *
     * A reply that arrives after its timeout is read by the next round instead, so replies are not
     * matched to the request they answer. An event is delivered whichever request it came back on,
     * since the host has already dequeued it.
     */
    pub fn poll_once<E: Endpoint>(&self, endpoint: &mut E) -> Result<PollOutcome, TransportError> {
        if let Some(event) = endpoint.next_outbound() {
            let reply = self.client.send_and_receive_reply(&Message::Event(event))?;
            self.handle_reply(reply, endpoint);
            return Ok(PollOutcome::Sent);
        }

        match self.client.send_and_receive_reply(&Message::Probe)? {
            Some(Message::EmptyQueue) => {
                thread::sleep(self.poll_interval);
                Ok(PollOutcome::Idle)
            }
            reply => match self.handle_reply(reply, endpoint) {
                true => Ok(PollOutcome::Received),
                false => Ok(PollOutcome::Idle),
            },
        }
    }

    /// Returns true when the reply carried an event for the endpoint.
    fn handle_reply<E: Endpoint>(&self, reply: Option<Message>, endpoint: &mut E) -> bool {
        match reply {
            Some(Message::Event(event)) => {
                endpoint.deliver(event);
                true
            }
            Some(Message::Acknowledge) => {
                trace!("Event acknowledged");
                false
            }
            Some(other) => {
                debug!("Reply without an event: {:?}", other);
                false
            }
            None => false,
        }
    }
}
