/***************************************/
/*        3rd party libraries          */
/***************************************/
use crossbeam_channel as cbc;
use log::{debug, info, trace, warn};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

/***************************************/
/*           Local modules             */
/***************************************/
use crate::network::message::{decode, encode, Message, TransportError, MAX_PAYLOAD_SIZE};
use crate::network::sock;
use crate::shared::SystemEvent;

/// How long one receive may block before the terminate channel is checked again.
const RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

/**
 * Dispatcher-side end of one link.
 *
 * The host never sends on its own. It acknowledges every event a client pushes and answers
 * every probe with the oldest event queued for that client, or `EmptyQueue` when there is none.
 *
 * # Fields
 * - `name`:            Used in log lines.
 * - `inbound_tx`:      Events received from the client, towards the dispatcher.
 * - `outbound_rx`:     Events the dispatcher queued for the client.
 * - `terminate_rx`:    Stops the receive loop.
 */
pub struct RouterHost {
    name: String,
    socket: UdpSocket,
    inbound_tx: cbc::Sender<SystemEvent>,
    outbound_rx: cbc::Receiver<SystemEvent>,
    terminate_rx: cbc::Receiver<()>,
}

impl RouterHost {
    pub fn new(
        name: &str,
        addr: SocketAddr,
        inbound_tx: cbc::Sender<SystemEvent>,
        outbound_rx: cbc::Receiver<SystemEvent>,
        terminate_rx: cbc::Receiver<()>,
    ) -> Result<RouterHost, TransportError> {
        let socket = sock::new_socket(addr)?;
        socket.set_read_timeout(Some(RECEIVE_TIMEOUT))?;

        Ok(RouterHost {
            name: name.to_string(),
            socket,
            inbound_tx,
            outbound_rx,
            terminate_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn run(self) -> Result<(), TransportError> {
        info!("{} host listening on {}", self.name, self.local_addr()?);
        let mut buf = [0u8; MAX_PAYLOAD_SIZE];

        loop {
            if !matches!(self.terminate_rx.try_recv(), Err(cbc::TryRecvError::Empty)) {
                info!("{} host terminated", self.name);
                return Ok(());
            }

            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => self.handle_packet(&buf[..n], from)?,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
                // A reply to a client that went away bounces back on some platforms
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    debug!("{} host: {}", self.name, e)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn handle_packet(&self, bytes: &[u8], from: SocketAddr) -> Result<(), TransportError> {
        match decode(bytes) {
            Message::Event(event) => {
                trace!("{} host received {:?} from {}", self.name, event, from);
                self.send_to(&Message::Acknowledge, from)?;
                if self.inbound_tx.send(event).is_err() {
                    warn!("{} host has no dispatcher to forward to", self.name);
                }
                Ok(())
            }
            Message::Probe => self.respond_to_probe(from),
            Message::Text(text) => {
                debug!("{} host got raw text {:?} from {}, answering as a probe", self.name, text, from);
                self.respond_to_probe(from)
            }
            other => {
                warn!("{} host got unexpected {:?} from {}", self.name, other, from);
                Ok(())
            }
        }
    }

    fn respond_to_probe(&self, from: SocketAddr) -> Result<(), TransportError> {
        let reply = match self.outbound_rx.try_recv() {
            Ok(event) => Message::Event(event),
            Err(_) => Message::EmptyQueue,
        };
        self.send_to(&reply, from)
    }

    fn send_to(&self, message: &Message, to: SocketAddr) -> Result<(), TransportError> {
        let bytes = encode(message)?;
        self.socket.send_to(&bytes, to)?;
        Ok(())
    }
}
