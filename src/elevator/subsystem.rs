/***************************************/
/*        3rd party libraries          */
/***************************************/
use crossbeam_channel as cbc;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};

/***************************************/
/*           Local modules             */
/***************************************/
use crate::config::ElevatorConfig;
use crate::elevator::approach_slot::{ApproachSlot, FaultFlags};
use crate::elevator::fsm::ElevatorFSM;
use crate::network::Endpoint;
use crate::shared::{AssignmentRequest, SystemEvent};

/***************************************/
/*             Public API              */
/***************************************/

/// What the subsystem keeps of each elevator it started.
struct ElevatorHandle {
    request_tx: cbc::Sender<AssignmentRequest>,
    approach_slot: Arc<ApproachSlot>,
    fault_flags: Arc<FaultFlags>,
}

/**
 * Hosts every elevator of the building and routes dispatcher traffic to them.
 *
 * Assignments go to the addressed elevator's channel and approach confirmations go into its
 * slot. Everything the elevators emit is collected on one channel
 * and handed to the poller in the order it was produced.
 *
 * # Fields
 * - `elevators`:   Handles keyed by elevator id.
 * - `event_tx`:    Cloned into every elevator.
 * - `event_rx`:    Outbound events waiting for the poller.
 */
pub struct ElevatorSubsystem {
    elevators: BTreeMap<u8, ElevatorHandle>,
    event_tx: cbc::Sender<SystemEvent>,
    event_rx: cbc::Receiver<SystemEvent>,
}

impl ElevatorSubsystem {
    pub fn new() -> ElevatorSubsystem {
        let (event_tx, event_rx) = cbc::unbounded::<SystemEvent>();
        ElevatorSubsystem {
            elevators: BTreeMap::new(),
            event_tx,
            event_rx,
        }
    }

    /// Registers elevator `id` and returns its state machine, ready to be run on a thread.
    pub fn add_elevator(&mut self, id: u8, config: &ElevatorConfig, terminate_rx: cbc::Receiver<()>) -> ElevatorFSM {
        let (request_tx, request_rx) = cbc::unbounded::<AssignmentRequest>();
        let approach_slot = Arc::new(ApproachSlot::new());
        let fault_flags = Arc::new(FaultFlags::new());

        self.elevators.insert(
            id,
            ElevatorHandle {
                request_tx,
                approach_slot: Arc::clone(&approach_slot),
                fault_flags: Arc::clone(&fault_flags),
            },
        );

        ElevatorFSM::new(
            id,
            config,
            request_rx,
            self.event_tx.clone(),
            terminate_rx,
            approach_slot,
            fault_flags,
        )
    }

    /// Starts elevators 1 through `n_elevators`, one named thread each.
    pub fn spawn_elevators(
        &mut self,
        config: &ElevatorConfig,
        terminate_rx: &cbc::Receiver<()>,
    ) -> std::io::Result<Vec<JoinHandle<()>>> {
        let mut handles = Vec::new();
        for id in 1..=config.n_elevators {
            let elevator = self.add_elevator(id, config, terminate_rx.clone());
            let handle = Builder::new()
                .name(format!("elevator_{}", id))
                .spawn(move || elevator.run())?;
            handles.push(handle);
        }
        info!("Started {} elevators", config.n_elevators);
        Ok(handles)
    }

    pub fn fault_injector(&self) -> FaultInjector {
        FaultInjector {
            flags: self
                .elevators
                .iter()
                .map(|(id, handle)| (*id, Arc::clone(&handle.fault_flags)))
                .collect(),
        }
    }

    fn handle(&self, id: Option<u8>) -> Option<&ElevatorHandle> {
        id.and_then(|id| self.elevators.get(&id))
    }
}

impl Default for ElevatorSubsystem {
    fn default() -> Self {
        ElevatorSubsystem::new()
    }
}

impl Endpoint for ElevatorSubsystem {
    fn next_outbound(&mut self) -> Option<SystemEvent> {
        self.event_rx.try_recv().ok()
    }

    fn deliver(&mut self, event: SystemEvent) {
        match event {
            SystemEvent::Assignment(request) => match self.handle(request.elevator_id) {
                Some(handle) => {
                    info!(
                        "Elevator #{} assigned floor {} -> {}",
                        request.elevator_id.unwrap_or_default(),
                        request.floor,
                        request.destination_floor
                    );
                    let elevator_id = request.elevator_id;
                    if handle.request_tx.send(request).is_err() {
                        warn!("Elevator #{:?} is no longer running", elevator_id);
                    }
                }
                None => warn!("Assignment for unknown elevator {:?} dropped", request.elevator_id),
            },
            SystemEvent::Approach(approach) => match self.handle(Some(approach.elevator_id)) {
                Some(handle) => handle.approach_slot.deliver(approach),
                None => warn!("Approach confirmation for unknown elevator #{}", approach.elevator_id),
            },
            SystemEvent::Stop(request) => {
                warn!("Unassigned stop request for floor {} dropped", request.floor)
            }
            SystemEvent::Status(status) => {
                debug!("Ignoring status of elevator #{}", status.elevator_id)
            }
        }
    }
}

/// Raises malfunction flags on running elevators.
#[derive(Clone)]
pub struct FaultInjector {
    flags: BTreeMap<u8, Arc<FaultFlags>>,
}

impl FaultInjector {
    pub fn set_doors_malfunctioning(&self, id: u8, value: bool) -> bool {
        self.flags
            .get(&id)
            .map(|flags| flags.set_doors_malfunctioning(value))
            .is_some()
    }

    pub fn set_cart_malfunctioning(&self, id: u8, value: bool) -> bool {
        self.flags
            .get(&id)
            .map(|flags| flags.set_cart_malfunctioning(value))
            .is_some()
    }

    /**
     * Applies one operator command.
     *
     * Commands are `door <id>` and `cart <id>`, optionally followed by `off` to lower the flag again.
     */
    pub fn apply_command(&self, line: &str) -> Result<String, String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let (kind, id, value) = match words.as_slice() {
            [kind, id] => (*kind, *id, true),
            [kind, id, "off"] => (*kind, *id, false),
            _ => return Err(format!("Unrecognized command '{}'", line.trim())),
        };
        let id: u8 = id.parse().map_err(|_| format!("Invalid elevator id '{}'", id))?;

        let applied = match kind {
            "door" => self.set_doors_malfunctioning(id, value),
            "cart" => self.set_cart_malfunctioning(id, value),
            _ => return Err(format!("Unknown fault '{}', expected door or cart", kind)),
        };
        if !applied {
            return Err(format!("No elevator #{}", id));
        }
        Ok(format!("Elevator #{} {} malfunction {}", id, kind, if value { "on" } else { "off" }))
    }
}
