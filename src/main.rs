/* 3rd party libraries */
use clap::{Parser, Subcommand};
use crossbeam_channel as cbc;
use log::{error, info, warn};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread::{Builder, JoinHandle};

/* Custom libraries */
use config::Config;
use dispatcher::Dispatcher;
use elevator::{ElevatorSubsystem, FaultInjector};
use floor::FloorSubsystem;
use network::{Poller, RouterClient, RouterHost};
use shared::{ElevatorStatus, SystemEvent};

/* Modules */
mod config;
mod dispatcher;
mod elevator;
mod floor;
mod network;
mod shared;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Elevator dispatch simulator")]
struct Args {
    /// Path to the configuration file
    #[clap(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[clap(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the dispatcher and its two router hosts
    Dispatcher,
    /// Run the elevator subsystem
    Elevators,
    /// Run the floor subsystem
    Floors {
        /// Request to submit, as FLOOR:DIRECTION[:DESTINATION]
        #[clap(short, long)]
        request: Vec<String>,
    },
    /// Run everything in one process
    All {
        /// Request to submit, as FLOOR:DIRECTION[:DESTINATION]
        #[clap(short, long)]
        request: Vec<String>,
    },
}

/* Main */
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // Load the configuration
    let config = unwrap_or_exit!(config::load_config(&args.config), "Failed to load configuration");

    let mut threads = Vec::new();
    match args.mode {
        Mode::Dispatcher => threads.extend(start_dispatcher(&config)),
        Mode::Elevators => threads.extend(start_elevators(&config)),
        Mode::Floors { request } => threads.extend(start_floors(&config, &request)),
        Mode::All { request } => {
            threads.extend(start_dispatcher(&config));
            threads.extend(start_elevators(&config));
            threads.extend(start_floors(&config, &request));
        }
    }

    for thread in threads {
        if thread.join().is_err() {
            error!("A subsystem thread panicked");
        }
    }
}

fn spawn_named<F>(name: &str, f: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    unwrap_or_exit!(
        Builder::new().name(name.into()).spawn(f),
        format!("Failed to start {} thread", name)
    )
}

fn start_dispatcher(config: &Config) -> Vec<JoinHandle<()>> {
    // Initialize channels
    let (floor_inbound_tx, floor_inbound_rx) = cbc::unbounded::<SystemEvent>();
    let (elevator_inbound_tx, elevator_inbound_rx) = cbc::unbounded::<SystemEvent>();
    let (floor_outbound_tx, floor_outbound_rx) = cbc::unbounded::<SystemEvent>();
    let (elevator_outbound_tx, elevator_outbound_rx) = cbc::unbounded::<SystemEvent>();

    let floor_host = unwrap_or_exit!(
        RouterHost::new(
            "Floor",
            unwrap_or_exit!(config.network.floor_dispatcher_address(), "Bad floor dispatcher address"),
            floor_inbound_tx,
            floor_outbound_rx,
            cbc::never(),
        ),
        "Failed to bind floor host"
    );
    let elevator_host = unwrap_or_exit!(
        RouterHost::new(
            "Elevator",
            unwrap_or_exit!(config.network.elevator_dispatcher_address(), "Bad elevator dispatcher address"),
            elevator_inbound_tx,
            elevator_outbound_rx,
            cbc::never(),
        ),
        "Failed to bind elevator host"
    );

    let mut dispatcher = Dispatcher::new(
        config.elevator.n_elevators,
        floor_inbound_rx,
        elevator_inbound_rx,
        floor_outbound_tx,
        elevator_outbound_tx,
        cbc::never(),
    );

    vec![
        spawn_named("floor_host", move || unwrap_or_exit!(floor_host.run(), "Floor host failed")),
        spawn_named("elevator_host", move || {
            unwrap_or_exit!(elevator_host.run(), "Elevator host failed")
        }),
        spawn_named("dispatcher", move || dispatcher.run()),
    ]
}

fn start_elevators(config: &Config) -> Vec<JoinHandle<()>> {
    let mut subsystem = ElevatorSubsystem::new();
    let mut threads = unwrap_or_exit!(
        subsystem.spawn_elevators(&config.elevator, &cbc::never()),
        "Failed to start elevators"
    );
    start_fault_injector(subsystem.fault_injector());

    let poller = make_poller(config, config.network.elevator_address(), config.network.elevator_dispatcher_address());
    threads.push(spawn_named("elevator_poller", move || {
        unwrap_or_exit!(poller.run(&mut subsystem), "Elevator subsystem lost its link")
    }));
    threads
}

fn start_floors(config: &Config, requests: &[String]) -> Vec<JoinHandle<()>> {
    let (request_tx, request_rx) = cbc::unbounded::<SystemEvent>();
    let (status_tx, status_rx) = cbc::unbounded::<ElevatorStatus>();

    for request in requests {
        let event = unwrap_or_exit!(floor::parse_request(request), "Invalid request");
        let _ = request_tx.send(event);
    }

    let mut subsystem = FloorSubsystem::new(config.floor.n_floors, request_rx, status_tx);
    let poller = make_poller(config, config.network.floor_address(), config.network.floor_dispatcher_address());

    vec![
        spawn_named("status_display", move || {
            for status in status_rx.iter() {
                info!("{}", status);
            }
        }),
        spawn_named("floor_poller", move || {
            // Keeps the request channel open for the lifetime of the poller
            let _request_tx = request_tx;
            unwrap_or_exit!(poller.run(&mut subsystem), "Floor subsystem lost its link")
        }),
    ]
}

fn make_poller(
    config: &Config,
    local: Result<std::net::SocketAddr, config::ConfigError>,
    host: Result<std::net::SocketAddr, config::ConfigError>,
) -> Poller {
    let local = unwrap_or_exit!(local, "Bad subsystem address");
    let host = unwrap_or_exit!(host, "Bad dispatcher address");
    let client = unwrap_or_exit!(
        RouterClient::new(local, host, config.network.reply_timeout()),
        format!("Failed to bind {}", local)
    );
    Poller::new(client, config.network.poll_interval(), cbc::never())
}

fn start_fault_injector(injector: FaultInjector) {
    // Not joined: the thread ends with stdin
    spawn_named("fault_injector", move || {
        info!("Fault injection: 'door <id>' or 'cart <id>', append 'off' to clear");
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Fault injector stopped reading stdin: {}", e);
                    return;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match injector.apply_command(&line) {
                Ok(applied) => info!("{}", applied),
                Err(e) => warn!("{}", e),
            }
        }
    });
}
