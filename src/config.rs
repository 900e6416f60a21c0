/***************************************/
/*        3rd party libraries          */
/***************************************/
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/***************************************/
/*       Public data structures        */
/***************************************/
#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub network: NetworkConfig,
    pub elevator: ElevatorConfig,
    pub floor: FloorConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct NetworkConfig {
    pub host: String,
    pub floor_port: u16,
    pub elevator_port: u16,
    pub floor_dispatcher_port: u16,
    pub elevator_dispatcher_port: u16,
    pub poll_interval: u64,
    pub reply_timeout: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ElevatorConfig {
    pub n_elevators: u8,
    pub n_floors: u8,
    pub travel_time: i64,
    pub door_time: i64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct FloorConfig {
    pub n_floors: u8,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Address(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read configuration file: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse configuration file: {}", e),
            ConfigError::Address(addr) => write!(f, "invalid socket address: {}", addr),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/***************************************/
/*             Public API              */
/***************************************/
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config_str = fs::read_to_string(path)?;
    parse_config(&config_str)
}

pub fn parse_config(config_str: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(config_str)?)
}

// Non-positive times disable the bound
fn optional_millis(ms: i64) -> Option<Duration> {
    if ms > 0 {
        Some(Duration::from_millis(ms as u64))
    } else {
        None
    }
}

impl ElevatorConfig {
    pub fn travel_time(&self) -> Option<Duration> {
        optional_millis(self.travel_time)
    }

    pub fn door_time(&self) -> Option<Duration> {
        optional_millis(self.door_time)
    }
}

impl NetworkConfig {
    fn address(&self, port: u16) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, port);
        addr.parse().map_err(|_| ConfigError::Address(addr))
    }

    pub fn floor_address(&self) -> Result<SocketAddr, ConfigError> {
        self.address(self.floor_port)
    }

    pub fn elevator_address(&self) -> Result<SocketAddr, ConfigError> {
        self.address(self.elevator_port)
    }

    pub fn floor_dispatcher_address(&self) -> Result<SocketAddr, ConfigError> {
        self.address(self.floor_dispatcher_port)
    }

    pub fn elevator_dispatcher_address(&self) -> Result<SocketAddr, ConfigError> {
        self.address(self.elevator_dispatcher_port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout)
    }
}

/***************************************/
/*             Unit tests              */
/***************************************/
