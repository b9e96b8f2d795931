//! Process configuration from the environment
//!
//! Read once at startup. Every knob has a default, so an empty environment
//! yields a working bridge fronting the embedded card.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::bridge::ReaderProtocol;

pub const ENV_LISTEN: &str = "VPCD_BRIDGE_LISTEN";
pub const ENV_BACKEND: &str = "VPCD_BRIDGE_BACKEND";
pub const ENV_BACKEND_TIMEOUT: &str = "VPCD_BRIDGE_BACKEND_TIMEOUT_SECS";
pub const ENV_READER_TIMEOUT: &str = "VPCD_BRIDGE_READER_TIMEOUT_SECS";
pub const ENV_PROTOCOL: &str = "VPCD_BRIDGE_PROTOCOL";

const DEFAULT_LISTEN: &str = "0.0.0.0:35963";
const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 10;
const DEFAULT_READER_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}: {value:?} is not a number of seconds")]
    InvalidSeconds { key: &'static str, value: String },

    #[error("{ENV_PROTOCOL}: {0:?} is neither \"prefixed\" nor \"legacy\"")]
    UnknownProtocol(String),
}

/// Which reader protocol variant the bridge speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVariant {
    Prefixed,
    Legacy,
}

impl ProtocolVariant {
    pub fn reader_protocol(self) -> ReaderProtocol {
        match self {
            Self::Prefixed => ReaderProtocol::prefixed(),
            Self::Legacy => ReaderProtocol::legacy(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the reader-facing listener binds to
    pub listen: String,
    /// Downstream card service; `None` selects the embedded card
    pub backend: Option<String>,
    pub backend_timeout: Duration,
    pub reader_timeout: Duration,
    pub protocol: ProtocolVariant,
}

impl Config {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let listen = get(ENV_LISTEN).unwrap_or_else(|| DEFAULT_LISTEN.into());
        let backend = get(ENV_BACKEND).filter(|v| !v.is_empty());

        let backend_timeout = seconds(ENV_BACKEND_TIMEOUT, get(ENV_BACKEND_TIMEOUT), DEFAULT_BACKEND_TIMEOUT_SECS)?;
        let reader_timeout = seconds(ENV_READER_TIMEOUT, get(ENV_READER_TIMEOUT), DEFAULT_READER_TIMEOUT_SECS)?;

        let protocol = match get(ENV_PROTOCOL).as_deref() {
            None | Some("prefixed") => ProtocolVariant::Prefixed,
            Some("legacy") => ProtocolVariant::Legacy,
            Some(other) => return Err(ConfigError::UnknownProtocol(other.into())),
        };

        Ok(Self {
            listen,
            backend,
            backend_timeout,
            reader_timeout,
            protocol,
        })
    }
}

fn seconds(
    key: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidSeconds { key, value: raw }),
    }
}
