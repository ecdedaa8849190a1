use std::time::Duration;

use thiserror::Error;

/// Errors returned by the blocking command surface of [`crate::WifiManager`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WifiError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Request rejected by network stack: {0}")]
    Request(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Another blocking wait is already in progress")]
    WaitInProgress,
}

/// Errors from the nmcli backend and interface discovery.
#[derive(Error, Debug)]
pub enum NmcliError {
    #[error("No WiFi interface found")]
    NoWifiInterface,

    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    #[error("Interface '{0}' is not a WiFi device")]
    NotWifiInterface(String),

    #[error("Interface '{0}' is not active")]
    NotActive(String),

    #[error("Failed to execute nmcli: {0}")]
    Execution(String),

    #[error("Failed to parse nmcli output: {0}")]
    Parse(String),
}
