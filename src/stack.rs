//! The network-management stack this crate sits on top of.
//!
//! Scanning, association, security negotiation and DHCP all happen behind
//! [`NetworkStack`]. This crate only submits [`Request`]s and listens for
//! the events the stack dispatches back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{EventHandler, EventMask};

#[cfg(any(test, feature = "mock"))]
use mockall::automock;

/// Channel value meaning "let the stack pick".
pub const WIFI_CHANNEL_ANY: u8 = 255;

/// WiFi security types, numbered the way the management layer numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityType {
    #[default]
    None,
    Psk,
    PskSha256,
    Sae,
    WapiPsk,
    Eap,
    Wep,
    WpaPsk,
    Unknown,
}

impl SecurityType {
    pub fn code(self) -> i32 {
        match self {
            SecurityType::None => 0,
            SecurityType::Psk => 1,
            SecurityType::PskSha256 => 2,
            SecurityType::Sae => 3,
            SecurityType::WapiPsk => 4,
            SecurityType::Eap => 5,
            SecurityType::Wep => 6,
            SecurityType::WpaPsk => 7,
            SecurityType::Unknown => -1,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => SecurityType::None,
            1 => SecurityType::Psk,
            2 => SecurityType::PskSha256,
            3 => SecurityType::Sae,
            4 => SecurityType::WapiPsk,
            5 => SecurityType::Eap,
            6 => SecurityType::Wep,
            7 => SecurityType::WpaPsk,
            _ => SecurityType::Unknown,
        }
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecurityType::None => "OPEN",
            SecurityType::Psk => "WPA2-PSK",
            SecurityType::PskSha256 => "WPA2-PSK-SHA256",
            SecurityType::Sae => "WPA3-SAE",
            SecurityType::WapiPsk => "WAPI",
            SecurityType::Eap => "EAP",
            SecurityType::Wep => "WEP",
            SecurityType::WpaPsk => "WPA-PSK",
            SecurityType::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown security type '{0}'")]
pub struct ParseSecurityError(String);

impl FromStr for SecurityType {
    type Err = ParseSecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" | "none" => Ok(SecurityType::None),
            "wpa2-psk" | "wpa2" | "psk" => Ok(SecurityType::Psk),
            "wpa2-psk-sha256" | "psk-sha256" => Ok(SecurityType::PskSha256),
            "wpa3-sae" | "wpa3" | "sae" => Ok(SecurityType::Sae),
            "wapi" | "wapi-psk" => Ok(SecurityType::WapiPsk),
            "eap" | "wpa2-eap" | "802.1x" => Ok(SecurityType::Eap),
            "wep" => Ok(SecurityType::Wep),
            "wpa-psk" | "wpa" => Ok(SecurityType::WpaPsk),
            other => Err(ParseSecurityError(other.to_string())),
        }
    }
}

/// Management frame protection negotiated during association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MfpOption {
    #[default]
    Disable,
    Optional,
    Required,
}

/// Parameters of a connect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub ssid: String,
    pub psk: Option<String>,
    pub security: SecurityType,
    pub mfp: MfpOption,
    pub channel: u8,
    /// `None` leaves the association timeout to the stack.
    pub timeout: Option<std::time::Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Scan,
    Connect(ConnectParams),
    Disconnect,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StackError {
    /// The interface is already in the requested state.
    #[error("Operation already done")]
    Already,

    #[error("{0}")]
    Rejected(String),
}

/// A network-management stack that accepts requests and dispatches events.
///
/// `request` only submits. The outcome of a scan, connect or disconnect
/// arrives later as an event on whatever thread the stack dispatches from.
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait NetworkStack: Send + Sync {
    fn request(&self, request: Request) -> Result<(), StackError>;

    fn add_event_callback(&self, mask: EventMask, handler: EventHandler);
}
