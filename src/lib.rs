//! Blocking WiFi commands over an event-driven network-management stack.
//!
//! The stack answers requests later, through events. [`WifiManager`] keeps
//! the link state those events describe and offers calls that block until
//! the answer arrives.
//!
//! # Modules
//!
//! - [`event`] - Event kinds, payloads and the callback registry
//! - [`stack`] - The [`NetworkStack`] trait and request types
//! - [`handler`] - Event to [`LinkState`] translation
//! - [`manager`] - The blocking command surface
//! - [`device`] - Sink for credentials of connect attempts
//! - [`config`] - Saved networks and wait deadlines
//! - [`error`] - Error types
//! - [`interface`], [`scan`], [`connection`], [`nmcli`] - NetworkManager backend
//!
//! # Example Usage
//!
//! ```no_run
//! use wifi_link::{NmcliStack, NoopSink, SecurityType, WifiManager, DEFAULT_WAIT_TIMEOUT};
//!
//! let manager = WifiManager::new(NmcliStack::new("wlan0"), Box::new(NoopSink));
//!
//! manager.connect("MySSID", Some("password123"), SecurityType::Psk).expect("Connect failed");
//! manager.wait_connecting(DEFAULT_WAIT_TIMEOUT).expect("No answer from the stack");
//! if manager.is_connected() {
//!     manager.wait_dhcp(DEFAULT_WAIT_TIMEOUT).expect("No DHCP lease");
//! }
//! ```

pub mod config;

pub mod connection;

pub mod device;

pub mod error;

pub mod event;

pub mod handler;

pub mod interface;

pub mod manager;

pub mod nmcli;

pub mod scan;

pub mod stack;

pub use device::{DeviceConfigSink, NoopSink};

pub use error::{NmcliError, WifiError};

pub use event::{
    DhcpLease, EventDispatcher, EventHandler, EventMask, NetEvent, NetEventKind, ScanEntry,
    WifiStatus, IPV4_DHCP_EVENTS, WIFI_MGMT_EVENTS,
};

pub use handler::LinkState;

pub use manager::{WifiManager, DEFAULT_WAIT_TIMEOUT};

pub use nmcli::NmcliStack;

pub use stack::{ConnectParams, MfpOption, NetworkStack, Request, SecurityType, StackError};
