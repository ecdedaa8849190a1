//! A [`NetworkStack`] backed by NetworkManager.
//!
//! Every request runs `nmcli` on its own worker thread and reports the
//! outcome as events, the same way an embedded management stack would call
//! back from its own context.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, warn};

use crate::connection;
use crate::error::NmcliError;
use crate::event::{DhcpLease, EventDispatcher, EventHandler, EventMask, NetEvent, WifiStatus};
use crate::scan::{self, Network};
use crate::stack::{ConnectParams, NetworkStack, Request, StackError};

/// Status reported in events when an nmcli command failed.
const STATUS_FAILED: i32 = -1;

const DHCP_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DHCP_POLL_LIMIT: Duration = Duration::from_secs(30);

pub struct NmcliStack {
    interface: String,
    dispatcher: Arc<EventDispatcher>,
    last_scan: Arc<Mutex<Vec<Network>>>,
}

impl NmcliStack {
    pub fn new(interface: impl Into<String>) -> Self {
        NmcliStack {
            interface: interface.into(),
            dispatcher: Arc::new(EventDispatcher::new()),
            last_scan: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Networks found by the most recent completed scan.
    pub fn last_scan(&self) -> Vec<Network> {
        self.last_scan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn spawn<F>(&self, name: &str, job: F) -> Result<(), StackError>
    where
        F: FnOnce(&str, &EventDispatcher) + Send + 'static,
    {
        let interface = self.interface.clone();
        let dispatcher = Arc::clone(&self.dispatcher);

        thread::Builder::new()
            .name(format!("nmcli-{}", name))
            .spawn(move || job(&interface, &dispatcher))
            .map(|_| ())
            .map_err(|e| StackError::Rejected(format!("failed to spawn {} worker: {}", name, e)))
    }

    fn request_scan(&self) -> Result<(), StackError> {
        let last_scan = Arc::clone(&self.last_scan);

        self.spawn("scan", move |interface, dispatcher| {
            let status = match scan::scan_networks(interface) {
                Ok(networks) => {
                    for network in &networks {
                        dispatcher.dispatch(&NetEvent::ScanResult(network.to_scan_entry()));
                    }
                    *last_scan.lock().unwrap_or_else(PoisonError::into_inner) = networks;
                    WifiStatus::OK
                }
                Err(e) => {
                    error!("nmcli scan on {} failed: {:#}", interface, e);
                    WifiStatus::failed(STATUS_FAILED)
                }
            };
            dispatcher.dispatch(&NetEvent::ScanDone(status));
        })
    }

    fn request_connect(&self, params: ConnectParams) -> Result<(), StackError> {
        if params.ssid.is_empty() {
            return Err(StackError::Rejected("empty SSID".to_string()));
        }

        self.spawn("connect", move |interface, dispatcher| {
            let result = connection::connect(
                interface,
                &params.ssid,
                params.psk.as_deref(),
                params.security,
                params.mfp,
            );
            if let Err(e) = result {
                debug!("nmcli connect to {} failed: {:#}", params.ssid, e);
                dispatcher.dispatch(&NetEvent::ConnectResult(WifiStatus::failed(STATUS_FAILED)));
                return;
            }
            dispatcher.dispatch(&NetEvent::ConnectResult(WifiStatus::OK));

            match wait_for_lease(interface) {
                Some(requested_ip) => {
                    dispatcher.dispatch(&NetEvent::DhcpBound(DhcpLease { requested_ip }));
                }
                None => warn!("No IPv4 lease on {} after {:?}", interface, DHCP_POLL_LIMIT),
            }
        })
    }

    fn request_disconnect(&self) -> Result<(), StackError> {
        match connection::status(&self.interface) {
            Ok(status) if status.is_disconnected() => return Err(StackError::Already),
            Ok(_) => {}
            Err(e) => return Err(StackError::Rejected(format!("{:#}", e))),
        }

        self.spawn("disconnect", |interface, dispatcher| {
            let status = match connection::disconnect(interface) {
                Ok(()) => WifiStatus::OK,
                Err(e) => {
                    if let Some(NmcliError::NotActive(_)) = e.downcast_ref::<NmcliError>() {
                        debug!("{} went down before the disconnect", interface);
                    } else {
                        error!("nmcli disconnect on {} failed: {:#}", interface, e);
                    }
                    WifiStatus::failed(STATUS_FAILED)
                }
            };
            dispatcher.dispatch(&NetEvent::DisconnectResult(status));
        })
    }
}

/// Polls the device until it reports an IPv4 address or the limit passes.
fn wait_for_lease(interface: &str) -> Option<std::net::Ipv4Addr> {
    let deadline = Instant::now() + DHCP_POLL_LIMIT;

    while Instant::now() < deadline {
        match connection::status(interface).and_then(|s| s.ipv4_address()) {
            Ok(Some(ip)) => return Some(ip),
            Ok(None) => {}
            Err(e) => debug!("Polling {} for an address: {:#}", interface, e),
        }
        thread::sleep(DHCP_POLL_INTERVAL);
    }

    None
}

impl NetworkStack for NmcliStack {
    fn request(&self, request: Request) -> Result<(), StackError> {
        match request {
            Request::Scan => self.request_scan(),
            Request::Connect(params) => self.request_connect(params),
            Request::Disconnect => self.request_disconnect(),
        }
    }

    fn add_event_callback(&self, mask: EventMask, handler: EventHandler) {
        self.dispatcher.add_callback(mask, handler);
    }
}
