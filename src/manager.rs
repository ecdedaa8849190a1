//! Blocking command surface over a [`NetworkStack`].
//!
//! [`WifiManager`] owns the [`LinkState`] that the event handlers update and
//! turns "request now, event later" into calls that block until the event
//! arrives or a deadline passes.
//!
//! Only one blocking wait may be outstanding per manager. A second caller
//! gets [`WifiError::WaitInProgress`] instead of sharing the first one's
//! deadline.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, error, info};

use crate::device::DeviceConfigSink;
use crate::error::WifiError;
use crate::event::{IPV4_DHCP_EVENTS, NetEvent, WIFI_MGMT_EVENTS};
use crate::handler::{self, LinkState};
use crate::stack::{ConnectParams, MfpOption, NetworkStack, Request, SecurityType, StackError, WIFI_CHANNEL_ANY};

/// Default deadline for [`WifiManager::wait_connecting`] and [`WifiManager::wait_dhcp`].
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

struct Shared {
    state: Mutex<LinkState>,
    changed: Condvar,
    wait_active: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut LinkState),
    {
        f(&mut self.lock());
        self.changed.notify_all();
    }
}

/// Releases the single wait slot when the wait returns, whatever the outcome.
struct WaitSlot<'a>(&'a AtomicBool);

impl Drop for WaitSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct WifiManager<S: NetworkStack> {
    stack: S,
    sink: Box<dyn DeviceConfigSink>,
    shared: Arc<Shared>,
}

impl<S: NetworkStack> WifiManager<S> {
    /// Starts from a cleared state and subscribes to the stack's WiFi and
    /// DHCP events.
    pub fn new(stack: S, sink: Box<dyn DeviceConfigSink>) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(LinkState::default()),
            changed: Condvar::new(),
            wait_active: AtomicBool::new(false),
        });

        let wifi = Arc::clone(&shared);
        stack.add_event_callback(
            WIFI_MGMT_EVENTS,
            Arc::new(move |event: &NetEvent| {
                wifi.update(|state| handler::handle_wifi_event(state, event))
            }),
        );

        let ipv4 = Arc::clone(&shared);
        stack.add_event_callback(
            IPV4_DHCP_EVENTS,
            Arc::new(move |event: &NetEvent| {
                ipv4.update(|state| handler::handle_ipv4_event(state, event))
            }),
        );

        WifiManager { stack, sink, shared }
    }

    /// The backend this manager drives.
    pub fn stack(&self) -> &S {
        &self.stack
    }

    /// Requests a scan. Results are only logged by the event handler.
    ///
    /// The scan is marked running even when the request is rejected, so a
    /// following [`wait_scan_done`](Self::wait_scan_done) blocks until the
    /// stack reports scan-done.
    pub fn scan(&self) -> Result<(), WifiError> {
        self.shared.update(|state| state.scan_running = true);

        if let Err(e) = self.stack.request(Request::Scan) {
            error!("Scan request failed: {}", e);
            return Err(WifiError::Request(e.to_string()));
        }
        info!("Scan requested");

        Ok(())
    }

    /// Blocks until the outstanding scan completes. There is no deadline.
    pub fn wait_scan_done(&self) -> Result<(), WifiError> {
        self.wait_while(None, |state| state.scan_running)
    }

    /// Requests a connection to `ssid`.
    ///
    /// An empty `ssid` is rejected before anything reaches the stack. With a
    /// key the connect asks for optional MFP, without one it is forced open.
    /// The credentials are handed to the device sink before the request.
    pub fn connect(&self, ssid: &str, psk: Option<&str>, security: SecurityType) -> Result<(), WifiError> {
        if ssid.is_empty() {
            return Err(WifiError::InvalidArgument("SSID must not be empty"));
        }

        let params = match psk {
            Some(psk) => ConnectParams {
                ssid: ssid.to_string(),
                psk: Some(psk.to_string()),
                security,
                mfp: MfpOption::Optional,
                channel: WIFI_CHANNEL_ANY,
                timeout: None,
            },
            None => ConnectParams {
                ssid: ssid.to_string(),
                psk: None,
                security: SecurityType::None,
                mfp: MfpOption::Disable,
                channel: WIFI_CHANNEL_ANY,
                timeout: None,
            },
        };

        debug!("Connecting to {}", ssid);
        debug!(
            "ssid: {}, psk: {}, security: {}, mfp: {:?}",
            params.ssid,
            if params.psk.is_some() { "<set>" } else { "<none>" },
            params.security,
            params.mfp
        );

        self.sink.set_wifi_config(ssid, psk, security);
        self.shared.update(|state| state.connecting = true);

        if let Err(e) = self.stack.request(Request::Connect(params)) {
            debug!("Connection request failed: {}", e);
            self.shared.update(|state| state.connecting = false);
            return Err(WifiError::Request(e.to_string()));
        }

        debug!("Connection requested");
        Ok(())
    }

    /// Requests a disconnect. Being already disconnected counts as success.
    pub fn disconnect(&self) -> Result<(), WifiError> {
        self.shared.update(|state| state.disconnecting = true);

        match self.stack.request(Request::Disconnect) {
            Ok(()) => {
                info!("Disconnect requested");
                Ok(())
            }
            Err(StackError::Already) => {
                self.shared.update(|state| state.disconnecting = false);
                info!("Already disconnected");
                Ok(())
            }
            Err(e) => {
                self.shared.update(|state| state.disconnecting = false);
                error!("Disconnect request failed: {}", e);
                Err(WifiError::Request(e.to_string()))
            }
        }
    }

    /// Blocks until the outstanding connect request resolves.
    ///
    /// Returns immediately when no connect is outstanding. Success here only
    /// means the stack answered; check [`is_connected`](Self::is_connected)
    /// for the outcome.
    pub fn wait_connecting(&self, timeout: Duration) -> Result<(), WifiError> {
        debug!("Waiting for connection to be established");
        self.wait_while(Some(timeout), |state| state.connecting)
            .inspect(|_| info!("Connecting established"))
            .inspect_err(|e| {
                if let WifiError::Timeout(_) = e {
                    error!("Connecting timed out");
                }
            })
    }

    /// Blocks until the outstanding disconnect request resolves.
    pub fn wait_disconnecting(&self, timeout: Duration) -> Result<(), WifiError> {
        self.wait_while(Some(timeout), |state| state.disconnecting)
            .inspect_err(|e| {
                if let WifiError::Timeout(_) = e {
                    error!("Disconnecting timed out");
                }
            })
    }

    /// Blocks until a DHCP lease has been bound.
    pub fn wait_dhcp(&self, timeout: Duration) -> Result<(), WifiError> {
        debug!("Waiting for DHCP to be configured");
        self.wait_while(Some(timeout), |state| !state.dhcp_configured)
            .inspect(|_| info!("DHCP configuration established"))
            .inspect_err(|e| {
                if let WifiError::Timeout(_) = e {
                    error!("DHCP configuration timed out");
                }
            })
    }

    /// Whether the last connect result succeeded and no solicited disconnect
    /// has completed since.
    pub fn is_connected(&self) -> bool {
        self.shared.lock().wifi_connected
    }

    /// Whether a connect request is awaiting its result.
    pub fn is_connecting(&self) -> bool {
        self.shared.lock().connecting
    }

    /// Whether a disconnect request is awaiting its result.
    pub fn is_disconnecting(&self) -> bool {
        self.shared.lock().disconnecting
    }

    /// Whether a scan has been requested and its done event not yet seen.
    pub fn is_scanning(&self) -> bool {
        self.shared.lock().scan_running
    }

    /// Results delivered by the running scan; reset when the scan is done.
    pub fn scan_result_count(&self) -> u32 {
        self.shared.lock().scan_result_count
    }

    /// Whether a DHCP lease has ever been bound.
    pub fn is_dhcp_configured(&self) -> bool {
        self.shared.lock().dhcp_configured
    }

    /// Address of the most recent DHCP lease.
    pub fn dhcp_address(&self) -> Option<Ipv4Addr> {
        self.shared.lock().dhcp_address
    }

    /// Copy of the whole link state, taken under a single lock.
    pub fn snapshot(&self) -> LinkState {
        self.shared.lock().clone()
    }

    fn wait_while<F>(&self, timeout: Option<Duration>, mut pending: F) -> Result<(), WifiError>
    where
        F: FnMut(&LinkState) -> bool,
    {
        if self
            .shared
            .wait_active
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(WifiError::WaitInProgress);
        }
        let _slot = WaitSlot(&self.shared.wait_active);

        // A deadline past the end of the clock means no deadline at all.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut state = self.shared.lock();

        while pending(&state) {
            state = match deadline {
                None => self
                    .shared
                    .changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(WifiError::Timeout(timeout.unwrap_or_default()));
                    }
                    self.shared
                        .changed
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }

        Ok(())
    }
}
