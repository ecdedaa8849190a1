//! Network-management events and the subscription registry that delivers them.

use std::net::Ipv4Addr;
use std::ops::BitOr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::stack::SecurityType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetEventKind {
    WifiScanResult,
    WifiScanDone,
    WifiConnectResult,
    WifiDisconnectResult,
    WifiTwt,
    WifiRawScanResult,
    Ipv4DhcpBound,
}

impl NetEventKind {
    pub const fn bit(self) -> u32 {
        match self {
            NetEventKind::WifiScanResult => 1 << 0,
            NetEventKind::WifiScanDone => 1 << 1,
            NetEventKind::WifiConnectResult => 1 << 2,
            NetEventKind::WifiDisconnectResult => 1 << 3,
            NetEventKind::WifiTwt => 1 << 4,
            NetEventKind::WifiRawScanResult => 1 << 5,
            NetEventKind::Ipv4DhcpBound => 1 << 16,
        }
    }
}

/// A set of [`NetEventKind`]s a callback is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventMask(u32);

impl EventMask {
    pub const fn empty() -> Self {
        EventMask(0)
    }

    pub const fn of(kind: NetEventKind) -> Self {
        EventMask(kind.bit())
    }

    pub const fn with(self, kind: NetEventKind) -> Self {
        EventMask(self.0 | kind.bit())
    }

    pub const fn contains(self, kind: NetEventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl From<NetEventKind> for EventMask {
    fn from(kind: NetEventKind) -> Self {
        EventMask::of(kind)
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        EventMask(self.0 | rhs.0)
    }
}

impl BitOr<NetEventKind> for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: NetEventKind) -> Self::Output {
        self.with(rhs)
    }
}

/// Everything the WiFi management callback listens for.
pub const WIFI_MGMT_EVENTS: EventMask = EventMask::of(NetEventKind::WifiScanResult)
    .with(NetEventKind::WifiScanDone)
    .with(NetEventKind::WifiConnectResult)
    .with(NetEventKind::WifiDisconnectResult)
    .with(NetEventKind::WifiTwt)
    .with(NetEventKind::WifiRawScanResult);

pub const IPV4_DHCP_EVENTS: EventMask = EventMask::of(NetEventKind::Ipv4DhcpBound);

/// One network found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub ssid: String,
    pub security: SecurityType,
    /// dBm
    pub rssi: i8,
    pub channel: Option<u8>,
}

/// Completion status carried by scan-done and connect/disconnect results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WifiStatus {
    pub status: i32,
}

impl WifiStatus {
    pub const OK: WifiStatus = WifiStatus { status: 0 };

    pub fn failed(status: i32) -> Self {
        WifiStatus { status }
    }

    pub fn is_ok(self) -> bool {
        self.status == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpLease {
    pub requested_ip: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    ScanResult(ScanEntry),
    ScanDone(WifiStatus),
    ConnectResult(WifiStatus),
    DisconnectResult(WifiStatus),
    Twt,
    RawScanResult(Vec<u8>),
    DhcpBound(DhcpLease),
}

impl NetEvent {
    pub fn kind(&self) -> NetEventKind {
        match self {
            NetEvent::ScanResult(_) => NetEventKind::WifiScanResult,
            NetEvent::ScanDone(_) => NetEventKind::WifiScanDone,
            NetEvent::ConnectResult(_) => NetEventKind::WifiConnectResult,
            NetEvent::DisconnectResult(_) => NetEventKind::WifiDisconnectResult,
            NetEvent::Twt => NetEventKind::WifiTwt,
            NetEvent::RawScanResult(_) => NetEventKind::WifiRawScanResult,
            NetEvent::DhcpBound(_) => NetEventKind::Ipv4DhcpBound,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&NetEvent) + Send + Sync>;

/// Registry of event callbacks, owned by a stack backend.
///
/// Handlers run synchronously on the thread that calls [`dispatch`](Self::dispatch).
#[derive(Default)]
pub struct EventDispatcher {
    callbacks: RwLock<Vec<(EventMask, EventHandler)>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_callback(&self, mask: EventMask, handler: EventHandler) {
        let mut callbacks = match self.callbacks.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        callbacks.push((mask, handler));
    }

    /// Delivers `event` to every callback whose mask contains its kind.
    /// Returns how many callbacks received it.
    pub fn dispatch(&self, event: &NetEvent) -> usize {
        let kind = event.kind();
        // Clone the matching handlers so a handler may register new callbacks.
        let matching: Vec<EventHandler> = {
            let callbacks = match self.callbacks.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            callbacks
                .iter()
                .filter(|(mask, _)| mask.contains(kind))
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };

        for handler in &matching {
            handler(event);
        }
        matching.len()
    }

    pub fn len(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
