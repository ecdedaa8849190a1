//! Translation of network-management events into [`LinkState`] flags.
//!
//! Handlers never fail. Anything odd in a payload is logged and otherwise
//! dropped, so a caller cannot tell a failed scan from an empty one.

use std::net::Ipv4Addr;

use log::{debug, error, info, warn};

use crate::event::{DhcpLease, NetEvent, ScanEntry, WifiStatus};

/// Link state shared between event handlers and the blocking commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkState {
    /// A connect request is outstanding.
    pub connecting: bool,
    /// A disconnect request is outstanding.
    pub disconnecting: bool,
    pub scan_running: bool,
    /// Results received so far in the current scan.
    pub scan_result_count: u32,
    pub wifi_connected: bool,
    pub dhcp_configured: bool,
    pub dhcp_address: Option<Ipv4Addr>,
}

/// Handles events registered under [`crate::event::WIFI_MGMT_EVENTS`].
pub fn handle_wifi_event(state: &mut LinkState, event: &NetEvent) {
    match event {
        NetEvent::ScanResult(entry) => on_scan_result(state, entry),
        NetEvent::ScanDone(status) => on_scan_done(state, *status),
        NetEvent::ConnectResult(status) => on_connect_result(state, *status),
        NetEvent::DisconnectResult(status) => on_disconnect_result(state, *status),
        NetEvent::Twt | NetEvent::RawScanResult(_) => {}
        NetEvent::DhcpBound(_) => {}
    }
}

/// Handles events registered under [`crate::event::IPV4_DHCP_EVENTS`].
pub fn handle_ipv4_event(state: &mut LinkState, event: &NetEvent) {
    match event {
        NetEvent::DhcpBound(lease) => on_dhcp_bound(state, lease),
        other => warn!("Unhandled event: {:?}", other.kind()),
    }
}

fn on_scan_result(state: &mut LinkState, entry: &ScanEntry) {
    state.scan_result_count += 1;

    info!(
        "SSID: {}, Security: {} ({}), RSSI: {} dBm",
        entry.ssid,
        entry.security,
        entry.security.code(),
        entry.rssi
    );
}

fn on_scan_done(state: &mut LinkState, status: WifiStatus) {
    if !status.is_ok() {
        error!("Scan request failed ({})", status.status);
    }

    state.scan_result_count = 0;
    state.scan_running = false;
}

fn on_connect_result(state: &mut LinkState, status: WifiStatus) {
    if status.is_ok() {
        debug!("Connected");
        state.wifi_connected = true;
    } else {
        debug!("Connection request failed ({})", status.status);
    }

    state.connecting = false;
}

fn on_disconnect_result(state: &mut LinkState, status: WifiStatus) {
    if state.disconnecting {
        debug!(
            "Disconnection request {} ({})",
            if status.is_ok() { "done" } else { "failed" },
            status.status
        );
        state.disconnecting = false;
        state.wifi_connected = false;
    } else {
        // Driver-initiated; wifi_connected is left as is.
        debug!("Disconnected");
    }
}

fn on_dhcp_bound(state: &mut LinkState, lease: &DhcpLease) {
    info!("DHCP IP address: {}", lease.requested_ip);
    state.dhcp_address = Some(lease.requested_ip);
    state.dhcp_configured = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::SecurityType;

    fn entry(ssid: &str) -> ScanEntry {
        ScanEntry {
            ssid: ssid.to_string(),
            security: SecurityType::Psk,
            rssi: -52,
            channel: Some(6),
        }
    }

    #[test]
    fn scan_results_count_until_done() {
        let mut state = LinkState {
            scan_running: true,
            ..Default::default()
        };

        handle_wifi_event(&mut state, &NetEvent::ScanResult(entry("a")));
        handle_wifi_event(&mut state, &NetEvent::ScanResult(entry("a")));
        assert_eq!(state.scan_result_count, 2);
        assert!(state.scan_running);

        handle_wifi_event(&mut state, &NetEvent::ScanDone(WifiStatus::OK));
        assert_eq!(state.scan_result_count, 0);
        assert!(!state.scan_running);
    }

    #[test]
    fn failed_scan_done_still_clears() {
        let mut state = LinkState {
            scan_running: true,
            scan_result_count: 3,
            ..Default::default()
        };

        handle_wifi_event(&mut state, &NetEvent::ScanDone(WifiStatus::failed(-5)));
        assert_eq!(state.scan_result_count, 0);
        assert!(!state.scan_running);
    }

    #[test]
    fn connect_result_sets_connected_only_on_success() {
        let mut state = LinkState {
            connecting: true,
            ..Default::default()
        };
        handle_wifi_event(&mut state, &NetEvent::ConnectResult(WifiStatus::failed(1)));
        assert!(!state.connecting);
        assert!(!state.wifi_connected);

        state.connecting = true;
        handle_wifi_event(&mut state, &NetEvent::ConnectResult(WifiStatus::OK));
        assert!(!state.connecting);
        assert!(state.wifi_connected);
    }

    #[test]
    fn requested_disconnect_clears_connected() {
        let mut state = LinkState {
            disconnecting: true,
            wifi_connected: true,
            ..Default::default()
        };
        handle_wifi_event(&mut state, &NetEvent::DisconnectResult(WifiStatus::failed(2)));
        assert!(!state.disconnecting);
        assert!(!state.wifi_connected);
    }

    #[test]
    fn unsolicited_disconnect_keeps_connected() {
        let mut state = LinkState {
            wifi_connected: true,
            ..Default::default()
        };
        handle_wifi_event(&mut state, &NetEvent::DisconnectResult(WifiStatus::OK));
        assert!(state.wifi_connected);
    }

    #[test]
    fn twt_and_raw_scan_are_ignored() {
        let mut state = LinkState::default();
        handle_wifi_event(&mut state, &NetEvent::Twt);
        handle_wifi_event(&mut state, &NetEvent::RawScanResult(vec![0x80, 0x00]));
        assert_eq!(state, LinkState::default());
    }

    #[test]
    fn dhcp_bound_records_address() {
        let mut state = LinkState::default();
        let lease = DhcpLease {
            requested_ip: Ipv4Addr::new(10, 0, 0, 7),
        };
        handle_ipv4_event(&mut state, &NetEvent::DhcpBound(lease));
        assert!(state.dhcp_configured);
        assert_eq!(state.dhcp_address, Some(Ipv4Addr::new(10, 0, 0, 7)));
    }

    #[test]
    fn ipv4_handler_ignores_other_events() {
        let mut state = LinkState::default();
        handle_ipv4_event(&mut state, &NetEvent::ConnectResult(WifiStatus::OK));
        assert_eq!(state, LinkState::default());
    }
}
