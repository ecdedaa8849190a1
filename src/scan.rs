//! WiFi network scanning through nmcli.
//!
//! A scan is a rescan on the interface followed by a listing of what the
//! adapter saw:
//!
//! ```bash
//! nmcli device wifi rescan ifname <interface>
//! nmcli -t -f SSID,CHAN,SIGNAL,SECURITY device wifi list ifname <interface>
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use std::process::Command;

use crate::error::NmcliError;
use crate::event::ScanEntry;
use crate::stack::SecurityType;

/// A network as listed by nmcli.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Network {
    pub ssid: String,
    pub channel: Option<u8>,
    /// Signal strength as a percentage (0-100).
    pub signal: u8,
    pub security: SecurityType,
}

impl Network {
    /// Approximate RSSI in dBm for the signal percentage.
    pub fn rssi(&self) -> i8 {
        (i16::from(self.signal.min(100)) / 2 - 100) as i8
    }

    pub fn to_scan_entry(&self) -> ScanEntry {
        ScanEntry {
            ssid: self.ssid.clone(),
            security: self.security,
            rssi: self.rssi(),
            channel: self.channel,
        }
    }
}

/// Triggers a rescan and returns what the interface sees, strongest first.
///
/// A failed rescan is tolerated (the adapter may already be scanning); the
/// listing then returns the cached results.
pub fn scan_networks(interface: &str) -> Result<Vec<Network>> {
    let _ = Command::new("nmcli")
        .args(["device", "wifi", "rescan", "ifname", interface])
        .output();

    // Give the adapter time to finish the rescan
    std::thread::sleep(std::time::Duration::from_millis(500));

    let output = Command::new("nmcli")
        .args([
            "-t",
            "-f",
            "SSID,CHAN,SIGNAL,SECURITY",
            "device",
            "wifi",
            "list",
            "ifname",
            interface,
        ])
        .output()
        .context("Failed to execute nmcli wifi list")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(NmcliError::Execution(stderr.to_string()).into());
    }

    Ok(parse_scan_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Parses `SSID:CHAN:SIGNAL:SECURITY` terse lines.
///
/// Hidden networks (empty SSID) are skipped. Unlike a UI listing, the same
/// SSID seen from several access points is kept once per access point.
pub fn parse_scan_list(stdout: &str) -> Vec<Network> {
    let mut networks: Vec<Network> = stdout
        .lines()
        .filter_map(|line| {
            let fields = split_terse(line);
            if fields.len() < 4 || fields[0].is_empty() {
                return None;
            }
            Some(Network {
                ssid: fields[0].clone(),
                channel: fields[1].parse().ok(),
                signal: fields[2].parse().unwrap_or(0),
                security: parse_security(&fields[3..].join(":")),
            })
        })
        .collect();

    networks.sort_by(|a, b| b.signal.cmp(&a.signal));
    networks
}

/// Splits an nmcli terse line on unescaped colons, removing `\` escapes.
pub fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Maps nmcli's SECURITY column ("WPA2", "WPA1 WPA2", "WPA3", "") to a
/// [`SecurityType`], preferring the strongest listed mode.
pub fn parse_security(security: &str) -> SecurityType {
    let security = security.trim();
    if security.is_empty() || security == "--" {
        SecurityType::None
    } else if security.contains("802.1X") {
        SecurityType::Eap
    } else if security.contains("WPA3") {
        SecurityType::Sae
    } else if security.contains("WPA2") {
        SecurityType::Psk
    } else if security.contains("WPA1") || security.contains("WPA") {
        SecurityType::WpaPsk
    } else if security.contains("WEP") {
        SecurityType::Wep
    } else {
        SecurityType::Unknown
    }
}

/// Prints networks as a table.
///
/// ```text
/// SSID                             CHAN SIGNAL SECURITY
/// ------------------------------------------------------------
/// MyHomeNetwork                      6    95% ████ WPA2-PSK
/// OpenCafe                          11    45% ██░░ OPEN
/// ```
pub fn display_networks(networks: &[Network]) {
    if networks.is_empty() {
        println!("No networks found.");
        return;
    }

    println!("{:<32} {:>4} {:>6} SECURITY", "SSID", "CHAN", "SIGNAL");
    println!("{}", "-".repeat(60));

    for network in networks {
        let channel = network
            .channel
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<32} {:>4} {:>5}% {} {}",
            truncate_ssid(&network.ssid, 32),
            channel,
            network.signal,
            signal_to_bar(network.signal),
            network.security
        );
    }
}

fn truncate_ssid(ssid: &str, max_len: usize) -> String {
    if ssid.chars().count() > max_len {
        let head: String = ssid.chars().take(max_len - 3).collect();
        format!("{}...", head)
    } else {
        ssid.to_string()
    }
}

fn signal_to_bar(signal: u8) -> &'static str {
    match signal {
        80..=100 => "████",
        60..=79 => "███░",
        40..=59 => "██░░",
        20..=39 => "█░░░",
        _ => "░░░░",
    }
}
