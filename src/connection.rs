//! WiFi connection management through NetworkManager's `nmcli`.
//!
//! # Requirements
//!
//! - NetworkManager must be installed and running
//! - The `nmcli` command must be available in PATH
//! - User must have permission to manage network connections

use anyhow::{Context, Result};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::process::{Command, Output};

use crate::error::NmcliError;
use crate::stack::{MfpOption, SecurityType};

/// Current state of a WiFi interface as reported by `nmcli -t device show`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub interface: String,

    /// Raw state string, e.g. "100 (connected)" or "30 (disconnected)".
    pub state: String,

    /// Active connection profile, if any.
    pub connection: Option<String>,

    /// Primary IPv4 address with prefix, e.g. "192.168.4.2/24".
    pub ip_address: Option<String>,

    pub gateway: Option<String>,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state.starts_with("100")
    }

    pub fn is_disconnected(&self) -> bool {
        self.connection.is_none() && !self.is_connected()
    }

    /// The IPv4 address without its prefix length.
    pub fn ipv4_address(&self) -> Result<Option<Ipv4Addr>> {
        let Some(ref ip) = self.ip_address else {
            return Ok(None);
        };
        let addr = ip.split('/').next().unwrap_or(ip);
        addr.parse()
            .map(Some)
            .map_err(|_| NmcliError::Parse(format!("bad IPv4 address '{}'", ip)).into())
    }
}

/// Connects `interface` to `ssid` through a profile of its own, so the
/// requested key management and MFP are applied instead of negotiated.
///
/// ```bash
/// nmcli connection delete id wifi-link-<ssid>
/// nmcli connection add type wifi con-name wifi-link-<ssid> ifname <interface> ssid <ssid> \
///     [wifi-sec.key-mgmt <key-mgmt> wifi-sec.psk <psk> wifi-sec.pmf <pmf>]
/// nmcli connection up id wifi-link-<ssid>
/// ```
pub fn connect(
    interface: &str,
    ssid: &str,
    psk: Option<&str>,
    security: SecurityType,
    mfp: MfpOption,
) -> Result<()> {
    let name = profile_name(ssid);

    // A profile left by an earlier attempt would carry stale credentials.
    let _ = Command::new("nmcli")
        .args(["connection", "delete", "id", name.as_str()])
        .output();

    let args = profile_args(&name, interface, ssid, psk, security, mfp);
    run_nmcli(args.as_slice())
        .context("Failed to create connection profile")?;
    run_nmcli(&["connection", "up", "id", name.as_str()]).context("Failed to activate connection profile")
}

fn run_nmcli<S: AsRef<std::ffi::OsStr>>(args: &[S]) -> Result<()> {
    let output = Command::new("nmcli")
        .args(args)
        .output()
        .context("Failed to execute nmcli")?;

    if !output.status.success() {
        return Err(NmcliError::Execution(error_message(&output)).into());
    }

    Ok(())
}

fn profile_name(ssid: &str) -> String {
    format!("wifi-link-{}", ssid)
}

/// Arguments of `nmcli connection add` for one connect attempt.
fn profile_args(
    name: &str,
    interface: &str,
    ssid: &str,
    psk: Option<&str>,
    security: SecurityType,
    mfp: MfpOption,
) -> Vec<String> {
    let mut args: Vec<String> = [
        "connection", "add", "type", "wifi", "con-name", name, "ifname", interface, "ssid", ssid,
    ]
    .iter()
    .map(|a| a.to_string())
    .collect();

    let Some(key_mgmt) = key_mgmt(security, psk.is_some()) else {
        return args;
    };
    args.extend(["wifi-sec.key-mgmt".to_string(), key_mgmt.to_string()]);

    if let Some(psk) = psk {
        let field = if security == SecurityType::Wep {
            "wifi-sec.wep-key0"
        } else {
            "wifi-sec.psk"
        };
        args.extend([field.to_string(), psk.to_string()]);
    }
    if security != SecurityType::Wep {
        args.extend(["wifi-sec.pmf".to_string(), pmf(mfp).to_string()]);
    }
    args
}

/// NetworkManager key management for `security`. `None` means an open
/// network without a wireless-security setting.
pub fn key_mgmt(security: SecurityType, has_key: bool) -> Option<&'static str> {
    match security {
        SecurityType::None => None,
        SecurityType::Wep => Some("none"),
        SecurityType::Psk | SecurityType::PskSha256 | SecurityType::WpaPsk => Some("wpa-psk"),
        SecurityType::Sae => Some("sae"),
        SecurityType::Eap => Some("wpa-eap"),
        // NetworkManager has no WAPI support; a key is still sent as WPA-PSK.
        SecurityType::WapiPsk | SecurityType::Unknown => has_key.then_some("wpa-psk"),
    }
}

/// `802-11-wireless-security.pmf`: 1 disable, 2 optional, 3 required.
fn pmf(mfp: MfpOption) -> &'static str {
    match mfp {
        MfpOption::Disable => "1",
        MfpOption::Optional => "2",
        MfpOption::Required => "3",
    }
}

/// Disconnects `interface`. The connection profile is kept.
///
/// Fails with [`NmcliError::NotActive`] when the device had no active
/// connection.
pub fn disconnect(interface: &str) -> Result<()> {
    let output = Command::new("nmcli")
        .args(["device", "disconnect", interface])
        .output()
        .context("Failed to execute nmcli disconnect")?;

    if !output.status.success() {
        let message = error_message(&output);
        if is_not_active(&message) {
            return Err(NmcliError::NotActive(interface.to_string()).into());
        }
        return Err(NmcliError::Execution(message).into());
    }

    Ok(())
}

/// nmcli reports "This device is not active" for an idle device.
fn is_not_active(message: &str) -> bool {
    message.contains("not active")
}

fn error_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr.trim().to_string()
    }
}

/// ```bash
/// nmcli -t device show <interface>
/// ```
pub fn status(interface: &str) -> Result<ConnectionStatus> {
    let output = Command::new("nmcli")
        .args(["-t", "device", "show", interface])
        .output()
        .context("Failed to execute nmcli device show")?;

    if !output.status.success() {
        return Err(NmcliError::Execution(error_message(&output)).into());
    }

    Ok(parse_device_show(interface, &String::from_utf8_lossy(&output.stdout)))
}

/// Parses terse `KEY:VALUE` lines of `nmcli -t device show`.
pub fn parse_device_show(interface: &str, stdout: &str) -> ConnectionStatus {
    let mut status = ConnectionStatus {
        interface: interface.to_string(),
        state: "unknown".to_string(),
        connection: None,
        ip_address: None,
        gateway: None,
    };

    for line in stdout.lines() {
        // Values may contain colons; split on the first only
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.to_string();
        let present = !value.is_empty() && value != "--";

        match key {
            "GENERAL.STATE" => status.state = value,
            "GENERAL.CONNECTION" if present => status.connection = Some(value),
            "IP4.ADDRESS[1]" if present => status.ip_address = Some(value),
            "IP4.GATEWAY" if present => status.gateway = Some(value),
            _ => {}
        }
    }

    status
}

/// ```text
/// Interface: wlan0
/// State:     100 (connected)
/// Connected: Lab
/// IP:        192.168.4.2/24
/// Gateway:   192.168.4.1
/// ```
pub fn display_status(status: &ConnectionStatus) {
    println!("Interface: {}", status.interface);
    println!("State:     {}", status.state);

    match status.connection {
        Some(ref conn) => println!("Connected: {}", conn),
        None => println!("Connected: (none)"),
    }

    if let Some(ref ip) = status.ip_address {
        println!("IP:        {}", ip);
    }
    if let Some(ref gw) = status.gateway {
        println!("Gateway:   {}", gw);
    }
}
