use anyhow::{Context, Result};
use std::process::Command;

use crate::error::NmcliError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiInterface {
    pub name: String,
    pub state: String,
}

/// A line of `nmcli -t -f DEVICE,TYPE,STATE device`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub kind: String,
    pub state: String,
}

/// List all network devices known to NetworkManager
pub fn list_devices() -> Result<Vec<Device>> {
    let output = Command::new("nmcli")
        .args(["-t", "-f", "DEVICE,TYPE,STATE", "device"])
        .output()
        .context("Failed to execute nmcli")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(NmcliError::Execution(stderr.to_string()).into());
    }

    Ok(parse_device_list(&String::from_utf8_lossy(&output.stdout)))
}

pub fn parse_device_list(stdout: &str) -> Vec<Device> {
    stdout
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(':').collect();
            if parts.len() < 3 || parts[0].is_empty() {
                return None;
            }
            Some(Device {
                name: parts[0].to_string(),
                kind: parts[1].to_string(),
                state: parts[2].to_string(),
            })
        })
        .collect()
}

/// List all WiFi interfaces on the system
pub fn list_wifi_interfaces() -> Result<Vec<WifiInterface>> {
    Ok(wifi_only(list_devices()?))
}

fn wifi_only(devices: Vec<Device>) -> Vec<WifiInterface> {
    devices
        .into_iter()
        .filter(|d| d.kind == "wifi")
        .map(|d| WifiInterface {
            name: d.name,
            state: d.state,
        })
        .collect()
}

/// Resolve interface: use the given name or fall back to the first WiFi device
pub fn resolve_interface(interface: Option<&str>) -> Result<WifiInterface> {
    select_interface(list_devices()?, interface)
}

fn select_interface(devices: Vec<Device>, name: Option<&str>) -> Result<WifiInterface> {
    match name {
        Some(name) => {
            let device = devices
                .into_iter()
                .find(|d| d.name == name)
                .ok_or_else(|| NmcliError::InterfaceNotFound(name.to_string()))?;
            if device.kind != "wifi" {
                return Err(NmcliError::NotWifiInterface(name.to_string()).into());
            }
            Ok(WifiInterface {
                name: device.name,
                state: device.state,
            })
        }
        None => wifi_only(devices)
            .into_iter()
            .next()
            .ok_or_else(|| NmcliError::NoWifiInterface.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICES: &str = "\
eth0:ethernet:connected
wlan0:wifi:disconnected
wlan1:wifi:connected
lo:loopback:unmanaged
";

    #[test]
    fn parses_device_lines() {
        let devices = parse_device_list(DEVICES);
        assert_eq!(devices.len(), 4);
        assert_eq!(devices[1].name, "wlan0");
        assert_eq!(devices[1].kind, "wifi");
        assert_eq!(devices[1].state, "disconnected");
    }

    #[test]
    fn default_is_first_wifi_device() {
        let iface = select_interface(parse_device_list(DEVICES), None).unwrap();
        assert_eq!(iface.name, "wlan0");
    }

    #[test]
    fn named_non_wifi_device_is_rejected() {
        let err = select_interface(parse_device_list(DEVICES), Some("eth0")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NmcliError>(),
            Some(NmcliError::NotWifiInterface(name)) if name == "eth0"
        ));
    }

    #[test]
    fn unknown_device_is_not_found() {
        let err = select_interface(parse_device_list(DEVICES), Some("wlan9")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NmcliError>(),
            Some(NmcliError::InterfaceNotFound(_))
        ));
    }

    #[test]
    fn no_wifi_devices() {
        let err = select_interface(parse_device_list("eth0:ethernet:connected\n"), None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NmcliError>(),
            Some(NmcliError::NoWifiInterface)
        ));
    }
}
