use anyhow::{Context, Result};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::device::DeviceConfigSink;
use crate::stack::SecurityType;

#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
    #[serde(default)]
    pub default_interface: Option<String>,
    #[serde(default)]
    pub wait: WaitConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NetworkConfig {
    pub ssid: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub security: SecurityType,
    #[serde(default)]
    pub interface: Option<String>,
}

/// Deadlines for the blocking waits, in seconds.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct WaitConfig {
    #[serde(default = "default_wait_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_wait_secs")]
    pub dhcp_timeout_secs: u64,
}

fn default_wait_secs() -> u64 {
    crate::manager::DEFAULT_WAIT_TIMEOUT.as_secs()
}

impl Default for WaitConfig {
    fn default() -> Self {
        WaitConfig {
            connect_timeout_secs: default_wait_secs(),
            dhcp_timeout_secs: default_wait_secs(),
        }
    }
}

impl WaitConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn dhcp_timeout(&self) -> Duration {
        Duration::from_secs(self.dhcp_timeout_secs)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn find_network(&self, ssid: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.ssid == ssid)
    }

    pub fn add_network(&mut self, network: NetworkConfig) {
        // Same SSID replaces the old entry
        self.networks.retain(|n| n.ssid != network.ssid);
        self.networks.push(network);
    }
}

pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("wifi-link").join("config.toml"))
}

/// Persists connect credentials into the config file at `path`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    interface: Option<String>,
}

impl ConfigStore {
    pub fn new(path: PathBuf, interface: Option<String>) -> Self {
        ConfigStore { path, interface }
    }

    fn store(&self, ssid: &str, psk: Option<&str>, security: SecurityType) -> Result<()> {
        let mut cfg = Config::load_from(&self.path)?;
        cfg.add_network(NetworkConfig {
            ssid: ssid.to_string(),
            password: psk.map(String::from),
            security,
            interface: self.interface.clone(),
        });
        cfg.save_to(&self.path)
    }
}

impl DeviceConfigSink for ConfigStore {
    fn set_wifi_config(&self, ssid: &str, psk: Option<&str>, security: SecurityType) {
        match self.store(ssid, psk, security) {
            Ok(()) => info!("Saved credentials for '{}' to {}", ssid, self.path.display()),
            Err(e) => error!("Failed to save credentials for '{}': {:#}", ssid, e),
        }
    }
}
