use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env, Target};
use log::{error, info, warn};
use std::io::Write;

use wifi_link::{
    config::{self, Config, ConfigStore, NetworkConfig},
    connection, interface, scan, DeviceConfigSink, NmcliStack, NoopSink, SecurityType,
    WifiManager,
};

#[derive(Parser)]
#[command(name = "wifi-link")]
#[command(about = "Scan, connect and disconnect a WiFi interface and wait for the outcome")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available WiFi interfaces
    ListInterfaces,

    /// Scan for WiFi networks and wait for the scan to finish
    Scan {
        /// Interface to use (defaults to the configured or first WiFi interface)
        #[arg(short, long)]
        interface: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Connect to a WiFi network and wait for association and DHCP
    Connect {
        /// SSID of the network to connect to
        ssid: String,

        /// Pre-shared key (uses the saved one if omitted; open network if none is saved)
        #[arg(short, long)]
        password: Option<String>,

        /// Security type, e.g. wpa2-psk, wpa3-sae, wpa-psk, open
        #[arg(short = 'S', long, default_value = "wpa2-psk")]
        security: SecurityType,

        /// Interface to use (defaults to the configured or first WiFi interface)
        #[arg(short, long)]
        interface: Option<String>,

        /// Save credentials to config file
        #[arg(short, long)]
        save: bool,
    },

    /// Show connection status
    Status {
        /// Interface to check (defaults to the configured or first WiFi interface)
        #[arg(short, long)]
        interface: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Disconnect from the current network
    Disconnect {
        /// Interface to disconnect (defaults to the configured or first WiFi interface)
        #[arg(short, long)]
        interface: Option<String>,
    },

    /// Save network credentials to config file
    SaveNetwork {
        /// SSID of the network
        ssid: String,

        /// Pre-shared key; omit for open networks
        #[arg(short, long)]
        password: Option<String>,

        /// Security type
        #[arg(short = 'S', long, default_value = "wpa2-psk")]
        security: SecurityType,

        /// Preferred interface for this network
        #[arg(short, long)]
        interface: Option<String>,
    },

    /// Show saved configuration
    ShowConfig,
}

fn main() {
    init_logging();

    if let Err(e) = run(Cli::parse()) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    builder.format(|f, record| writeln!(f, "[{}] {}", record.level(), record.args()));
    builder.target(Target::Stderr).init();
}

fn run(cli: Cli) -> Result<()> {
    let cfg = Config::load().unwrap_or_else(|e| {
        warn!("Ignoring config: {e:#}");
        Config::default()
    });

    match cli.command {
        Commands::ListInterfaces => cmd_list_interfaces(),
        Commands::Scan { interface, json } => cmd_scan(&cfg, interface.as_deref(), json),
        Commands::Connect {
            ssid,
            password,
            security,
            interface,
            save,
        } => cmd_connect(&cfg, &ssid, password.as_deref(), security, interface.as_deref(), save),
        Commands::Status { interface, json } => cmd_status(&cfg, interface.as_deref(), json),
        Commands::Disconnect { interface } => cmd_disconnect(&cfg, interface.as_deref()),
        Commands::SaveNetwork {
            ssid,
            password,
            security,
            interface,
        } => cmd_save_network(&ssid, password.as_deref(), security, interface.as_deref()),
        Commands::ShowConfig => cmd_show_config(),
    }
}

/// Picks the interface from the argument, then the config, then the first WiFi device.
fn pick_interface(cfg: &Config, interface: Option<&str>) -> Result<String> {
    let name = interface.or(cfg.default_interface.as_deref());
    Ok(interface::resolve_interface(name)?.name)
}

fn new_manager(iface: &str, sink: Box<dyn DeviceConfigSink>) -> WifiManager<NmcliStack> {
    WifiManager::new(NmcliStack::new(iface), sink)
}

fn cmd_list_interfaces() -> Result<()> {
    let interfaces = interface::list_wifi_interfaces()?;

    if interfaces.is_empty() {
        println!("No WiFi interfaces found.");
        return Ok(());
    }

    println!("{:<16} STATE", "INTERFACE");
    println!("{}", "-".repeat(40));

    for iface in interfaces {
        println!("{:<16} {}", iface.name, iface.state);
    }

    Ok(())
}

fn cmd_scan(cfg: &Config, interface: Option<&str>, json: bool) -> Result<()> {
    let iface = pick_interface(cfg, interface)?;
    let manager = new_manager(&iface, Box::new(NoopSink));

    info!("Scanning on interface: {}", iface);
    manager.scan()?;
    manager.wait_scan_done()?;

    let networks = manager.stack().last_scan();
    if json {
        println!("{}", serde_json::to_string_pretty(&networks)?);
    } else {
        scan::display_networks(&networks);
    }

    Ok(())
}

fn cmd_connect(
    cfg: &Config,
    ssid: &str,
    password: Option<&str>,
    security: SecurityType,
    interface: Option<&str>,
    save: bool,
) -> Result<()> {
    let saved = cfg.find_network(ssid);

    let (password, security) = match (password, saved) {
        (Some(p), _) => (Some(p.to_string()), security),
        (None, Some(network)) => {
            info!("Using saved credentials for '{}'", ssid);
            (network.password.clone(), network.security)
        }
        (None, None) => (None, SecurityType::None),
    };

    let preferred = interface.or(saved.and_then(|n| n.interface.as_deref()));
    let iface = pick_interface(cfg, preferred)?;

    let sink: Box<dyn DeviceConfigSink> = if save {
        Box::new(ConfigStore::new(config::config_path()?, Some(iface.clone())))
    } else {
        Box::new(NoopSink)
    };
    let manager = new_manager(&iface, sink);

    info!("Connecting to '{}' on interface {}...", ssid, iface);
    manager.connect(ssid, password.as_deref(), security)?;
    manager.wait_connecting(cfg.wait.connect_timeout())?;
    if !manager.is_connected() {
        bail!("Connection to '{}' failed", ssid);
    }

    manager
        .wait_dhcp(cfg.wait.dhcp_timeout())
        .context("Associated but no DHCP lease")?;
    if let Some(ip) = manager.dhcp_address() {
        println!("Connected to '{}' with address {}", ssid, ip);
    }

    Ok(())
}

fn cmd_status(cfg: &Config, interface: Option<&str>, json: bool) -> Result<()> {
    let iface = pick_interface(cfg, interface)?;
    let status = connection::status(&iface)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        connection::display_status(&status);
    }

    Ok(())
}

fn cmd_disconnect(cfg: &Config, interface: Option<&str>) -> Result<()> {
    let iface = pick_interface(cfg, interface)?;
    let manager = new_manager(&iface, Box::new(NoopSink));

    info!("Disconnecting interface {}...", iface);
    manager.disconnect()?;
    manager.wait_disconnecting(cfg.wait.connect_timeout())?;

    Ok(())
}

fn cmd_save_network(
    ssid: &str,
    password: Option<&str>,
    security: SecurityType,
    interface: Option<&str>,
) -> Result<()> {
    let mut cfg = Config::load()?;

    cfg.add_network(NetworkConfig {
        ssid: ssid.to_string(),
        password: password.map(String::from),
        security: if password.is_some() { security } else { SecurityType::None },
        interface: interface.map(String::from),
    });

    cfg.save()?;

    let path = config::config_path()?;
    println!("Saved network '{}' to {}", ssid, path.display());

    Ok(())
}

fn cmd_show_config() -> Result<()> {
    let path = config::config_path()?;
    println!("Config file: {}", path.display());
    println!();

    let cfg = Config::load()?;

    println!(
        "Wait deadlines: connect {}s, DHCP {}s",
        cfg.wait.connect_timeout_secs, cfg.wait.dhcp_timeout_secs
    );
    if let Some(ref iface) = cfg.default_interface {
        println!("Default interface: {}", iface);
    }
    println!();

    if cfg.networks.is_empty() {
        println!("No saved networks.");
    } else {
        println!("{:<24} {:<16} {:<16} PASSWORD", "SSID", "SECURITY", "INTERFACE");
        println!("{}", "-".repeat(68));
        for network in &cfg.networks {
            let iface = network.interface.as_deref().unwrap_or("-");
            let masked_pw = match network.password {
                Some(ref pw) => "*".repeat(pw.len().min(12)),
                None => "-".to_string(),
            };
            println!(
                "{:<24} {:<16} {:<16} {}",
                network.ssid,
                network.security.to_string(),
                iface,
                masked_pw
            );
        }
    }

    Ok(())
}
