use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use anthem_sdk::logging::{self, LOG_MODE_ENV};
use anthem_sdk::{
    default_config_path, load_device_configs, ClientConfig, ClientRegistry, DeviceConfig,
    ModelFamily, ZoneChange,
};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Anthem receiver monitor
///
/// Connects to every configured receiver, keeps the connections alive, and
/// prints each zone change as the receivers report it.
#[derive(Parser, Debug)]
#[command(name = "anthem-monitor")]
#[command(about = "Print live zone changes from Anthem A/V receivers")]
#[command(version)]
pub struct Args {
    /// Device list (JSON array of device entries)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Receiver address as HOST or HOST:PORT, may be repeated
    #[arg(short, long = "device")]
    pub devices: Vec<String>,

    /// Zones to track on receivers given with --device
    #[arg(short, long, default_value = "1")]
    pub zones: u8,

    /// Model family of receivers given with --device (MRX, AVM, STR)
    #[arg(short, long, default_value = "MRX")]
    pub model: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if self.zones == 0 {
            return Err(anyhow!("At least one zone must be tracked"));
        }

        match self.log_level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(anyhow!(
                    "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
                    self.log_level
                ));
            }
        }

        Ok(())
    }

    /// Device entries from `--device` flags
    pub fn device_configs(&self) -> Result<Vec<DeviceConfig>> {
        let family: ModelFamily = self
            .model
            .parse()
            .with_context(|| format!("Invalid model family '{}'", self.model))?;

        self.devices
            .iter()
            .map(|device| {
                let mut config = parse_device(device)?;
                config.model_family = family;
                config.zone_count = self.zones;
                Ok(config)
            })
            .collect()
    }
}

/// Parses `HOST` or `HOST:PORT`
fn parse_device(device: &str) -> Result<DeviceConfig> {
    let device = device.trim();
    let (host, port) = match device.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("Invalid port in '{}'", device))?;
            (host, Some(port))
        }
        None => (device, None),
    };

    if host.is_empty() {
        return Err(anyhow!("Missing host in '{}'", device));
    }

    let mut config = DeviceConfig::new(host);
    if let Some(port) = port {
        config.port = port;
    }
    Ok(config)
}

/// Device list from flags, else from the config file
fn resolve_devices(args: &Args) -> Result<Vec<DeviceConfig>> {
    if !args.devices.is_empty() {
        return args.device_configs();
    }

    let path = args
        .config
        .clone()
        .or_else(|| std::env::var_os("ANTHEM_CONFIG").map(PathBuf::from))
        .or_else(default_config_path)
        .ok_or_else(|| anyhow!("No --device given and no config directory available"))?;

    info!("Loading devices from {}", path.display());
    load_device_configs(&path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Uses `ANTHEM_LOG_MODE` when set, plain stderr output at `log_level` otherwise
fn init_tracing(log_level: &str) -> Result<()> {
    if std::env::var_os(LOG_MODE_ENV).is_some() {
        return logging::init_logging_from_env().context("Failed to initialize logging");
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.to_lowercase())),
        )
        .init();

    Ok(())
}

fn print_change(change: &ZoneChange) {
    println!("{}  {}", chrono::Local::now().format("%H:%M:%S"), change);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;
    init_tracing(&args.log_level)?;

    let devices = resolve_devices(&args)?;
    if devices.is_empty() {
        return Err(anyhow!("No receivers configured"));
    }

    let registry = ClientRegistry::new(ClientConfig::default())?;
    let mut changes = registry.subscribe_changes();
    let count = registry.initialize_from_configuration(devices).await?;
    info!("Monitoring {} receiver(s), press Ctrl+C to stop", count);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
            change = changes.recv() => match change {
                Ok(change) => print_change(&change),
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} changes", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    }

    registry.shutdown().await;
    Ok(())
}
