use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tokio::time::{Instant, sleep};

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use broadlink_lib::{BroadlinkError, Device, DeviceConfig, DiscoveryConfig, RemoteType, WifiSecurity, setup_wifi};

/// Default identity presented to devices on auth
const DEFAULT_LOCAL_ID: &str = "broadlink-rs-id";

/// Discover, authorize and drive Broadlink IR/RF bridges on the local network.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Broadcast a hello and list the devices that answer.
    Discover {
        /// How long to listen for replies, in milliseconds
        #[arg(short = 't', long, default_value_t = 1000)]
        listen_ms: u64,
        /// Local UDP port to listen on (0 = any)
        #[arg(short = 'p', long, default_value_t = 0)]
        listen_port: u16,
        /// Probe from this local address only instead of every interface
        #[arg(long)]
        local: Option<SocketAddr>,
        /// Write one JSON device file per discovered device into this directory
        #[arg(long)]
        save_dir: Option<PathBuf>,
    },
    /// Authorize with a device and store its key in the device file.
    Auth {
        /// JSON device file, as written by `discover --save-dir`
        device: PathBuf,
        /// 15-byte identity of this machine
        #[arg(long, default_value = DEFAULT_LOCAL_ID)]
        local_id: String,
        /// Name announced to the device
        #[arg(long, default_value = "broadlink-rs")]
        name: String,
        /// Where to write the authorized device (defaults to overwriting DEVICE)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Capture a remote control code from the device.
    Learn {
        /// Authorized JSON device file
        device: PathBuf,
        /// How long to wait for a code, in seconds
        #[arg(short, long, default_value_t = 30)]
        wait_secs: u64,
    },
    /// Send a remote control code through the device.
    Send {
        /// Authorized JSON device file
        device: PathBuf,
        /// Code bytes as hex, as printed by `learn`
        code: String,
        #[arg(short = 'k', long, value_enum, default_value_t = CodeKind::Ir)]
        kind: CodeKind,
        /// Number of times to emit the code
        #[arg(short, long, default_value_t = 1)]
        count: u32,
    },
    /// Hand Wi-Fi credentials to a device in AP setup mode.
    Wifi {
        ssid: String,
        password: String,
        #[arg(short, long, value_enum, default_value_t = Security::Wpa2)]
        security: Security,
        /// Local address to broadcast from
        #[arg(long, default_value = "0.0.0.0:0")]
        local: SocketAddr,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CodeKind {
    Ir,
    Rf433,
    Rf315,
}

impl From<CodeKind> for RemoteType {
    fn from(kind: CodeKind) -> Self {
        match kind {
            CodeKind::Ir => RemoteType::Ir,
            CodeKind::Rf433 => RemoteType::Rf433,
            CodeKind::Rf315 => RemoteType::Rf315,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Security {
    None,
    Wep,
    Wpa1,
    Wpa2,
    WpaCcmp,
    WpaTkip,
}

impl From<Security> for WifiSecurity {
    fn from(security: Security) -> Self {
        match security {
            Security::None => WifiSecurity::None,
            Security::Wep => WifiSecurity::Wep,
            Security::Wpa1 => WifiSecurity::Wpa1,
            Security::Wpa2 => WifiSecurity::Wpa2,
            Security::WpaCcmp => WifiSecurity::WpaCcmp,
            Security::WpaTkip => WifiSecurity::WpaTkip,
        }
    }
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, DEBUG with -v (packet hex dumps), RUST_LOG overrides
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file, &cli.verbose)?;

    if let Err(e) = run(cli.command).await {
        error!("{:#}", e);
        process::exit(1);
    }

    Ok(())
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Discover {
            listen_ms,
            listen_port,
            local,
            save_dir,
        } => discover(Duration::from_millis(listen_ms), listen_port, local, save_dir).await,
        Command::Auth {
            device,
            local_id,
            name,
            out,
        } => auth(&device, &local_id, &name, out.as_deref()).await,
        Command::Learn { device, wait_secs } => learn(&device, Duration::from_secs(wait_secs)).await,
        Command::Send {
            device,
            code,
            kind,
            count,
        } => send(&device, &code, kind.into(), count).await,
        Command::Wifi {
            ssid,
            password,
            security,
            local,
        } => {
            setup_wifi(&ssid, &password, security.into(), local, &DiscoveryConfig::default()).await?;
            println!("Credentials sent for network {ssid:?}");
            Ok(())
        }
    }
}

fn load_device(path: &Path) -> Result<Device> {
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read device file {:?}", path))?;
    let config = DeviceConfig::from_json(&json).with_context(|| format!("Invalid device file {:?}", path))?;
    Ok(Device::try_from(config)?)
}

fn save_device(path: &Path, device: &Device) -> Result<()> {
    let json = DeviceConfig::from(device).to_json()?;
    fs::write(path, json).with_context(|| format!("Failed to write device file {:?}", path))
}

fn describe(device: &Device) -> String {
    let model = device
        .model()
        .map(|m| format!("{} ({})", m.name, m.class))
        .unwrap_or_else(|| "unknown model".to_string());
    let mac = device.mac.map(hex::encode).unwrap_or_default();
    format!(
        "{} type={:#06x} mac={} via {} - {}",
        device.remote_addr, device.device_type, mac, device.local_addr, model
    )
}

async fn discover(
    listen_time: Duration,
    listen_port: u16,
    local: Option<SocketAddr>,
    save_dir: Option<PathBuf>,
) -> Result<()> {
    let config = DiscoveryConfig::new(listen_time, listen_port);
    let devices = match local {
        Some(local) => config.discover_from(local).await?,
        None => match config.discover_all().await {
            Ok(devices) => devices,
            Err(BroadlinkError::Discovery { found, failures }) => {
                for failure in &failures {
                    warn!("{}", failure);
                }
                found
            }
            Err(e) => return Err(e.into()),
        },
    };

    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }

    for device in &devices {
        println!("{}", describe(device));
    }

    if let Some(dir) = save_dir {
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
        for device in &devices {
            let mac = device.mac.map(hex::encode).unwrap_or_default();
            let path = dir.join(format!("{mac}.json"));
            save_device(&path, device)?;
            info!("Saved {:?}", path);
        }
    }
    Ok(())
}

async fn auth(path: &Path, local_id: &str, name: &str, out: Option<&Path>) -> Result<()> {
    let mut device = load_device(path)?;
    device
        .auth(local_id.as_bytes(), name)
        .await
        .with_context(|| format!("Auth with {} failed", device.remote_addr))?;

    let out = out.unwrap_or(path);
    save_device(out, &device)?;
    println!("Authorized {} as id {}, saved to {:?}", device.remote_addr, device.id, out);
    Ok(())
}

async fn learn(path: &Path, wait: Duration) -> Result<()> {
    let mut device = load_device(path)?;
    if !device.is_authorized() {
        bail!("device in {:?} is not authorized, run `auth` first", path);
    }

    device.start_capture().await.context("Failed to start capture")?;
    println!("Waiting for a remote control signal...");

    let deadline = Instant::now() + wait;
    loop {
        match device.read_captured().await {
            Ok((rtype, code)) => {
                println!("{rtype}: {}", hex::encode(code));
                return Ok(());
            }
            Err(e) if e.is_not_captured() || e.is_timeout() => {
                if Instant::now() >= deadline {
                    bail!("no signal captured within {:?}", wait);
                }
                sleep(Duration::from_secs(1)).await;
            }
            Err(e) => return Err(e).context("Failed to read captured code"),
        }
    }
}

async fn send(path: &Path, code: &str, rtype: RemoteType, count: u32) -> Result<()> {
    let mut device = load_device(path)?;
    if !device.is_authorized() {
        bail!("device in {:?} is not authorized, run `auth` first", path);
    }

    let code = hex::decode(code.trim()).context("Code must be hex")?;
    device
        .send_code(rtype, &code, count)
        .await
        .with_context(|| format!("Failed to send {rtype} code"))?;
    println!("Sent {} bytes as {rtype} x{count}", code.len());
    Ok(())
}
