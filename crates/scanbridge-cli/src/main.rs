//! Scanbridge demo
//!
//! Runs a scanner session over the simulated driver: initialize, list the
//! connected devices, subscribe to every barcode, beep the target device and
//! request one scan from it.
//!
//! # Usage
//!
//! ```bash
//! scanbridge --device SN1=1 --device SN2=2 --serial SN1 --simulate-read 123
//! ```
//!
//! With a session config file (JSON) and staying alive for passive reads:
//! ```bash
//! RUST_LOG=scanbridge_engine=debug scanbridge --config session.json --wait
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use scanbridge_core::BeepPattern;
use scanbridge_driver::mock::MockDriver;
use scanbridge_engine::{Session, SessionConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scanbridge")]
#[command(about = "Barcode scanner session demo over a simulated driver")]
struct Args {
    /// Session configuration file (JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Simulated device as SERIAL=ID, may be repeated
    #[arg(long = "device", value_parser = parse_device, default_values = ["SN1=1", "SN2=2"])]
    devices: Vec<(String, u32)>,

    /// Serial number of the device to beep and scan (defaults to the first device)
    #[arg(short, long)]
    serial: Option<String>,

    /// Scan timeout in milliseconds (defaults to the configured timeout)
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// Beep pattern to play before scanning (0-26)
    #[arg(short, long, default_value = "2")]
    beep: BeepPattern,

    /// Barcode the simulated device reads when triggered
    #[arg(long)]
    simulate_read: Option<String>,

    /// Delay before the simulated read is reported, in milliseconds
    #[arg(long, default_value_t = 200)]
    read_delay_ms: u64,

    /// Keep running and print barcodes until Ctrl+C
    #[arg(short, long)]
    wait: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &args.config {
        Some(path) => load_config(Path::new(path))?,
        None => SessionConfig::default(),
    };

    let target = match args.serial.clone().or_else(|| args.devices.first().map(|d| d.0.clone())) {
        Some(serial) => serial,
        None => bail!("no device to scan: pass --serial or at least one --device"),
    };

    let (driver, handle) = MockDriver::with_name("simulated driver".to_string());
    for (serial, device_id) in &args.devices {
        handle.attach_device(serial.clone(), *device_id);
    }
    if let Some(text) = &args.simulate_read {
        handle.script_read(target.clone(), text, Duration::from_millis(args.read_delay_ms));
    }

    let session = Session::new(driver, config).context("invalid session configuration")?;

    info!("Initializing scanner session");
    if let Err(e) = session.initialize().await {
        error!("Couldn't initialize scanner session: {}", e);
        session.dispose().await;
        return Err(e.into());
    }

    let devices = session.list_devices()?;
    info!("Connected devices: {}", devices.join(", "));

    let mut subscription = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            info!(
                serial = %event.device_serial,
                label_type = %event.raw_label_type,
                "Barcode: {}",
                event.barcode_text
            );
        }
    });

    if let Err(e) = session.beep(&target, args.beep).await {
        warn!("Beep failed: {}", e);
    }

    let scanned = match args.timeout_ms {
        Some(ms) => session.scan(&target, Duration::from_millis(ms)).await,
        None => session.scan_default(&target).await,
    };
    match &scanned {
        Ok(barcode) if barcode.is_empty() => println!("No barcode read from {target}"),
        Ok(barcode) => println!("Scanned barcode: {barcode}"),
        Err(e) => error!("Scan failed: {}", e),
    }

    if args.wait {
        info!("Waiting for barcode scans. Press Ctrl+C to exit...");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl+C")?;
    }

    session.dispose().await;
    printer.abort();

    scanned.map(|_| ()).map_err(Into::into)
}

fn load_config(path: &Path) -> Result<SessionConfig> {
    info!("Loading config from: {}", path.display());
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: SessionConfig = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn parse_device(s: &str) -> std::result::Result<(String, u32), String> {
    let (serial, id) = s
        .split_once('=')
        .ok_or_else(|| format!("expected SERIAL=ID, got '{s}'"))?;
    let serial = serial.trim();
    if serial.is_empty() {
        return Err(format!("empty serial in '{s}'"));
    }
    let id = id
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid device id in '{s}': {e}"))?;
    Ok((serial.to_string(), id))
}
