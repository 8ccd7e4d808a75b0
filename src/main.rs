//! ParkiMotion - vibration-therapy device link
//!
//! Streams accelerometer frames from the device, tracks the dominant
//! vibration frequency on the Z axis and keeps the device driven at the
//! desired therapy frequency.
//!
//! # Usage
//!
//! ```bash
//! # Run a session with the default ports (COM6 in, COM11 out)
//! parkimotion
//!
//! # Linux ports, moderate profile, JSON readings on stdout
//! parkimotion --read-port /dev/ttyUSB0 --write-port /dev/ttyUSB1 --profile moderate --json
//!
//! # List serial ports / check that the configured ports open
//! parkimotion ports
//! parkimotion probe
//! ```
//!
//! # Environment Variables
//!
//! - `PARKIMOTION_CONFIG`: Path to a TOML config file (default: ./parkimotion.toml)
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use parkimotion::acquisition::{list_ports, probe_port, PortSettings, SerialConnector};
use parkimotion::{Pipeline, PipelineConfig, SessionMonitor, SessionReading, TherapyProfile};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "parkimotion")]
#[command(about = "Vibration-therapy device link: acquisition, spectral analysis and frequency control")]
#[command(version)]
struct CliArgs {
    /// Config file (overrides PARKIMOTION_CONFIG and ./parkimotion.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Port the accelerometer stream arrives on
    #[arg(long, value_name = "PORT")]
    read_port: Option<String>,

    /// Port drive-frequency commands are written to
    #[arg(long, value_name = "PORT")]
    write_port: Option<String>,

    /// Baud rate for both links
    #[arg(long)]
    baud: Option<u32>,

    /// Therapy profile: mild, moderate or severe
    #[arg(long)]
    profile: Option<TherapyProfile>,

    /// Drive frequency in Hz (clamped into the profile's range)
    #[arg(long, value_name = "HZ")]
    frequency: Option<f64>,

    /// Emit logs and readings as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run a monitored therapy session (default)
    Run,

    /// List serial ports visible to the OS
    Ports,

    /// Open and release a port to check it is usable
    Probe {
        /// Port to probe (default: the configured read and write ports)
        #[arg(long)]
        port: Option<String>,
    },
}

// ============================================================================
// Configuration
// ============================================================================

fn load_config(args: &CliArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::load(),
    };

    if let Some(port) = &args.read_port {
        config.serial.read_port.clone_from(port);
    }
    if let Some(port) = &args.write_port {
        config.serial.write_port.clone_from(port);
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(profile) = args.profile {
        config.session.profile = profile;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Subcommands
// ============================================================================

fn run_ports() -> Result<()> {
    let ports = list_ports().context("Could not enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

fn run_probe(config: &PipelineConfig, port: Option<String>) -> Result<()> {
    let serial = &config.serial;
    let names = match port {
        Some(name) => vec![name],
        None => vec![serial.read_port.clone(), serial.write_port.clone()],
    };

    let mut failed = 0;
    for name in names {
        let settings = PortSettings::new(name.as_str(), serial.baud_rate, serial.read_timeout());
        match probe_port(&SerialConnector, &settings) {
            Ok(()) => println!("{name}: ok"),
            Err(e) => {
                println!("{name}: {e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} port(s) could not be opened");
    }
    Ok(())
}

fn print_reading(reading: &SessionReading, json: bool) {
    if json {
        match serde_json::to_string(reading) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "Could not serialize reading"),
        }
    } else {
        info!(
            desired_hz = format_args!("{:.2}", reading.desired_hz),
            detected_hz = format_args!("{:.2}", reading.detected_hz),
            peak_g = format_args!("{:.3}", reading.peak_g),
            displacement_cm = format_args!("{:.3}", reading.displacement_cm),
            samples = reading.samples,
            "Reading"
        );
    }
}

async fn run_session(config: PipelineConfig, frequency: Option<f64>, json: bool) -> Result<()> {
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  ParkiMotion - vibration therapy session");
    info!(
        "  Read: {} | Write: {} | {} baud",
        config.serial.read_port, config.serial.write_port, config.serial.baud_rate
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Could not listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C, shutting down...");
        shutdown_token.cancel();
    });

    let profile = config.session.profile;
    let interval = config.session.poll_interval();
    let pipeline = Arc::new(
        Pipeline::with_cancel_token(config, SerialConnector, cancel_token.clone())
            .context("Could not build analysis pipeline")?,
    );
    pipeline.start();

    let mut monitor = SessionMonitor::new(Arc::clone(&pipeline), profile);
    match frequency {
        Some(hz) => monitor.set_desired(hz),
        None => monitor.select_profile(profile),
    };

    let history = monitor
        .run(interval, cancel_token, |reading| print_reading(reading, json))
        .await;

    // Joining the reader can block for one read timeout.
    let stopping = Arc::clone(&pipeline);
    tokio::task::spawn_blocking(move || stopping.shutdown())
        .await
        .context("Shutdown task failed")?;

    info!(readings = history.len(), "Session ended");
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json);

    if matches!(args.command, Some(SubCommand::Ports)) {
        return run_ports();
    }

    let config = load_config(&args)?;
    match args.command {
        Some(SubCommand::Probe { port }) => run_probe(&config, port),
        Some(SubCommand::Run | SubCommand::Ports) | None => {
            run_session(config, args.frequency, args.json).await
        }
    }
}
