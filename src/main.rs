//! Demo device agent
//!
//! Simulates a temperature/humidity sensor: initializes the SDK from a TOML
//! config, registers with the platform, then loops maintaining the
//! connection and publishing a reading every few seconds. Inbound commands
//! of the form `{"operation": "led_on"}` toggle a (logged) LED.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tokio::time::{Duration, Instant};
use tracing::{error, info, warn};

use twinlink::observability::init_default_logging;
use twinlink::{SdkConfig, SensorMetadata, TwinSdk};

/// Demo device agent for the Twin telemetry platform
#[derive(Parser)]
#[command(name = "twinlink")]
#[command(about = "Twin telemetry device agent")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the device agent
    Run {
        /// WiFi network name (ignored on hosts where the OS owns connectivity)
        #[arg(long, env = "TWINLINK_WIFI_SSID", default_value = "")]
        ssid: String,

        /// WiFi password
        #[arg(long, env = "TWINLINK_WIFI_PASSWORD", default_value = "")]
        password: String,
    },
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting twinlink v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run { ssid, password } => run_device(config, &ssid, &password).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Shutdown complete");
}

fn load_configuration(config_path: &Option<PathBuf>) -> Result<SdkConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(SdkConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = ["twinlink.toml", "config/twinlink.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(SdkConfig::load_from_file(&path)?);
                }
            }

            Err("No configuration file found. Provide one with -c/--config or create twinlink.toml".into())
        }
    }
}

async fn run_device(
    config: SdkConfig,
    ssid: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let sensor_id = config.identity.sensor_id.clone();
    info!(sensor_id = %sensor_id, "starting device agent");

    let mut sdk = TwinSdk::with_defaults(config)?;

    sdk.set_command_handler(handle_command);
    sdk.set_error_handler(|e| {
        warn!("SDK error: {e}");
    });

    sdk.initialize(ssid, password).await?;

    // A failed registration is not fatal for the demo; readings still flow.
    if let Err(e) = sdk
        .register_sensor("temperature", SensorMetadata::default())
        .await
    {
        warn!("sensor registration failed: {e}");
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut tick = tokio::time::interval(Duration::from_millis(250));
    let mut last_reading = Instant::now();

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("received Ctrl-C, shutting down");
                break;
            }
            _ = tick.tick() => {
                sdk.maintain().await;

                if last_reading.elapsed() >= Duration::from_secs(5) {
                    let payload = simulated_reading(sdk.uptime_ms());
                    match sdk.send_data(&payload).await {
                        Ok(()) => info!(payload = %payload, "reading published"),
                        Err(e) => warn!("failed to publish reading: {e}"),
                    }
                    last_reading = Instant::now();
                }
            }
        }
    }

    sdk.disconnect().await;
    Ok(())
}

fn handle_config_command(config: SdkConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}

fn handle_command(command: &str) {
    let parsed: serde_json::Value = match serde_json::from_str(command) {
        Ok(value) => value,
        Err(e) => {
            warn!("unparseable command: {e}");
            return;
        }
    };

    match parsed["operation"].as_str() {
        Some("led_on") => info!("LED on"),
        Some("led_off") => info!("LED off"),
        other => warn!(?other, "unknown operation"),
    }
}

/// Slow sine waves standing in for a real sensor.
fn simulated_reading(uptime_ms: u64) -> String {
    let phase = uptime_ms as f64 / 60_000.0 * std::f64::consts::TAU;
    let temperature = 25.0 + 2.5 * phase.sin();
    let humidity = 60.0 + 10.0 * (phase / 2.0).cos();
    format!(r#"{{"temperature": {temperature:.1}, "humidity": {humidity:.1}}}"#)
}
