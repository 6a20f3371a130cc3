// blebridge — desktop harness for the BLE call bridge
//
// Drives the native-side bridge against an in-process simulated scripting
// runtime, and manages the bridge configuration.

mod config;
mod simulator;

use anyhow::{Context, Result};
use blebridge_core::{
    BleErrorCode, BridgeError, CharacteristicTarget, ConnectionOptions, DescriptorTarget,
    MethodCall, Response, ScanOptions, ScriptBridge,
};
use clap::{Parser, Subcommand};
use colored::*;
use futures::StreamExt;
use simulator::{PeripheralFile, Simulator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "blebridge")]
#[command(about = "BLE bridge — native/script call correlation harness", long_about = None)]
#[command(version)]
struct Cli {
    /// Use this config file instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full client session against simulated peripherals
    Simulate {
        /// JSON file describing the peripherals
        #[arg(short, long)]
        peripherals: Option<PathBuf>,
        /// Notifications per monitored characteristic (overrides config)
        #[arg(short, long)]
        notifications: Option<usize>,
    },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run self-tests
    Test,
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = config::Config::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate {
            peripherals,
            notifications,
        } => cmd_simulate(&config_path, peripherals, notifications).await,
        Commands::Config { action } => cmd_config(&config_path, action),
        Commands::Test => cmd_test().await,
    }
}

/// Bridge wired to a simulator thread. Dropping the bridge stops the thread.
fn start_session(
    file: PeripheralFile,
    notifications: usize,
    config: &config::Config,
) -> Result<(Arc<ScriptBridge>, std::thread::JoinHandle<()>)> {
    let (tx, rx) = std::sync::mpsc::channel::<MethodCall>();
    let bridge = Arc::new(
        ScriptBridge::new(Arc::new(tx), config.bridge.clone())
            .context("Failed to create bridge")?,
    );
    let handle = simulator::spawn(
        Simulator::new(file, notifications),
        rx,
        Arc::downgrade(&bridge),
    );
    Ok((bridge, handle))
}

async fn cmd_simulate(
    config_path: &std::path::Path,
    peripherals: Option<PathBuf>,
    notifications: Option<usize>,
) -> Result<()> {
    let config = config::Config::load_from(config_path)?;
    let file = match peripherals {
        Some(path) => PeripheralFile::load(&path)?,
        None => PeripheralFile::demo(),
    };
    let notifications = notifications.unwrap_or(config.notifications);

    println!("{}", "Starting simulated session...".bold());
    println!();

    let (bridge, handle) = start_session(file, notifications, &config)?;
    run_session(&bridge, Duration::from_millis(config.scan_window_ms)).await?;

    let stats = bridge.facade().stats();
    println!();
    println!("{}", "Bridge statistics".bold());
    println!("  {:<12} {}", "registered".bright_cyan(), stats.registered);
    println!("  {:<12} {}", "delivered".bright_cyan(), stats.delivered);
    println!("  {:<12} {}", "missed".bright_cyan(), stats.missed);
    println!("  {:<12} {}", "cancelled".bright_cyan(), stats.cancelled);
    println!("  {:<12} {}", "pending".bright_cyan(), stats.pending);

    drop(bridge);
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("Simulator thread panicked"))?;
    Ok(())
}

async fn run_session(bridge: &ScriptBridge, scan_window: Duration) -> Result<()> {
    bridge.create_client().await?;
    println!("  {} Client created", "✓".green());

    let mut scan = bridge.start_scan(ScanOptions::default())?;
    let mut found: Vec<String> = Vec::new();
    let deadline = tokio::time::Instant::now() + scan_window;
    while let Ok(Some(item)) = tokio::time::timeout_at(deadline, scan.next()).await {
        match item? {
            Response::ScanResult(result) => {
                if !found.contains(&result.id) {
                    println!(
                        "  {} Found {} {} ({} dBm)",
                        "•".bright_blue(),
                        result.id.bright_cyan(),
                        result.name.as_deref().unwrap_or("(unnamed)"),
                        result.rssi
                    );
                    found.push(result.id);
                }
            }
            Response::Failed(err) => anyhow::bail!("Scan failed: {}", err),
            other => tracing::debug!("Ignoring scan delivery {:?}", other),
        }
    }
    drop(scan);
    bridge.stop_scan().await?;
    println!("  {} Scan stopped ({} devices)", "✓".green(), found.len());

    for id in &found {
        let device = bridge.connect(id, ConnectionOptions::default()).await?;
        println!(
            "  {} Connected {} (mtu {})",
            "✓".green(),
            device.id.bright_cyan(),
            device.mtu.map(|m| m.to_string()).unwrap_or_else(|| "?".to_string())
        );

        let services = bridge.discover(id, &format!("discover-{}", id)).await?;
        for service in &services {
            println!("    {} {}", "service".dimmed(), service.uuid);
            for characteristic in &service.characteristics {
                let target = CharacteristicTarget::Id(characteristic.id);
                println!("      {} {}", "characteristic".dimmed(), characteristic.uuid);

                if characteristic.is_readable {
                    let read = bridge
                        .read_characteristic(&target, &format!("read-{}", characteristic.id))
                        .await?;
                    println!(
                        "        read  {}",
                        read.value.as_deref().unwrap_or("(empty)").bright_white()
                    );
                }

                if characteristic.is_notifiable {
                    let transaction_id = format!("monitor-{}", characteristic.id);
                    let mut monitor = bridge.monitor_characteristic(&target, &transaction_id)?;
                    while let Ok(Some(item)) =
                        tokio::time::timeout(scan_window, monitor.next_response()).await
                    {
                        match item? {
                            Response::Characteristic(update) => println!(
                                "        notify {}",
                                update.value.as_deref().unwrap_or("(empty)").bright_white()
                            ),
                            Response::Failed(err) => {
                                println!("        {} {}", "✗".red(), err);
                                break;
                            }
                            other => tracing::debug!("Ignoring monitor delivery {:?}", other),
                        }
                    }
                    if monitor.is_active() {
                        bridge.cancel_transaction(&transaction_id)?;
                    }
                }
            }
        }

        bridge.disconnect(id).await?;
        println!("  {} Disconnected {}", "✓".green(), id.bright_cyan());
    }

    bridge.destroy_client().await?;
    println!("  {} Client destroyed", "✓".green());
    Ok(())
}

fn cmd_config(config_path: &std::path::Path, action: ConfigAction) -> Result<()> {
    let mut config = config::Config::load_from(config_path)?;

    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save_to(config_path)?;
            println!("{} Set {} = {}", "✓".green(), key.bright_cyan(), value);
        }

        ConfigAction::Get { key } => {
            if let Some(value) = config.get(&key) {
                println!("{} = {}", key.bright_cyan(), value);
            } else {
                anyhow::bail!("Unknown config key: {}", key);
            }
        }

        ConfigAction::List => {
            println!("{}", "Configuration".bold());
            println!("  {}", config_path.display().to_string().dimmed());
            println!();

            for (key, value) in config.list() {
                println!("  {:<20} {}", key.bright_cyan(), value);
            }
        }
    }

    Ok(())
}

async fn cmd_test() -> Result<()> {
    println!("{}", "Running self-tests...".bold());
    println!();

    let config = config::Config {
        bridge: blebridge_core::BridgeConfig::default()
            .with_request_timeout(Duration::from_millis(500)),
        ..config::Config::default()
    };
    let (bridge, handle) = start_session(PeripheralFile::demo(), 3, &config)?;
    let device_id = "D0:5F:B8:00:00:01";

    bridge.create_client().await?;
    println!("{} Client lifecycle", "✓".green());

    match bridge
        .read_characteristic(&CharacteristicTarget::Id(4), "read-before-connect")
        .await
    {
        Err(BridgeError::Ble(err)) if err.code == BleErrorCode::DeviceNotConnected => {}
        other => anyhow::bail!("Expected DeviceNotConnected, got {:?}", other),
    }
    println!("{} Error payloads surface as BLE errors", "✓".green());

    bridge.connect(device_id, ConnectionOptions::default()).await?;
    let services = bridge.discover(device_id, "discover").await?;
    anyhow::ensure!(services.len() == 1, "Expected one service");
    println!("{} Connect and discovery", "✓".green());

    let monitor = bridge.monitor_characteristic(&CharacteristicTarget::Id(2), "hr")?;
    let updates: Vec<_> = monitor.collect().await;
    anyhow::ensure!(updates.len() == 3, "Expected 3 notifications, got {}", updates.len());
    println!("{} Streaming delivery until final", "✓".green());

    let descriptor = bridge
        .write_descriptor(&DescriptorTarget::Id(3), "AQA=", "cccd")
        .await?;
    anyhow::ensure!(descriptor.value.as_deref() == Some("AQA="), "Descriptor write lost");
    println!("{} Descriptor write", "✓".green());

    let stats_before = bridge.facade().stats();
    bridge.facade().handle_return_call("not-a-call", Default::default());
    anyhow::ensure!(
        bridge.facade().stats().missed == stats_before.missed + 1,
        "Unknown id should count as missed"
    );
    println!("{} Unknown ids are benign misses", "✓".green());

    bridge.destroy_client().await?;
    anyhow::ensure!(bridge.facade().pending_count() == 0, "Callbacks leaked");
    println!("{} No pending callbacks after teardown", "✓".green());

    drop(bridge);
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("Simulator thread panicked"))?;

    println!();
    println!("{}", "All tests passed!".green().bold());

    Ok(())
}
