//! keybridge - MIDI input bridge
//!
//! Watches MIDI input devices, decodes their note traffic and prints each
//! event for the host application, one line per event.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keybridge::provider::system;
use keybridge::{BridgeConfig, BridgeEvent, ChannelSink, DeviceRegistry, SystemProvider};

/// Keybridge - forward MIDI input devices to a host as note events
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "keybridge.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI input ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Print events as JSON lines instead of the plain wire format
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level)?;

    info!("Starting keybridge...");

    // Handle list ports
    if args.list_ports {
        system::list_ports_formatted();
        return Ok(());
    }

    // Load configuration; a missing file means defaults, a broken one is
    // an error
    let config = load_config(&args.config).await?;

    // Set up shutdown signal
    let shutdown_signal = shutdown_signal();

    run_app(config, args.json, shutdown_signal).await?;

    info!("keybridge shutdown complete");
    Ok(())
}

async fn load_config(path: &str) -> Result<BridgeConfig> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let config = BridgeConfig::load(path).await?;
        info!("Configuration loaded from {}", path);
        Ok(config)
    } else {
        info!("Config file '{}' not found, using defaults", path);
        Ok(BridgeConfig::default())
    }
}

async fn run_app(
    config: BridgeConfig,
    json: bool,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let provider =
        Arc::new(SystemProvider::new(&config.client_name).with_filter(config.name_filter.clone()));
    if let Some(filter) = &config.name_filter {
        info!("Bridging devices matching '{}'", filter);
    }

    let (sink, mut events) = ChannelSink::new(config.event_buffer);
    let registry = DeviceRegistry::new(provider, Arc::new(sink));

    // Pick up devices attached before we started
    match registry.scan_existing().await {
        Ok(count) => info!("Initial scan found {} device(s)", count),
        Err(e) => warn!("Initial device scan failed: {}", e),
    }

    let watcher = registry.watch(config.poll_interval());
    info!(
        "Watching for device changes every {}ms",
        config.poll_interval_ms
    );

    // Main event loop
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                print_event(&event, json);
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    // Cleanup
    watcher.abort();
    registry.shutdown().await;

    Ok(())
}

fn print_event(event: &BridgeEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize event: {}", e),
        }
        return;
    }

    match event {
        BridgeEvent::Connectivity { device, connected } => {
            if *connected {
                println!("{} {}", "connected".green().bold(), device);
            } else {
                println!("{} {}", "disconnected".red().bold(), device);
            }
        }
        BridgeEvent::Note { device, event } => {
            println!("{} {}", device.dimmed(), event.wire_format());
        }
        BridgeEvent::Failed { device, reason } => {
            println!("{} {} ({})", "failed".yellow().bold(), device, reason);
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
