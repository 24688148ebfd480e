//! Demo app: prints device metadata and reports telemetry through tattle.
//!
//! Stands in for the host application glue around the library — the
//! device-info display, the record triggers, and the lifecycle signal a
//! real app would wire to its suspend/terminate notifications. Records
//! whatever counters, gauges, and events are given on the command line,
//! then drives a terminating lifecycle flush against the configured
//! collector.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sysinfo::System;

use tattle::{
    CollectorConfig, DeviceSnapshot, FileStore, HttpCollector, LifecycleSignal, NoExtension,
    StaticDevice, Telemetry, TelemetryConfig,
};

/// tattle-demo — device metadata reporter with buffered telemetry.
#[derive(Parser)]
#[command(name = "tattle-demo", version, about)]
struct Cli {
    /// Base URL of the telemetry collector.
    #[arg(long, default_value = "http://localhost:8000")]
    endpoint: String,

    /// Application name used in collector paths.
    #[arg(long, default_value = "tattle-demo")]
    app_name: String,

    /// Shared secret for the collector's `key` query parameter.
    #[arg(long, default_value = "dev-key")]
    key: String,

    /// Path to the persisted telemetry state file.
    #[arg(long, default_value = "./tattle_state.json")]
    state: PathBuf,

    /// Counter to increment by 1 (repeatable).
    #[arg(long = "counter")]
    counters: Vec<String>,

    /// Gauge observation as `name=value` (repeatable).
    #[arg(long = "gauge")]
    gauges: Vec<String>,

    /// Event to record (repeatable).
    #[arg(long = "event")]
    events: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!("demo failed: {e}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = device_snapshot();
    print_device_info(&snapshot);

    let collector = HttpCollector::new(
        CollectorConfig::new(cli.endpoint, cli.app_name, cli.key),
    )?;
    let store = Arc::new(FileStore::open(&cli.state));
    let telemetry = Telemetry::new(
        TelemetryConfig::new(),
        Arc::new(collector),
        store,
        Arc::new(StaticDevice::new(snapshot)),
    )?;

    for name in &cli.counters {
        telemetry.record_counter(name, 1);
    }
    for gauge in &cli.gauges {
        match parse_gauge(gauge) {
            Some((name, value)) => telemetry.record_gauge(name, value),
            None => tracing::warn!("ignoring malformed gauge '{gauge}' (expected name=value)"),
        }
    }
    for name in &cli.events {
        telemetry.record_event(name, None);
    }

    println!("\n{} records pending delivery", telemetry.pending_len());

    // A real app would wire this to its suspend/terminate notifications.
    telemetry
        .handle_lifecycle(LifecycleSignal::WillTerminate, &NoExtension)
        .await;

    println!("{} records still queued for next launch", telemetry.pending_len());
    Ok(())
}

/// Reads live host metadata the way the on-screen device-info list shows it.
fn device_snapshot() -> DeviceSnapshot {
    DeviceSnapshot {
        model: System::cpu_arch(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        build_number: "1".to_string(),
        os_name: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
        os_version: System::os_version().unwrap_or_else(|| "unknown".to_string()),
        os_version_string: System::long_os_version().unwrap_or_else(|| "unknown".to_string()),
    }
}

fn print_device_info(snapshot: &DeviceSnapshot) {
    println!("Device");
    println!("  Model:               {}", snapshot.model);
    println!("  OS Name:             {}", snapshot.os_name);
    println!("  OS Version:          {}", snapshot.os_version);
    println!("  Extended OS Version: {}", snapshot.os_version_string);
    println!("  App Version:         {}", snapshot.app_version);
}

fn parse_gauge(input: &str) -> Option<(&str, f32)> {
    let (name, value) = input.split_once('=')?;
    value.parse().ok().map(|v| (name, v))
}
