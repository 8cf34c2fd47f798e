//! ramgov - Background resource governor CLI

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ramgov::{
    create_platform, detect_elevated, format_bytes, EventBus, Governor, GovernorConfig,
    TelemetrySampler,
};

#[derive(Parser)]
#[command(name = "ramgov")]
#[command(about = "Background resource governor: standby reclaim, priority rules, CPU telemetry", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "ramgov.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current memory and CPU status
    Status {
        /// Emit machine-readable JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run the governor loops until interrupted
    Run,

    /// Reclaim standby memory once and exit
    Clean,

    /// Show the effective configuration
    Config,
}

#[derive(Serialize)]
struct StatusReport {
    total_bytes: u64,
    available_bytes: u64,
    used_percentage: f32,
    cpu_usage_percent: f32,
    cpu_temperature_celsius: Option<f64>,
    cpu_count: usize,
    elevated: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; RUST_LOG overrides the default level.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
        )
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Status { json } => {
            let platform = create_platform();
            let snapshot = platform.memory.snapshot()?;
            let sampler = TelemetrySampler::new(platform.telemetry);
            let sample = sampler.sample();

            let report = StatusReport {
                total_bytes: snapshot.total_bytes,
                available_bytes: snapshot.available_bytes,
                used_percentage: snapshot.used_percentage,
                cpu_usage_percent: sample.cpu_usage_percent,
                cpu_temperature_celsius: sample.cpu_temperature_celsius,
                cpu_count: num_cpus::get(),
                elevated: detect_elevated(),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Memory Status:");
                println!("  Total:     {}", format_bytes(report.total_bytes));
                println!("  Available: {}", format_bytes(report.available_bytes));
                println!(
                    "  Used:      {} ({:.1}%)",
                    format_bytes(snapshot.used_bytes()),
                    report.used_percentage
                );
                println!("CPU Status:");
                println!("  Cores:     {}", report.cpu_count);
                println!("  Usage:     {:.1}%", report.cpu_usage_percent);
                match report.cpu_temperature_celsius {
                    Some(temp) => println!("  Temp:      {:.1} C", temp),
                    None => println!("  Temp:      unavailable"),
                }
                println!(
                    "Privileges:  {}",
                    if report.elevated { "elevated" } else { "limited" }
                );
            }
        }

        Commands::Run => {
            if !detect_elevated() {
                warn!("not running elevated - reclaim and priority changes may be denied");
            }

            let config = GovernorConfig::load(&cli.config)?;
            info!(
                "starting governor (threshold {}, check every {}s, sweep every {}s, {} rules)",
                format_bytes(config.memory_threshold_bytes),
                config.memory_check_interval_secs,
                config.sweep_interval_secs,
                config.rules.len()
            );

            let bus = EventBus::new();
            let mut events = bus.subscribe();
            let printer = tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    println!("{}", event);
                }
            });

            let governor = Governor::initialize(config, create_platform(), bus)?;
            governor.start_all().await;

            tokio::signal::ctrl_c().await?;
            info!("interrupt received, shutting down");
            governor.stop_all().await;
            printer.abort();
        }

        Commands::Clean => {
            if !detect_elevated() {
                warn!("not running elevated - reclaim may be denied");
            }

            let config = GovernorConfig::load(&cli.config)?;
            let governor = Governor::initialize(config, create_platform(), EventBus::new())?;
            let freed = governor.clean_now();
            println!("Standby reclaim freed {}", format_bytes(freed));
        }

        Commands::Config => {
            let config = GovernorConfig::load(&cli.config)?;
            println!("Current Configuration ({}):", cli.config.display());
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
