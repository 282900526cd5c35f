//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "binary"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Binary entrypoint for the R-Swarm vehicle daemon."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use r_swarm_common::config::{AppConfig, LoadedAppConfig};
use r_swarm_common::logging::init_tracing;
use r_swarm_core::{Vehicle, VehicleHandle};
use r_swarm_schema::to_json_string;
use r_swarm_transport::Channel;
use serde::Serialize;
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "R-Swarm vehicle daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the vehicle until interrupted")]
    Run,
    #[command(about = "Run the vehicle and feed it a recorded event stream")]
    Replay {
        #[arg(value_name = "FILE", help = "Newline-delimited JSON events")]
        file: PathBuf,
        #[arg(
            long,
            value_name = "SECONDS",
            default_value_t = 1.0,
            help = "Time left for components to settle after the last event"
        )]
        settle: f64,
    },
    #[command(about = "List the communication channels and their wire hashes")]
    Channels {
        #[arg(long, help = "Print JSON instead of a table")]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct ChannelRow {
    name: &'static str,
    hash: i64,
    whitelist: &'static [&'static str],
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run);
    if let Commands::Channels { json } = command {
        return print_channels(json);
    }

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.extend(AppConfig::DEFAULT_CANDIDATES.iter().map(PathBuf::from));

    let load_started = Instant::now();
    let LoadedAppConfig { config, source } = AppConfig::load_with_source(&candidates)?;
    init_tracing("r-swarmd", &config.logging)?;
    info!(
        config_path = %source.display(),
        load_ms = load_started.elapsed().as_millis() as u64,
        "configuration loaded"
    );

    match command {
        Commands::Run => run_daemon(config).await,
        Commands::Replay { file, settle } => replay(config, file, settle).await,
        Commands::Channels { .. } => Ok(()),
    }
}

async fn run_daemon(config: AppConfig) -> Result<()> {
    let handle = Vehicle::new(config).start()?;
    info!(
        vehicle = handle.config().vehicle.id,
        "vehicle running; waiting for termination signal"
    );
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    shutdown(handle).await
}

async fn replay(config: AppConfig, file: PathBuf, settle: f64) -> Result<()> {
    let handle = Vehicle::new(config).start()?;
    let replayed = handle
        .replay(&file)
        .with_context(|| format!("failed to replay {}", file.display()))?;
    info!(events = replayed, file = %file.display(), "replay finished");

    let settle = Duration::try_from_secs_f64(settle).unwrap_or_default();
    tokio::select! {
        _ = tokio::time::sleep(settle) => {}
        result = signal::ctrl_c() => {
            result?;
            warn!("ctrl-c received; cutting settle time short");
        }
    }
    println!("{}", to_json_string(&handle.state())?);
    shutdown(handle).await
}

/// Stop the vehicle off the async runtime, then write the metrics dump.
async fn shutdown(handle: VehicleHandle) -> Result<()> {
    let dump = handle.config().metrics.dump_path.clone();
    let metrics = tokio::task::spawn_blocking(move || {
        let metrics = handle.metrics_text();
        handle.shutdown().map(|()| metrics)
    })
    .await??;

    if let Some(path) = dump {
        match metrics {
            Some(text) => {
                tokio::fs::write(&path, text)
                    .await
                    .with_context(|| format!("failed to write metrics to {}", path.display()))?;
                info!(path = %path.display(), "metrics dumped");
            }
            None => warn!(path = %path.display(), "metrics dump requested but metrics are disabled"),
        }
    }
    Ok(())
}

fn print_channels(json: bool) -> Result<()> {
    let rows: Vec<ChannelRow> = Channel::all()
        .map(|channel| ChannelRow {
            name: channel.name(),
            hash: channel.hash(),
            whitelist: channel.whitelist(),
        })
        .collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for row in rows {
        let fields = if row.whitelist.is_empty() {
            "*".to_owned()
        } else {
            row.whitelist.join(",")
        };
        println!("{:<16} {:>20}  {}", row.name, row.hash, fields);
    }
    Ok(())
}
