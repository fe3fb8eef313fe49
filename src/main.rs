use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use instawatch::config::Config;
use instawatch::models::{Handle, OwnerId};
use instawatch::notifications::notifier_from_config;
use instawatch::resolver::Resolver;
use instawatch::scheduler::Monitor;
use instawatch::storage::open_repository;

#[derive(Parser)]
#[command(
    name = "instawatch",
    version,
    about = "Watches public profiles and reports when they are deactivated or come back",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file (environment variables are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor until interrupted
    Run,

    /// Resolve a handle once without touching the store
    Probe {
        /// Profile handle
        handle: String,
    },

    /// Watch a handle for an owner (replaces the owner's current target)
    Watch {
        /// Owner identifier
        owner: OwnerId,

        /// Profile handle
        handle: String,
    },

    /// Check an owner's target now
    Check {
        /// Owner identifier
        owner: OwnerId,
    },

    /// Show an owner's target
    Status {
        /// Owner identifier
        owner: OwnerId,
    },

    /// Change an owner's check interval (minutes, clamped)
    Interval {
        /// Owner identifier
        owner: OwnerId,

        /// Requested interval in minutes
        #[arg(allow_hyphen_values = true)]
        minutes: i64,
    },

    /// Stop watching an owner's target
    Reset {
        /// Owner identifier
        owner: OwnerId,
    },

    /// List all stored targets
    List,

    /// Send a message to every known owner
    Broadcast {
        /// Message text
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, cli.verbose)?;

    if let Err(e) = instawatch::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics registration failed");
    }

    match cli.command {
        Commands::Run => run(config).await?,
        Commands::Probe { handle } => probe(config, handle).await?,
        Commands::Watch { owner, handle } => {
            tracing::info!(owner = owner, handle = %handle, "Starting watch command");
            watch(config, owner, handle).await?;
        }
        Commands::Check { owner } => check(config, owner).await?,
        Commands::Status { owner } => status(config, owner)?,
        Commands::Interval { owner, minutes } => interval(config, owner, minutes).await?,
        Commands::Reset { owner } => reset(config, owner).await?,
        Commands::List => list(config)?,
        Commands::Broadcast { message } => broadcast(config, message).await?,
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("instawatch=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("instawatch=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn build_monitor(config: &Config) -> Result<Monitor> {
    let store = open_repository(&config.database).context("Failed to open target store")?;
    let resolver = Resolver::from_config(&config.probe).context("Failed to build HTTP client")?;
    let notifier = notifier_from_config(&config.notifier).context("Failed to build notifier")?;

    Ok(Monitor::new(
        store,
        resolver,
        notifier,
        config.schedule.clone(),
    ))
}

async fn run(config: Config) -> Result<()> {
    let monitor = build_monitor(&config)?;
    let scheduled = monitor.start().await?;

    tracing::info!(
        targets = scheduled,
        database = %config.database.sqlite_path.display(),
        "Monitor running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    monitor.shutdown();

    match instawatch::metrics::gather_metrics() {
        Ok(text) => tracing::debug!(metrics = %text, "Final metrics"),
        Err(e) => tracing::warn!(error = %e, "Failed to gather metrics"),
    }

    Ok(())
}

async fn probe(config: Config, handle: String) -> Result<()> {
    let handle = Handle::parse(&handle)?;
    let resolver = Resolver::from_config(&config.probe).context("Failed to build HTTP client")?;

    let resolution = resolver.resolve(&handle.normalized()).await;

    println!("{} {}", resolution.status.emoji(), handle);
    println!("  Status:    {}", resolution.status);
    println!("  Probe:     {}", resolution.probe.unwrap_or("none"));
    println!("  Rationale: {}", resolution.rationale);
    Ok(())
}

async fn watch(config: Config, owner: OwnerId, handle: String) -> Result<()> {
    let monitor = build_monitor(&config)?;
    let status = monitor.register_or_update_target(owner, &handle).await?;
    monitor.shutdown();

    println!("Now watching {handle} for owner {owner}");
    println!("  Current status: {} {}", status.emoji(), status);
    Ok(())
}

async fn check(config: Config, owner: OwnerId) -> Result<()> {
    let monitor = build_monitor(&config)?;
    let outcome = monitor.manual_check(owner).await?;
    monitor.shutdown();

    println!("{} {}: {}", outcome.status.emoji(), outcome.handle, outcome.status);
    if outcome.changed {
        println!("  Changed from {}", outcome.previous);
    }
    Ok(())
}

fn status(config: Config, owner: OwnerId) -> Result<()> {
    let monitor = build_monitor(&config)?;

    match monitor.current_status(owner)? {
        Some(snapshot) => {
            println!(
                "{} {}: {}",
                snapshot.status.emoji(),
                snapshot.handle,
                snapshot.status
            );
            println!("  Interval: {} min", snapshot.interval_minutes);
        }
        None => println!("No target set for owner {owner}"),
    }
    Ok(())
}

async fn interval(config: Config, owner: OwnerId, minutes: i64) -> Result<()> {
    let monitor = build_monitor(&config)?;
    let effective = monitor.set_interval(owner, minutes).await?;
    monitor.shutdown();

    println!("Interval for owner {owner} set to {effective} min");
    Ok(())
}

async fn reset(config: Config, owner: OwnerId) -> Result<()> {
    let monitor = build_monitor(&config)?;
    monitor.clear_target(owner).await?;

    println!("Stopped watching for owner {owner}");
    Ok(())
}

fn list(config: Config) -> Result<()> {
    let monitor = build_monitor(&config)?;
    let records = monitor.list_targets()?;

    if records.is_empty() {
        println!("No targets stored");
        return Ok(());
    }

    println!("{:<12} {:<32} {:<12} {:>8} {:>7}", "OWNER", "HANDLE", "STATUS", "INTERVAL", "ERRORS");
    for record in records {
        println!(
            "{:<12} {:<32} {:<12} {:>8} {:>7}",
            record.owner_id,
            record.active_handle().unwrap_or("-"),
            record.last_known_status.as_str(),
            record.interval_minutes,
            record.consecutive_errors
        );
    }
    Ok(())
}

async fn broadcast(config: Config, message: String) -> Result<()> {
    let monitor = build_monitor(&config)?;
    let delivered = monitor.broadcast(&message).await?;

    println!("Delivered to {delivered} owner(s)");
    Ok(())
}
