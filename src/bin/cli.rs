//! tourwatch CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Month, Utc};
use clap::{Parser, Subcommand};
use tourwatch::{
    error::{AppError, Result},
    models::{Config, SourceConfig},
    pipeline::{self, Monitor, RefreshOptions, RefreshReport},
    services::{self, EventSource},
    storage::{EventStore, LocalStorage, SNAPSHOT_FILE, is_fresh},
    utils::http,
};

/// tourwatch - Tour Date Watcher
#[derive(Parser, Debug)]
#[command(
    name = "tourwatch",
    version,
    about = "Watches a band's tour listing and announces new shows"
)]
struct Cli {
    /// Path to storage directory containing config and state files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, diff and announce new shows once
    Refresh {
        /// Bypass the circuit breaker
        #[arg(long)]
        force: bool,

        /// Log what would be announced without sending or saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Refresh repeatedly on a fixed interval
    Watch {
        /// Hours between refreshes (default: from config)
        #[arg(long)]
        interval_hours: Option<u64>,
    },

    /// Print the current tour dates
    Show {
        /// Only shows starting in this month (name or number)
        #[arg(long, value_parser = parse_month)]
        month: Option<Month>,

        /// Ignore the cache and fetch now
        #[arg(long)]
        refresh: bool,
    },

    /// Mark every listed show as announced without sending anything
    Seed,

    /// Drop ledger entries past the retention window
    Prune,

    /// Validate configuration
    Validate,

    /// Show cache and ledger info
    Info,

    /// Write a default config.toml
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn parse_month(s: &str) -> std::result::Result<Month, String> {
    if let Ok(n) = s.parse::<u8>() {
        return Month::try_from(n).map_err(|_| format!("month number out of range: {n}"));
    }
    s.parse::<Month>()
        .map_err(|_| format!("unknown month: {s}"))
}

fn log_report(report: &RefreshReport) {
    log::info!(
        "Refresh: {} fetched, {} events, {} skipped, {} new, {} updated, {} announced, {} failed",
        report.fetched,
        report.normalized,
        report.skipped,
        report.added,
        report.updated,
        report.announced,
        report.failed_notifications
    );
    if !report.cache_saved {
        log::warn!("Cache was not updated");
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        log::warn!(
            "Config already exists at {}. Use --force to overwrite.",
            path.display()
        );
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, Config::default().to_toml()?)?;
    log::info!("Default config written to {}", path.display());
    Ok(())
}

fn validate_selectors(config: &Config) -> Result<()> {
    for source in &config.sources {
        if let SourceConfig::Html { url, selectors } = source {
            let base = url::Url::parse(url)?;
            services::parse_listing("", selectors, &base)?;
        }
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    if let Command::Init { force } = cli.command {
        return init_config(&config_path, force);
    }

    let config = Arc::new(Config::load_or_default(&config_path));
    log::debug!("Loaded configuration from {}", config_path.display());

    let storage = LocalStorage::new(&cli.storage_dir);
    let client = http::create_async_client(&config.http)?;
    let sources: Vec<Box<dyn EventSource>> = services::build_sources(&config, &client);
    let monitor = Monitor::new(Arc::clone(&config), storage.clone());

    match cli.command {
        Command::Refresh { force, dry_run } => {
            let notifier = services::build_notifier(&config.notifier, &client)?;
            let options = RefreshOptions {
                force,
                dry_run,
                ..RefreshOptions::new()
            };
            let report = monitor.refresh(&sources, notifier.as_ref(), &options).await?;
            log_report(&report);
        }

        Command::Watch { interval_hours } => {
            let notifier = services::build_notifier(&config.notifier, &client)?;
            let hours = interval_hours.unwrap_or(config.interval_hours).max(1);
            let interval = Duration::from_secs(hours * 60 * 60);
            log::info!("Watching {} source(s) every {}h", sources.len(), hours);

            loop {
                match monitor
                    .refresh(&sources, notifier.as_ref(), &RefreshOptions::new())
                    .await
                {
                    Ok(report) => log_report(&report),
                    Err(e) => log::error!("Refresh failed: {}", e),
                }
                tokio::time::sleep(interval).await;
            }
        }

        Command::Show { month, refresh } => {
            let options = RefreshOptions::new();
            let events = if refresh {
                monitor.fetch_events(&sources, &options).await?
            } else {
                monitor.current_events(&sources, &options).await?
            };

            let events = match month {
                Some(m) => pipeline::filter_by_month(&events, m),
                None => events,
            };

            let formatter = monitor.formatter();
            println!("{}\n", formatter.summary_header(events.len(), month));
            for chunk in formatter.format_collection(&events).chunks() {
                println!("{chunk}\n");
            }
        }

        Command::Seed => {
            let added = monitor.seed(&sources, &RefreshOptions::new()).await?;
            log::info!("Marked {} show(s) as announced", added);
        }

        Command::Prune => {
            let pruned = monitor.prune(&RefreshOptions::new()).await?;
            log::info!("Removed {} ledger entr(ies)", pruned);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate().and_then(|_| validate_selectors(&config)) {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} source(s))", config.sources.len());
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!(
                "Config: {}",
                if config_path.exists() {
                    "exists"
                } else {
                    "not found (using defaults)"
                }
            );

            match storage.load_snapshot().await {
                Some(snapshot) => {
                    let now = Utc::now();
                    let fresh = is_fresh(&snapshot, now, config.cache.ttl_at(now));
                    log::info!(
                        "{}: {} events captured at {} ({})",
                        SNAPSHOT_FILE,
                        snapshot.len(),
                        snapshot.captured_at.to_rfc3339(),
                        if fresh { "fresh" } else { "stale" }
                    );
                }
                None => log::info!("No snapshot found yet."),
            }

            match storage.load_ledger().await {
                Ok(ledger) => log::info!("Ledger: {} announced event(s)", ledger.len()),
                Err(e) => log::error!("Ledger unreadable: {}", e),
            }
        }

        Command::Init { .. } => {
            return Err(AppError::config("init is handled before loading config"));
        }
    }

    Ok(())
}
