//! Trends monitor CLI
//!
//! Local execution entry point, meant to be started by an external scheduler.
//! Exit codes: 0 clean, 1 failed, 2 degraded, 3 configuration or schedule error.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use trends_monitor::{
    config::{config_path, load_config, write_default_config},
    error::{AppError, Result},
    models::{DataMode, GroupConfig},
    pipeline::{self, AcquisitionOrchestrator},
    services::{GoogleTrendsClient, IdentityPool, RateLimiter, RetryPolicy, RetryingFetcher},
    storage::{
        DryRunSink, ExportSink, LocalBackup, LocalSheets, LocalStorage, cleanup_old_backups,
        list_backups, load_backup,
    },
};

/// Exit code for errors raised before any work starts.
const SETUP_ERROR_EXIT: u8 = 3;

/// Trends Monitor - related-query acquisition per region group
#[derive(Parser, Debug)]
#[command(
    name = "trends-monitor",
    version,
    about = "Rate-limited Google Trends acquisition for scheduled region groups"
)]

struct Cli {
    /// Path to storage directory containing config.toml and outputs
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
    /// Run one group: the one scheduled now, or the one given with --group
    Run {
        /// Group id, overrides clock-based resolution
        #[arg(short, long)]
        group: Option<String>,

        /// Also fetch related topics
        #[arg(long)]
        full: bool,

        /// Resolve the group as if it were this UTC instant (RFC 3339)
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// Fetch and back up, but only log records instead of exporting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Check local storage and trends connectivity (exit 0 when usable)
    Health,

    /// Validate configuration, schedule windows and duration budgets
    Validate,

    /// Show the work list and duration estimate per group
    Plan {
        /// Only this group
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Export a backup file again (default: the most recent one)
    Replay {
        backup: Option<PathBuf>,
    },

    /// List backup files, newest first
    Backups,

    /// Show sheet row counts and the last run summary
    Info,

    /// Write the built-in default configuration
    Init {
        /// Overwrite an existing config.toml
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

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli).await {
        Ok(code) => code,
        Err(e) if e.is_fatal_setup() => {
            log::error!("{e}");
            ExitCode::from(SETUP_ERROR_EXIT)
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let config_file = config_path(&cli.storage_dir);

    match cli.command {
        Command::Run {
            group,
            full,
            at,
            dry_run,
        } => {
            let config = load_config(&config_file)?;
            let scheduler = pipeline::validate_config(&config)?;

            let group = match group.as_deref() {
                Some(id) => scheduler.by_id(id)?,
                None => scheduler.resolve(at.unwrap_or_else(Utc::now))?,
            };
            let estimate = scheduler.check_budget(group)?;
            pipeline::log_estimate(&estimate);

            let started_at = Utc::now();
            match cleanup_old_backups(&cli.storage_dir, config.run.backup_keep_days, started_at).await
            {
                Ok(0) => {}
                Ok(removed) => log::info!("Removed {removed} old backups"),
                Err(e) => log::warn!("Backup cleanup failed: {e}"),
            }

            let mode = if full { DataMode::Full } else { DataMode::Reduced };
            let limiter = RateLimiter::from_config(&config.engine);
            let source = GoogleTrendsClient::new(&config.http)?;
            let storage = LocalStorage::new(&cli.storage_dir);
            let mut sheets = LocalSheets::new(storage.clone());
            let mut dry = DryRunSink::new();
            let export: &mut dyn ExportSink = if dry_run {
                log::info!("Dry run: records are logged, not exported");
                &mut dry
            } else {
                &mut sheets
            };
            let mut backup = LocalBackup::new(&cli.storage_dir, &group.id, started_at);

            let summary = {
                let mut orchestrator = AcquisitionOrchestrator::from_config(
                    &config,
                    &scheduler,
                    &limiter,
                    source,
                    mode,
                    export,
                    &mut backup,
                );
                orchestrator.run(group).await
            };

            pipeline::log_summary(&summary);
            log::info!("Backup: {} ({} records)", backup.path().display(), backup.stored());
            if dry_run {
                log::info!("Dry run: {} records not exported", dry.accepted());
            } else if let Err(e) = storage.write_metrics(&summary).await {
                log::error!("Could not write metrics: {e}");
            }

            Ok(ExitCode::from(summary.disposition.exit_code()))
        }

        Command::Health => {
            log::info!("=== Health Check ===");
            let config = load_config(&config_file)?;
            let mut healthy = true;

            log::info!("[1/2] Local sheets...");
            match LocalStorage::new(&cli.storage_dir).sheet_row_counts().await {
                Ok(counts) => {
                    let rows: usize = counts.values().sum();
                    log::info!("  [OK] Local sheets: {rows} rows");
                }
                Err(e) => {
                    log::error!("  [FAIL] Local sheets: {e}");
                    healthy = false;
                }
            }

            log::info!("[2/2] Google Trends...");
            let limiter = RateLimiter::from_config(&config.engine);
            let mut fetcher = RetryingFetcher::new(
                GoogleTrendsClient::new(&config.http)?,
                &limiter,
                RetryPolicy {
                    max_retries: 0,
                    ..RetryPolicy::from_config(&config.engine)
                },
                IdentityPool::browsers(),
                DataMode::Reduced,
            );
            let item = pipeline::health_item(&config);
            healthy &= pipeline::check_trends(&mut fetcher, &item).await.is_reachable();

            Ok(if healthy {
                log::info!("Health check passed");
                ExitCode::SUCCESS
            } else {
                log::error!("Health check failed");
                ExitCode::FAILURE
            })
        }

        Command::Validate => {
            log::info!("Validating {}...", config_file.display());
            let config = load_config(&config_file)?;
            let scheduler = pipeline::validate_config(&config)?;
            log::info!(
                "✓ Config OK ({} base terms, {} groups)",
                config.terms.base.len(),
                config.groups.len()
            );
            for estimate in pipeline::preflight(&scheduler) {
                pipeline::log_estimate(&estimate);
            }
            log::info!("All validations passed!");
            Ok(ExitCode::SUCCESS)
        }

        Command::Plan { group } => {
            let config = load_config(&config_file)?;
            let scheduler = pipeline::validate_config(&config)?;

            let groups: Vec<&GroupConfig> = match group.as_deref() {
                Some(id) => vec![scheduler.by_id(id)?],
                None => scheduler.groups().iter().collect(),
            };
            for group in groups {
                let windows: Vec<String> = group
                    .windows
                    .iter()
                    .map(|w| format!("{}-{}", w.start, w.end))
                    .collect();
                log::info!("{} (UTC {})", group.id, windows.join(", "));
                pipeline::log_estimate(&scheduler.estimate(group));
                for (index, item) in scheduler.work_list(group).iter().enumerate() {
                    log::info!("    {:>2}. {item}", index + 1);
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Replay { backup } => {
            let path = match backup {
                Some(path) => path,
                None => list_backups(&cli.storage_dir)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| AppError::backup("replay", "no backups found"))?,
            };

            let records = load_backup(&path).await?;
            log::info!("Replaying {} records from {}", records.len(), path.display());

            let mut export = LocalSheets::new(LocalStorage::new(&cli.storage_dir));
            let outcome = pipeline::replay_records(&records, &mut export).await;
            Ok(if outcome.failed == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::Backups => {
            let backups = list_backups(&cli.storage_dir).await?;
            if backups.is_empty() {
                log::info!("No backups found.");
            }
            for path in backups {
                log::info!("{}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Info => {
            let storage = LocalStorage::new(&cli.storage_dir);
            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!(
                "Config: {}",
                if config_file.exists() {
                    "exists"
                } else {
                    "not found"
                }
            );

            for (sheet, rows) in storage.sheet_row_counts().await? {
                log::info!("    {sheet}: {rows} rows");
            }

            match storage.latest_metrics().await? {
                Some(report) => pipeline::log_summary(&report.summary),
                None => log::info!("No run recorded yet."),
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Init { force } => {
            if config_file.exists() && !force {
                log::warn!(
                    "Config already exists at {}. Use --force to overwrite.",
                    config_file.display()
                );
                return Ok(ExitCode::SUCCESS);
            }
            write_default_config(&config_file)?;
            log::info!("Default configuration written to {}", config_file.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}
