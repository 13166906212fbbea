//! Harvester CLI - keeps a local copy of GitHub repository metadata and commits.

mod commands;
mod config;
mod progress;
mod shutdown;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::run::Mode;
use crate::config::{LogFormat, Overrides};

#[derive(Parser)]
#[command(name = "harvester")]
#[command(version)]
#[command(about = "Incremental GitHub repository and commit sync")]
#[command(
    long_about = "Harvester periodically syncs a configured list of GitHub repositories into a \
local database: repository metadata plus every commit since the last sync. Each repository \
is synced atomically, rate limits are waited out, and transient failures are retried."
)]
#[command(after_long_help = r#"EXAMPLES
    Sync two repositories every 10 minutes:
        $ harvester run -r rust-lang/rust -r tokio-rs/tokio --interval 600

    Run a single cycle (e.g. from cron):
        $ harvester once

    Apply migrations only:
        $ harvester migrate up

CONFIGURATION
    Harvester reads configuration from:
      1. ~/.config/harvester/config.toml (or $XDG_CONFIG_HOME/harvester/config.toml)
      2. ./harvester.toml
      3. Environment variables (HARVESTER_* prefix, nested keys joined by __)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    HARVESTER_DATABASE__URL         Database connection string (default: ~/.local/state/harvester/harvester.db)
    HARVESTER_GITHUB__TOKEN         GitHub personal access token (GITHUB_TOKEN also works)
    HARVESTER_SYNC__REPOSITORIES    Comma-separated owner/name list
    HARVESTER_SYNC__INTERVAL_SECS   Seconds between cycles (default: 3600)
    HARVESTER_SYNC__CONCURRENCY     Repositories synced at once (default: 4)
    HARVESTER_SYNC__DEFAULT_SINCE   RFC3339 start for new repositories (default: 2023-01-01T00:00:00Z)
    HARVESTER_LOG_LEVEL             Log filter when RUST_LOG is unset
"#)]
struct Cli {
    /// Log output format (overrides config)
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync periodically until interrupted
    Run {
        #[command(flatten)]
        sync_opts: SyncOptions,
    },
    /// Run one sync cycle and exit
    Once {
        #[command(flatten)]
        sync_opts: SyncOptions,
    },
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

/// Sync options shared by `run` and `once`.
#[derive(Debug, Clone, clap::Args)]
struct SyncOptions {
    /// Repository to sync as owner/name; repeatable (replaces the configured list)
    #[arg(short = 'r', long = "repo")]
    repositories: Vec<String>,

    /// Seconds between cycle starts (default from config or 3600)
    #[arg(short = 'i', long)]
    interval: Option<u64>,

    /// Maximum repositories synced at once (default from config or 4)
    #[arg(short = 'c', long)]
    concurrency: Option<usize>,
}

impl From<SyncOptions> for Overrides {
    fn from(opts: SyncOptions) -> Self {
        Self {
            repositories: opts.repositories,
            interval_secs: opts.interval,
            concurrency: opts.concurrency,
        }
    }
}

fn init_tracing(log_level: Option<&str>, format: LogFormat) {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match log_level {
            Some(level) => EnvFilter::new(format!("harvester={level},harvester_cli={level}")),
            None => EnvFilter::new("harvester=info,harvester_cli=info"),
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);
    match format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load()?;
    init_tracing(
        config.log_level.as_deref(),
        cli.log_format.unwrap_or(config.log_format),
    );

    let database_url = config
        .database_url()
        .ok_or(config::ConfigError::NoDatabaseUrl)?;

    // Ensure the database directory exists for SQLite
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        // Strip query parameters (e.g., ?mode=rwc) before path operations
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);

        // Warn if using a relative path (can cause issues depending on cwd)
        if db_path.is_relative() && !db_path.as_os_str().is_empty() {
            tracing::warn!(
                "Database path '{}' is relative - behavior depends on current directory. \
                 Consider using an absolute path.",
                db_path.display()
            );
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Run { sync_opts } => {
            let cancel = shutdown::setup_shutdown_handler();
            commands::run::handle_run(
                Mode::Service,
                &config,
                &sync_opts.into(),
                &database_url,
                cancel,
            )
            .await?;
        }
        Commands::Once { sync_opts } => {
            let cancel = shutdown::setup_shutdown_handler();
            commands::run::handle_run(Mode::Once, &config, &sync_opts.into(), &database_url, cancel)
                .await?;
        }
    }

    tracing::info!("Stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_repeated_repositories() {
        let cli = Cli::parse_from([
            "harvester",
            "run",
            "-r",
            "acme/widgets",
            "--repo",
            "acme/gadgets",
            "--interval",
            "600",
        ]);
        match cli.command {
            Commands::Run { sync_opts } => {
                let overrides = Overrides::from(sync_opts);
                assert_eq!(overrides.repositories, vec!["acme/widgets", "acme/gadgets"]);
                assert_eq!(overrides.interval_secs, Some(600));
                assert_eq!(overrides.concurrency, None);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_global_log_format() {
        let cli = Cli::parse_from(["harvester", "once", "--log-format", "json", "-c", "2"]);
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert!(matches!(
            cli.command,
            Commands::Once { ref sync_opts } if sync_opts.concurrency == Some(2)
        ));
    }

    #[test]
    fn test_cli_migrate_subcommand() {
        let cli = Cli::parse_from(["harvester", "migrate", "status"]);
        assert!(matches!(
            cli.command,
            Commands::Migrate {
                action: MigrateAction::Status
            }
        ));
    }
}
