//! Configuration file support for harvester.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `HARVESTER_`, nested keys joined by
//!    `__`, e.g., `HARVESTER_DATABASE__URL`, `HARVESTER_SYNC__REPOSITORIES`)
//! 3. Config file (./harvester.toml, then ~/.config/harvester/config.toml)
//! 4. Built-in defaults
//!
//! `GITHUB_TOKEN` is honored when no token is configured.
//!
//! Example config file:
//! ```toml
//! log_level = "info"
//! log_format = "pretty"   # or "json"
//!
//! [database]
//! url = "sqlite://~/.local/state/harvester/harvester.db"  # optional, this is the default
//!
//! [github]
//! token = "ghp_..."  # or use HARVESTER_GITHUB__TOKEN / GITHUB_TOKEN
//! api_url = "https://api.github.com"
//!
//! [sync]
//! repositories = ["rust-lang/rust", "tokio-rs/tokio"]
//! interval_secs = 3600
//! concurrency = 4
//! default_since = "2023-01-01T00:00:00Z"
//!
//! [retry]
//! min_delay_ms = 1000
//! max_delay_ms = 60000
//! max_attempts = 5
//! ```

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use harvester::github::DEFAULT_API_URL;
use harvester::retry::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS, DEFAULT_MIN_DELAY_MS, RetryConfig,
};
use harvester::sync::{DEFAULT_CONCURRENCY, DEFAULT_SYNC_INTERVAL_SECS, SyncConfig};
use harvester::{IdentifierError, RepositoryIdentifier, parse_identifiers};
use serde::{Deserialize, Deserializer};

/// Fallback token variable shared with other GitHub tooling.
const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Default watermark for repositories without stored commits.
const DEFAULT_SINCE: &str = "2023-01-01T00:00:00Z";

/// Invalid or incomplete configuration. Reported at startup; nothing syncs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("a GitHub token is required (set github.token, HARVESTER_GITHUB__TOKEN or GITHUB_TOKEN)")]
    MissingToken,

    #[error("sync.repositories must contain at least one owner/name entry")]
    NoRepositories,

    #[error("invalid repository list: {0}")]
    Repositories(#[from] IdentifierError),

    #[error("sync.default_since must be RFC3339 (e.g. 2023-01-01T00:00:00Z), got {value:?}")]
    DefaultSince { value: String },

    #[error("could not determine a database URL")]
    NoDatabaseUrl,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log filter directive used when `RUST_LOG` is unset (e.g. "debug").
    pub log_level: Option<String>,
    pub log_format: LogFormat,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// GitHub configuration.
    pub github: GitHubConfig,
    /// Sync schedule and repository list.
    pub sync: SyncSettings,
    /// Provider retry tuning.
    pub retry: RetrySettings,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    /// Defaults to `sqlite://~/.local/state/harvester/harvester.db` if not specified.
    pub url: Option<String>,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token.
    pub token: Option<String>,
    /// REST API base URL, for GitHub Enterprise.
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// Sync schedule and repository list.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Repositories to sync, as "owner/name".
    #[serde(deserialize_with = "string_or_list")]
    pub repositories: Vec<String>,
    /// Seconds between cycle starts.
    pub interval_secs: u64,
    /// Maximum repositories synced at once.
    pub concurrency: usize,
    /// Watermark for repositories without stored commits (RFC3339).
    pub default_since: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            concurrency: DEFAULT_CONCURRENCY,
            default_since: DEFAULT_SINCE.to_string(),
        }
    }
}

/// Provider retry tuning.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Total attempts per call for transient failures, first try included.
    pub max_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            min_delay_ms: DEFAULT_MIN_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            Duration::from_millis(self.min_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.max_attempts.max(1),
        )
    }
}

/// Accept either a TOML list or a comma-separated string (from the
/// environment). Entries are trimmed and empty ones dropped.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        String(String),
        List(Vec<String>),
    }

    let entries = match StringOrList::deserialize(deserializer)? {
        StringOrList::String(s) => s.split(',').map(str::to_string).collect(),
        StringOrList::List(list) => list,
    };
    Ok(entries
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect())
}

/// CLI flags that override configured values.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub repositories: Vec<String>,
    pub interval_secs: Option<u64>,
    pub concurrency: Option<usize>,
}

/// Validated settings for one `run` or `once` invocation.
#[derive(Debug)]
pub struct SyncPlan {
    pub token: String,
    pub api_url: String,
    pub repositories: Vec<RepositoryIdentifier>,
    pub sync: SyncConfig,
    pub default_since: DateTime<Utc>,
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/harvester/config.toml)
    /// 3. Local config file (./harvester.toml)
    /// 4. Environment variables with HARVESTER_ prefix
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        // Add XDG config file if it exists
        if let Some(proj_dirs) = ProjectDirs::from("", "", "harvester") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        // Add local config file (higher priority than XDG)
        let local_config = PathBuf::from("harvester.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./harvester.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., HARVESTER_SYNC__INTERVAL_SECS -> sync.interval_secs
        builder = builder.add_source(
            Environment::with_prefix("HARVESTER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;
        if config.github.token.is_none() {
            config.github.token = std::env::var(GITHUB_TOKEN_ENV).ok();
        }
        Ok(config)
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// If no database URL is configured, defaults to `sqlite://~/.local/state/harvester/harvester.db?mode=rwc`
    /// on Linux (using XDG state directory) or the platform-appropriate equivalent.
    /// The `mode=rwc` parameter enables read-write access and creates the file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("harvester.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/harvester` or `~/.local/state/harvester`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "harvester").map(|dirs| {
            // state_dir() returns None on macOS/Windows, fall back to data_dir
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }

    /// Apply CLI overrides and validate everything a sync needs.
    pub fn sync_plan(&self, overrides: &Overrides) -> Result<SyncPlan, ConfigError> {
        let token = self
            .github
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let entries = if overrides.repositories.is_empty() {
            &self.sync.repositories
        } else {
            &overrides.repositories
        };
        if entries.is_empty() {
            return Err(ConfigError::NoRepositories);
        }
        let repositories = parse_identifiers(entries)?;

        let default_since = DateTime::parse_from_rfc3339(&self.sync.default_since)
            .map_err(|_| ConfigError::DefaultSince {
                value: self.sync.default_since.clone(),
            })?
            .with_timezone(&Utc);

        let sync = SyncConfig {
            interval: Duration::from_secs(
                overrides.interval_secs.unwrap_or(self.sync.interval_secs),
            ),
            concurrency: overrides.concurrency.unwrap_or(self.sync.concurrency),
        };

        Ok(SyncPlan {
            token,
            api_url: self.github.api_url.clone(),
            repositories,
            sync,
            default_since,
            retry: self.retry.to_retry_config(),
        })
    }
}
