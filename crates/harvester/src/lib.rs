//! Harvester - incremental repository metadata and commit history sync.
//!
//! This library keeps a local database copy of a configured set of GitHub
//! repositories: their metadata and every commit since a watermark. Each
//! repository is synced as one atomic unit, provider calls are retried by
//! failure class, and an orchestrator runs periodic cycles with bounded
//! concurrency and cooperative cancellation.
//!
//! # Features
//!
//! - `github` - The reqwest-backed GitHub REST client.
//! - `sqlite` / `postgres` - Database drivers.
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to automatically run migrations on connection.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use harvester::{connect_and_migrate, github::GitHubClient, fetch::ResilientFetcher};
//! use harvester::sync::{AtomicSyncUnit, SyncConfig, Syncer, default_since};
//!
//! let db = connect_and_migrate("sqlite://harvester.db?mode=rwc").await?;
//! let fetcher = ResilientFetcher::new(GitHubClient::with_reqwest(token)?, policy);
//! let unit = AtomicSyncUnit::new(db, Arc::new(fetcher), default_since(), clock);
//! let syncer = Syncer::from_entries(Arc::new(unit), ["acme/widgets"], SyncConfig::default())?;
//! let report = syncer.run_cycle(&cancel).await;
//! ```

pub mod clock;
pub mod db;
pub mod entity;
pub mod fetch;
pub mod http;
pub mod identifier;
pub mod retry;
pub mod store;
pub mod sync;

#[cfg(feature = "github")]
pub mod github;

#[cfg(feature = "migrate")]
pub mod migration;

pub use clock::{Clock, RandomSource, SystemClock, ThreadRandom};
pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use identifier::{IdentifierError, RepositoryIdentifier, parse_identifiers};
pub use store::StoreError;
