//! Sync configuration, outcomes and constants.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use crate::fetch::FetchError;
use crate::identifier::IdentifierError;
use crate::store::StoreError;

/// Default time between cycle starts.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 3_600;

/// Default number of repositories synced concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default watermark for repositories without stored commits (2023-01-01T00:00:00Z).
pub const DEFAULT_SINCE_EPOCH: i64 = 1_672_531_200;

/// Offset added to the newest stored commit date so the boundary commit is
/// not requested again.
pub const WATERMARK_OFFSET_SECS: i64 = 1;

/// The default watermark as a timestamp.
pub fn default_since() -> DateTime<Utc> {
    DateTime::from_timestamp(DEFAULT_SINCE_EPOCH, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Scheduling parameters of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Time between cycle starts.
    pub interval: Duration,
    /// Maximum number of sync units running at once.
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Invalid orchestrator construction input. Nothing runs if this is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncConfigError {
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error("sync interval must be greater than zero")]
    ZeroInterval,

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), SyncConfigError> {
        if self.interval.is_zero() {
            return Err(SyncConfigError::ZeroInterval);
        }
        if self.concurrency == 0 {
            return Err(SyncConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}

/// Failure of one sync unit.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DbErr> for SyncError {
    fn from(err: DbErr) -> Self {
        Self::Store(StoreError::Database(err))
    }
}

impl SyncError {
    /// True if the unit stopped because cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Fetch(err) if err.is_cancelled())
    }
}

/// What one successful sync unit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub repository_id: Uuid,
    /// True if the repository record was created by this unit.
    pub created: bool,
    /// Watermark commits were requested from.
    pub since: DateTime<Utc>,
    /// Number of new commits stored.
    pub inserted: u64,
}

/// Tally of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Units started.
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Units that stopped on cancellation.
    pub cancelled: usize,
    /// Repositories never dispatched because cancellation came first.
    pub skipped: usize,
}
