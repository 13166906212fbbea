//! Progress reporting types for sync cycles.
//!
//! The orchestrator, the sync unit and the fetcher all report what they are
//! doing through a single optional callback. Front ends decide how to render
//! the events; the CLI turns them into tracing output.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::types::CycleReport;
use crate::retry::RetryReason;

/// Progress events emitted during sync cycles.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// A cycle is about to dispatch its repositories.
    CycleStarted {
        /// Number of configured repositories.
        repositories: usize,
        /// Worker pool size for this cycle.
        concurrency: usize,
    },

    /// A sync unit started for one repository.
    RepositoryStarted { owner: String, name: String },

    /// Commits are being requested from this watermark onwards.
    FetchingCommits {
        owner: String,
        name: String,
        since: DateTime<Utc>,
    },

    /// Fetched one page of commits.
    FetchedCommitPage {
        owner: String,
        name: String,
        /// Page number (1-indexed).
        page: u32,
        /// Number of commits on this page.
        count: usize,
    },

    /// A provider call failed and will be retried after `delay`.
    RetryBackoff {
        owner: String,
        name: String,
        reason: RetryReason,
        /// Retry attempt number (1-indexed).
        attempt: u32,
        delay: Duration,
    },

    /// A repository was brought up to date and its transaction committed.
    RepositorySynced {
        owner: String,
        name: String,
        /// True if the repository record was created in this unit.
        created: bool,
        /// Number of new commits stored.
        inserted: u64,
    },

    /// A sync unit failed; its writes were rolled back.
    RepositoryFailed {
        owner: String,
        name: String,
        error: String,
    },

    /// A sync unit stopped because cancellation was requested.
    RepositoryCancelled { owner: String, name: String },

    /// Every dispatched unit has finished.
    CycleComplete { report: CycleReport },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
