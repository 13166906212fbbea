//! Repository sync: the atomic per-repository unit and the orchestrator
//! that schedules it.
//!
//! # Module Structure
//!
//! - [`types`] - Core types: `SyncConfig`, `SyncOutcome`, `CycleReport`, constants
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`unit`] - `SyncUnit` and the transactional `AtomicSyncUnit`
//! - [`orchestrator`] - `Syncer`, the periodic bounded-concurrency driver
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use harvester::sync::{AtomicSyncUnit, SyncConfig, Syncer, default_since};
//!
//! let unit = AtomicSyncUnit::new(db, fetcher, default_since(), clock);
//! let syncer = Syncer::from_entries(Arc::new(unit), ["acme/widgets"], SyncConfig::default())?;
//! syncer.start(cancel).await;
//! ```

pub mod orchestrator;
mod progress;
mod types;
pub mod unit;

// Re-export types
pub use types::{CycleReport, SyncConfig, SyncConfigError, SyncError, SyncOutcome, default_since};

// Re-export constants
pub use types::{
    DEFAULT_CONCURRENCY, DEFAULT_SINCE_EPOCH, DEFAULT_SYNC_INTERVAL_SECS, WATERMARK_OFFSET_SECS,
};

// Re-export progress types
pub use progress::{ProgressCallback, SyncProgress, emit};

pub use orchestrator::Syncer;
pub use unit::{AtomicSyncUnit, SyncUnit, watermark};
