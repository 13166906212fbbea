//! Periodic, bounded-concurrency sync cycles.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{CycleReport, SyncConfig, SyncConfigError};
use super::unit::SyncUnit;
use crate::identifier::{RepositoryIdentifier, parse_identifiers};

/// How one dispatched unit ended.
enum UnitStatus {
    Synced,
    Failed,
    Cancelled,
}

/// Drives sync cycles over a fixed set of repositories.
pub struct Syncer {
    unit: Arc<dyn SyncUnit>,
    repositories: Vec<RepositoryIdentifier>,
    config: SyncConfig,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl Syncer {
    /// Create a syncer over already validated identifiers.
    pub fn new(
        unit: Arc<dyn SyncUnit>,
        repositories: Vec<RepositoryIdentifier>,
        config: SyncConfig,
    ) -> Result<Self, SyncConfigError> {
        config.validate()?;
        Ok(Self {
            unit,
            repositories,
            config,
            on_progress: None,
        })
    }

    /// Create a syncer from raw `owner/name` entries.
    ///
    /// # Errors
    /// Fails on the first malformed entry, on an empty list, or on invalid
    /// scheduling parameters.
    pub fn from_entries<I, S>(
        unit: Arc<dyn SyncUnit>,
        entries: I,
        config: SyncConfig,
    ) -> Result<Self, SyncConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let repositories = parse_identifiers(entries)?;
        Self::new(unit, repositories, config)
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Arc<ProgressCallback>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn repositories(&self) -> &[RepositoryIdentifier] {
        &self.repositories
    }

    /// Run one cycle immediately and one per interval until `cancel` fires.
    ///
    /// A tick that comes due while a cycle is still running is delayed, never
    /// stacked. Returns the number of cycles run.
    pub async fn start(&self, cancel: CancellationToken) -> u64 {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles: u64 = 0;

        tracing::info!(
            repositories = self.repositories.len(),
            concurrency = self.config.concurrency,
            interval_secs = self.config.interval.as_secs(),
            "Syncer started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.run_cycle(&cancel).await;
            cycles += 1;
        }

        tracing::info!(cycles, "Syncer stopped");
        cycles
    }

    /// Sync every repository once with at most `concurrency` units in flight.
    ///
    /// Returns after every dispatched unit has finished. Unit failures are
    /// logged and counted, never propagated.
    #[tracing::instrument(skip_all, fields(repositories = self.repositories.len()))]
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let total = self.repositories.len();
        let mut report = CycleReport::default();

        tracing::info!(concurrency = self.config.concurrency, "Sync cycle started");
        emit(
            self.on_progress.as_deref(),
            SyncProgress::CycleStarted {
                repositories: total,
                concurrency: self.config.concurrency,
            },
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks: JoinSet<UnitStatus> = JoinSet::new();

        for (index, id) in self.repositories.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                report.skipped = total - index;
                tracing::info!(skipped = report.skipped, "Cancellation requested, not dispatching remaining repositories");
                break;
            };

            report.dispatched += 1;
            let unit = Arc::clone(&self.unit);
            let on_progress = self.on_progress.clone();
            let cancel = cancel.clone();
            let id = id.clone();

            tasks.spawn(async move {
                let _permit = permit;
                run_unit(unit.as_ref(), &id, &cancel, on_progress.as_deref()).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(UnitStatus::Synced) => report.succeeded += 1,
                Ok(UnitStatus::Failed) => report.failed += 1,
                Ok(UnitStatus::Cancelled) => report.cancelled += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(error = %e, "Sync task panicked");
                }
            }
        }

        tracing::info!(
            dispatched = report.dispatched,
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled,
            skipped = report.skipped,
            "Sync cycle complete"
        );
        emit(
            self.on_progress.as_deref(),
            SyncProgress::CycleComplete { report },
        );
        report
    }
}

/// Run one unit and log its outcome with the repository identifier.
async fn run_unit(
    unit: &dyn SyncUnit,
    id: &RepositoryIdentifier,
    cancel: &CancellationToken,
    on_progress: Option<&ProgressCallback>,
) -> UnitStatus {
    let owner = id.owner().to_string();
    let name = id.name().to_string();
    emit(
        on_progress,
        SyncProgress::RepositoryStarted {
            owner: owner.clone(),
            name: name.clone(),
        },
    );

    match unit.sync_repository(id, cancel).await {
        Ok(outcome) => {
            tracing::info!(
                owner = %owner,
                name = %name,
                repo_id = %outcome.repository_id,
                since = %outcome.since,
                count = outcome.inserted,
                created = outcome.created,
                "Repository synced"
            );
            emit(
                on_progress,
                SyncProgress::RepositorySynced {
                    owner,
                    name,
                    created: outcome.created,
                    inserted: outcome.inserted,
                },
            );
            UnitStatus::Synced
        }
        Err(e) if e.is_cancelled() => {
            tracing::info!(owner = %owner, name = %name, "Repository sync cancelled");
            emit(on_progress, SyncProgress::RepositoryCancelled { owner, name });
            UnitStatus::Cancelled
        }
        Err(e) => {
            tracing::error!(owner = %owner, name = %name, error = %e, "Repository sync failed");
            emit(
                on_progress,
                SyncProgress::RepositoryFailed {
                    owner,
                    name,
                    error: e.to_string(),
                },
            );
            UnitStatus::Failed
        }
    }
}
