//! The per-repository sync unit.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tokio_util::sync::CancellationToken;

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{SyncError, SyncOutcome, WATERMARK_OFFSET_SECS};
use crate::clock::Clock;
use crate::fetch::{CommitData, RepositoryFetcher, RepositoryMetadata};
use crate::identifier::RepositoryIdentifier;
use crate::store;

/// Brings one repository up to date.
#[async_trait]
pub trait SyncUnit: Send + Sync {
    async fn sync_repository(
        &self,
        id: &RepositoryIdentifier,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, SyncError>;
}

/// Compute the commit watermark.
///
/// With stored commits it is one second past the newest one, which excludes
/// the boundary commit; otherwise it is `default_since`.
pub fn watermark(latest: Option<DateTime<Utc>>, default_since: DateTime<Utc>) -> DateTime<Utc> {
    match latest {
        Some(latest) => latest + chrono::Duration::seconds(WATERMARK_OFFSET_SECS),
        None => default_since,
    }
}

/// [`SyncUnit`] persisting through SeaORM.
///
/// Provider I/O happens first and reads only; every write (repository
/// upsert, commit insert, last-synced touch) then runs in one transaction
/// that is committed as a whole or rolled back. No connection or database
/// lock is held while waiting on the provider.
pub struct AtomicSyncUnit {
    db: DatabaseConnection,
    fetcher: Arc<dyn RepositoryFetcher>,
    default_since: DateTime<Utc>,
    clock: Arc<dyn Clock>,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl AtomicSyncUnit {
    pub fn new(
        db: DatabaseConnection,
        fetcher: Arc<dyn RepositoryFetcher>,
        default_since: DateTime<Utc>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            fetcher,
            default_since,
            clock,
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Arc<ProgressCallback>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Current watermark for `id`, read outside any transaction.
    async fn current_watermark(&self, id: &RepositoryIdentifier) -> Result<DateTime<Utc>, SyncError> {
        let latest = match store::find_by_owner_and_name(&self.db, id.owner(), id.name()).await? {
            Some(repo) => store::latest_commit_date(&self.db, repo.id).await?,
            None => None,
        };
        Ok(watermark(latest, self.default_since))
    }

    async fn persist(
        &self,
        txn: &DatabaseTransaction,
        id: &RepositoryIdentifier,
        meta: &RepositoryMetadata,
        commits: &[CommitData],
    ) -> Result<(uuid::Uuid, bool, u64), SyncError> {
        let now = self.clock.now();
        let (repo, created) =
            store::upsert_repository(txn, id.owner(), id.name(), meta, now).await?;

        let inserted = if commits.is_empty() {
            0
        } else {
            store::insert_commits(txn, repo.id, commits, now).await?
        };

        store::touch_synced(txn, repo.id, now).await?;
        Ok((repo.id, created, inserted))
    }
}

#[async_trait]
impl SyncUnit for AtomicSyncUnit {
    /// Fetches metadata, reads the watermark and fetches commits before the
    /// transaction opens, then upserts the repository, inserts commits and
    /// touches `last_synced_at` inside it. The upsert follows the reads on
    /// purpose; a repository not yet stored has no commits, so its watermark
    /// is `default_since` in either order.
    #[tracing::instrument(skip_all, fields(owner = id.owner(), name = id.name()))]
    async fn sync_repository(
        &self,
        id: &RepositoryIdentifier,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, SyncError> {
        let meta = self.fetcher.fetch_repository_metadata(id, cancel).await?;

        let since = self.current_watermark(id).await?;
        tracing::debug!(since = %since, "Fetching commits");
        emit(
            self.on_progress.as_deref(),
            SyncProgress::FetchingCommits {
                owner: id.owner().to_string(),
                name: id.name().to_string(),
                since,
            },
        );
        let commits = self.fetcher.fetch_commits_since(id, since, cancel).await?;

        let txn = self.db.begin().await?;
        match self.persist(&txn, id, &meta, &commits).await {
            Ok((repository_id, created, inserted)) => {
                txn.commit().await?;
                tracing::debug!(repo_id = %repository_id, count = inserted, "Committed sync unit");
                Ok(SyncOutcome {
                    repository_id,
                    created,
                    since,
                    inserted,
                })
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}
