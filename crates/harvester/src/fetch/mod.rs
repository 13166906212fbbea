//! Resilient access to the provider API.
//!
//! [`ProviderApi`] is a thin, single-attempt view of the provider (one HTTP
//! call per method). [`ResilientFetcher`] wraps it with the retry policy and
//! walks commit pagination, exposing the [`RepositoryFetcher`] interface the
//! sync unit consumes.

mod error;
mod types;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::identifier::RepositoryIdentifier;
use crate::retry::RetryPolicy;
use crate::sync::{ProgressCallback, SyncProgress, emit};

pub use error::{DEFAULT_THROTTLE_WAIT, FailureKind, FetchError, ProviderFailure, classify};
pub use types::{CommitData, CommitPage, RepositoryMetadata};

/// Single-attempt provider operations.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Get repository metadata by owner and name.
    async fn get_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<RepositoryMetadata, ProviderFailure>;

    /// List one page (1-indexed) of commits authored at or after `since`.
    async fn list_commits_page(
        &self,
        owner: &str,
        name: &str,
        since: DateTime<Utc>,
        page: u32,
    ) -> Result<CommitPage, ProviderFailure>;
}

#[async_trait]
impl<T: ProviderApi + ?Sized> ProviderApi for Arc<T> {
    async fn get_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<RepositoryMetadata, ProviderFailure> {
        (**self).get_repository(owner, name).await
    }

    async fn list_commits_page(
        &self,
        owner: &str,
        name: &str,
        since: DateTime<Utc>,
        page: u32,
    ) -> Result<CommitPage, ProviderFailure> {
        (**self).list_commits_page(owner, name, since, page).await
    }
}

/// Retrying, paginating fetch operations used by the sync unit.
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    async fn fetch_repository_metadata(
        &self,
        id: &RepositoryIdentifier,
        cancel: &CancellationToken,
    ) -> Result<RepositoryMetadata, FetchError>;

    /// All commits since `since`, in provider page order.
    async fn fetch_commits_since(
        &self,
        id: &RepositoryIdentifier,
        since: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CommitData>, FetchError>;
}

/// [`RepositoryFetcher`] that applies a [`RetryPolicy`] to every provider call.
///
/// Each commit page is retried on its own; a failure on page N never causes
/// pages before N to be requested again.
pub struct ResilientFetcher<P> {
    provider: P,
    policy: RetryPolicy,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl<P: ProviderApi> ResilientFetcher<P> {
    pub fn new(provider: P, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            on_progress: None,
        }
    }

    /// Report retries and fetched pages through `on_progress`.
    #[must_use]
    pub fn with_progress(mut self, on_progress: Arc<ProgressCallback>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }
}

#[async_trait]
impl<P: ProviderApi> RepositoryFetcher for ResilientFetcher<P> {
    async fn fetch_repository_metadata(
        &self,
        id: &RepositoryIdentifier,
        cancel: &CancellationToken,
    ) -> Result<RepositoryMetadata, FetchError> {
        self.policy
            .run(id, cancel, self.on_progress.as_deref(), || {
                self.provider.get_repository(id.owner(), id.name())
            })
            .await
    }

    async fn fetch_commits_since(
        &self,
        id: &RepositoryIdentifier,
        since: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CommitData>, FetchError> {
        let mut commits = Vec::new();
        let mut page: u32 = 1;

        loop {
            let fetched = self
                .policy
                .run(id, cancel, self.on_progress.as_deref(), || {
                    self.provider
                        .list_commits_page(id.owner(), id.name(), since, page)
                })
                .await?;

            tracing::debug!(
                owner = id.owner(),
                name = id.name(),
                page,
                count = fetched.commits.len(),
                "Fetched commit page"
            );
            emit(
                self.on_progress.as_deref(),
                SyncProgress::FetchedCommitPage {
                    owner: id.owner().to_string(),
                    name: id.name().to_string(),
                    page,
                    count: fetched.commits.len(),
                },
            );

            commits.extend(fetched.commits);

            // A non-advancing cursor would loop forever.
            match fetched.next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        Ok(commits)
    }
}
