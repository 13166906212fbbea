use harvester::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::CycleStarted {
                repositories,
                concurrency,
            } => {
                tracing::debug!(repositories, concurrency, "Cycle started");
            }

            SyncProgress::RepositoryStarted { owner, name } => {
                tracing::debug!(%owner, %name, "Syncing repository");
            }

            SyncProgress::FetchingCommits { owner, name, since } => {
                tracing::debug!(%owner, %name, %since, "Fetching commits");
            }

            SyncProgress::FetchedCommitPage {
                owner,
                name,
                page,
                count,
            } => {
                tracing::debug!(%owner, %name, page, count, "Fetched page");
            }

            SyncProgress::RetryBackoff {
                owner,
                name,
                reason,
                attempt,
                delay,
            } => {
                tracing::warn!(
                    %owner,
                    %name,
                    %reason,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off"
                );
            }

            SyncProgress::RepositoryCancelled { owner, name } => {
                tracing::debug!(%owner, %name, "Cancelled");
            }

            // Unit outcomes and cycle totals are already logged by the syncer.
            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
