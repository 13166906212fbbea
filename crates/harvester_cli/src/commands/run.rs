//! The `run` and `once` commands: wire config into a syncer and drive it.

use std::sync::Arc;

use harvester::clock::{Clock, SystemClock, ThreadRandom};
use harvester::fetch::ResilientFetcher;
use harvester::github::GitHubClient;
use harvester::retry::RetryPolicy;
use harvester::sync::{AtomicSyncUnit, ProgressCallback, Syncer};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, Overrides, SyncPlan};
use crate::progress::LoggingReporter;

/// How long to keep syncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Periodic cycles until shutdown.
    Service,
    /// A single cycle, then exit.
    Once,
}

fn reporter_callback() -> Arc<ProgressCallback> {
    let reporter = LoggingReporter::new();
    let callback: ProgressCallback = Box::new(move |event| reporter.handle(event));
    Arc::new(callback)
}

async fn build_syncer(
    plan: SyncPlan,
    database_url: &str,
) -> Result<Syncer, Box<dyn std::error::Error>> {
    let db = harvester::connect_and_migrate(database_url).await?;
    tracing::info!("Database ready");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let on_progress = reporter_callback();

    let client = GitHubClient::with_reqwest(Some(plan.token))?.with_api_url(plan.api_url);
    let policy = RetryPolicy::new(plan.retry, Arc::clone(&clock), Arc::new(ThreadRandom));
    let fetcher = ResilientFetcher::new(client, policy).with_progress(Arc::clone(&on_progress));

    let unit = AtomicSyncUnit::new(db, Arc::new(fetcher), plan.default_since, clock)
        .with_progress(Arc::clone(&on_progress));

    let syncer = Syncer::new(Arc::new(unit), plan.repositories, plan.sync)?
        .with_progress(on_progress);
    Ok(syncer)
}

pub(crate) async fn handle_run(
    mode: Mode,
    config: &Config,
    overrides: &Overrides,
    database_url: &str,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let plan = config.sync_plan(overrides)?;
    tracing::info!(
        repositories = plan.repositories.len(),
        interval_secs = plan.sync.interval.as_secs(),
        concurrency = plan.sync.concurrency,
        default_since = %plan.default_since,
        "Configuration loaded"
    );

    let syncer = build_syncer(plan, database_url).await?;

    match mode {
        Mode::Service => {
            syncer.start(cancel).await;
        }
        Mode::Once => {
            let report = syncer.run_cycle(&cancel).await;
            if report.failed > 0 {
                return Err(format!(
                    "{} of {} repositories failed to sync",
                    report.failed, report.dispatched
                )
                .into());
            }
        }
    }

    Ok(())
}
