//! Classification-driven retry policy for provider calls.
//!
//! Every failed provider call is classified (see [`classify`]) and the policy
//! reacts per kind:
//!
//! - rate limited: sleep until the reset deadline, retry without limit
//! - throttled: sleep for the suggested wait, retry without limit
//! - transient: exponential backoff with ±25% jitter, bounded attempts
//! - permanent or cancelled: fail at once
//!
//! Every call and every sleep races the cancellation token, so shutdown never
//! waits out a backoff or a stalled request.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, RandomSource};
use crate::fetch::{FailureKind, FetchError, ProviderFailure, classify};
use crate::identifier::RepositoryIdentifier;
use crate::sync::{ProgressCallback, SyncProgress, emit};

/// Default initial backoff delay in milliseconds.
pub const DEFAULT_MIN_DELAY_MS: u64 = 1_000;

/// Default backoff ceiling in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 60_000;

/// Default number of attempts for a transiently failing call, first try included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Symmetric jitter applied to transient backoff delays.
pub const JITTER_FRACTION: f64 = 0.25;

/// Shortest wait before retrying a rate-limited call, even if the reset
/// deadline has already passed.
pub const MIN_RATE_LIMIT_WAIT: Duration = Duration::from_secs(1);

/// Configuration for retry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay after the first transient failure.
    pub min_delay: Duration,
    /// Upper bound for a single backoff delay (before jitter).
    pub max_delay: Duration,
    /// Total attempts for transient failures, first try included.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(DEFAULT_MIN_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            min_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Build the exponential delay schedule: `min(max_delay, min_delay * 2^n)`,
    /// one delay per retry. Jitter is applied by [`RetryPolicy`] from its
    /// injected random source.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_factor(2.0)
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }
}

/// Why a call is being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    RateLimited,
    Throttled,
    Transient,
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::RateLimited => "rate limited",
            Self::Throttled => "throttled",
            Self::Transient => "transient failure",
        };
        f.write_str(label)
    }
}

/// Scale `delay` by a factor in `[1 - JITTER_FRACTION, 1 + JITTER_FRACTION)`.
///
/// `unit` is a uniform sample from `[0, 1)`.
#[must_use]
pub fn apply_jitter(delay: Duration, unit: f64) -> Duration {
    let unit = unit.clamp(0.0, 1.0);
    delay.mul_f64(1.0 + JITTER_FRACTION * (2.0 * unit - 1.0))
}

/// Retry driver shared by every provider call of a fetcher.
#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig, clock: Arc<dyn Clock>, random: Arc<dyn RandomSource>) -> Self {
        Self {
            config,
            clock,
            random,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds, fails permanently, exhausts its
    /// transient attempts, or `cancel` fires.
    ///
    /// Every attempt and every wait is raced against `cancel`; an attempt still
    /// in flight when it fires is dropped.
    pub async fn run<T, F, Fut>(
        &self,
        id: &RepositoryIdentifier,
        cancel: &CancellationToken,
        on_progress: Option<&ProgressCallback>,
        mut operation: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderFailure>>,
    {
        let mut backoff = self.config.clone().into_backoff().build();
        let mut transient_failures: u32 = 0;
        let mut retries: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                result = operation() => result,
            };
            let failure = match attempt {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            let (reason, delay) = match classify(&failure) {
                FailureKind::Permanent => {
                    return Err(FetchError::Permanent {
                        message: failure.to_string(),
                    });
                }
                FailureKind::Cancelled => return Err(FetchError::Cancelled),
                FailureKind::RateLimited { reset_at } => {
                    let until_reset = (reset_at - self.clock.now())
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                    (
                        RetryReason::RateLimited,
                        until_reset.max(MIN_RATE_LIMIT_WAIT),
                    )
                }
                FailureKind::Throttled { retry_after } => (RetryReason::Throttled, retry_after),
                FailureKind::Transient => {
                    transient_failures += 1;
                    match backoff.next() {
                        Some(delay) => (
                            RetryReason::Transient,
                            apply_jitter(delay, self.random.next_unit()),
                        ),
                        None => {
                            return Err(FetchError::Transient {
                                attempts: transient_failures,
                                message: failure.to_string(),
                            });
                        }
                    }
                }
            };

            retries += 1;
            tracing::debug!(
                owner = id.owner(),
                name = id.name(),
                reason = %reason,
                attempt = retries,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Provider call failed, backing off"
            );
            emit(
                on_progress,
                SyncProgress::RetryBackoff {
                    owner: id.owner().to_string(),
                    name: id.name().to_string(),
                    reason,
                    attempt: retries,
                    delay,
                },
            );

            sleep_or_cancel(delay, cancel).await?;
        }
    }
}

/// Sleep for `delay` unless `cancel` fires first.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<(), FetchError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
