//! Provider failures and their classification.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Wait applied to throttling responses that carry no explicit `Retry-After`.
pub const DEFAULT_THROTTLE_WAIT: Duration = Duration::from_secs(60);

/// The raw failure of a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderFailure {
    /// The provider answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        /// Parsed `Retry-After` header.
        retry_after: Option<Duration>,
        /// Parsed `X-RateLimit-Remaining` header.
        rate_limit_remaining: Option<u64>,
        /// Parsed `X-RateLimit-Reset` header.
        rate_limit_reset: Option<DateTime<Utc>>,
    },

    /// The request never produced a response (connect, TLS, reset, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("failed to decode provider response: {0}")]
    Decode(String),

    /// The call observed cancellation before completing.
    #[error("provider call cancelled")]
    Cancelled,
}

impl ProviderFailure {
    /// Shorthand for an HTTP failure without rate-limit headers.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            retry_after: None,
            rate_limit_remaining: None,
            rate_limit_reset: None,
        }
    }
}

/// How the retry policy must react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Hard quota exhausted; retry once `reset_at` has passed.
    RateLimited { reset_at: DateTime<Utc> },
    /// Soft limit; retry after `retry_after`.
    Throttled { retry_after: Duration },
    /// Server-side trouble; retry with exponential backoff.
    Transient,
    /// Retrying cannot help.
    Permanent,
    /// Cancellation was observed.
    Cancelled,
}

/// Map a raw provider failure onto exactly one [`FailureKind`].
pub fn classify(failure: &ProviderFailure) -> FailureKind {
    match failure {
        ProviderFailure::Http {
            status,
            message,
            retry_after,
            rate_limit_remaining,
            rate_limit_reset,
        } => match *status {
            403 | 429 => {
                let mentions_limit = message.to_ascii_lowercase().contains("rate limit");
                if let Some(wait) = retry_after {
                    FailureKind::Throttled { retry_after: *wait }
                } else if let Some(reset_at) = rate_limit_reset
                    && (*rate_limit_remaining == Some(0) || mentions_limit)
                {
                    FailureKind::RateLimited {
                        reset_at: *reset_at,
                    }
                } else if *status == 429 || mentions_limit {
                    FailureKind::Throttled {
                        retry_after: DEFAULT_THROTTLE_WAIT,
                    }
                } else {
                    FailureKind::Permanent
                }
            }
            408 | 500..=599 => FailureKind::Transient,
            _ => FailureKind::Permanent,
        },
        ProviderFailure::Transport(_) => FailureKind::Transient,
        ProviderFailure::Decode(_) => FailureKind::Permanent,
        ProviderFailure::Cancelled => FailureKind::Cancelled,
    }
}

/// Failure surfaced by the resilient fetcher once the retry policy gives up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Not retryable (4xx, malformed response).
    #[error("permanent provider failure: {message}")]
    Permanent { message: String },

    /// Still failing after the configured number of attempts.
    #[error("provider still failing after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    /// Cancellation was requested while fetching.
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
