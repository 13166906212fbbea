//! Injected sources of time and randomness.
//!
//! The retry policy needs a wall clock (rate-limit reset deadlines are absolute
//! timestamps) and a random source (backoff jitter). Both are passed in at
//! construction so tests can pin them.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Wall-clock time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of uniformly distributed values in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    fn next_unit(&self) -> f64;
}

/// Random source backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..1.0)
    }
}

/// A random source that always yields the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_unit(&self) -> f64 {
        self.0
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A clock that follows tokio's (pausable) timer, starting at `origin`.
///
/// Under `#[tokio::test(start_paused = true)]` wall-clock deadlines and tokio
/// sleeps then advance together.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct PausedClock {
    origin: DateTime<Utc>,
    started: tokio::time::Instant,
}

#[cfg(test)]
impl PausedClock {
    pub(crate) fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            started: tokio::time::Instant::now(),
        }
    }
}

#[cfg(test)]
impl Clock for PausedClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .expect("elapsed test time should fit in a chrono duration");
        self.origin + elapsed
    }
}
