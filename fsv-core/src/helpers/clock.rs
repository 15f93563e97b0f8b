//! Clock abstraction and create-invocation pacing.
//!
//! Archivers that name artifacts after the wall clock need a minimum real-time
//! gap between two creates. The gap is enforced by [`Pacer`] through a
//! [`Clock`], so tests can substitute [`ManualClock`] and never sleep.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of time that can also wait.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `chrono::Utc` and `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Simulated clock; `sleep` advances time instantly.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    slept: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            slept: Mutex::new(Duration::ZERO),
        }
    }

    /// Create a clock frozen at a fixed, arbitrary instant.
    pub fn at_epoch_secs(secs: i64) -> Self {
        Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    /// Move the clock forward without counting it as sleep.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        if let Ok(delta) = chrono::Duration::from_std(duration) {
            *now += delta;
        }
    }

    /// Total time spent in `sleep` so far.
    pub fn total_slept(&self) -> Duration {
        *self.slept.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        let mut slept = self.slept.lock().unwrap_or_else(|e| e.into_inner());
        *slept += duration;
    }
}

/// Enforces a minimum interval between successive create invocations.
#[derive(Debug, Clone)]
pub struct Pacer {
    min_interval: Duration,
    last: Option<DateTime<Utc>>,
}

impl Pacer {
    /// Create a pacer with the given minimum interval.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// The configured minimum interval.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Instant of the last granted turn, if any.
    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.last
    }

    /// Wait until a create may start, then record the start.
    ///
    /// Returns how long the caller was held back.
    pub fn wait_turn(&mut self, clock: &dyn Clock) -> Duration {
        let mut waited = Duration::ZERO;
        if let Some(last) = self.last {
            // A clock that went backwards counts as no time elapsed.
            let elapsed = (clock.now() - last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < self.min_interval {
                waited = self.min_interval - elapsed;
                log::debug!("Pacing create invocation for {:?}", waited);
                clock.sleep(waited);
            }
        }
        self.last = Some(clock.now());
        waited
    }
}
