//! Rate limiting of published metrics.
//!
//! Metrics are computed on every frame but only published once per
//! interval so that observers see a stable, human-readable cadence.
//! Time is read through the [`Clock`] trait so that tests and replays can
//! drive it explicitly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::measurement::Metrics;

/// Default minimum time between two publications.
pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_millis(15_000);

/// Source of monotonic time.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle while the
/// pipeline owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }

    /// Jump to `elapsed` since creation. Moving backwards is allowed.
    pub fn set(&self, elapsed: Duration) {
        self.offset_ms
            .store(elapsed.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

/// Whether a publication is currently allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottlePhase {
    /// Too soon since the last publication; new metrics are dropped.
    Pending,
    /// The next offered metrics will be published.
    Eligible,
}

/// State carried between frames. Reset only when the pipeline restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThrottleState {
    /// `None` until the first publication.
    pub last_published_at: Option<Instant>,
    pub last_metrics: Option<Metrics>,
}

#[derive(Debug, Clone)]
pub struct UpdateThrottler {
    interval: Duration,
    state: ThrottleState,
}

impl Default for UpdateThrottler {
    fn default() -> Self {
        Self {
            interval: DEFAULT_THROTTLE_INTERVAL,
            state: ThrottleState::default(),
        }
    }
}

impl UpdateThrottler {
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidConfig(
                "throttle interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            interval,
            state: ThrottleState::default(),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> &ThrottleState {
        &self.state
    }

    /// The currently published metrics, if any.
    pub fn published(&self) -> Option<Metrics> {
        self.state.last_metrics
    }

    pub fn phase(&self, now: Instant) -> ThrottlePhase {
        match self.state.last_published_at {
            None => ThrottlePhase::Eligible,
            // A clock that runs backwards yields zero here and stays Pending.
            Some(last) if now.saturating_duration_since(last) >= self.interval => {
                ThrottlePhase::Eligible
            }
            Some(_) => ThrottlePhase::Pending,
        }
    }

    /// Time left until the throttler becomes eligible again.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.state.last_published_at {
            None => Duration::ZERO,
            Some(last) => self
                .interval
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }

    /// Offer freshly computed metrics. Returns `true` if they were published.
    pub fn offer(&mut self, metrics: Metrics, now: Instant) -> bool {
        match self.phase(now) {
            ThrottlePhase::Eligible => {
                self.state.last_metrics = Some(metrics);
                self.state.last_published_at = Some(now);
                true
            }
            ThrottlePhase::Pending => false,
        }
    }

    pub fn reset(&mut self) {
        self.state = ThrottleState::default();
    }
}
