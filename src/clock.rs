//! Time source abstraction
//!
//! Everything that waits or checks for staleness goes through a [`Clock`], so the
//! credential cache and the poller can run on virtual time in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[async_trait]
pub trait Clock: Send + Sync + Debug {
    /// Current point in time
    fn now(&self) -> Instant;

    /// Suspend the calling task for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio's timer (honours `tokio::time::pause`)
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: time only moves when someone sleeps or calls [`ManualClock::advance`].
///
/// Sleeping advances the shared offset immediately and yields, so code under test
/// observes exactly the durations it asked for without any real waiting.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move virtual time forward
    pub fn advance(&self, duration: Duration) {
        *self.offset.lock() += duration;
    }

    /// Total virtual time elapsed since construction
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}
