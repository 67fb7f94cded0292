//! Bounded polling for eventually consistent server state
//!
//! [`BoundedPoller`] re-runs a check until it passes or a deadline elapses. When the
//! deadline wins, the failure from the last check is what gets reported, so callers see
//! why the condition never held rather than just that time ran out.

use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, TokioClock};
use crate::error::{HarnessError, Result};

// A zero interval would spin without letting time advance.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Timing for one wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub name: String,
    /// Slept once before the first check
    pub initial_delay: Duration,
    pub poll_interval: Duration,
    /// Measured from the first check
    pub max_wait: Duration,
}

impl PollConfig {
    pub fn new(
        name: impl Into<String>,
        initial_delay: Duration,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            initial_delay,
            poll_interval,
            max_wait,
        }
    }

    /// Short wait after a write, before asserting on its side effects
    pub fn settle() -> Self {
        Self::new(
            "settle",
            Duration::from_millis(200),
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
    }

    /// Longer wait for background processing such as an antivirus scan
    pub fn convergence() -> Self {
        Self::new(
            "convergence",
            Duration::ZERO,
            Duration::from_secs(5),
            Duration::from_secs(15),
        )
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Result of a poll that does not treat timeouts as errors
#[derive(Debug)]
pub enum PollOutcome {
    Success {
        attempts: u32,
        elapsed: Duration,
    },
    TimedOut {
        attempts: u32,
        elapsed: Duration,
        last_failure: anyhow::Error,
    },
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Success { attempts, .. } | PollOutcome::TimedOut { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            PollOutcome::Success { elapsed, .. } | PollOutcome::TimedOut { elapsed, .. } => {
                *elapsed
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoundedPoller {
    clock: Arc<dyn Clock>,
}

impl Default for BoundedPoller {
    fn default() -> Self {
        Self::new(Arc::new(TokioClock))
    }
}

impl BoundedPoller {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Run `check` until it returns `Ok` or `config.max_wait` has elapsed.
    ///
    /// The check always runs at least once, and once more exactly at the deadline when
    /// the poll interval would otherwise overshoot it.
    pub async fn poll<F, Fut>(&self, config: &PollConfig, mut check: F) -> PollOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        if !config.initial_delay.is_zero() {
            self.clock.sleep(config.initial_delay).await;
        }

        let started = self.clock.now();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let failure = match check().await {
                Ok(()) => {
                    let elapsed = self.clock.now().saturating_duration_since(started);
                    if attempts > 1 {
                        info!(
                            "'{}' held after {} attempts ({:?})",
                            config.name, attempts, elapsed
                        );
                    }
                    return PollOutcome::Success { attempts, elapsed };
                }
                Err(failure) => failure,
            };

            let elapsed = self.clock.now().saturating_duration_since(started);
            if elapsed >= config.max_wait {
                warn!(
                    "'{}' did not hold within {:?} after {} attempts: {:#}",
                    config.name, config.max_wait, attempts, failure
                );
                return PollOutcome::TimedOut {
                    attempts,
                    elapsed,
                    last_failure: failure,
                };
            }

            debug!(
                "'{}' not yet satisfied (attempt {}): {:#}",
                config.name, attempts, failure
            );

            let remaining = config.max_wait - elapsed;
            let pause = config.poll_interval.max(MIN_POLL_INTERVAL).min(remaining);
            self.clock.sleep(pause).await;
        }
    }

    /// Like [`poll`](Self::poll) but a timeout becomes
    /// [`HarnessError::PollDeadlineExceeded`] carrying the last failure.
    pub async fn await_assertion<F, Fut>(&self, config: &PollConfig, check: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        match self.poll(config, check).await {
            PollOutcome::Success { .. } => Ok(()),
            PollOutcome::TimedOut {
                attempts,
                elapsed,
                last_failure,
            } => Err(HarnessError::PollDeadlineExceeded {
                name: config.name.clone(),
                waited: elapsed,
                attempts,
                last_failure,
            }),
        }
    }
}
