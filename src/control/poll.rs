use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::interrupt::CancelFlag;

/// Source of delays for poll loops. Tests swap in a sleeper that returns
/// immediately.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real-time sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome<T = ()> {
    /// The condition was observed; carries the last observation.
    Finished(T),
    /// The cancellation flag was observed before the condition held.
    Cancelled,
}

impl<T> WaitOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitOutcome::Cancelled)
    }
}

/// Fixed-interval pacing shared by every wait loop.
#[derive(Clone)]
pub struct Poller {
    sleeper: Arc<dyn Sleeper>,
    interval: Duration,
    cancel: CancelFlag,
}

impl Poller {
    pub fn new(sleeper: Arc<dyn Sleeper>, interval: Duration, cancel: CancelFlag) -> Self {
        Self {
            sleeper,
            interval,
            cancel,
        }
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Sleep one interval, then test-and-clear the cancellation flag.
    /// Returns false when the caller should stop polling.
    pub async fn tick(&self) -> bool {
        self.sleeper.sleep(self.interval).await;
        !self.cancel.take()
    }
}
