//! Cancellable poll ticker bound to a wait deadline.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::retry::CallContext;

/// Paces status queries of a wait operation.
///
/// The deadline covers the whole wait (every query and every retry inside
/// it), not a single attempt. [`PollTicker::tick`] never sleeps past the
/// deadline and returns as soon as the token is cancelled.
#[derive(Debug)]
pub struct PollTicker {
    interval: Duration,
    timeout: Duration,
    started: Instant,
    ctx: CallContext,
    ticks: u32,
}

impl PollTicker {
    pub fn new(interval: Duration, timeout: Duration, cancel: CancellationToken) -> Self {
        let started = Instant::now();
        Self {
            interval,
            timeout,
            started,
            ctx: CallContext::new(cancel, Some(started + timeout)),
            ticks: 0,
        }
    }

    /// Context handed to the Retry Layer for queries issued in this wait
    pub fn context(&self) -> &CallContext {
        &self.ctx
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Completed sleeps so far
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// `Cancelled` or `DeadlineExceeded` if no further query may be issued.
    pub fn check(&self) -> Result<()> {
        self.ctx.check()
    }

    /// Wait one poll interval.
    pub async fn tick(&mut self) -> Result<()> {
        self.ctx.sleep(self.interval).await?;
        self.ticks += 1;
        Ok(())
    }
}
