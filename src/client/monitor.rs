//! Liveness monitor.
//!
//! A periodic timer owned by the supervisor. While running it yields one
//! tick per probe interval; the supervisor probes on each tick if the
//! session is ready, or reconnects immediately if the session died between
//! ticks.
//!
//! The timer lives in an `Option`, so stopping drops it and a stopped
//! monitor holds no timer at all. [`LivenessMonitor::start`] always stops
//! first, so repeated starts never leave a second timer behind.

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::trace;

// ============================================================================
// LivenessMonitor
// ============================================================================

/// Periodic probe timer.
#[derive(Debug)]
pub(crate) struct LivenessMonitor {
    /// Time between ticks.
    period: Duration,
    /// Active timer, if started.
    interval: Option<Interval>,
}

impl LivenessMonitor {
    /// Creates a stopped monitor.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    /// Starts ticking, first tick one period from now.
    ///
    /// Cancels any previous timer.
    pub fn start(&mut self) {
        self.stop();

        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);

        trace!(period_ms = self.period.as_millis() as u64, "Liveness monitor started");
    }

    /// Stops ticking. Idempotent.
    pub fn stop(&mut self) {
        if self.interval.take().is_some() {
            trace!("Liveness monitor stopped");
        }
    }

    /// Returns `true` if a timer is active.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Waits for the next tick. Never completes while stopped.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => pending::<()>().await,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
