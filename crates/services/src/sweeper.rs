//! Periodic purge of elapsed cooldowns and expired admin sessions.
//!
//! Lazy expiry only fires when a key is looked up again; entries for
//! identities that never come back would otherwise live forever.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::debug;

use crate::metrics::CoreMetrics;
use crate::rate_limiter::RateLimiter;
use crate::sessions::SessionRegistry;

/// Default interval between sweep cycles.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub cooldowns: usize,
    pub sessions: usize,
}

pub struct Sweeper {
    limiter: Arc<RateLimiter>,
    sessions: Arc<SessionRegistry>,
    metrics: Option<Arc<CoreMetrics>>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(limiter: Arc<RateLimiter>, sessions: Arc<SessionRegistry>) -> Self {
        Self { limiter, sessions, metrics: None, interval: SWEEP_INTERVAL }
    }

    /// A zero interval keeps [`SWEEP_INTERVAL`].
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.interval = interval;
        }
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<CoreMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run a single sweep cycle.
    pub fn run_once(&self) -> SweepReport {
        let report =
            SweepReport { cooldowns: self.limiter.sweep(), sessions: self.sessions.sweep() };
        if let Some(metrics) = &self.metrics {
            metrics.record_swept(report.cooldowns + report.sessions);
        }
        debug!(cooldowns = report.cooldowns, sessions = report.sessions, "sweep cycle finished");
        report
    }

    /// Start the sweeper background task.
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            loop {
                ticker.tick().await;
                self.run_once();
            }
        })
    }
}
