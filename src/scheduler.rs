//! Fixed-cadence scheduler driving the collection job.
//!
//! Cadence policy: ticks fire on multiples of the interval counted from
//! startup, the first one a whole interval after start. The job is awaited
//! inline on the loop task, so executions can never overlap; ticks that
//! fall due while a job is still running are dropped, never queued, and the
//! next fire stays on the interval grid regardless of how long a job takes.
//!
//! The next fire instant is tracked explicitly rather than through
//! `tokio::time::interval`: even with `MissedTickBehavior::Skip`, an
//! interval fires a missed tick immediately on the next poll, which would
//! turn a slow job into an off-grid back-to-back run instead of a dropped
//! tick.
//!
//! The mechanism is job-agnostic: it drives any `FnMut() -> Future` and is
//! bound to the collection job only at startup.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

/// Errors that can occur when constructing a scheduler.
#[derive(Debug, PartialEq, Eq)]
pub enum SchedulerError {
    /// The interval must be a positive number of seconds
    InvalidInterval(u64),
}

impl std::fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerError::InvalidInterval(secs) => {
                write!(f, "invalid scheduler interval: {}s (must be > 0)", secs)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

/// Fixed-interval scheduler for a single recurring job.
#[derive(Debug)]
pub struct Scheduler {
    period: Duration,
}

impl Scheduler {
    /// Create a scheduler with the given tick interval in seconds.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidInterval` if `interval_secs` is zero.
    pub fn new(interval_secs: u64) -> Result<Self, SchedulerError> {
        if interval_secs == 0 {
            return Err(SchedulerError::InvalidInterval(interval_secs));
        }

        Ok(Self {
            period: Duration::from_secs(interval_secs),
        })
    }

    /// Get the configured tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Drive the job on the fixed cadence until `shutdown` flips to true.
    ///
    /// The first tick fires one whole interval after this call, never
    /// immediately. Each tick awaits the job to completion before the next
    /// tick is considered; shutdown cancels the pending wait but an
    /// in-flight job always finishes.
    pub async fn run<F, Fut>(&self, mut job: F, mut shutdown: watch::Receiver<bool>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        if *shutdown.borrow() {
            return;
        }

        let mut next_fire = Instant::now() + self.period;
        let mut ticks: u64 = 0;
        let mut skipped: u64 = 0;

        loop {
            tokio::select! {
                _ = sleep_until(next_fire) => {
                    ticks += 1;
                    let started = Instant::now();
                    job().await;

                    // Advance on the interval grid; ticks that fell due
                    // while the job was running are dropped, not queued.
                    let now = Instant::now();
                    let mut dropped: u64 = 0;
                    next_fire += self.period;
                    while next_fire <= now {
                        next_fire += self.period;
                        dropped += 1;
                    }
                    skipped += dropped;

                    debug!(
                        tick = ticks,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        skipped = dropped,
                        "tick completed"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(
                            ticks_completed = ticks,
                            ticks_skipped = skipped,
                            "scheduler stopping"
                        );
                        break;
                    }
                }
            }
        }
    }
}
