//! Timer that drives the recompute job
//!
//! Runs independently of request traffic. A failed run is recorded and the
//! loop keeps going; only a stop command or a dropped handle ends it.

use super::job::{JobOutcome, RecomputeJob};
use chrono::{DateTime, Utc};
use holocron_core::{HolocronError, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Control messages for a running scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerCommand {
    RunNow,
    Stop,
}

/// Counters describing past runs
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    pub runs: u64,
    pub completed: u64,
    pub failed: u64,
    pub discarded: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<JobOutcome>,
}

impl SchedulerStats {
    fn record(&mut self, outcome: JobOutcome) {
        self.runs += 1;
        match &outcome {
            JobOutcome::Completed { .. } => self.completed += 1,
            JobOutcome::Discarded { .. } => self.discarded += 1,
            JobOutcome::Failed { .. } => self.failed += 1,
        }
        self.last_run_at = Some(Utc::now());
        self.last_outcome = Some(outcome);
    }
}

/// Spawns the periodic recompute loop
pub struct StatisticsScheduler {
    job: RecomputeJob,
    interval: Duration,
    run_on_startup: bool,
}

impl StatisticsScheduler {
    pub fn new(job: RecomputeJob, interval: Duration) -> Self {
        Self {
            job,
            interval,
            run_on_startup: true,
        }
    }

    /// Whether the first run happens immediately or after one interval
    pub fn run_on_startup(mut self, enabled: bool) -> Self {
        self.run_on_startup = enabled;
        self
    }

    /// Start the loop on the current runtime
    pub fn spawn(self) -> SchedulerHandle {
        let (control_tx, control_rx) = mpsc::channel(8);
        let stats = Arc::new(RwLock::new(SchedulerStats::default()));

        let task = tokio::spawn(run_loop(self, control_rx, stats.clone()));

        SchedulerHandle {
            control_tx,
            stats,
            task,
        }
    }
}

async fn run_loop(
    scheduler: StatisticsScheduler,
    mut control_rx: mpsc::Receiver<SchedulerCommand>,
    stats: Arc<RwLock<SchedulerStats>>,
) {
    let period = scheduler.interval;
    let start = if scheduler.run_on_startup {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval_secs = period.as_secs(), "Statistics scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            cmd = control_rx.recv() => match cmd {
                Some(SchedulerCommand::RunNow) => info!("Statistics recompute requested"),
                Some(SchedulerCommand::Stop) | None => break,
            },
        }

        // Stop requests are honoured mid-run; extra run requests are dropped
        let run = scheduler.job.run();
        tokio::pin!(run);
        let outcome = loop {
            tokio::select! {
                outcome = &mut run => break Some(outcome),
                cmd = control_rx.recv() => match cmd {
                    Some(SchedulerCommand::RunNow) => debug!("Recompute already in progress"),
                    Some(SchedulerCommand::Stop) | None => break None,
                },
            }
        };

        match outcome {
            Some(outcome) => {
                if !outcome.is_completed() {
                    warn!(?outcome, "Scheduled statistics run did not complete");
                }
                stats.write().await.record(outcome);
            }
            None => {
                info!("Stopping during a statistics run");
                break;
            }
        }
    }

    info!("Statistics scheduler stopped");
}

/// Handle to a running scheduler
pub struct SchedulerHandle {
    control_tx: mpsc::Sender<SchedulerCommand>,
    stats: Arc<RwLock<SchedulerStats>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask for a run outside the timer
    pub async fn trigger(&self) -> Result<()> {
        self.control_tx
            .send(SchedulerCommand::RunNow)
            .await
            .map_err(|_| HolocronError::validation("Statistics scheduler is not running"))
    }

    /// Snapshot of the run counters
    pub async fn stats(&self) -> SchedulerStats {
        self.stats.read().await.clone()
    }

    /// Whether the loop is still alive
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the loop and wait for it to exit
    pub async fn shutdown(self) {
        let _ = self.control_tx.send(SchedulerCommand::Stop).await;
        if let Err(e) = self.task.await {
            warn!(error = %e, "Statistics scheduler task ended abnormally");
        }
    }
}
