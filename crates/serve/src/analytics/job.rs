//! Scheduled statistics recompute job
//!
//! One run calls the aggregator up to `tries` times. Each attempt is bounded
//! by a timeout; failed attempts wait out the backoff table before the next
//! one. When the budget is spent the failure handler is told once and the
//! run ends normally, so the scheduler driving it never sees an error.

use super::aggregator::StatisticsAggregator;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use holocron_core::{HolocronError, JobConfig, Result, Statistics};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

/// Attempt budget, per-attempt deadline and delays between attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub tries: u32,
    pub timeout: Duration,
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&JobConfig::default())
    }
}

impl From<&JobConfig> for RetryPolicy {
    fn from(config: &JobConfig) -> Self {
        Self {
            tries: config.tries.max(1),
            timeout: config.timeout(),
            backoff: config.backoff(),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based), clamped to the last entry
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1) as usize;
        self.backoff
            .get(index)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or_default()
    }
}

/// Work the job performs on every attempt
#[async_trait]
pub trait Recompute: Send + Sync + std::fmt::Debug {
    async fn recompute(&self) -> Result<Statistics>;
}

#[async_trait]
impl Recompute for StatisticsAggregator {
    async fn recompute(&self) -> Result<Statistics> {
        self.calculate_statistics().await
    }
}

/// How a job run ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Statistics were calculated and cached
    Completed { attempts: u32 },
    /// Nothing left to work on; dropped without retrying
    Discarded { attempts: u32, reason: String },
    /// Every attempt failed
    Failed { attempts: u32, error: String },
}

impl JobOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed { attempts }
            | Self::Discarded { attempts, .. }
            | Self::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Terminal failure record handed to a [`JobFailureHandler`]
#[derive(Debug, Clone)]
pub struct JobFailure {
    pub error: String,
    pub trace: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// Hook invoked once when a run has exhausted its attempts
#[async_trait]
pub trait JobFailureHandler: Send + Sync + std::fmt::Debug {
    async fn failed(&self, failure: &JobFailure);
}

/// Reports terminal failures through tracing
#[derive(Debug, Default, Clone)]
pub struct LoggingFailureHandler;

#[async_trait]
impl JobFailureHandler for LoggingFailureHandler {
    async fn failed(&self, failure: &JobFailure) {
        error!(
            error = %failure.error,
            trace = %failure.trace,
            attempts = failure.attempts,
            "Statistics calculation job failed permanently"
        );
    }
}

/// Render an error with its source chain
fn error_trace(err: &HolocronError) -> String {
    let mut trace = format!("{:?}", err);
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        trace.push_str("\ncaused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }
    trace
}

/// Statistics recompute job
#[derive(Debug, Clone)]
pub struct RecomputeJob {
    target: Arc<dyn Recompute>,
    policy: RetryPolicy,
    failure_handler: Arc<dyn JobFailureHandler>,
}

impl RecomputeJob {
    pub fn new(target: Arc<dyn Recompute>, policy: RetryPolicy) -> Self {
        Self {
            target,
            policy,
            failure_handler: Arc::new(LoggingFailureHandler),
        }
    }

    /// Replace the terminal failure hook
    pub fn with_failure_handler(mut self, handler: Arc<dyn JobFailureHandler>) -> Self {
        self.failure_handler = handler;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// A single attempt. Errors are logged and returned to the caller.
    pub async fn handle(&self) -> Result<Statistics> {
        info!("Starting statistics calculation");

        match self.target.recompute().await {
            Ok(stats) => {
                info!(
                    total_searches = stats.total_searches,
                    top_queries = stats.top_queries.len(),
                    popular_hours = stats.popular_hours.len(),
                    average_response_time = stats.average_response_time,
                    "Statistics calculated successfully"
                );
                Ok(stats)
            }
            Err(e) => {
                error!(error = %e, "Failed to calculate statistics");
                Err(e)
            }
        }
    }

    /// Runs the recompute with retries
    ///
    /// Every error except a missing resource is retried until `tries`
    /// attempts are spent. Each attempt is cut off after the policy timeout.
    ///
    /// # Returns
    ///
    /// Returns how the run ended. The run itself never fails: an exhausted
    /// budget yields `JobOutcome::Failed` after the failure handler is told.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use holocron_serve::analytics::{RecomputeJob, RetryPolicy, StatisticsAggregator};
    /// use std::sync::Arc;
    ///
    /// # async fn example(aggregator: Arc<StatisticsAggregator>) {
    /// let job = RecomputeJob::new(aggregator, RetryPolicy::default());
    /// let outcome = job.run().await;
    /// println!("{:?}", outcome);
    /// # }
    /// ```
    pub async fn run(&self) -> JobOutcome {
        let tries = self.policy.tries.max(1);
        let mut attempt = 0;

        let last_error = loop {
            attempt += 1;

            let result = match timeout(self.policy.timeout, self.handle()).await {
                Ok(result) => result,
                Err(_) => Err(HolocronError::timeout(format!(
                    "statistics calculation exceeded {}s",
                    self.policy.timeout.as_secs()
                ))),
            };

            let err = match result {
                Ok(_) => return JobOutcome::Completed { attempts: attempt },
                Err(e) => e,
            };

            if err.is_missing_resource() {
                warn!(error = %err, attempt, "Statistics job discarded");
                return JobOutcome::Discarded {
                    attempts: attempt,
                    reason: err.to_string(),
                };
            }

            if attempt >= tries {
                break err;
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                error = %err,
                category = err.category(),
                attempt,
                tries,
                delay_secs = delay.as_secs(),
                "Statistics job attempt failed, retrying"
            );
            sleep(delay).await;
        };

        let failure = JobFailure {
            error: last_error.to_string(),
            trace: error_trace(&last_error),
            attempts: attempt,
            failed_at: Utc::now(),
        };
        self.failure_handler.failed(&failure).await;

        JobOutcome::Failed {
            attempts: attempt,
            error: failure.error,
        }
    }
}
