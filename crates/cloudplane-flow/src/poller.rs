//! Reconciliation polling
//!
//! Waits for externally observed state to converge by invoking a check at a
//! fixed interval until it reports a terminal outcome, the deadline passes, or
//! the check fails and the configuration says to stop on failure.

use crate::error::PollError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout_at};

/// Outcome of a single check invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome<T> {
    /// Not there yet, poll again
    Continue,
    /// Converged, stop with this value
    Finished(T),
    /// Definitive external failure, stop without retrying
    Break(String),
}

/// Polling parameters, immutable per call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Pause between two check invocations
    pub interval: Duration,
    /// Total time budget for the whole poll
    pub deadline: Duration,
    /// Abort on the first check error instead of polling on
    pub stop_on_exception: bool,
}

impl PollingConfig {
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self {
            interval,
            deadline,
            stop_on_exception: true,
        }
    }

    pub fn with_stop_on_exception(mut self, stop: bool) -> Self {
        self.stop_on_exception = stop;
        self
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(60 * 60))
    }
}

/// Poll `check` until it finishes, breaks, fails or the deadline passes
///
/// The first attempt runs immediately and every further attempt after
/// `config.interval`. An attempt is only started if it still falls inside
/// `config.deadline`, and a check still running at the deadline is dropped.
///
/// # Returns
/// * `Ok(value)` - the check reported [`AttemptOutcome::Finished`]
/// * `Err(PollError::Break)` - the check reported [`AttemptOutcome::Break`]
/// * `Err(PollError::Timeout)` - no terminal outcome within the deadline
/// * `Err(PollError::Aborted)` - the check failed and `stop_on_exception` is set
pub async fn poll_until<T, F, Fut>(mut check: F, config: &PollingConfig) -> Result<T, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<AttemptOutcome<T>>>,
{
    let started = Instant::now();
    let deadline = started + config.deadline;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        let Ok(result) = timeout_at(deadline, check()).await else {
            let elapsed = started.elapsed();
            tracing::info!(
                "Check still running at the deadline after {} attempts ({:?})",
                attempts,
                elapsed
            );
            return Err(PollError::Timeout { attempts, elapsed });
        };

        match result {
            Ok(AttemptOutcome::Finished(value)) => {
                tracing::debug!("Polling finished after {} attempts", attempts);
                return Ok(value);
            }
            Ok(AttemptOutcome::Break(reason)) => {
                tracing::info!("Polling stopped after {} attempts: {}", attempts, reason);
                return Err(PollError::Break(reason));
            }
            Ok(AttemptOutcome::Continue) => {}
            Err(source) if config.stop_on_exception => {
                tracing::warn!("Polling aborted on attempt {}: {:#}", attempts, source);
                return Err(PollError::Aborted { attempts, source });
            }
            Err(e) => {
                tracing::debug!("Check failed on attempt {}, polling on: {:#}", attempts, e);
            }
        }

        let elapsed = started.elapsed();
        if elapsed + config.interval > config.deadline {
            tracing::info!(
                "Polling timed out after {} attempts ({:?} of {:?})",
                attempts,
                elapsed,
                config.deadline
            );
            return Err(PollError::Timeout { attempts, elapsed });
        }

        sleep(config.interval).await;
    }
}
