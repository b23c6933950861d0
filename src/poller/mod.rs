//! Generic completion polling for long-running generation jobs.
//!
//! The gateway answers a generation request with either an immediate result
//! or a job id. [`await_completion`] drives the status endpoint for a job id
//! under a [`PollPolicy`] until the gateway reports a terminal state or the
//! attempt budget runs out. The same routine serves the landing, ad, and
//! video flows; only the policy differs.
//!
//! Transient transport errors on a status check are swallowed and the loop
//! proceeds to the next scheduled attempt. The generation itself is never
//! retried here.

use crate::error::{Error, Result};
use crate::gateway::JobStatus;
use crate::session::SectionCopy;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Fixed-interval polling budget for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Delay before the first status check
    pub initial_delay: Duration,
    /// Delay between subsequent checks
    pub interval: Duration,
    /// Total number of status checks before giving up
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::image()
    }
}

impl PollPolicy {
    /// Budget for image generations: roughly seventy seconds of wall time.
    pub fn image() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            interval: Duration::from_secs(10),
            max_attempts: 7,
        }
    }

    /// Budget for video renders: ten minutes at the same interval.
    pub fn video() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            interval: Duration::from_secs(10),
            max_attempts: 60,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }
}

/// Terminal state of a polled job as reported by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        image_url: Option<String>,
        video_url: Option<String>,
        copy: Option<SectionCopy>,
    },
    Failed {
        message: String,
    },
}

/// Poll `check` until the job settles or the budget is exhausted.
///
/// Returns `Err(Error::PollTimeout)` when every attempt reported the job
/// still running; gateway-reported failures come back as
/// [`JobOutcome::Failed`], not as an `Err`.
pub async fn await_completion<F, Fut>(
    policy: &PollPolicy,
    job_id: &str,
    mut check: F,
) -> Result<JobOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<JobStatus>>,
{
    sleep(policy.initial_delay).await;

    for attempt in 1..=policy.max_attempts {
        match check().await {
            Ok(status) if status.done => {
                let succeeded = status.success.unwrap_or(status.error.is_none());
                if succeeded {
                    debug!(job_id, attempt, "job completed");
                    return Ok(JobOutcome::Completed {
                        image_url: status.image_url,
                        video_url: status.video_url,
                        copy: status.copy,
                    });
                }
                let message = status
                    .error
                    .unwrap_or_else(|| "Generation failed".to_string());
                debug!(job_id, attempt, %message, "job failed");
                return Ok(JobOutcome::Failed { message });
            }
            Ok(_) => {
                debug!(
                    job_id,
                    attempt,
                    max_attempts = policy.max_attempts,
                    "job still running"
                );
            }
            Err(e) => {
                // Counts toward the shared attempt budget, nothing more.
                warn!(job_id, attempt, error = %e, "status check failed, will retry");
            }
        }

        if attempt < policy.max_attempts {
            sleep(policy.interval).await;
        }
    }

    Err(Error::PollTimeout(job_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_millis(10),
            interval: Duration::from_millis(10),
            max_attempts,
        }
    }

    fn running() -> JobStatus {
        JobStatus {
            done: false,
            success: None,
            image_url: None,
            video_url: None,
            copy: None,
            error: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_when_gateway_reports_done() {
        let calls = AtomicU32::new(0);
        let outcome = await_completion(&fast_policy(5), "job-1", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Ok(running())
            } else {
                Ok(JobStatus {
                    done: true,
                    success: Some(true),
                    image_url: Some("https://img.example/out.png".to_string()),
                    video_url: None,
                    copy: None,
                    error: None,
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            outcome,
            JobOutcome::Completed { image_url: Some(ref url), .. } if url.ends_with("out.png")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn gateway_failure_is_an_outcome_not_an_error() {
        let outcome = await_completion(&fast_policy(5), "job-2", || async {
            Ok(JobStatus {
                done: true,
                success: Some(false),
                image_url: None,
                video_url: None,
                copy: None,
                error: Some("content policy rejection".to_string()),
            })
        })
        .await
        .unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Failed {
                message: "content policy rejection".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_share_the_attempt_budget() {
        let calls = AtomicU32::new(0);
        let result = await_completion(&fast_policy(4), "job-3", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Gateway("connection reset".to_string()))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(matches!(result, Err(Error::PollTimeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_times_out() {
        let calls = AtomicU32::new(0);
        let result = await_completion(&fast_policy(7), "job-4", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(running())
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 7);
        assert!(matches!(result, Err(Error::PollTimeout(_))));
    }
}
