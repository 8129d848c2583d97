//! Fixed-interval polling of asynchronous peer jobs.

use crate::client::PeerClient;
use crate::error::{PeerError, PeerResult};
use crate::types::{JobRef, JobStatus};
use log::debug;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

/// Interval between `queryAsyncJobResult` polls.
pub const JOB_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Poll until the job reaches a terminal status. Success yields the job
/// result document; failure maps to [`PeerError::JobFailed`]. No upper
/// bound on polls, callers that need one use [`await_job_bounded`].
pub async fn await_job(client: &PeerClient, job: &JobRef) -> PeerResult<Value> {
    await_job_inner(client, job, None, JOB_POLL_INTERVAL).await
}

/// Like [`await_job`] but gives up after `max_polls` non-terminal polls.
pub async fn await_job_bounded(
    client: &PeerClient,
    job: &JobRef,
    max_polls: u32,
) -> PeerResult<Value> {
    await_job_inner(client, job, Some(max_polls), JOB_POLL_INTERVAL).await
}

async fn await_job_inner(
    client: &PeerClient,
    job: &JobRef,
    max_polls: Option<u32>,
    interval: Duration,
) -> PeerResult<Value> {
    let mut polls = 0u32;
    loop {
        let poll = client.query_async_job_result(job).await?;
        match poll.status {
            JobStatus::Success => return Ok(poll.result),
            JobStatus::Failure => {
                let message = poll
                    .error_text
                    .unwrap_or_else(|| "no error text reported".to_string());
                return Err(PeerError::job_failed(job.as_str(), message));
            }
            JobStatus::Pending => {
                polls += 1;
                if let Some(max) = max_polls {
                    if polls >= max {
                        return Err(PeerError::transport(format!(
                            "job {} still pending after {} polls",
                            job, polls
                        )));
                    }
                }
                debug!("job {} pending, poll {}", job, polls);
                sleep(interval).await;
            }
        }
    }
}
