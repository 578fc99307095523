use crate::control::poll::{Poller, WaitOutcome};
use crate::control::status::StatusDecoder;
use crate::error::Result;
use crate::scheduler::{JobId, JobStatus};

/// Polls a single job until it finishes or the wait is cancelled.
///
/// Waiting only observes the job. Cancelling a wait leaves the job running.
#[derive(Clone)]
pub struct JobWaiter {
    decoder: StatusDecoder,
    poller: Poller,
}

impl JobWaiter {
    pub fn new(decoder: StatusDecoder, poller: Poller) -> Self {
        Self { decoder, poller }
    }

    /// Block until `job_id` reports DONE or EXIT.
    ///
    /// One status query runs per poll interval. The cancellation flag is
    /// checked after each sleep, before the next query. A failed query ends
    /// the wait with that error.
    pub async fn wait(&self, job_id: JobId) -> Result<WaitOutcome<JobStatus>> {
        let mut status = self.decoder.status(job_id).await?;
        let mut polls: u64 = 1;

        while !status.is_finished() {
            tracing::debug!(job_id, status = %status, polls, "Job not finished yet");

            if !self.poller.tick().await {
                tracing::info!(job_id, status = %status, "Wait cancelled");
                return Ok(WaitOutcome::Cancelled);
            }

            status = self.decoder.status(job_id).await?;
            polls += 1;
        }

        tracing::info!(job_id, status = %status, polls, "Job finished");
        Ok(WaitOutcome::Finished(status))
    }
}
