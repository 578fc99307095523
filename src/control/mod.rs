//! Job control over an external batch scheduler.
//!
//! - [`JobSubmitter`]: builds requests and obtains job ids
//! - [`StatusDecoder`]: reads status bitmasks back through scoped cursors
//! - [`JobWaiter`]: polls one job until it finishes or the wait is cancelled
//! - [`BatchController`]: counts, waits for and kills jobs sharing a name
//!
//! [`JobControl`] wires all four to one scheduler client, one poll interval
//! and one cancellation flag.

pub mod batch;
pub mod poll;
pub mod session;
pub mod status;
pub mod submitter;
pub mod waiter;

use std::sync::Arc;

pub use batch::BatchController;
pub use poll::{Poller, Sleeper, TokioSleeper, WaitOutcome};
pub use session::Session;
pub use status::{finished, StatusDecoder};
pub use submitter::JobSubmitter;
pub use waiter::JobWaiter;

use crate::config::ControlConfig;
use crate::error::Result;
use crate::interrupt::CancelFlag;
use crate::scheduler::{JobId, JobRequest, JobStatus, SchedulerClient};

/// Public job-control surface.
#[derive(Clone)]
pub struct JobControl {
    submitter: JobSubmitter,
    decoder: StatusDecoder,
    waiter: JobWaiter,
    batch: BatchController,
    poller: Poller,
}

impl JobControl {
    /// Control backed by real-time sleeps and a fresh cancellation flag.
    pub fn new(client: Arc<dyn SchedulerClient>, config: &ControlConfig) -> Self {
        Self::with_parts(client, config, Arc::new(TokioSleeper), CancelFlag::new())
    }

    pub fn with_parts(
        client: Arc<dyn SchedulerClient>,
        config: &ControlConfig,
        sleeper: Arc<dyn Sleeper>,
        cancel: CancelFlag,
    ) -> Self {
        let session = Session::new(client, &config.app_name);
        let decoder = StatusDecoder::new(session.clone());
        let poller = Poller::new(sleeper, config.poll_interval, cancel);

        Self {
            submitter: JobSubmitter::new(session),
            waiter: JobWaiter::new(decoder.clone(), poller.clone()),
            batch: BatchController::new(decoder.clone(), poller.clone(), config.kill_signal),
            decoder,
            poller,
        }
    }

    /// Flag that cancels the wait in progress.
    pub fn cancel_flag(&self) -> &CancelFlag {
        self.poller.cancel_flag()
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub async fn submit(
        &self,
        command: &str,
        job_name: Option<&str>,
        queue: Option<&str>,
        resource_requirement: Option<&str>,
        stdout_path: Option<&str>,
        stderr_path: Option<&str>,
    ) -> Result<JobId> {
        self.submitter
            .submit(
                command,
                job_name,
                queue,
                resource_requirement,
                stdout_path,
                stderr_path,
            )
            .await
    }

    pub async fn submit_request(&self, request: JobRequest) -> Result<JobId> {
        self.submitter.submit_request(request).await
    }

    pub async fn status(&self, job_id: JobId) -> Result<JobStatus> {
        self.decoder.status(job_id).await
    }

    pub async fn status_by_name(&self, job_name: &str) -> Result<Vec<(JobId, JobStatus)>> {
        self.decoder.status_by_name(job_name).await
    }

    pub async fn wait(&self, job_id: JobId) -> Result<WaitOutcome<JobStatus>> {
        self.waiter.wait(job_id).await
    }

    pub async fn kill(&self, job_id: JobId) -> Result<()> {
        self.batch.kill(job_id).await
    }

    pub async fn batch_status(&self, job_name: &str) -> Result<usize> {
        self.batch.batch_status(job_name).await
    }

    pub async fn batch_wait(&self, job_name: &str) -> Result<WaitOutcome> {
        self.batch.batch_wait(job_name).await
    }

    pub async fn batch_kill(&self, job_name: &str) -> Result<usize> {
        self.batch.batch_kill(job_name).await
    }
}
