use crate::control::poll::{Poller, WaitOutcome};
use crate::control::status::StatusDecoder;
use crate::error::{BatchError, Result};
use crate::scheduler::{JobFilter, JobId, JobSignal};

/// Operations over every job sharing a job name, plus single-job kill.
///
/// A batch is never stored: each call asks the scheduler for the jobs that
/// currently carry the name.
#[derive(Clone)]
pub struct BatchController {
    decoder: StatusDecoder,
    poller: Poller,
    kill_signal: JobSignal,
}

impl BatchController {
    pub fn new(decoder: StatusDecoder, poller: Poller, kill_signal: JobSignal) -> Self {
        Self {
            decoder,
            poller,
            kill_signal,
        }
    }

    /// Number of jobs named `job_name` that are not finished. Zero when no
    /// job has the name.
    pub async fn batch_status(&self, job_name: &str) -> Result<usize> {
        let records = self.decoder.records_by_name(job_name).await?;
        let unfinished = records.iter().filter(|r| !r.is_finished()).count();
        tracing::debug!(job_name, total = records.len(), unfinished, "Batch status");
        Ok(unfinished)
    }

    /// Poll [`batch_status`](Self::batch_status) until it reaches zero or
    /// the wait is cancelled.
    pub async fn batch_wait(&self, job_name: &str) -> Result<WaitOutcome> {
        let mut remaining = self.batch_status(job_name).await?;

        while remaining > 0 {
            if !self.poller.tick().await {
                tracing::info!(job_name, remaining, "Batch wait cancelled");
                return Ok(WaitOutcome::Cancelled);
            }
            remaining = self.batch_status(job_name).await?;
        }

        tracing::info!(job_name, "All jobs in batch finished");
        Ok(WaitOutcome::Finished(()))
    }

    /// Signal every unfinished job named `job_name`. Returns how many jobs
    /// were signalled.
    ///
    /// Jobs are signalled in scheduler order while the query is still open.
    /// The first failed signal stops the walk and is returned; jobs already
    /// signalled stay signalled.
    pub async fn batch_kill(&self, job_name: &str) -> Result<usize> {
        let Some(cursor) = self
            .decoder
            .open_cursor(&JobFilter::by_name(job_name))
            .await?
        else {
            tracing::info!(job_name, "No jobs to kill");
            return Ok(0);
        };

        let mut signalled = 0;
        for entry in cursor {
            let record = entry.map_err(|fault| self.decoder.read_error(fault))?;
            if record.job_name.as_deref().is_some_and(|n| n != job_name) {
                continue;
            }
            if record.is_finished() {
                continue;
            }
            self.send_signal(record.job_id).await?;
            signalled += 1;
        }

        tracing::info!(job_name, signalled, "Batch kill complete");
        Ok(signalled)
    }

    /// Signal one job without checking its state first. A job the scheduler
    /// refuses to signal (for example, one that already finished) yields
    /// `Signal`.
    pub async fn kill(&self, job_id: JobId) -> Result<()> {
        self.decoder.session().open().await?;
        self.send_signal(job_id).await
    }

    async fn send_signal(&self, job_id: JobId) -> Result<()> {
        let session = self.decoder.session();
        match session.client().signal(job_id, self.kill_signal).await {
            Ok(()) => {
                tracing::info!(job_id, signal = ?self.kill_signal, "Job signalled");
                Ok(())
            }
            Err(fault) => {
                let message = session.diagnostic("signal rejected");
                tracing::warn!(job_id, ?fault, %message, "Failed to signal job");
                Err(BatchError::Signal { job_id, message })
            }
        }
    }
}
