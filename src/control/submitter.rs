use crate::control::session::Session;
use crate::error::{BatchError, Result};
use crate::scheduler::{Fault, JobId, JobRequest};

/// Builds submission requests and hands them to the scheduler.
#[derive(Clone)]
pub struct JobSubmitter {
    session: Session,
}

impl JobSubmitter {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Submit `command` with the given optional fields. Fields left as
    /// `None` are not sent to the scheduler at all; defaults (one processor,
    /// no limits, rerunnable) come from [`JobRequest::new`].
    pub async fn submit(
        &self,
        command: &str,
        job_name: Option<&str>,
        queue: Option<&str>,
        resource_requirement: Option<&str>,
        stdout_path: Option<&str>,
        stderr_path: Option<&str>,
    ) -> Result<JobId> {
        self.submit_request(build_request(
            command,
            job_name,
            queue,
            resource_requirement,
            stdout_path,
            stderr_path,
        ))
        .await
    }

    /// Submit a fully built request.
    ///
    /// # Errors
    ///
    /// - `Submission` for an empty command or a rejected request
    /// - `QueueUnavailable` when the requested queue is closed or refuses
    ///   the submission
    /// - `Connection` when no session can be opened
    pub async fn submit_request(&self, request: JobRequest) -> Result<JobId> {
        if request.command.trim().is_empty() {
            return Err(BatchError::Submission(
                "Command cannot be empty".to_string(),
            ));
        }

        self.session.open().await?;

        match self.session.client().submit(&request).await {
            Ok(job_id) => {
                tracing::info!(
                    job_id,
                    job_name = ?request.job_name,
                    queue = ?request.queue,
                    command = %request.command,
                    "Job submitted"
                );
                Ok(job_id)
            }
            Err(Fault::QueueClosed { queue }) => {
                let message = self.session.diagnostic("queue does not accept jobs");
                tracing::warn!(%queue, %message, "Submission refused by queue");
                Err(BatchError::QueueUnavailable { queue, message })
            }
            Err(Fault::Unavailable) => Err(BatchError::Connection(
                self.session.diagnostic("scheduler unavailable during submit"),
            )),
            Err(fault) => {
                let message = self.session.diagnostic("submission rejected");
                tracing::warn!(?fault, %message, command = %request.command, "Submission rejected");
                Err(BatchError::Submission(message))
            }
        }
    }
}

/// Request for `command` carrying exactly the optional fields that are set.
pub fn build_request(
    command: &str,
    job_name: Option<&str>,
    queue: Option<&str>,
    resource_requirement: Option<&str>,
    stdout_path: Option<&str>,
    stderr_path: Option<&str>,
) -> JobRequest {
    let mut request = JobRequest::new(command);
    request.job_name = job_name.map(str::to_string);
    request.queue = queue.map(str::to_string);
    request.resource_requirement = resource_requirement.map(str::to_string);
    request.stdout_path = stdout_path.map(str::to_string);
    request.stderr_path = stderr_path.map(str::to_string);
    request
}
