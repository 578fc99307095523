use std::collections::VecDeque;

use crate::control::{JobControl, WaitOutcome};
use crate::error::{BatchError, Result};
use crate::scheduler::{JobId, JobRequest, LimitKind};

/// A command waiting to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCommand {
    pub command: String,
    pub stdout_path: Option<String>,
    pub stderr_path: Option<String>,
}

/// Settings for one [`ThrottledQueue::run`].
#[derive(Debug, Clone)]
pub struct ThrottleOptions {
    /// Most jobs of the batch allowed to be unfinished at once.
    pub max_jobs: usize,
    pub job_name: String,
    pub queue: Option<String>,
    pub memory_limit: Option<u64>,
}

impl ThrottleOptions {
    pub fn new(max_jobs: usize, job_name: impl Into<String>) -> Self {
        Self {
            max_jobs,
            job_name: job_name.into(),
            queue: None,
            memory_limit: None,
        }
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn with_memory_limit(mut self, limit: u64) -> Self {
        self.memory_limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleOutcome {
    /// Nothing was run: the queue was empty or `max_jobs` was zero.
    Skipped,
    /// Every command was submitted and every job of the batch finished.
    Completed { submitted: Vec<JobId> },
    /// The cancellation flag was observed. Submitted jobs keep running.
    Cancelled { submitted: Vec<JobId> },
    /// A scheduler call failed. Submitted jobs keep running and commands
    /// not yet accepted stay queued.
    Failed {
        submitted: Vec<JobId>,
        error: BatchError,
    },
}

impl ThrottleOutcome {
    /// Jobs submitted before the run ended.
    pub fn submitted(&self) -> &[JobId] {
        match self {
            ThrottleOutcome::Skipped => &[],
            ThrottleOutcome::Completed { submitted }
            | ThrottleOutcome::Cancelled { submitted }
            | ThrottleOutcome::Failed { submitted, .. } => submitted,
        }
    }
}

/// Feeds commands into one named batch while keeping at most `max_jobs`
/// of them unfinished, then waits for the batch to drain.
#[derive(Debug, Default)]
pub struct ThrottledQueue {
    pending: VecDeque<QueuedCommand>,
}

impl ThrottledQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        command: impl Into<String>,
        stdout_path: Option<String>,
        stderr_path: Option<String>,
    ) {
        self.pending.push_back(QueuedCommand {
            command: command.into(),
            stdout_path,
            stderr_path,
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queue one command per line of `contents`, in the form
    /// `command[<TAB>stdout[<TAB>stderr]]`. Blank lines and `#` comments are
    /// skipped; an empty path field leaves that path unset.
    pub fn from_lines(contents: &str) -> Self {
        let mut queue = Self::new();
        for line in contents.lines() {
            let mut fields = line.split('\t').map(str::trim);
            let command = fields.next().unwrap_or_default();
            if command.is_empty() || command.starts_with('#') {
                continue;
            }
            let mut path = || fields.next().filter(|f| !f.is_empty()).map(str::to_string);
            let stdout_path = path();
            let stderr_path = path();
            queue.add(command, stdout_path, stderr_path);
        }
        queue
    }

    fn request(&self, cmd: &QueuedCommand, options: &ThrottleOptions) -> JobRequest {
        let mut request =
            JobRequest::new(cmd.command.clone()).with_job_name(options.job_name.clone());
        request.stdout_path = cmd.stdout_path.clone();
        request.stderr_path = cmd.stderr_path.clone();
        request.queue = options.queue.clone();
        if let Some(limit) = options.memory_limit {
            request = request.with_limit(LimitKind::Memory, limit);
        }
        request
    }

    /// Submit all queued commands under `options.job_name`.
    ///
    /// The first round fills every slot. Each later round sleeps one poll
    /// interval, counts the batch's unfinished jobs and submits into the
    /// free slots. Once the queue is empty the batch is polled until no job
    /// is left unfinished.
    ///
    /// A command leaves the queue only once the scheduler accepts it. Any
    /// failure ends the run with [`ThrottleOutcome::Failed`], which still
    /// lists the jobs already submitted; calling `run` again resumes with
    /// the command that failed.
    pub async fn run(
        &mut self,
        control: &JobControl,
        options: &ThrottleOptions,
    ) -> ThrottleOutcome {
        if self.pending.is_empty() {
            tracing::warn!("Throttled run started with an empty queue");
            return ThrottleOutcome::Skipped;
        }
        if options.max_jobs == 0 {
            tracing::warn!(max_jobs = options.max_jobs, "Invalid job limit");
            return ThrottleOutcome::Skipped;
        }

        let mut submitted: Vec<JobId> = Vec::with_capacity(self.pending.len());
        match self.drive(control, options, &mut submitted).await {
            Ok(WaitOutcome::Finished(())) => {
                tracing::info!(job_name = %options.job_name, jobs = submitted.len(), "All jobs completed");
                ThrottleOutcome::Completed { submitted }
            }
            Ok(WaitOutcome::Cancelled) => {
                tracing::info!(
                    submitted = submitted.len(),
                    queued = self.pending.len(),
                    "Throttled run cancelled"
                );
                ThrottleOutcome::Cancelled { submitted }
            }
            Err(error) => {
                tracing::warn!(
                    %error,
                    submitted = submitted.len(),
                    queued = self.pending.len(),
                    "Throttled run failed"
                );
                ThrottleOutcome::Failed { submitted, error }
            }
        }
    }

    async fn drive(
        &mut self,
        control: &JobControl,
        options: &ThrottleOptions,
        submitted: &mut Vec<JobId>,
    ) -> Result<WaitOutcome> {
        let total = self.pending.len();
        let job_name = options.job_name.as_str();
        tracing::info!(total, max_jobs = options.max_jobs, job_name, "Starting throttled run");

        let mut unfinished = 0;
        loop {
            let slots = options
                .max_jobs
                .saturating_sub(unfinished)
                .min(self.pending.len());

            tracing::info!(
                slots,
                submitted = submitted.len(),
                total,
                unfinished,
                "Submitting next round"
            );

            for _ in 0..slots {
                let Some(cmd) = self.pending.front() else {
                    break;
                };
                let request = self.request(cmd, options);
                submitted.push(control.submit_request(request).await?);
                self.pending.pop_front();
            }

            if self.pending.is_empty() {
                break;
            }
            if !control.poller().tick().await {
                return Ok(WaitOutcome::Cancelled);
            }
            unfinished = control.batch_status(job_name).await?;
        }

        tracing::info!(job_name, "All jobs submitted, waiting for them to complete");
        control.batch_wait(job_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_preserves_order() {
        let mut queue = ThrottledQueue::new();
        assert!(queue.is_empty());
        queue.add("a", None, None);
        queue.add("b", Some("b.out".into()), Some("b.err".into()));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pending[0].command, "a");
        assert_eq!(queue.pending[1].stdout_path.as_deref(), Some("b.out"));
    }

    #[test]
    fn from_lines_reads_optional_output_paths() {
        let queue = ThrottledQueue::from_lines(
            "# header\nsort a.txt\tsort.out\tsort.err\n\n  uniq b.txt\tuniq.out\nwc c.txt\t\twc.err\n",
        );
        assert_eq!(queue.len(), 3);
        assert_eq!(
            queue.pending[0],
            QueuedCommand {
                command: "sort a.txt".into(),
                stdout_path: Some("sort.out".into()),
                stderr_path: Some("sort.err".into()),
            }
        );
        assert_eq!(queue.pending[1].command, "uniq b.txt");
        assert_eq!(queue.pending[1].stdout_path.as_deref(), Some("uniq.out"));
        assert!(queue.pending[1].stderr_path.is_none());
        assert!(queue.pending[2].stdout_path.is_none());
        assert_eq!(queue.pending[2].stderr_path.as_deref(), Some("wc.err"));
    }

    #[test]
    fn request_carries_batch_fields() {
        let queue = ThrottledQueue::new();
        let options = ThrottleOptions::new(4, "align")
            .with_queue("short")
            .with_memory_limit(1024);
        let req = queue.request(
            &QueuedCommand {
                command: "bwa mem ref.fa r1.fq".into(),
                stdout_path: Some("r1.out".into()),
                stderr_path: None,
            },
            &options,
        );
        assert_eq!(req.job_name.as_deref(), Some("align"));
        assert_eq!(req.queue.as_deref(), Some("short"));
        assert_eq!(req.stdout_path.as_deref(), Some("r1.out"));
        assert!(req.stderr_path.is_none());
        assert_eq!(req.limits.get(LimitKind::Memory), Some(1024));
    }
}
