use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::LsfConfig;
use crate::lsf::command::{bjobs_args, bkill_args, bsub_args};
use crate::lsf::parse::{
    classify_query_failure, classify_submit_failure, is_not_found_message, is_signal_refusal,
    parse_bjobs, parse_submitted_job_id,
};
use crate::scheduler::{
    Fault, JobCursor, JobFilter, JobId, JobRecord, JobRequest, JobSignal, SchedulerClient,
};

type LastError = Arc<Mutex<Option<String>>>;

/// Captured result of one LSF tool invocation.
#[derive(Debug)]
struct ToolOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl ToolOutput {
    /// Text worth reporting: stderr when present, otherwise stdout.
    fn message(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        }
    }
}

/// [`SchedulerClient`] that drives the LSF command-line tools
/// (`lsid`, `bsub`, `bjobs`, `bkill`).
#[derive(Debug, Clone)]
pub struct LsfClient {
    config: LsfConfig,
    last_error: LastError,
}

impl LsfClient {
    pub fn new(config: LsfConfig) -> Self {
        Self {
            config,
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    fn set_last_error(&self, text: impl Into<String>) {
        store_error(&self.last_error, text.into());
    }

    async fn run(&self, tool: &str, args: &[String]) -> Result<ToolOutput, Fault> {
        let program = self.config.program(tool);
        tracing::debug!(program = %program.display(), ?args, "Running LSF tool");

        let result = Command::new(&program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match result {
            Ok(output) => Ok(ToolOutput {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }),
            Err(e) => {
                tracing::error!(program = %program.display(), error = %e, "Failed to run LSF tool");
                self.set_last_error(format!("{}: {}", program.display(), e));
                Err(Fault::Unavailable)
            }
        }
    }
}

#[async_trait]
impl SchedulerClient for LsfClient {
    async fn open_session(&self, app_name: &str) -> Result<(), Fault> {
        let output = self.run(&self.config.lsid, &[]).await?;
        if output.success {
            tracing::trace!(app_name, "LSF cluster reachable");
            Ok(())
        } else {
            self.set_last_error(output.message());
            Err(Fault::Unavailable)
        }
    }

    async fn submit(&self, request: &JobRequest) -> Result<JobId, Fault> {
        let output = self.run(&self.config.bsub, &bsub_args(request)).await?;

        if output.success {
            if let Some(job_id) = parse_submitted_job_id(&output.stdout) {
                return Ok(job_id);
            }
        }

        let message = output.message();
        self.set_last_error(message.clone());
        Err(classify_submit_failure(&message, request.queue.as_deref()))
    }

    async fn open_query(&self, filter: &JobFilter) -> Result<Box<dyn JobCursor>, Fault> {
        let output = self.run(&self.config.bjobs, &bjobs_args(filter)).await?;
        let rows = parse_bjobs(&output.stdout);

        if rows.is_empty() {
            let message = output.message();
            if is_not_found_message(&message) {
                self.set_last_error(message);
                return Err(Fault::NotFound);
            }
            if !output.success {
                let fault = classify_query_failure(&message);
                self.set_last_error(message);
                return Err(fault);
            }
        }

        Ok(Box::new(BjobsCursor {
            rows: rows.into_iter(),
            last_error: self.last_error.clone(),
            closed: false,
        }))
    }

    async fn signal(&self, job_id: JobId, signal: JobSignal) -> Result<(), Fault> {
        let output = self.run(&self.config.bkill, &bkill_args(job_id, signal)).await?;
        let message = output.message();

        if output.success && !is_signal_refusal(&message) {
            Ok(())
        } else {
            self.set_last_error(message);
            Err(Fault::Rejected)
        }
    }

    fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn store_error(slot: &LastError, text: String) {
    let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Some(text);
}

/// Cursor over rows already captured from one `bjobs` run.
struct BjobsCursor {
    rows: std::vec::IntoIter<Result<JobRecord, String>>,
    last_error: LastError,
    closed: bool,
}

impl JobCursor for BjobsCursor {
    fn read_next(&mut self) -> Result<Option<JobRecord>, Fault> {
        if self.closed {
            return Ok(None);
        }
        match self.rows.next() {
            None => Ok(None),
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(message)) => {
                store_error(&self.last_error, message);
                Err(Fault::Rejected)
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
        // Drop buffered rows; nothing else is held open for a CLI query.
        self.rows = Vec::new().into_iter();
    }
}
