//! The narrow interface between job control and a concrete scheduler.
//!
//! Implementations translate these calls into the scheduler's own API or
//! command-line tools. Failures are reported as a bare [`Fault`]; the text
//! explaining a failure is fetched separately through
//! [`SchedulerClient::last_error`], mirroring how batch-system client
//! libraries keep their error state.

use async_trait::async_trait;

use crate::scheduler::job::{JobId, JobRecord};
use crate::scheduler::request::JobRequest;

/// Why a scheduler call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The scheduler could not be reached or refused the session.
    Unavailable,
    /// Submission refused because the named queue is closed or does not
    /// accept jobs from this user.
    QueueClosed { queue: String },
    /// Request refused for any other reason.
    Rejected,
    /// No job matched the query.
    NotFound,
}

/// Selects which jobs a query cursor yields. Both filters may be combined;
/// an empty filter matches every job visible to the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub job_id: Option<JobId>,
    pub job_name: Option<String>,
}

impl JobFilter {
    pub fn by_id(job_id: JobId) -> Self {
        Self {
            job_id: Some(job_id),
            job_name: None,
        }
    }

    pub fn by_name(job_name: impl Into<String>) -> Self {
        Self {
            job_id: None,
            job_name: Some(job_name.into()),
        }
    }
}

/// Signal delivered to a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobSignal {
    /// The scheduler's own termination sequence.
    #[default]
    Terminate,
    /// Immediate SIGKILL.
    Kill,
}

/// Raw cursor over the scheduler's job-info store.
pub trait JobCursor: Send {
    /// Next record, or `Ok(None)` once the store is exhausted.
    fn read_next(&mut self) -> Result<Option<JobRecord>, Fault>;

    /// Release scheduler-side state held by the cursor.
    fn close(&mut self);
}

#[async_trait]
pub trait SchedulerClient: Send + Sync {
    async fn open_session(&self, app_name: &str) -> Result<(), Fault>;

    async fn submit(&self, request: &JobRequest) -> Result<JobId, Fault>;

    async fn open_query(&self, filter: &JobFilter) -> Result<Box<dyn JobCursor>, Fault>;

    async fn signal(&self, job_id: JobId, signal: JobSignal) -> Result<(), Fault>;

    /// Diagnostic text for the most recent failed call, if any.
    fn last_error(&self) -> Option<String>;
}

/// Scoped query cursor. Yields records until the store is exhausted or a
/// read fails, then stops for good. The underlying cursor is closed exactly
/// once: on exhaustion, on the first failed read, or on drop.
pub struct QueryCursor {
    inner: Box<dyn JobCursor>,
    done: bool,
}

impl QueryCursor {
    pub fn new(inner: Box<dyn JobCursor>) -> Self {
        Self { inner, done: false }
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            self.inner.close();
        }
    }
}

impl Iterator for QueryCursor {
    type Item = Result<JobRecord, Fault>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.read_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finish();
                None
            }
            Err(fault) => {
                self.finish();
                Some(Err(fault))
            }
        }
    }
}

impl Drop for QueryCursor {
    fn drop(&mut self) {
        self.finish();
    }
}
