use crate::control::session::Session;
use crate::error::{BatchError, Result};
use crate::scheduler::{Fault, JobFilter, JobId, JobRecord, JobStatus, QueryCursor};

/// A job is finished once the scheduler reports DONE or EXIT.
pub fn finished(status: JobStatus) -> bool {
    status.is_finished()
}

/// Reads job records back from the scheduler. Nothing is cached: every call
/// opens a fresh session and cursor.
#[derive(Clone)]
pub struct StatusDecoder {
    session: Session,
}

impl StatusDecoder {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current status bitmask of one job.
    ///
    /// # Errors
    ///
    /// `Connection` if no session can be opened, `Query` if the cursor
    /// fails or the job is unknown to the scheduler.
    pub async fn status(&self, job_id: JobId) -> Result<JobStatus> {
        let records = match self.records(&JobFilter::by_id(job_id)).await? {
            Some(records) => records,
            None => return Err(BatchError::Query(self.not_found(job_id))),
        };

        records
            .into_iter()
            .find(|r| r.job_id == job_id)
            .map(|r| r.status)
            .ok_or_else(|| BatchError::Query(self.not_found(job_id)))
    }

    /// `(job_id, status)` of every job named `job_name`, in scheduler order.
    /// Empty when no job has that name.
    pub async fn status_by_name(&self, job_name: &str) -> Result<Vec<(JobId, JobStatus)>> {
        Ok(self
            .records_by_name(job_name)
            .await?
            .into_iter()
            .map(|r| (r.job_id, r.status))
            .collect())
    }

    /// Every record whose job name equals `job_name`.
    pub async fn records_by_name(&self, job_name: &str) -> Result<Vec<JobRecord>> {
        let records = self
            .records(&JobFilter::by_name(job_name))
            .await?
            .unwrap_or_default();
        Ok(records
            .into_iter()
            .filter(|r| r.job_name.as_deref().map_or(true, |n| n == job_name))
            .collect())
    }

    /// Open a session and a scoped cursor for `filter`.
    ///
    /// Returns `Ok(None)` when the scheduler reports no matching job.
    pub async fn open_cursor(&self, filter: &JobFilter) -> Result<Option<QueryCursor>> {
        self.session.open().await?;

        match self.session.client().open_query(filter).await {
            Ok(cursor) => Ok(Some(QueryCursor::new(cursor))),
            Err(Fault::NotFound) => Ok(None),
            Err(fault) => {
                let message = self.session.diagnostic("cannot open job query");
                tracing::warn!(?filter, ?fault, %message, "Job query failed");
                Err(BatchError::Query(message))
            }
        }
    }

    /// Turn a failed cursor read into a `Query` error with diagnostics.
    pub fn read_error(&self, fault: Fault) -> BatchError {
        let message = self.session.diagnostic("cannot read job info");
        tracing::warn!(?fault, %message, "Job info read failed");
        BatchError::Query(message)
    }

    async fn records(&self, filter: &JobFilter) -> Result<Option<Vec<JobRecord>>> {
        let Some(cursor) = self.open_cursor(filter).await? else {
            return Ok(None);
        };

        let mut records = Vec::new();
        for entry in cursor {
            records.push(entry.map_err(|fault| self.read_error(fault))?);
        }
        Ok(Some(records))
    }

    fn not_found(&self, job_id: JobId) -> String {
        self.session
            .diagnostic(&format!("job <{}> is not found", job_id))
    }
}
