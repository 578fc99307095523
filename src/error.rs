use thiserror::Error;

use crate::scheduler::JobId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Could not connect to scheduler: {0}")]
    Connection(String),

    #[error("Queue <{queue}> is unavailable: {message}")]
    QueueUnavailable { queue: String, message: String },

    #[error("Job submission failed: {0}")]
    Submission(String),

    #[error("Job query failed: {0}")]
    Query(String),

    #[error("Failed to signal job <{job_id}>: {message}")]
    Signal { job_id: JobId, message: String },
}

impl BatchError {
    /// True for both generic submission failures and queue rejections.
    pub fn is_submission_error(&self) -> bool {
        matches!(
            self,
            BatchError::Submission(_) | BatchError::QueueUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_unavailable_keeps_queue_name() {
        let err = BatchError::QueueUnavailable {
            queue: "night".to_string(),
            message: "Queue has been closed".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("night"));
        assert!(text.contains("Queue has been closed"));
        assert!(err.is_submission_error());
    }

    #[test]
    fn only_submission_variants_are_submission_errors() {
        assert!(BatchError::Submission("rejected".into()).is_submission_error());
        assert!(!BatchError::Query("no job".into()).is_submission_error());
        assert!(!BatchError::Connection("down".into()).is_submission_error());
        assert!(!BatchError::Signal {
            job_id: 7,
            message: "finished".into()
        }
        .is_submission_error());
    }
}
