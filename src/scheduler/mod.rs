pub mod client;
pub mod job;
pub mod request;

pub use client::{Fault, JobCursor, JobFilter, JobSignal, QueryCursor, SchedulerClient};
pub use job::{JobId, JobRecord, JobStatus};
pub use request::{JobRequest, LimitKind, ResourceLimits};
