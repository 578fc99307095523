pub mod config;
pub mod control;
pub mod error;
pub mod interrupt;
pub mod lsf;
pub mod scheduler;
pub mod workload;

pub use control::{JobControl, WaitOutcome};
pub use error::{BatchError, Result};
pub use interrupt::CancelFlag;
pub use scheduler::{JobId, JobRequest, JobStatus};
