//! Multi-job workloads built on [`crate::control::JobControl`].
//!
//! - [`ParamSweep`]: expand a command template over argument lists
//! - [`ThrottledQueue`]: submit into a named batch with bounded concurrency

pub mod sweep;
pub mod throttle;

pub use sweep::{ParamSweep, SweepError};
pub use throttle::{QueuedCommand, ThrottleOptions, ThrottleOutcome, ThrottledQueue};
