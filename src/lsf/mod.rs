//! LSF adapter.
//!
//! Talks to an LSF cluster through its command-line tools:
//! - `lsid` to check the cluster is reachable before each operation
//! - `bsub` to submit, with one flag per request field that is set
//! - `bjobs -a` to read job id, state and name
//! - `bkill` to signal jobs
//!
//! Tool failures are classified from their output text and the text is kept
//! as the client's last error.

pub mod client;
pub mod command;
pub mod parse;

pub use client::LsfClient;
