//! Argument lists for the LSF command-line tools.
//!
//! This is the only place where request fields turn into scheduler flags:
//! a field that is `None` produces no flag at all.

use crate::scheduler::{JobFilter, JobRequest, JobSignal, LimitKind};

/// Output format requested from `bjobs`; parsed by [`super::parse::parse_bjobs_row`].
pub const BJOBS_FORMAT: &str = "jobid stat job_name delimiter='|'";

pub fn limit_flag(kind: LimitKind) -> &'static str {
    match kind {
        LimitKind::CpuTime => "-c",
        LimitKind::FileSize => "-F",
        LimitKind::Data => "-D",
        LimitKind::Stack => "-S",
        LimitKind::Core => "-C",
        LimitKind::Memory => "-M",
        LimitKind::RunTime => "-W",
        LimitKind::Processes => "-p",
        LimitKind::Swap => "-v",
        LimitKind::Threads => "-T",
    }
}

pub fn bsub_args(request: &JobRequest) -> Vec<String> {
    let mut args = vec!["-n".to_string(), request.processors.to_string()];

    args.push(if request.rerunnable { "-r" } else { "-rn" }.to_string());

    let optional = [
        ("-J", &request.job_name),
        ("-q", &request.queue),
        ("-R", &request.resource_requirement),
        ("-o", &request.stdout_path),
        ("-e", &request.stderr_path),
    ];
    for (flag, value) in optional {
        if let Some(value) = value {
            args.push(flag.to_string());
            args.push(value.clone());
        }
    }

    for (kind, value) in request.limits.bounded() {
        args.push(limit_flag(kind).to_string());
        args.push(value.to_string());
    }

    args.push(request.command.clone());
    args
}

pub fn bjobs_args(filter: &JobFilter) -> Vec<String> {
    let mut args = vec![
        "-a".to_string(),
        "-noheader".to_string(),
        "-o".to_string(),
        BJOBS_FORMAT.to_string(),
    ];
    if let Some(name) = &filter.job_name {
        args.push("-J".to_string());
        args.push(name.clone());
    }
    if let Some(job_id) = filter.job_id {
        args.push(job_id.to_string());
    }
    args
}

pub fn bkill_args(job_id: u64, signal: JobSignal) -> Vec<String> {
    let mut args = Vec::new();
    if signal == JobSignal::Kill {
        args.push("-s".to_string());
        args.push("KILL".to_string());
    }
    args.push(job_id.to_string());
    args
}
