use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Scheduler-assigned job identifier.
pub type JobId = u64;

/// Raw job status bitmask as reported by the scheduler.
///
/// Bit values match LSF's `JOB_STAT_*` constants. Several bits can be set at
/// once while a job is changing state, so the mask is never decoded into a
/// single variant; callers test bits with [`JobStatus::contains`] or use
/// [`JobStatus::is_finished`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobStatus(u32);

impl JobStatus {
    pub const NULL: JobStatus = JobStatus(0x00000);
    pub const PENDING: JobStatus = JobStatus(0x00001);
    pub const PENDING_SUSPENDED: JobStatus = JobStatus(0x00002);
    pub const RUNNING: JobStatus = JobStatus(0x00004);
    pub const SYSTEM_SUSPENDED: JobStatus = JobStatus(0x00008);
    pub const USER_SUSPENDED: JobStatus = JobStatus(0x00010);
    pub const EXITED: JobStatus = JobStatus(0x00020);
    pub const DONE: JobStatus = JobStatus(0x00040);
    pub const POST_DONE: JobStatus = JobStatus(0x00080);
    pub const POST_ERROR: JobStatus = JobStatus(0x00100);
    pub const WAITING: JobStatus = JobStatus(0x00200);
    pub const UNKNOWN: JobStatus = JobStatus(0x10000);

    /// Every named bit together with its short LSF name, in display order.
    pub const NAMED_BITS: [(JobStatus, &'static str); 11] = [
        (JobStatus::PENDING, "PEND"),
        (JobStatus::PENDING_SUSPENDED, "PSUSP"),
        (JobStatus::RUNNING, "RUN"),
        (JobStatus::SYSTEM_SUSPENDED, "SSUSP"),
        (JobStatus::USER_SUSPENDED, "USUSP"),
        (JobStatus::EXITED, "EXIT"),
        (JobStatus::DONE, "DONE"),
        (JobStatus::POST_DONE, "PDONE"),
        (JobStatus::POST_ERROR, "PERR"),
        (JobStatus::WAITING, "WAIT"),
        (JobStatus::UNKNOWN, "UNKWN"),
    ];

    const TERMINAL: JobStatus = JobStatus(Self::DONE.0 | Self::EXITED.0);

    pub const fn from_bits(bits: u32) -> Self {
        JobStatus(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if any bit of `other` is also set in `self`.
    pub const fn intersects(self, other: JobStatus) -> bool {
        self.0 & other.0 != 0
    }

    /// True if every bit of `other` is set in `self`.
    pub const fn contains(self, other: JobStatus) -> bool {
        self.0 & other.0 == other.0
    }

    /// A job is finished once DONE or EXIT is set, whatever else is set.
    pub const fn is_finished(self) -> bool {
        self.intersects(Self::TERMINAL)
    }

    /// Parse a value of the `STAT` column printed by `bjobs`.
    pub fn from_lsf_name(name: &str) -> Option<JobStatus> {
        let name = name.trim();
        if name == "ZOMBI" {
            return Some(JobStatus::EXITED | JobStatus::UNKNOWN);
        }
        if name == "NULL" {
            return Some(JobStatus::NULL);
        }
        Self::NAMED_BITS
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(bit, _)| *bit)
    }

    /// Short names of every set bit, in display order.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED_BITS
            .iter()
            .filter(|(bit, _)| self.intersects(*bit))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.names();
        if names.is_empty() {
            write!(f, "NULL")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

impl BitOr for JobStatus {
    type Output = JobStatus;

    fn bitor(self, rhs: JobStatus) -> JobStatus {
        JobStatus(self.0 | rhs.0)
    }
}

impl BitOrAssign for JobStatus {
    fn bitor_assign(&mut self, rhs: JobStatus) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for JobStatus {
    type Output = JobStatus;

    fn bitand(self, rhs: JobStatus) -> JobStatus {
        JobStatus(self.0 & rhs.0)
    }
}

impl From<u32> for JobStatus {
    fn from(bits: u32) -> Self {
        JobStatus(bits)
    }
}

/// One job as read back from the scheduler's job-info store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub job_name: Option<String>,
    pub status: JobStatus,
}

impl JobRecord {
    pub fn new(job_id: JobId, job_name: Option<String>, status: JobStatus) -> Self {
        Self {
            job_id,
            job_name,
            status,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }
}
