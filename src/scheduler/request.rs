use serde::{Deserialize, Serialize};

/// Per-job resource limit kinds understood by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitKind {
    CpuTime,
    FileSize,
    Data,
    Stack,
    Core,
    Memory,
    RunTime,
    Processes,
    Swap,
    Threads,
}

impl LimitKind {
    pub const ALL: [LimitKind; 10] = [
        LimitKind::CpuTime,
        LimitKind::FileSize,
        LimitKind::Data,
        LimitKind::Stack,
        LimitKind::Core,
        LimitKind::Memory,
        LimitKind::RunTime,
        LimitKind::Processes,
        LimitKind::Swap,
        LimitKind::Threads,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// One optional bound per [`LimitKind`]. `None` means no limit.
///
/// Values are passed to the scheduler untouched; units are whatever the
/// scheduler expects for that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceLimits {
    limits: [Option<u64>; 10],
}

impl ResourceLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: LimitKind) -> Option<u64> {
        self.limits[kind.index()]
    }

    pub fn set(&mut self, kind: LimitKind, value: Option<u64>) {
        self.limits[kind.index()] = value;
    }

    pub fn with(mut self, kind: LimitKind, value: u64) -> Self {
        self.set(kind, Some(value));
        self
    }

    /// Bounded limits only, in [`LimitKind::ALL`] order.
    pub fn bounded(&self) -> impl Iterator<Item = (LimitKind, u64)> + '_ {
        LimitKind::ALL
            .iter()
            .filter_map(|kind| self.get(*kind).map(|v| (*kind, v)))
    }

    pub fn is_unlimited(&self) -> bool {
        self.limits.iter().all(Option::is_none)
    }
}

/// A single job submission. Built per call and handed to the scheduler
/// client; optional fields that are `None` are never sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub command: String,
    pub job_name: Option<String>,
    pub queue: Option<String>,
    pub resource_requirement: Option<String>,
    pub stdout_path: Option<String>,
    pub stderr_path: Option<String>,
    pub processors: u32,
    pub limits: ResourceLimits,
    /// Job may be restarted on another host if its host fails.
    pub rerunnable: bool,
}

impl JobRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            job_name: None,
            queue: None,
            resource_requirement: None,
            stdout_path: None,
            stderr_path: None,
            processors: 1,
            limits: ResourceLimits::unlimited(),
            rerunnable: true,
        }
    }

    pub fn with_job_name(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = Some(job_name.into());
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn with_resource_requirement(mut self, res_req: impl Into<String>) -> Self {
        self.resource_requirement = Some(res_req.into());
        self
    }

    pub fn with_stdout(mut self, path: impl Into<String>) -> Self {
        self.stdout_path = Some(path.into());
        self
    }

    pub fn with_stderr(mut self, path: impl Into<String>) -> Self {
        self.stderr_path = Some(path.into());
        self
    }

    pub fn with_limit(mut self, kind: LimitKind, value: u64) -> Self {
        self.limits.set(kind, Some(value));
        self
    }

    pub fn with_processors(mut self, processors: u32) -> Self {
        self.processors = processors;
        self
    }

    pub fn with_rerunnable(mut self, rerunnable: bool) -> Self {
        self.rerunnable = rerunnable;
        self
    }
}
