//! Test harness for job-control tests.
//!
//! Provides an in-memory scheduler whose jobs follow scripted status
//! timelines, and a sleeper that returns immediately while recording calls.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use batchctl::config::ControlConfig;
use batchctl::control::{JobControl, Sleeper};
use batchctl::interrupt::CancelFlag;
use batchctl::scheduler::{
    Fault, JobCursor, JobFilter, JobId, JobRecord, JobRequest, JobSignal, JobStatus,
    SchedulerClient,
};

/// First id handed out by [`StubScheduler::submit`].
pub const FIRST_JOB_ID: JobId = 101;

/// A job known to the stub. Each status read returns the next entry of
/// `timeline`, repeating the last one forever.
#[derive(Debug, Clone)]
pub struct StubJob {
    pub job_id: JobId,
    pub job_name: Option<String>,
    pub timeline: Vec<JobStatus>,
    pub reads: usize,
}

impl StubJob {
    fn current(&self) -> JobStatus {
        let idx = self.reads.min(self.timeline.len().saturating_sub(1));
        self.timeline.get(idx).copied().unwrap_or(JobStatus::UNKNOWN)
    }
}

#[derive(Debug, Default)]
struct StubState {
    jobs: Vec<StubJob>,
    next_id: JobId,
    submitted: Vec<JobRequest>,
    signal_attempts: Vec<(JobId, JobSignal)>,
    signalled: Vec<JobId>,
    failing_signals: HashSet<JobId>,
    session_down: bool,
    submit_fault: Option<Fault>,
    /// Fail the n-th (0-based) `open_query` call.
    failing_query: Option<usize>,
    /// Fail reads after this many records have been returned by one cursor.
    failing_read_after: Option<usize>,
    queries: usize,
    sessions: usize,
    last_error: Option<String>,
}

/// In-memory [`SchedulerClient`].
#[derive(Clone)]
pub struct StubScheduler {
    state: Arc<Mutex<StubState>>,
    cursors_opened: Arc<AtomicUsize>,
    cursors_closed: Arc<AtomicUsize>,
}

impl Default for StubScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl StubScheduler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StubState {
                next_id: FIRST_JOB_ID,
                ..Default::default()
            })),
            cursors_opened: Arc::new(AtomicUsize::new(0)),
            cursors_closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap()
    }

    /// Add a job that reports `timeline` on successive reads.
    pub fn add_job(&self, job_id: JobId, job_name: Option<&str>, timeline: &[JobStatus]) {
        self.state().jobs.push(StubJob {
            job_id,
            job_name: job_name.map(str::to_string),
            timeline: timeline.to_vec(),
            reads: 0,
        });
    }

    /// Replace the job's timeline with a single status.
    pub fn set_status(&self, job_id: JobId, status: JobStatus) {
        let mut state = self.state();
        if let Some(job) = state.jobs.iter_mut().find(|j| j.job_id == job_id) {
            job.timeline = vec![status];
            job.reads = 0;
        }
    }

    /// Mark every job as DONE.
    pub fn finish_all(&self) {
        let ids: Vec<JobId> = self.state().jobs.iter().map(|j| j.job_id).collect();
        for id in ids {
            self.set_status(id, JobStatus::DONE);
        }
    }

    pub fn reads_of(&self, job_id: JobId) -> usize {
        self.state()
            .jobs
            .iter()
            .find(|j| j.job_id == job_id)
            .map_or(0, |j| j.reads)
    }

    pub fn set_session_down(&self, down: bool) {
        self.state().session_down = down;
    }

    pub fn fail_submit(&self, fault: Fault, message: &str) {
        let mut state = self.state();
        state.submit_fault = Some(fault);
        state.last_error = Some(message.to_string());
    }

    pub fn accept_submits(&self) {
        self.state().submit_fault = None;
    }

    pub fn fail_query_on_call(&self, call: usize) {
        self.state().failing_query = Some(call);
    }

    pub fn fail_reads_after(&self, records: usize) {
        self.state().failing_read_after = Some(records);
    }

    pub fn fail_signal_for(&self, job_id: JobId) {
        self.state().failing_signals.insert(job_id);
    }

    pub fn submitted(&self) -> Vec<JobRequest> {
        self.state().submitted.clone()
    }

    pub fn signal_attempts(&self) -> Vec<JobId> {
        self.state().signal_attempts.iter().map(|(id, _)| *id).collect()
    }

    pub fn signals_sent(&self) -> Vec<(JobId, JobSignal)> {
        self.state().signal_attempts.clone()
    }

    pub fn signalled(&self) -> Vec<JobId> {
        self.state().signalled.clone()
    }

    pub fn query_count(&self) -> usize {
        self.state().queries
    }

    pub fn session_count(&self) -> usize {
        self.state().sessions
    }

    pub fn cursors_opened(&self) -> usize {
        self.cursors_opened.load(Ordering::SeqCst)
    }

    pub fn cursors_closed(&self) -> usize {
        self.cursors_closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchedulerClient for StubScheduler {
    async fn open_session(&self, _app_name: &str) -> Result<(), Fault> {
        let mut state = self.state();
        state.sessions += 1;
        if state.session_down {
            state.last_error = Some("LSF is down. Please wait".to_string());
            return Err(Fault::Unavailable);
        }
        Ok(())
    }

    async fn submit(&self, request: &JobRequest) -> Result<JobId, Fault> {
        let mut state = self.state();
        if let Some(fault) = state.submit_fault.clone() {
            return Err(fault);
        }
        let job_id = state.next_id;
        state.next_id += 1;
        state.submitted.push(request.clone());
        state.jobs.push(StubJob {
            job_id,
            job_name: request.job_name.clone(),
            timeline: vec![JobStatus::PENDING],
            reads: 0,
        });
        Ok(job_id)
    }

    async fn open_query(&self, filter: &JobFilter) -> Result<Box<dyn JobCursor>, Fault> {
        let mut state = self.state();
        let call = state.queries;
        state.queries += 1;

        if state.failing_query == Some(call) {
            state.last_error = Some("Failed in an LSF library call".to_string());
            return Err(Fault::Rejected);
        }

        let mut records = Vec::new();
        for job in state.jobs.iter_mut() {
            let id_ok = filter.job_id.map_or(true, |id| id == job.job_id);
            let name_ok = filter
                .job_name
                .as_ref()
                .map_or(true, |name| job.job_name.as_ref() == Some(name));
            if id_ok && name_ok {
                records.push(JobRecord::new(job.job_id, job.job_name.clone(), job.current()));
                job.reads += 1;
            }
        }

        if records.is_empty() {
            state.last_error = Some("No matching job found".to_string());
            return Err(Fault::NotFound);
        }

        self.cursors_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubCursor {
            records: records.into_iter(),
            returned: 0,
            fail_after: state.failing_read_after,
            closed: self.cursors_closed.clone(),
        }))
    }

    async fn signal(&self, job_id: JobId, signal: JobSignal) -> Result<(), Fault> {
        let mut state = self.state();
        state.signal_attempts.push((job_id, signal));

        if state.failing_signals.contains(&job_id) {
            state.last_error = Some(format!("Job <{}>: Permission denied", job_id));
            return Err(Fault::Rejected);
        }

        let finished = state
            .jobs
            .iter()
            .find(|j| j.job_id == job_id)
            .map(|j| j.current().is_finished());
        match finished {
            None => {
                state.last_error = Some(format!("Job <{}> is not found", job_id));
                return Err(Fault::NotFound);
            }
            Some(true) => {
                state.last_error = Some("Job has already finished".to_string());
                return Err(Fault::Rejected);
            }
            Some(false) => {}
        }

        state.signalled.push(job_id);
        state.set_exited(job_id);
        Ok(())
    }

    fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }
}

impl StubState {
    fn set_exited(&mut self, job_id: JobId) {
        if let Some(job) = self.jobs.iter_mut().find(|j| j.job_id == job_id) {
            job.timeline = vec![JobStatus::EXITED];
            job.reads = 0;
        }
    }
}

struct StubCursor {
    records: std::vec::IntoIter<JobRecord>,
    returned: usize,
    fail_after: Option<usize>,
    closed: Arc<AtomicUsize>,
}

impl JobCursor for StubCursor {
    fn read_next(&mut self) -> Result<Option<JobRecord>, Fault> {
        if self.fail_after == Some(self.returned) {
            return Err(Fault::Rejected);
        }
        let next = self.records.next();
        if next.is_some() {
            self.returned += 1;
        }
        Ok(next)
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

type SleepHook = Box<dyn FnMut(usize) + Send>;

/// Sleeper that returns at once. Records each requested duration and runs
/// an optional hook with the 1-based call number.
#[derive(Default)]
pub struct RecordingSleeper {
    durations: Mutex<Vec<Duration>>,
    hook: Mutex<Option<SleepHook>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(hook: impl FnMut(usize) + Send + 'static) -> Self {
        Self {
            durations: Mutex::new(Vec::new()),
            hook: Mutex::new(Some(Box::new(hook))),
        }
    }

    /// Sleeper that raises `flag` during the `n`-th sleep.
    pub fn cancelling_on(n: usize, flag: CancelFlag) -> Self {
        Self::with_hook(move |call| {
            if call == n {
                flag.cancel();
            }
        })
    }

    pub fn calls(&self) -> usize {
        self.durations.lock().unwrap().len()
    }

    pub fn durations(&self) -> Vec<Duration> {
        self.durations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        let call = {
            let mut durations = self.durations.lock().unwrap();
            durations.push(duration);
            durations.len()
        };
        if let Some(hook) = self.hook.lock().unwrap().as_mut() {
            hook(call);
        }
    }
}

/// Job control over `scheduler` with the default 5 second interval and an
/// instant sleeper.
pub fn control_with(
    scheduler: &StubScheduler,
    sleeper: Arc<RecordingSleeper>,
    cancel: CancelFlag,
) -> JobControl {
    JobControl::with_parts(
        Arc::new(scheduler.clone()),
        &ControlConfig::default(),
        sleeper,
        cancel,
    )
}

pub fn test_control(scheduler: &StubScheduler) -> (JobControl, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::new());
    let control = control_with(scheduler, sleeper.clone(), CancelFlag::new());
    (control, sleeper)
}
