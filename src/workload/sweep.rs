//! Parameter sweeps: one command template expanded over lists of values,
//! each expansion submitted as its own job.
//!
//! ```ignore
//! let mut args = BTreeMap::new();
//! args.insert("input".to_string(), vec!["a.fa".into(), "b.fa".into()]);
//! args.insert("k".to_string(), vec!["21".into(), "31".into()]);
//!
//! let mut sweep = ParamSweep::new("assemble -i {input} -k {k}", &args)?;
//! sweep.submit(&control).await?;
//! sweep.wait_all(&control).await?;
//! ```

use std::collections::BTreeMap;

use crate::control::{JobControl, WaitOutcome};
use crate::error::Result;
use crate::scheduler::{JobId, JobRequest, JobStatus, LimitKind};

/// Default prefix for generated job names.
pub const DEFAULT_NAME_PREFIX: &str = "batchctl";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SweepError {
    #[error("No sweep arguments given")]
    NoArgs,

    #[error("Argument lists differ in length: {first_key:?} has {first_len} items, {key:?} has {len}")]
    RaggedArgs {
        first_key: String,
        first_len: usize,
        key: String,
        len: usize,
    },

    #[error("Template field {{{0}}} has no argument list")]
    MissingField(String),
}

/// Names of the `{field}` placeholders in `template`, in order of
/// appearance. Braces around anything other than a plain identifier are
/// left alone.
pub fn template_fields(template: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) if is_field_name(&after[..end]) => {
                fields.push(after[..end].to_string());
                rest = &after[end + 1..];
            }
            _ => rest = after,
        }
    }
    fields
}

fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn render(template: &str, values: &BTreeMap<&str, &str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) if values.contains_key(&after[..end]) => {
                out.push_str(values[&after[..end]]);
                rest = &after[end + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// A set of commands generated from one template, submitted as jobs named
/// `<prefix>_000`, `<prefix>_001`, ...
#[derive(Debug, Clone)]
pub struct ParamSweep {
    commands: Vec<String>,
    name_prefix: String,
    queue: Option<String>,
    memory_limit: Option<u64>,
    job_ids: Vec<JobId>,
}

impl ParamSweep {
    /// Expand `template` over `args`. Every list in `args` must have the
    /// same length, and every template field needs a list.
    pub fn new(
        template: &str,
        args: &BTreeMap<String, Vec<String>>,
    ) -> std::result::Result<Self, SweepError> {
        let (first_key, first_values) = args.iter().next().ok_or(SweepError::NoArgs)?;
        let count = first_values.len();

        for (key, values) in args {
            if values.len() != count {
                return Err(SweepError::RaggedArgs {
                    first_key: first_key.clone(),
                    first_len: count,
                    key: key.clone(),
                    len: values.len(),
                });
            }
        }

        for field in template_fields(template) {
            if !args.contains_key(&field) {
                return Err(SweepError::MissingField(field));
            }
        }

        let commands = (0..count)
            .map(|n| {
                let values: BTreeMap<&str, &str> = args
                    .iter()
                    .map(|(k, v)| (k.as_str(), v[n].as_str()))
                    .collect();
                render(template, &values)
            })
            .collect();

        Ok(Self {
            commands,
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            queue: None,
            memory_limit: None,
            job_ids: Vec::new(),
        })
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn with_memory_limit(mut self, limit: u64) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn job_ids(&self) -> &[JobId] {
        &self.job_ids
    }

    pub fn job_name(&self, index: usize) -> String {
        format!("{}_{:03}", self.name_prefix, index)
    }

    /// Request for the `index`-th command, with output files named after the
    /// job.
    pub fn request(&self, index: usize) -> JobRequest {
        let job_name = self.job_name(index);
        let mut request = JobRequest::new(self.commands[index].clone())
            .with_stdout(format!("stdout.{}", job_name))
            .with_stderr(format!("stderr.{}", job_name))
            .with_job_name(job_name);
        if let Some(queue) = &self.queue {
            request = request.with_queue(queue.clone());
        }
        if let Some(limit) = self.memory_limit {
            request = request.with_limit(LimitKind::Memory, limit);
        }
        request
    }

    /// Submit every command in order. Job ids are recorded as they are
    /// obtained, so a failure part way leaves the earlier ids available.
    pub async fn submit(&mut self, control: &JobControl) -> Result<&[JobId]> {
        self.job_ids.clear();
        for index in 0..self.commands.len() {
            let job_id = control.submit_request(self.request(index)).await?;
            self.job_ids.push(job_id);
        }
        tracing::info!(jobs = self.job_ids.len(), prefix = %self.name_prefix, "Sweep submitted");
        Ok(&self.job_ids)
    }

    pub async fn statuses(&self, control: &JobControl) -> Result<Vec<(JobId, JobStatus)>> {
        let mut statuses = Vec::with_capacity(self.job_ids.len());
        for &job_id in &self.job_ids {
            statuses.push((job_id, control.status(job_id).await?));
        }
        Ok(statuses)
    }

    /// Wait for each job in submission order. Stops at the first
    /// cancellation.
    pub async fn wait_all(&self, control: &JobControl) -> Result<WaitOutcome> {
        for &job_id in &self.job_ids {
            if control.wait(job_id).await?.is_cancelled() {
                return Ok(WaitOutcome::Cancelled);
            }
        }
        Ok(WaitOutcome::Finished(()))
    }

    /// Kill each job in submission order, stopping at the first failure.
    pub async fn kill_all(&self, control: &JobControl) -> Result<()> {
        for &job_id in &self.job_ids {
            control.kill(job_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn expands_template_per_index() {
        let sweep = ParamSweep::new(
            "prog -a {argA} -b {argB} -c {argC}",
            &args(&[
                ("argA", &["file1", "file2", "file3"]),
                ("argB", &["X", "Y", "Z"]),
                ("argC", &["1.1", "2.2", "3.3"]),
            ]),
        )
        .unwrap();

        assert_eq!(
            sweep.commands(),
            &[
                "prog -a file1 -b X -c 1.1",
                "prog -a file2 -b Y -c 2.2",
                "prog -a file3 -b Z -c 3.3",
            ]
        );
    }

    #[test]
    fn leaves_non_field_braces_alone() {
        let sweep = ParamSweep::new(
            "awk '{print $1}' {input}",
            &args(&[("input", &["data.txt"])]),
        )
        .unwrap();
        assert_eq!(sweep.commands(), &["awk '{print $1}' data.txt"]);
    }

    #[test]
    fn rejects_ragged_args() {
        let err = ParamSweep::new(
            "prog {a} {b}",
            &args(&[("a", &["1", "2"]), ("b", &["x"])]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SweepError::RaggedArgs {
                first_key: "a".to_string(),
                first_len: 2,
                key: "b".to_string(),
                len: 1,
            }
        );
    }

    #[test]
    fn rejects_missing_field() {
        let err = ParamSweep::new("prog {a} {c}", &args(&[("a", &["1"])])).unwrap_err();
        assert_eq!(err, SweepError::MissingField("c".to_string()));
    }

    #[test]
    fn rejects_empty_args() {
        let err = ParamSweep::new("prog", &BTreeMap::new()).unwrap_err();
        assert_eq!(err, SweepError::NoArgs);
    }

    #[test]
    fn requests_use_generated_names_and_output_files() {
        let sweep = ParamSweep::new("run {n}", &args(&[("n", &["1", "2"])]))
            .unwrap()
            .with_name_prefix("Lincer")
            .with_queue("long")
            .with_memory_limit(4000);

        let req = sweep.request(1);
        assert_eq!(req.command, "run 2");
        assert_eq!(req.job_name.as_deref(), Some("Lincer_001"));
        assert_eq!(req.stdout_path.as_deref(), Some("stdout.Lincer_001"));
        assert_eq!(req.stderr_path.as_deref(), Some("stderr.Lincer_001"));
        assert_eq!(req.queue.as_deref(), Some("long"));
        assert_eq!(req.limits.get(LimitKind::Memory), Some(4000));
    }

    #[test]
    fn finds_template_fields() {
        assert_eq!(
            template_fields("x {a} {b_2} {} {not valid} {a}"),
            vec!["a", "b_2", "a"]
        );
    }
}
