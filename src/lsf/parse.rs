//! Parsing of LSF tool output and classification of tool failures.

use crate::scheduler::{Fault, JobId, JobRecord, JobStatus};

/// Extract the job id from `bsub` output such as
/// `Job <1234> is submitted to default queue <normal>.`
pub fn parse_submitted_job_id(output: &str) -> Option<JobId> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("Job <")?;
        let end = rest.find('>')?;
        rest[..end].parse().ok()
    })
}

/// Parse one `bjobs` row in the `jobid|stat|job_name` layout.
pub fn parse_bjobs_row(line: &str) -> Result<JobRecord, String> {
    let mut fields = line.splitn(3, '|');
    let id_field = fields.next().unwrap_or_default().trim();
    let stat_field = fields
        .next()
        .ok_or_else(|| format!("missing STAT column in {:?}", line))?
        .trim();
    let name_field = fields.next().map(str::trim).unwrap_or_default();

    let job_id: JobId = id_field
        .parse()
        .map_err(|_| format!("invalid job id {:?}", id_field))?;
    let status = JobStatus::from_lsf_name(stat_field)
        .ok_or_else(|| format!("unknown job state {:?}", stat_field))?;
    let job_name = match name_field {
        "" | "-" => None,
        name => Some(name.to_string()),
    };

    Ok(JobRecord::new(job_id, job_name, status))
}

/// Job array elements print as `1234[3]`. They share the array's job id,
/// which cannot name one element, so they are not reported.
fn is_array_element(line: &str) -> bool {
    line.split('|').next().is_some_and(|id| id.contains('['))
}

/// Parse every non-empty row of `bjobs` output, skipping job array elements.
pub fn parse_bjobs(output: &str) -> Vec<Result<JobRecord, String>> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter(|l| !is_not_found_message(l))
        .filter(|l| {
            let skip = is_array_element(l);
            if skip {
                tracing::debug!(row = %l.trim(), "Skipping job array element");
            }
            !skip
        })
        .map(parse_bjobs_row)
        .collect()
}

pub fn is_not_found_message(text: &str) -> bool {
    let text = text.to_ascii_lowercase();
    text.contains("no job found")
        || text.contains("no unfinished job found")
        || text.contains("no matching job found")
        || text.contains("is not found")
}

fn is_daemon_down_message(text: &str) -> bool {
    let text = text.to_ascii_lowercase();
    text.contains("lsf is down")
        || text.contains("not responding")
        || text.contains("cannot connect")
        || text.contains("failed in an lsf library call")
}

fn is_queue_refusal(text: &str) -> bool {
    let text = text.to_ascii_lowercase();
    text.contains("queue")
        && ["closed", "cannot use", "not allowed", "not accept", "inactive"]
            .iter()
            .any(|needle| text.contains(needle))
}

/// Classify a failed `bsub`. Queue refusals are only reported as such when
/// a queue was explicitly requested.
pub fn classify_submit_failure(text: &str, queue: Option<&str>) -> Fault {
    if is_daemon_down_message(text) {
        return Fault::Unavailable;
    }
    match queue {
        Some(queue) if is_queue_refusal(text) => Fault::QueueClosed {
            queue: queue.to_string(),
        },
        _ => Fault::Rejected,
    }
}

pub fn classify_query_failure(text: &str) -> Fault {
    if is_not_found_message(text) {
        Fault::NotFound
    } else if is_daemon_down_message(text) {
        Fault::Unavailable
    } else {
        Fault::Rejected
    }
}

/// `bkill` exits successfully for some refusals, so the text decides.
pub fn is_signal_refusal(text: &str) -> bool {
    let text = text.to_ascii_lowercase();
    text.contains("already finished")
        || text.contains("no matching job")
        || text.contains("is not found")
        || text.contains("permission denied")
        || text.contains("not the owner")
}
