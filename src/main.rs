use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use batchctl::config::{ControlConfig, LsfConfig, DEFAULT_APP_NAME};
use batchctl::control::{JobControl, TokioSleeper, WaitOutcome};
use batchctl::interrupt::{install_interrupt_handler, CancelFlag};
use batchctl::lsf::LsfClient;
use batchctl::scheduler::{JobId, JobRequest, JobSignal, JobStatus, LimitKind};
use batchctl::workload::{ParamSweep, ThrottleOptions, ThrottleOutcome, ThrottledQueue};

/// Exit code used when a wait is interrupted.
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "batchctl")]
#[command(version)]
#[command(about = "Submit, watch and kill jobs on an LSF cluster")]
#[command(propagate_version = true)]
struct Args {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

// =============================================================================
// Global Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Directory containing the LSF binaries (bsub, bjobs, bkill, lsid)
    #[arg(long, global = true, env = "LSF_BINDIR")]
    lsf_bindir: Option<PathBuf>,

    /// Application name used when opening scheduler sessions
    #[arg(long, global = true, default_value = DEFAULT_APP_NAME)]
    app_name: String,

    /// Seconds between status checks while waiting
    #[arg(long, global = true, default_value = "5", env = "BATCHCTL_POLL_INTERVAL")]
    poll_interval: u64,

    /// Send SIGKILL instead of the scheduler's termination sequence
    #[arg(long, global = true)]
    force: bool,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Commands
// =============================================================================

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Submit a job
    Submit(SubmitArgs),

    /// Show the status bitmask of a job
    Status {
        job_id: JobId,
    },

    /// Wait until a job finishes (Ctrl-C stops waiting, not the job)
    Wait {
        job_id: JobId,
    },

    /// Kill a job
    Kill {
        job_id: JobId,
    },

    /// Operations over all jobs sharing a job name
    Batch {
        #[command(subcommand)]
        command: BatchCommands,
    },

    /// Expand a command template over argument lists and submit each
    Sweep(SweepArgs),

    /// Submit commands from a file into one batch, at most N unfinished at a time
    Throttle(ThrottleArgs),
}

impl Commands {
    fn polls(&self) -> bool {
        match self {
            Commands::Wait { .. } | Commands::Throttle(_) => true,
            Commands::Batch { command } => matches!(command, BatchCommands::Wait { .. }),
            Commands::Sweep(args) => args.wait,
            Commands::Submit(_) | Commands::Status { .. } | Commands::Kill { .. } => false,
        }
    }
}

#[derive(Parser, Debug)]
struct SubmitArgs {
    /// The command to run (e.g., "echo hello")
    command: String,

    /// Job name
    #[arg(long, short = 'J')]
    job_name: Option<String>,

    /// Queue to submit to
    #[arg(long, short = 'q')]
    queue: Option<String>,

    /// Resource requirement expression
    #[arg(long, short = 'R')]
    res_req: Option<String>,

    /// File for the job's standard output
    #[arg(long)]
    stdout: Option<PathBuf>,

    /// File for the job's standard error
    #[arg(long)]
    stderr: Option<PathBuf>,

    /// Number of processors
    #[arg(long, short = 'n', default_value = "1")]
    processors: u32,

    /// Memory limit, passed to the scheduler as given
    #[arg(long)]
    memory: Option<u64>,

    /// Run time limit in minutes
    #[arg(long)]
    run_limit: Option<u64>,

    /// Do not restart the job on another host after a host failure
    #[arg(long)]
    no_rerun: bool,
}

#[derive(clap::Subcommand, Debug)]
enum BatchCommands {
    /// Count unfinished jobs with this name
    Status { job_name: String },
    /// List every job with this name and its status
    List { job_name: String },
    /// Wait until no job with this name is unfinished
    Wait { job_name: String },
    /// Kill every unfinished job with this name
    Kill { job_name: String },
}

#[derive(Parser, Debug)]
struct SweepArgs {
    /// Command template with {field} placeholders
    template: String,

    /// Argument list for a field, as name=v1,v2,v3 (repeatable)
    #[arg(long = "arg", short = 'a', required = true)]
    args: Vec<String>,

    /// Prefix for generated job names
    #[arg(long, default_value = batchctl::workload::sweep::DEFAULT_NAME_PREFIX)]
    prefix: String,

    #[arg(long, short = 'q')]
    queue: Option<String>,

    #[arg(long)]
    memory: Option<u64>,

    /// Wait for every job after submitting
    #[arg(long)]
    wait: bool,
}

#[derive(Parser, Debug)]
struct ThrottleArgs {
    /// File with one command per line, optionally followed by
    /// tab-separated stdout and stderr paths
    file: PathBuf,

    /// Most unfinished jobs allowed at once
    #[arg(long, short = 'm')]
    max_jobs: usize,

    /// Job name shared by every submitted job
    #[arg(long, short = 'J')]
    job_name: String,

    #[arg(long, short = 'q')]
    queue: Option<String>,

    #[arg(long)]
    memory: Option<u64>,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct JobSubmitOutput {
    job_id: JobId,
}

#[derive(Serialize)]
struct JobStatusOutput {
    job_id: JobId,
    status: JobStatus,
    flags: String,
    finished: bool,
}

impl JobStatusOutput {
    fn new(job_id: JobId, status: JobStatus) -> Self {
        Self {
            job_id,
            status,
            flags: status.to_string(),
            finished: status.is_finished(),
        }
    }
}

#[derive(Serialize)]
struct WaitOutput {
    job_id: Option<JobId>,
    job_name: Option<String>,
    cancelled: bool,
    status: Option<JobStatus>,
}

#[derive(Serialize)]
struct KillOutput {
    job_id: JobId,
    signalled: bool,
}

#[derive(Serialize)]
struct BatchStatusOutput {
    job_name: String,
    unfinished: usize,
}

#[derive(Serialize)]
struct BatchKillOutput {
    job_name: String,
    signalled: usize,
}

#[derive(Serialize)]
struct JobListOutput {
    jobs: Vec<JobStatusOutput>,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn build_config(global: &GlobalArgs) -> ControlConfig {
    let mut lsf = LsfConfig::default();
    if let Some(dir) = &global.lsf_bindir {
        lsf = lsf.with_bin_dir(dir);
    }

    ControlConfig::default()
        .with_app_name(global.app_name.clone())
        .with_poll_interval(Duration::from_secs(global.poll_interval))
        .with_kill_signal(if global.force {
            JobSignal::Kill
        } else {
            JobSignal::Terminate
        })
        .with_lsf(lsf)
}

/// Parse `name=v1,v2,v3` sweep arguments.
fn parse_sweep_args(raw: &[String]) -> Result<BTreeMap<String, Vec<String>>, String> {
    let mut args = BTreeMap::new();
    for item in raw {
        let (name, values) = item
            .split_once('=')
            .ok_or_else(|| format!("Invalid sweep argument {:?}, expected name=v1,v2", item))?;
        let values: Vec<String> = values.split(',').map(|v| v.trim().to_string()).collect();
        args.insert(name.trim().to_string(), values);
    }
    Ok(args)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_job_table(jobs: &[(JobId, JobStatus)]) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }
    println!("{:<12} {:<10} {:<24} FINISHED", "JOB ID", "STATUS", "FLAGS");
    println!("{}", "-".repeat(56));
    for (job_id, status) in jobs {
        println!(
            "{:<12} {:<10} {:<24} {}",
            job_id,
            status.bits(),
            status.to_string(),
            if status.is_finished() { "yes" } else { "no" }
        );
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn handle_submit(
    control: &JobControl,
    args: SubmitArgs,
    output: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut request = JobRequest::new(args.command)
        .with_processors(args.processors)
        .with_rerunnable(!args.no_rerun);
    request.job_name = args.job_name;
    request.queue = args.queue;
    request.resource_requirement = args.res_req;
    request.stdout_path = args.stdout.map(|p| p.display().to_string());
    request.stderr_path = args.stderr.map(|p| p.display().to_string());
    if let Some(memory) = args.memory {
        request = request.with_limit(LimitKind::Memory, memory);
    }
    if let Some(minutes) = args.run_limit {
        request = request.with_limit(LimitKind::RunTime, minutes);
    }

    let job_id = control.submit_request(request).await?;

    match output {
        OutputFormat::Json => print_json(&JobSubmitOutput { job_id })?,
        OutputFormat::Table => {
            println!("Job submitted successfully!");
            println!("Job ID: {}", job_id);
        }
    }
    Ok(())
}

async fn handle_status(
    control: &JobControl,
    job_id: JobId,
    output: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = control.status(job_id).await?;

    match output {
        OutputFormat::Json => print_json(&JobStatusOutput::new(job_id, status))?,
        OutputFormat::Table => {
            println!("Job ID:   {}", job_id);
            println!("Status:   {} ({})", status.bits(), status);
            println!(
                "Finished: {}",
                if status.is_finished() { "yes" } else { "no" }
            );
        }
    }
    Ok(())
}

async fn handle_wait(
    control: &JobControl,
    job_id: JobId,
    output: &OutputFormat,
) -> Result<bool, Box<dyn std::error::Error>> {
    let outcome = control.wait(job_id).await?;
    let (cancelled, status) = match outcome {
        WaitOutcome::Finished(status) => (false, Some(status)),
        WaitOutcome::Cancelled => (true, None),
    };

    match output {
        OutputFormat::Json => print_json(&WaitOutput {
            job_id: Some(job_id),
            job_name: None,
            cancelled,
            status,
        })?,
        OutputFormat::Table => match status {
            Some(status) => println!("Job <{}> finished: {}", job_id, status),
            None => println!("Stopped waiting for job <{}>; the job was not touched.", job_id),
        },
    }
    Ok(!cancelled)
}

async fn handle_kill(
    control: &JobControl,
    job_id: JobId,
    output: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    control.kill(job_id).await?;
    match output {
        OutputFormat::Json => print_json(&KillOutput {
            job_id,
            signalled: true,
        })?,
        OutputFormat::Table => println!("Job <{}> signalled.", job_id),
    }
    Ok(())
}

async fn handle_batch(
    control: &JobControl,
    command: BatchCommands,
    output: &OutputFormat,
) -> Result<bool, Box<dyn std::error::Error>> {
    match command {
        BatchCommands::Status { job_name } => {
            let unfinished = control.batch_status(&job_name).await?;
            match output {
                OutputFormat::Json => print_json(&BatchStatusOutput {
                    job_name,
                    unfinished,
                })?,
                OutputFormat::Table => {
                    println!("{} unfinished job(s) named {:?}", unfinished, job_name)
                }
            }
        }
        BatchCommands::List { job_name } => {
            let jobs = control.status_by_name(&job_name).await?;
            match output {
                OutputFormat::Json => print_json(&JobListOutput {
                    jobs: jobs
                        .iter()
                        .map(|(id, status)| JobStatusOutput::new(*id, *status))
                        .collect(),
                })?,
                OutputFormat::Table => print_job_table(&jobs),
            }
        }
        BatchCommands::Wait { job_name } => {
            let cancelled = control.batch_wait(&job_name).await?.is_cancelled();
            match output {
                OutputFormat::Json => print_json(&WaitOutput {
                    job_id: None,
                    job_name: Some(job_name),
                    cancelled,
                    status: None,
                })?,
                OutputFormat::Table if cancelled => {
                    println!("Stopped waiting for batch {:?}; jobs were not touched.", job_name)
                }
                OutputFormat::Table => println!("All jobs named {:?} finished.", job_name),
            }
            return Ok(!cancelled);
        }
        BatchCommands::Kill { job_name } => {
            let signalled = control.batch_kill(&job_name).await?;
            match output {
                OutputFormat::Json => print_json(&BatchKillOutput {
                    job_name,
                    signalled,
                })?,
                OutputFormat::Table => {
                    println!("Signalled {} job(s) named {:?}", signalled, job_name)
                }
            }
        }
    }
    Ok(true)
}

async fn handle_sweep(
    control: &JobControl,
    args: SweepArgs,
    output: &OutputFormat,
) -> Result<bool, Box<dyn std::error::Error>> {
    let sweep_args = parse_sweep_args(&args.args)?;
    let mut sweep = ParamSweep::new(&args.template, &sweep_args)?.with_name_prefix(args.prefix);
    if let Some(queue) = args.queue {
        sweep = sweep.with_queue(queue);
    }
    if let Some(memory) = args.memory {
        sweep = sweep.with_memory_limit(memory);
    }

    sweep.submit(control).await?;

    let finished = if args.wait {
        !sweep.wait_all(control).await?.is_cancelled()
    } else {
        true
    };
    let statuses = sweep.statuses(control).await?;

    match output {
        OutputFormat::Json => print_json(&JobListOutput {
            jobs: statuses
                .iter()
                .map(|(id, status)| JobStatusOutput::new(*id, *status))
                .collect(),
        })?,
        OutputFormat::Table => print_job_table(&statuses),
    }
    Ok(finished)
}

async fn handle_throttle(
    control: &JobControl,
    args: ThrottleArgs,
    output: &OutputFormat,
) -> Result<bool, Box<dyn std::error::Error>> {
    let contents = tokio::fs::read_to_string(&args.file).await?;
    let mut queue = ThrottledQueue::from_lines(&contents);

    let mut options = ThrottleOptions::new(args.max_jobs, args.job_name.clone());
    if let Some(q) = args.queue {
        options = options.with_queue(q);
    }
    if let Some(memory) = args.memory {
        options = options.with_memory_limit(memory);
    }

    let outcome = queue.run(control, &options).await;
    if let ThrottleOutcome::Failed { submitted, error } = &outcome {
        eprintln!(
            "Submitted {} job(s) as {:?} before failing; {} command(s) not submitted",
            submitted.len(),
            args.job_name,
            queue.len()
        );
        return Err(error.clone().into());
    }
    let submitted = outcome.submitted().to_vec();
    let finished = !matches!(outcome, ThrottleOutcome::Cancelled { .. });

    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "job_name": args.job_name,
            "submitted": submitted,
            "cancelled": !finished,
        }))?,
        OutputFormat::Table => {
            println!("Submitted {} job(s) as {:?}", submitted.len(), args.job_name);
            if !finished {
                println!("Stopped early; submitted jobs were not touched.");
            }
        }
    }
    Ok(finished)
}

// =============================================================================
// Main Entry Point
// =============================================================================

async fn run(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    let config = build_config(&args.global);
    let output = args.global.output;

    tracing::debug!(
        app_name = %config.app_name,
        poll_interval = ?config.poll_interval,
        lsf_bindir = ?config.lsf.bin_dir,
        "Starting batchctl"
    );

    let client = Arc::new(LsfClient::new(config.lsf.clone()));
    // Only commands that poll take over SIGINT; everything else keeps the
    // default behaviour of terminating the process.
    let cancel = if args.command.polls() {
        install_interrupt_handler()
    } else {
        CancelFlag::new()
    };
    let control = JobControl::with_parts(client, &config, Arc::new(TokioSleeper), cancel);

    match args.command {
        Commands::Submit(submit) => handle_submit(&control, submit, &output).await?,
        Commands::Status { job_id } => handle_status(&control, job_id, &output).await?,
        Commands::Wait { job_id } => return handle_wait(&control, job_id, &output).await,
        Commands::Kill { job_id } => handle_kill(&control, job_id, &output).await?,
        Commands::Batch { command } => return handle_batch(&control, command, &output).await,
        Commands::Sweep(sweep) => return handle_sweep(&control, sweep, &output).await,
        Commands::Throttle(throttle) => return handle_throttle(&control, throttle, &output).await,
    }
    Ok(true)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_CANCELLED),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sweep_arguments() {
        let raw = vec!["input=a.fa, b.fa".to_string(), "k=21,31".to_string()];
        let args = parse_sweep_args(&raw).unwrap();
        assert_eq!(args["input"], vec!["a.fa", "b.fa"]);
        assert_eq!(args["k"], vec!["21", "31"]);
    }

    #[test]
    fn rejects_sweep_argument_without_values() {
        assert!(parse_sweep_args(&["input".to_string()]).is_err());
    }

    #[test]
    fn cli_parses_batch_kill() {
        let args = Args::try_parse_from(["batchctl", "--force", "batch", "kill", "sweep"]).unwrap();
        assert!(args.global.force);
        assert!(matches!(
            args.command,
            Commands::Batch {
                command: BatchCommands::Kill { .. }
            }
        ));
    }

    #[test]
    fn config_from_global_args() {
        let args = Args::try_parse_from([
            "batchctl",
            "--poll-interval",
            "2",
            "--lsf-bindir",
            "/opt/lsf/bin",
            "status",
            "101",
        ])
        .unwrap();
        let config = build_config(&args.global);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.kill_signal, JobSignal::Terminate);
        assert_eq!(config.lsf.program("bjobs"), PathBuf::from("/opt/lsf/bin/bjobs"));
    }
}
