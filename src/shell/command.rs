//! The Job Runner: external process execution.

use std::fmt::Write as _;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{trace, warn};

use crate::error::{Result, RunnelError};
use crate::tasks::CommandSpec;

/// One unit of work handed to a [`JobRunner`].
#[derive(Debug, Clone)]
pub struct Job {
    /// Instance id.
    pub id: String,

    /// Fully rendered command.
    pub command: CommandSpec,

    /// Declared outputs of the instance.
    pub outputs: Vec<PathBuf>,

    /// Where to write the job log, if anywhere.
    pub log_path: Option<PathBuf>,
}

/// Result of running a job.
#[derive(Debug, Clone)]
pub struct JobOutput {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,
}

impl JobOutput {
    /// Create a success result.
    pub fn success(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: Some(0),
            stdout,
            stderr,
            duration,
            success: true,
        }
    }

    /// Create a failure result.
    pub fn failure(
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
            success: false,
        }
    }

    /// The failure as an error value, if the job failed.
    pub fn to_error(&self, instance: &str) -> Option<RunnelError> {
        (!self.success).then(|| RunnelError::ExternalProcess {
            instance: instance.to_string(),
            code: self.exit_code,
            stderr: stderr_tail(&self.stderr, 5),
        })
    }
}

/// Last `lines` non-empty lines of captured stderr.
pub fn stderr_tail(stderr: &str, lines: usize) -> String {
    let kept: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = kept.len().saturating_sub(lines);
    kept[start..].join("\n")
}

/// Runs one job to completion, blocking the calling worker.
///
/// A non-zero exit is an `Ok` result with `success == false`; `Err` is
/// reserved for failures to start the process at all.
pub trait JobRunner: Send + Sync {
    /// Execute a job.
    fn execute(&self, job: &Job) -> Result<JobOutput>;
}

/// Output line from a running process.
#[derive(Debug, Clone)]
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Runs jobs as real child processes, without a shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a process runner.
    pub fn new() -> Self {
        Self
    }
}

impl JobRunner for ProcessRunner {
    fn execute(&self, job: &Job) -> Result<JobOutput> {
        let started_at = Local::now();
        let start = Instant::now();
        let spec = &job.command;

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        cmd.envs(&spec.env);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Terminal Ctrl-C reaches only the engine; running jobs finish.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|e| {
            RunnelError::Other(anyhow::anyhow!(
                "failed to start '{}' for {}: {}",
                spec.program,
                job.id,
                e
            ))
        })?;

        let (tx, rx) = mpsc::channel();
        let stdout_handle = child
            .stdout
            .take()
            .map(|out| capture(out, tx.clone(), OutputLine::Stdout));
        let stderr_handle = child
            .stderr
            .take()
            .map(|err| capture(err, tx, OutputLine::Stderr));

        for line in rx {
            match line {
                OutputLine::Stdout(line) => trace!(instance = %job.id, "stdout: {}", line),
                OutputLine::Stderr(line) => trace!(instance = %job.id, "stderr: {}", line),
            }
        }

        let stdout = join_capture(stdout_handle);
        let stderr = join_capture(stderr_handle);

        let status = child.wait()?;
        let duration = start.elapsed();

        let output = if status.success() {
            JobOutput::success(stdout, stderr, duration)
        } else {
            JobOutput::failure(status.code(), stdout, stderr, duration)
        };

        if let Some(path) = &job.log_path {
            if let Err(e) = write_log(path, job, &output, started_at) {
                warn!("Could not write job log {}: {}", path.display(), e);
            }
        }

        Ok(output)
    }
}

fn capture<R, F>(reader: R, tx: mpsc::Sender<OutputLine>, wrap: F) -> thread::JoinHandle<String>
where
    R: Read + Send + 'static,
    F: Fn(String) -> OutputLine + Send + 'static,
{
    thread::spawn(move || {
        let reader = BufReader::new(reader);
        let mut output = String::new();
        for line in reader.lines().map_while(std::result::Result::ok) {
            output.push_str(&line);
            output.push('\n');
            let _ = tx.send(wrap(line));
        }
        output
    })
}

fn join_capture(handle: Option<thread::JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Write a job log: header, captured streams, exit status.
pub fn write_log(
    path: &Path,
    job: &Job,
    output: &JobOutput,
    started_at: DateTime<Local>,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut log = String::new();
    let _ = writeln!(log, "# instance: {}", job.id);
    let _ = writeln!(log, "# command: {}", job.command.display_line());
    let _ = writeln!(log, "# started: {}", started_at.to_rfc3339());
    let _ = writeln!(log, "\n## stdout\n{}", output.stdout);
    let _ = writeln!(log, "## stderr\n{}", output.stderr);
    let status = match output.exit_code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    };
    let _ = writeln!(
        log,
        "# finished: {} after {:.2}s",
        status,
        output.duration.as_secs_f64()
    );

    fs::write(path, log)?;
    Ok(())
}
