//! Mock job runner for testing.
//!
//! `MockRunner` implements [`JobRunner`] without spawning processes. It
//! records every job it receives, creates the job's declared outputs on
//! success, and fails the jobs it was told to fail.
//!
//! # Example
//!
//! ```
//! use runnel::shell::{Job, JobRunner, MockRunner};
//! use runnel::tasks::CommandSpec;
//!
//! let runner = MockRunner::new().fail("gwa", 2);
//! let job = Job {
//!     id: "gwa".to_string(),
//!     command: CommandSpec { program: "gcta64".to_string(), ..Default::default() },
//!     outputs: vec![],
//!     log_path: None,
//! };
//!
//! let output = runner.execute(&job).unwrap();
//! assert_eq!(output.exit_code, Some(2));
//! assert_eq!(runner.executed(), vec!["gwa"]);
//! ```

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::error::Result;

use super::command::{Job, JobOutput, JobRunner};

/// Job runner that records calls instead of spawning processes.
#[derive(Debug, Default)]
pub struct MockRunner {
    failures: HashMap<String, i32>,
    delay: Duration,
    touch_outputs: bool,
    partial_outputs: bool,
    executed: Mutex<Vec<String>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl MockRunner {
    /// Create a runner that succeeds and creates declared outputs.
    pub fn new() -> Self {
        Self {
            touch_outputs: true,
            ..Default::default()
        }
    }

    /// Fail the job with this instance id with the given exit code.
    pub fn fail(mut self, id: impl Into<String>, code: i32) -> Self {
        self.failures.insert(id.into(), code);
        self
    }

    /// Sleep this long inside every job.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Do not create declared outputs.
    pub fn without_outputs(mut self) -> Self {
        self.touch_outputs = false;
        self
    }

    /// Create declared outputs for failing jobs too, like a command that
    /// dies halfway through writing.
    pub fn partial_outputs(mut self) -> Self {
        self.partial_outputs = true;
        self
    }

    /// Instance ids executed so far, in start order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Number of jobs executed so far.
    pub fn call_count(&self) -> usize {
        self.executed().len()
    }

    /// Highest number of jobs observed running at once.
    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

impl JobRunner for MockRunner {
    fn execute(&self, job: &Job) -> Result<JobOutput> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(job.id.clone());
        }
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        let failure = self.failures.get(&job.id).copied();
        let touched = if failure.is_some() {
            self.partial_outputs
        } else {
            self.touch_outputs
        };
        let result = if touched {
            touch(&job.outputs)
        } else {
            Ok(())
        };
        self.running.fetch_sub(1, Ordering::SeqCst);
        result?;

        Ok(match failure {
            Some(code) => JobOutput::failure(
                Some(code),
                String::new(),
                format!("{} failed", job.id),
                self.delay,
            ),
            None => JobOutput::success(String::new(), String::new(), self.delay),
        })
    }
}

fn touch(outputs: &[PathBuf]) -> Result<()> {
    for output in outputs {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        File::create(output)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::CommandSpec;
    use tempfile::TempDir;

    fn job(id: &str, outputs: Vec<std::path::PathBuf>) -> Job {
        Job {
            id: id.to_string(),
            command: CommandSpec {
                program: "true".to_string(),
                ..Default::default()
            },
            outputs,
            log_path: None,
        }
    }

    #[test]
    fn success_touches_outputs() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("nested/out.txt");
        let runner = MockRunner::new();

        let output = runner.execute(&job("a", vec![out.clone()])).unwrap();

        assert!(output.success);
        assert!(out.exists());
        assert_eq!(runner.call_count(), 1);
        assert_eq!(runner.max_concurrency(), 1);
    }

    #[test]
    fn configured_failure_does_not_touch_outputs() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out.txt");
        let runner = MockRunner::new().fail("a", 7);

        let output = runner.execute(&job("a", vec![out.clone()])).unwrap();

        assert!(!output.success);
        assert_eq!(output.exit_code, Some(7));
        assert!(!out.exists());
    }

    #[test]
    fn partial_outputs_survive_failure() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out.txt");
        let runner = MockRunner::new().fail("a", 1).partial_outputs();

        let output = runner.execute(&job("a", vec![out.clone()])).unwrap();

        assert!(!output.success);
        assert!(out.exists());
    }

    #[test]
    fn without_outputs_skips_touching() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out.txt");
        let runner = MockRunner::new().without_outputs();
        runner.execute(&job("a", vec![out.clone()])).unwrap();
        assert!(!out.exists());
    }
}
