//! The Run Record.
//!
//! A [`RunReport`] holds the computed execution order and the outcome of every
//! instance for one invocation. It lives only as long as the invocation.

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::runner::freshness::StaleReason;

/// Lifecycle state of a task instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Waiting on prerequisites.
    Pending,
    /// All prerequisites finished successfully; waiting for a worker.
    Ready,
    /// Dispatched to the Job Runner.
    Running,
    /// Ran and exited successfully.
    Succeeded,
    /// Ran and failed.
    Failed,
    /// Outputs were already up to date.
    SkippedUpToDate,
    /// Never started: a prerequisite failed or the run was cancelled.
    NotRun,
    /// Dry run: would have been dispatched.
    WouldRun,
}

impl InstanceState {
    /// Check if this is a terminal state (no more changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstanceState::Succeeded
                | InstanceState::Failed
                | InstanceState::SkippedUpToDate
                | InstanceState::NotRun
                | InstanceState::WouldRun
        )
    }

    /// Whether dependents may proceed past this state.
    pub fn unblocks_dependents(&self) -> bool {
        matches!(
            self,
            InstanceState::Succeeded | InstanceState::SkippedUpToDate | InstanceState::WouldRun
        )
    }

    /// Whether the instance ran (or, in a dry run, would run).
    pub fn ran(&self) -> bool {
        matches!(
            self,
            InstanceState::Succeeded | InstanceState::Failed | InstanceState::WouldRun
        )
    }

    /// Get a display character for this state.
    pub fn display_char(&self) -> char {
        match self {
            InstanceState::Pending => '○',
            InstanceState::Ready => '◎',
            InstanceState::Running => '◉',
            InstanceState::Succeeded => '✓',
            InstanceState::Failed => '✗',
            InstanceState::SkippedUpToDate => '⊘',
            InstanceState::NotRun => '-',
            InstanceState::WouldRun => '▶',
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceState::Pending => "pending",
            InstanceState::Ready => "ready",
            InstanceState::Running => "running",
            InstanceState::Succeeded => "succeeded",
            InstanceState::Failed => "failed",
            InstanceState::SkippedUpToDate => "up to date",
            InstanceState::NotRun => "not run",
            InstanceState::WouldRun => "would run",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceOutcome {
    /// Instance id.
    pub id: String,

    /// Task the instance belongs to.
    pub task: String,

    /// Final state.
    pub state: InstanceState,

    /// Why the instance was considered stale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale: Option<StaleReason>,

    /// Rendered command line, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Exit code of the external process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Wall-clock time spent running.
    #[serde(
        serialize_with = "serialize_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Duration>,

    /// Error message for failed or not-run instances.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn serialize_secs<S: Serializer>(
    duration: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match duration {
        Some(d) => serializer.serialize_f64(d.as_secs_f64()),
        None => serializer.serialize_none(),
    }
}

impl InstanceOutcome {
    /// A pending outcome for an instance.
    pub fn pending(id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task: task.into(),
            state: InstanceState::Pending,
            stale: None,
            command: None,
            exit_code: None,
            duration: None,
            error: None,
        }
    }

    /// Generate a summary line for display.
    pub fn summary_line(&self) -> String {
        let mut line = format!("{} {} ({})", self.state.display_char(), self.id, self.state);
        if let Some(duration) = self.duration {
            line.push_str(&format!(" [{:.1}s]", duration.as_secs_f64()));
        }
        if let Some(reason) = &self.stale {
            if self.state.ran() {
                line.push_str(&format!(" - {}", reason));
            }
        }
        if let Some(error) = &self.error {
            line.push_str(&format!(": {}", error));
        }
        line
    }
}

/// Result of one invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Instance ids in the computed topological order.
    pub order: Vec<String>,

    /// Outcome of every instance, in the computed order.
    pub outcomes: Vec<InstanceOutcome>,

    /// Whether this was a dry run.
    pub dry_run: bool,

    /// Whether the run was cancelled.
    pub cancelled: bool,
}

impl RunReport {
    /// Whether every instance succeeded, was up to date, or would run.
    pub fn success(&self) -> bool {
        !self.cancelled && self.outcomes.iter().all(|o| o.state.unblocks_dependents())
    }

    /// Process exit code for this report.
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }

    /// Outcome of the instance with the given id.
    pub fn outcome(&self, id: &str) -> Option<&InstanceOutcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }

    /// State of the instance with the given id.
    pub fn state_of(&self, id: &str) -> Option<InstanceState> {
        self.outcome(id).map(|o| o.state)
    }

    /// Ids of instances in a given state, in order.
    pub fn ids_with(&self, state: InstanceState) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.state == state)
            .map(|o| o.id.as_str())
            .collect()
    }

    /// Number of instances in a given state.
    pub fn count(&self, state: InstanceState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    /// Number of external processes started.
    pub fn processes_started(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.state.ran() && o.state != InstanceState::WouldRun && o.command.is_some())
            .count()
    }

    /// One-line partial-success summary.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        for state in [
            InstanceState::Succeeded,
            InstanceState::WouldRun,
            InstanceState::SkippedUpToDate,
            InstanceState::Failed,
            InstanceState::NotRun,
        ] {
            let n = self.count(state);
            if n > 0 {
                parts.push(format!("{} {}", n, state));
            }
        }
        if parts.is_empty() {
            "nothing to do".to_string()
        } else {
            parts.join(", ")
        }
    }
}
