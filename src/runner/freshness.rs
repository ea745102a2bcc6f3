//! The Freshness Checker.
//!
//! Decides whether a task instance must run by comparing the existence and
//! modification times of its declared outputs against its resolved inputs.
//! File contents are never inspected.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;

use crate::tasks::TaskInstance;

/// Why an instance must run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StaleReason {
    /// The instance's task was forced on the command line.
    Forced,
    /// A prerequisite ran (or would run) in this invocation.
    UpstreamRan,
    /// A declared output does not exist.
    MissingOutput { path: PathBuf },
    /// A declared output is older than an input.
    OutdatedOutput { output: PathBuf, input: PathBuf },
    /// Nothing to compare against; the instance always runs.
    NoOutputs,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::Forced => write!(f, "forced"),
            StaleReason::UpstreamRan => write!(f, "upstream ran"),
            StaleReason::MissingOutput { path } => write!(f, "missing {}", path.display()),
            StaleReason::OutdatedOutput { output, input } => {
                write!(f, "{} older than {}", output.display(), input.display())
            }
            StaleReason::NoOutputs => write!(f, "no outputs"),
        }
    }
}

/// Verdict of the Freshness Checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// All outputs exist and are at least as new as every input.
    UpToDate,
    /// The instance must run.
    Stale(StaleReason),
}

impl Freshness {
    /// Whether the instance must run.
    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale(_))
    }

    /// The reason, if stale.
    pub fn reason(&self) -> Option<&StaleReason> {
        match self {
            Freshness::Stale(reason) => Some(reason),
            Freshness::UpToDate => None,
        }
    }
}

/// What the scheduler knows about an instance's prerequisites.
#[derive(Debug, Clone, Copy, Default)]
pub struct Upstream {
    /// The instance has at least one prerequisite.
    pub has_prerequisites: bool,
    /// At least one prerequisite ran in this invocation.
    pub ran: bool,
    /// The instance's task was forced.
    pub forced: bool,
}

/// Check an instance.
///
/// Missing inputs are ignored for the timestamp comparison; a producer that
/// will create them propagates staleness through [`Upstream::ran`].
pub fn check(instance: &TaskInstance, upstream: Upstream) -> Freshness {
    if upstream.forced {
        return Freshness::Stale(StaleReason::Forced);
    }
    if upstream.ran {
        return Freshness::Stale(StaleReason::UpstreamRan);
    }

    if instance.outputs.is_empty() {
        return if upstream.has_prerequisites || !instance.inputs.is_empty() {
            Freshness::UpToDate
        } else {
            Freshness::Stale(StaleReason::NoOutputs)
        };
    }

    let mut oldest: Option<(&Path, SystemTime)> = None;
    for output in &instance.outputs {
        let Some(modified) = modified(output) else {
            return Freshness::Stale(StaleReason::MissingOutput {
                path: output.clone(),
            });
        };
        if oldest.is_none_or(|(_, t)| modified < t) {
            oldest = Some((output, modified));
        }
    }

    let newest_input = instance
        .inputs
        .iter()
        .filter_map(|input| modified(input).map(|t| (input, t)))
        .max_by_key(|(_, t)| *t);

    if let (Some((output, out_time)), Some((input, in_time))) = (oldest, newest_input) {
        if out_time < in_time {
            return Freshness::Stale(StaleReason::OutdatedOutput {
                output: output.to_path_buf(),
                input: input.clone(),
            });
        }
    }

    Freshness::UpToDate
}

/// Convenience wrapper: stale given only whether an upstream instance ran.
pub fn is_stale(instance: &TaskInstance, upstream_ran: bool) -> bool {
    check(
        instance,
        Upstream {
            has_prerequisites: upstream_ran,
            ran: upstream_ran,
            forced: false,
        },
    )
    .is_stale()
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
