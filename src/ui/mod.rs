//! User-facing output.
//!
//! This module provides:
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] for terminal usage
//! - [`MockUI`] for tests
//! - [`show_outcome`] and [`show_report`] to render run results
//!
//! # Example
//!
//! ```
//! use runnel::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.show_header("fast-mlm");
//! ui.success("generate_grm");
//! assert!(ui.has_success("generate_grm"));
//! ```

pub mod mock;
pub mod output;
pub mod terminal;
pub mod theme;

pub use mock::MockUI;
pub use output::{format_duration, OutputMode};
pub use terminal::TerminalUI;
pub use theme::{should_use_colors, RunnelTheme};

use crate::runner::{InstanceOutcome, InstanceState, RunReport};

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a skipped message.
    fn skipped(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message.
    fn error(&mut self, msg: &str);

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Print machine-readable data verbatim, regardless of output mode.
    fn data(&mut self, text: &str);
}

/// Render one instance outcome with the style matching its state.
pub fn show_outcome(ui: &mut dyn UserInterface, outcome: &InstanceOutcome) {
    let mut line = outcome.id.clone();
    if let Some(duration) = outcome.duration {
        line.push_str(&format!(" ({})", format_duration(duration)));
    }

    match outcome.state {
        InstanceState::Succeeded => ui.success(&line),
        InstanceState::SkippedUpToDate => ui.skipped(&format!("{} (up to date)", line)),
        InstanceState::WouldRun => {
            let reason = outcome
                .stale
                .as_ref()
                .map(|r| format!(" [{}]", r))
                .unwrap_or_default();
            ui.message(&format!("▶ {}{}", line, reason));
            if ui.output_mode().shows_commands() {
                if let Some(command) = &outcome.command {
                    ui.message(&format!("    {}", command));
                }
            }
        }
        InstanceState::Failed => {
            let error = outcome.error.as_deref().unwrap_or("failed");
            ui.error(&format!("{}: {}", line, error));
        }
        InstanceState::NotRun => {
            let why = outcome.error.as_deref().unwrap_or("not run");
            ui.warning(&format!("{} not run ({})", line, why));
        }
        InstanceState::Pending | InstanceState::Ready | InstanceState::Running => {
            ui.message(&format!("{} {}", outcome.state.display_char(), line));
        }
    }
}

/// Render the closing summary of a run.
pub fn show_report(ui: &mut dyn UserInterface, report: &RunReport) {
    let summary = report.summary();
    if report.cancelled {
        ui.warning(&format!("Cancelled: {}", summary));
    } else if report.success() {
        ui.success(&summary);
    } else {
        ui.error(&summary);
    }
}
