//! Show command implementation.
//!
//! Computes the execution order and the staleness verdict of every
//! instance without starting any process.

use std::path::{Path, PathBuf};

use crate::cli::args::ShowArgs;
use crate::error::{Result, RunnelError};
use crate::runner::{InstanceState, ScheduleOptions, Scheduler};
use crate::shell::MockRunner;
use crate::ui::{show_outcome, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::pipeline::Pipeline;

/// The show command reports what `make` would do.
pub struct ShowCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    args: ShowArgs,
}

impl ShowCommand {
    /// Create a new show command.
    pub fn new(project_root: &Path, config: Option<&Path>, args: ShowArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config: config.map(Path::to_path_buf),
            args,
        }
    }

    /// Get the show arguments.
    pub fn args(&self) -> &ShowArgs {
        &self.args
    }
}

impl Command for ShowCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let pipeline = Pipeline::load(&self.project_root, self.config.as_deref())?;
        let targets = pipeline.targets(&self.args.targets);
        let graph = pipeline.select(&targets)?;

        let options = ScheduleOptions {
            dry_run: true,
            force: pipeline.force_set(&self.args.force)?,
            ..Default::default()
        };
        // A dry run never reaches the runner.
        let runner = MockRunner::new();
        let report = Scheduler::new(&runner, options).run(&graph);

        if self.args.json {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| RunnelError::Other(e.into()))?;
            ui.data(&json);
            return Ok(CommandResult::success());
        }

        ui.show_header(&format!("Execution order for {}", targets.join(", ")));
        for outcome in &report.outcomes {
            show_outcome(ui, outcome);
        }

        let stale = report.count(InstanceState::WouldRun);
        if stale == 0 {
            ui.success("Everything is up to date");
        } else {
            ui.message(&format!("\n{} of {} instance(s) would run", stale, graph.len()));
        }

        Ok(CommandResult::success())
    }
}
