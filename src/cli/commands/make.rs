//! Make command implementation.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::cli::args::MakeArgs;
use crate::error::Result;
use crate::runner::{RunEvent, ScheduleOptions, Scheduler};
use crate::shell::{CancelFlag, JobRunner, ProcessRunner};
use crate::ui::{show_outcome, show_report, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::pipeline::Pipeline;

/// The make command brings targets up to date.
pub struct MakeCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    args: MakeArgs,
    cancel: CancelFlag,
}

impl MakeCommand {
    /// Create a new make command.
    pub fn new(project_root: &Path, config: Option<&Path>, args: MakeArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config: config.map(Path::to_path_buf),
            args,
            cancel: CancelFlag::new(),
        }
    }

    /// Use a specific cancellation flag.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get the make arguments.
    pub fn args(&self) -> &MakeArgs {
        &self.args
    }

    /// Run with the given job runner.
    pub fn execute_with(
        &self,
        ui: &mut dyn UserInterface,
        runner: &dyn JobRunner,
    ) -> Result<CommandResult> {
        let pipeline = Pipeline::load(&self.project_root, self.config.as_deref())?;
        let targets = pipeline.targets(&self.args.targets);
        let graph = pipeline.select(&targets)?;

        let options = ScheduleOptions {
            jobs: pipeline.jobs(self.args.jobs),
            dry_run: self.args.dry_run,
            force: pipeline.force_set(&self.args.force)?,
            cancel: self.cancel.clone(),
            log_dir: pipeline.log_dir(),
        };
        info!(
            "Making {} with {} job(s){}",
            targets.join(", "),
            options.jobs,
            if options.dry_run { " (dry run)" } else { "" }
        );

        let title = if self.args.dry_run {
            format!("Dry run: {}", targets.join(", "))
        } else {
            format!("Making {}", targets.join(", "))
        };
        ui.show_header(&title);

        let scheduler = Scheduler::new(runner, options);
        let report = scheduler.run_with_progress(&graph, &mut |event| match event {
            RunEvent::Started { instance } => {
                if ui.output_mode().shows_commands() {
                    if let Some(command) = &instance.command {
                        ui.message(&format!("→ {}: {}", instance.id, command.display_line()));
                    }
                }
            }
            RunEvent::Finished { outcome } => show_outcome(ui, outcome),
        });

        show_report(ui, &report);

        if report.success() {
            Ok(CommandResult::success())
        } else {
            Ok(CommandResult::failure(report.exit_code()))
        }
    }
}

impl Command for MakeCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        self.execute_with(ui, &ProcessRunner::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunnelError;
    use crate::shell::MockRunner;
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    fn chain(temp: &TempDir) {
        let dir = temp.path().display();
        let yaml = format!(
            r#"
params:
  out: {dir}
tasks:
  - name: a
    outputs: ["${{out}}/a.txt"]
    command: {{ program: touch, args: ["${{outputs}}"] }}
  - name: b
    inputs: ["${{out}}/a.txt"]
    outputs: ["${{out}}/b.txt"]
    command: {{ program: touch, args: ["${{outputs}}"] }}
"#
        );
        fs::write(temp.path().join("pipeline.yml"), yaml).unwrap();
    }

    #[test]
    fn make_runs_stale_instances() {
        let temp = TempDir::new().unwrap();
        chain(&temp);
        let runner = MockRunner::new();
        let cmd = MakeCommand::new(temp.path(), None, MakeArgs::default());
        let mut ui = MockUI::new();

        let result = cmd.execute_with(&mut ui, &runner).unwrap();

        assert!(result.success);
        assert_eq!(runner.executed(), vec!["a", "b"]);
        assert!(ui.has_success("a"));
        assert!(ui.has_success("2 succeeded"));
    }

    #[test]
    fn second_make_does_nothing() {
        let temp = TempDir::new().unwrap();
        chain(&temp);
        let cmd = MakeCommand::new(temp.path(), None, MakeArgs::default());
        cmd.execute_with(&mut MockUI::new(), &MockRunner::new())
            .unwrap();

        let runner = MockRunner::new();
        let mut ui = MockUI::new();
        let result = cmd.execute_with(&mut ui, &runner).unwrap();

        assert!(result.success);
        assert_eq!(runner.call_count(), 0);
        assert!(ui.has_skip("b (up to date)"));
    }

    #[test]
    fn failure_exits_one() {
        let temp = TempDir::new().unwrap();
        chain(&temp);
        let runner = MockRunner::new().fail("a", 3);
        let cmd = MakeCommand::new(temp.path(), None, MakeArgs::default());
        let mut ui = MockUI::new();

        let result = cmd.execute_with(&mut ui, &runner).unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, 1);
        assert!(ui.has_warning("b not run"));
    }

    #[test]
    fn dry_run_starts_nothing() {
        let temp = TempDir::new().unwrap();
        chain(&temp);
        let runner = MockRunner::new();
        let args = MakeArgs {
            dry_run: true,
            ..Default::default()
        };
        let cmd = MakeCommand::new(temp.path(), None, args);
        let mut ui = MockUI::new();

        let result = cmd.execute_with(&mut ui, &runner).unwrap();

        assert!(result.success);
        assert_eq!(runner.call_count(), 0);
        assert!(ui.has_message("▶ a"));
        assert!(ui.has_message("▶ b"));
    }

    #[test]
    fn target_limits_the_run() {
        let temp = TempDir::new().unwrap();
        chain(&temp);
        let runner = MockRunner::new();
        let args = MakeArgs {
            targets: vec!["a".to_string()],
            ..Default::default()
        };
        let cmd = MakeCommand::new(temp.path(), None, args);

        cmd.execute_with(&mut MockUI::new(), &runner).unwrap();

        assert_eq!(runner.executed(), vec!["a"]);
    }

    #[test]
    fn unknown_target_is_construction_error() {
        let temp = TempDir::new().unwrap();
        chain(&temp);
        let args = MakeArgs {
            targets: vec!["nope".to_string()],
            ..Default::default()
        };
        let cmd = MakeCommand::new(temp.path(), None, args);

        let err = cmd
            .execute_with(&mut MockUI::new(), &MockRunner::new())
            .unwrap_err();
        assert!(matches!(err, RunnelError::Configuration { .. }));
    }

    #[test]
    fn cancelled_before_start_runs_nothing() {
        let temp = TempDir::new().unwrap();
        chain(&temp);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let runner = MockRunner::new();
        let cmd = MakeCommand::new(temp.path(), None, MakeArgs::default()).with_cancel(cancel);
        let mut ui = MockUI::new();

        let result = cmd.execute_with(&mut ui, &runner).unwrap();

        assert_eq!(result.exit_code, 1);
        assert_eq!(runner.call_count(), 0);
        assert!(ui.has_warning("Cancelled"));
    }
}
