//! List command implementation.
//!
//! The `runnel list` command lists tasks, their instances and the edges
//! between them.

use std::path::{Path, PathBuf};

use crate::cli::args::ListArgs;
use crate::error::Result;
use crate::runner::{EdgeKind, Graph};
use crate::ui::{should_use_colors, RunnelTheme, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::pipeline::Pipeline;

/// The list command implementation.
pub struct ListCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    args: ListArgs,
}

impl ListCommand {
    /// Create a new list command.
    pub fn new(project_root: &Path, config: Option<&Path>, args: ListArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config: config.map(Path::to_path_buf),
            args,
        }
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the command arguments.
    pub fn args(&self) -> &ListArgs {
        &self.args
    }

    fn show_instance(
        &self,
        ui: &mut dyn UserInterface,
        theme: &RunnelTheme,
        graph: &Graph,
        index: usize,
    ) {
        let instance = graph.instance(index);
        ui.message(&format!("    {}", theme.highlight.apply_to(&instance.id)));

        for &producer in graph.dependencies_of(index) {
            let via = match graph.edge_kind(producer, index) {
                Some(EdgeKind::Follows) => "follows",
                _ => "needs",
            };
            ui.message(&format!(
                "      {} {}",
                theme.dim.apply_to(format!("└── {}:", via)),
                graph.instance(producer).id
            ));
        }

        if self.args.paths {
            for input in &instance.inputs {
                ui.message(&format!(
                    "      {} {}",
                    theme.dim.apply_to("<"),
                    input.display()
                ));
            }
            for output in &instance.outputs {
                ui.message(&format!(
                    "      {} {}",
                    theme.dim.apply_to(">"),
                    output.display()
                ));
            }
        }
    }
}

impl Command for ListCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let pipeline = Pipeline::load(&self.project_root, self.config.as_deref())?;
        let graph = pipeline.graph();

        let theme = if should_use_colors() {
            RunnelTheme::new()
        } else {
            RunnelTheme::plain()
        };

        ui.message(&format!("  {}", theme.header.apply_to("Tasks:")));
        for task in graph.tasks() {
            let instances = graph.instances_of(task);
            let count = if instances.len() == 1 && graph.instance(instances[0]).id == *task {
                String::new()
            } else {
                let label = format!("({} instances)", instances.len());
                format!(" {}", theme.dim.apply_to(label))
            };
            ui.message(&format!("  {}{}", theme.highlight.apply_to(task), count));

            if let Some(desc) = graph.description(task) {
                ui.message(&format!("    {}", theme.dim.apply_to(desc)));
            }

            for index in instances {
                self.show_instance(ui, &theme, graph, index);
            }
        }

        ui.message("");
        ui.message(&format!("  {}", theme.header.apply_to("Stages:")));
        for (n, stage) in graph.stages().iter().enumerate() {
            ui.message(&format!(
                "    {} {}",
                theme.dim.apply_to(format!("{}.", n + 1)),
                stage.join(", ")
            ));
        }

        ui.message("");
        ui.message(&format!(
            "  {} {}",
            theme.dim.apply_to("Default targets:"),
            pipeline.default_targets().join(", ")
        ));

        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    fn setup(temp: &TempDir) {
        let dir = temp.path().display();
        let yaml = format!(
            r#"
params:
  out: {dir}
  chroms: [1, 2]
tasks:
  - name: split
    description: Write one file per chromosome
    outputs: ["${{out}}/chr${{chrom}}.txt"]
    fan_out: {{ name: chrom, param: chroms }}
  - name: merge
    inputs: ["${{out}}/chr*.txt"]
    outputs: ["${{out}}/all.txt"]
  - name: full
    follows: [merge]
"#
        );
        fs::write(temp.path().join("pipeline.yml"), yaml).unwrap();
    }

    fn line_with(ui: &MockUI, label: &str, value: &str) -> bool {
        ui.messages()
            .iter()
            .any(|m| m.contains(label) && m.contains(value))
    }

    #[test]
    fn lists_tasks_instances_and_edges() {
        let temp = TempDir::new().unwrap();
        setup(&temp);
        let cmd = ListCommand::new(temp.path(), None, ListArgs::default());
        let mut ui = MockUI::new();

        let result = cmd.execute(&mut ui).unwrap();

        assert!(result.success);
        assert!(ui.has_message("split"));
        assert!(ui.has_message("(2 instances)"));
        assert!(ui.has_message("Write one file per chromosome"));
        assert!(ui.has_message("split[chrom=1]"));
        assert!(line_with(&ui, "needs:", "split[chrom=2]"));
        assert!(line_with(&ui, "follows:", "merge"));
        assert!(line_with(&ui, "1.", "split[chrom=1], split[chrom=2]"));
        assert!(line_with(&ui, "3.", "full"));
        assert!(line_with(&ui, "Default targets:", "full"));
    }

    #[test]
    fn paths_flag_shows_resolved_files() {
        let temp = TempDir::new().unwrap();
        setup(&temp);
        let args = ListArgs { paths: true };
        let cmd = ListCommand::new(temp.path(), None, args);
        let mut ui = MockUI::new();

        cmd.execute(&mut ui).unwrap();

        assert!(ui.has_message("chr1.txt"));
        assert!(ui.has_message("all.txt"));
    }
}
