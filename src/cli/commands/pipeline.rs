//! Loading a pipeline for a command.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{load, ConfigPaths, LoadedConfig};
use crate::error::{Result, RunnelError};
use crate::runner::{Graph, GraphBuilder};

/// A loaded configuration and its full instance graph.
#[derive(Debug)]
pub struct Pipeline {
    project_root: PathBuf,
    loaded: LoadedConfig,
    graph: Graph,
}

impl Pipeline {
    /// Discover the config files, build the Parameter Store and the graph.
    ///
    /// # Errors
    ///
    /// Any configuration or graph construction error. No process is
    /// started before this returns.
    pub fn load(project_root: &Path, config: Option<&Path>) -> Result<Self> {
        let paths = ConfigPaths::discover(project_root, config);
        let loaded = load(&paths)?;
        debug!(
            "Loaded {} parameter(s) from {:?}",
            loaded.params.len(),
            loaded.sources
        );

        let graph =
            GraphBuilder::from_config(loaded.params.clone(), &loaded.config.tasks)?.build()?;
        debug!("Built graph with {} instance(s)", graph.len());

        Ok(Self {
            project_root: project_root.to_path_buf(),
            loaded,
            graph,
        })
    }

    /// The loaded configuration.
    pub fn loaded(&self) -> &LoadedConfig {
        &self.loaded
    }

    /// The full graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Targets to use when none were named.
    ///
    /// `settings.default_target` if set, otherwise every terminal task.
    pub fn default_targets(&self) -> Vec<String> {
        match &self.loaded.config.settings.default_target {
            Some(target) => vec![target.clone()],
            None => self.graph.terminal_tasks(),
        }
    }

    /// Resolve the requested targets, falling back to the defaults.
    pub fn targets(&self, requested: &[String]) -> Vec<String> {
        if requested.is_empty() {
            self.default_targets()
        } else {
            requested.to_vec()
        }
    }

    /// The graph restricted to the targets and their prerequisites.
    pub fn select(&self, targets: &[String]) -> Result<Graph> {
        self.graph.select(targets)
    }

    /// Validate `--force` task names.
    pub fn force_set(&self, force: &[String]) -> Result<HashSet<String>> {
        for task in force {
            if !self.graph.tasks().iter().any(|t| t == task) {
                return Err(RunnelError::config(format!(
                    "cannot force unknown task '{}'",
                    task
                )));
            }
        }
        Ok(force.iter().cloned().collect())
    }

    /// Concurrency limit: the `--jobs` override or `settings.max_parallel`.
    pub fn jobs(&self, requested: Option<u32>) -> usize {
        requested
            .map(|j| j as usize)
            .unwrap_or(self.loaded.config.settings.max_parallel)
            .max(1)
    }

    /// Log directory, relative to the project root.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.loaded
            .config
            .settings
            .log_dir
            .as_ref()
            .map(|dir| self.project_root.join(dir))
    }
}
