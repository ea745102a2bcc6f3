//! Configuration file discovery and loading.
//!
//! Candidates are read in priority order. A key found in an earlier file is
//! never overridden by a later one; later files only supply missing keys.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::merger::merge_configs;
use crate::config::params::ParameterStore;
use crate::config::schema::PipelineConfig;
use crate::error::{Result, RunnelError};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "pipeline.yml";

/// Candidate configuration paths in priority order (earlier wins).
///
/// Discovery order:
/// 1. Explicit `--config` path
/// 2. `pipeline.yml` in the project root
/// 3. `pipeline.yml` in the parent of the project root
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    candidates: Vec<PathBuf>,
}

impl ConfigPaths {
    /// Use an explicit list of candidates.
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    /// Discover candidates for the given project root.
    pub fn discover(project_root: &Path, explicit: Option<&Path>) -> Self {
        let mut candidates = Vec::new();

        if let Some(path) = explicit {
            candidates.push(path.to_path_buf());
        }

        candidates.push(project_root.join(CONFIG_FILE_NAME));

        if let Some(parent) = project_root.parent() {
            candidates.push(parent.join(CONFIG_FILE_NAME));
        }

        Self { candidates }
    }

    /// All candidates, existing or not.
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Returns the existing candidates in priority order.
    pub fn existing(&self) -> Vec<&PathBuf> {
        self.candidates.iter().filter(|p| p.is_file()).collect()
    }

    /// Human-readable list of candidates for error messages.
    pub fn describe(&self) -> String {
        self.candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A loaded configuration with its Parameter Store.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration document.
    pub config: PipelineConfig,

    /// Flattened parameters.
    pub params: ParameterStore,

    /// Files that contributed, in priority order.
    pub sources: Vec<PathBuf>,
}

/// Parse YAML content into a PipelineConfig.
///
/// # Arguments
///
/// * `content` - The YAML content to parse
/// * `source_path` - Path for error reporting
pub fn parse_config(content: &str, source_path: &Path) -> Result<PipelineConfig> {
    serde_yaml::from_str(content).map_err(|e| RunnelError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load a config file as a raw YAML value (for merging).
///
/// An empty file loads as an empty mapping.
pub fn load_config_value(path: &Path) -> Result<serde_yaml::Value> {
    let content = fs::read_to_string(path)?;

    let value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|e| RunnelError::ConfigParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    match value {
        serde_yaml::Value::Null => Ok(serde_yaml::Value::Mapping(Default::default())),
        serde_yaml::Value::Mapping(_) => Ok(value),
        _ => Err(RunnelError::ConfigParseError {
            path: path.to_path_buf(),
            message: "top level must be a mapping".to_string(),
        }),
    }
}

/// Load and merge all existing candidates.
///
/// # Errors
///
/// Returns `ConfigNotFound` if no candidate exists.
/// Returns `ConfigParseError` if any existing candidate is invalid.
pub fn load(paths: &ConfigPaths) -> Result<LoadedConfig> {
    let existing = paths.existing();
    if existing.is_empty() {
        return Err(RunnelError::ConfigNotFound {
            searched: paths.describe(),
        });
    }

    let mut values = Vec::with_capacity(existing.len());
    for path in &existing {
        debug!("Reading configuration from {}", path.display());
        values.push(load_config_value(path)?);
    }

    let merged = merge_configs(&values);
    let source = existing[0].as_path();
    let config: PipelineConfig =
        serde_yaml::from_value(merged).map_err(|e| RunnelError::ConfigParseError {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;

    let params = ParameterStore::from_mapping(&config.params)?;

    Ok(LoadedConfig {
        config,
        params,
        sources: existing.into_iter().cloned().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn discover_orders_explicit_first() {
        let root = Path::new("/work/project");
        let paths = ConfigPaths::discover(root, Some(Path::new("/etc/custom.yml")));
        let candidates = paths.candidates();
        assert_eq!(candidates[0], PathBuf::from("/etc/custom.yml"));
        assert_eq!(candidates[1], PathBuf::from("/work/project/pipeline.yml"));
        assert_eq!(candidates[2], PathBuf::from("/work/pipeline.yml"));
    }

    #[test]
    fn load_without_candidates_fails() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::new(vec![temp.path().join("missing.yml")]);
        let err = load(&paths).unwrap_err();
        assert!(matches!(err, RunnelError::ConfigNotFound { .. }));
    }

    #[test]
    fn first_found_wins_per_key() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("local.yml");
        let shared = temp.path().join("shared.yml");
        fs::write(&local, "params:\n  inp_title: local\n").unwrap();
        fs::write(
            &shared,
            "params:\n  inp_title: shared\n  pheno: pheno.txt\nsettings:\n  max_parallel: 2\n",
        )
        .unwrap();

        let loaded = load(&ConfigPaths::new(vec![local.clone(), shared])).unwrap();

        assert_eq!(loaded.params.get("inp_title").as_deref(), Some("local"));
        assert_eq!(loaded.params.get("pheno").as_deref(), Some("pheno.txt"));
        assert_eq!(loaded.config.settings.max_parallel, 2);
        assert_eq!(loaded.sources[0], local);
    }

    #[test]
    fn missing_candidates_are_skipped() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("real.yml");
        fs::write(&real, "params:\n  a: 1\n").unwrap();

        let loaded =
            load(&ConfigPaths::new(vec![temp.path().join("nope.yml"), real])).unwrap();

        assert_eq!(loaded.sources.len(), 1);
        assert_eq!(loaded.params.require_usize("a").unwrap(), 1);
    }

    #[test]
    fn invalid_yaml_reports_path() {
        let temp = TempDir::new().unwrap();
        let bad = temp.path().join("bad.yml");
        fs::write(&bad, "params: [unclosed").unwrap();

        let err = load(&ConfigPaths::new(vec![bad.clone()])).unwrap_err();
        match err {
            RunnelError::ConfigParseError { path, .. } => assert_eq!(path, bad),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_file_loads_defaults() {
        let temp = TempDir::new().unwrap();
        let empty = temp.path().join("empty.yml");
        fs::write(&empty, "").unwrap();

        let loaded = load(&ConfigPaths::new(vec![empty])).unwrap();
        assert!(loaded.params.is_empty());
        assert!(loaded.config.tasks.is_empty());
    }

    #[test]
    fn parse_config_reads_tasks() {
        let config = parse_config(
            "tasks:\n  - name: a\n    outputs: [a.txt]\n",
            Path::new("inline.yml"),
        )
        .unwrap();
        assert_eq!(config.tasks[0].outputs, vec!["a.txt"]);
    }
}
