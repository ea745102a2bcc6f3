//! Configuration schema definitions for runnel.
//!
//! This module contains the struct definitions that map to the
//! `pipeline.yml` document format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure for pipeline.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Parameter Store keys. Nested mappings are flattened with `_`.
    #[serde(skip_serializing_if = "serde_yaml::Mapping::is_empty")]
    pub params: serde_yaml::Mapping,

    /// Engine settings
    pub settings: Settings,

    /// Task declarations, in declaration order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskConfig>,
}

/// Engine settings that apply to every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum concurrent task instances
    #[serde(
        default = "default_max_parallel",
        skip_serializing_if = "is_default_max_parallel"
    )]
    pub max_parallel: usize,

    /// Directory for per-instance job logs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Target used when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_target: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            log_dir: None,
            default_target: None,
        }
    }
}

fn default_max_parallel() -> usize {
    4
}

fn is_default_max_parallel(v: &usize) -> bool {
    *v == default_max_parallel()
}

/// A single task declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskConfig {
    /// Unique task name
    pub name: String,

    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Input path patterns (literal paths or globs)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,

    /// Output path templates
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,

    /// Tasks whose every instance must finish first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub follows: Vec<String>,

    /// Directory created before the task runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mkdir: Option<String>,

    /// External command; absent for aggregation targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandConfig>,

    /// One instance per bound value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_out: Option<FanOutConfig>,

    /// One instance per matching input file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformConfig>,
}

/// Structured command declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandConfig {
    /// Program to execute (looked up on PATH)
    pub program: String,

    /// Argument templates
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Working directory template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// Environment overrides (value templates)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Fan-out declaration.
///
/// Exactly one of `count`, `values` or `param` must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FanOutConfig {
    /// Binding name, e.g. `chrom`
    pub name: String,

    /// Parameter holding N; binds `1..=N`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<String>,

    /// Literal values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<serde_yaml::Value>>,

    /// List-valued parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

/// Transform declaration: derive each output from one matching input.
///
/// Exactly one of `suffix` or `regex` must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    /// Input glob template
    pub input: String,

    /// Suffix to strip from the input path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,

    /// Regular expression applied to the input path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,

    /// Replacement suffix, or replacement template for `regex`
    pub replace: String,
}
