//! Error types for runnel operations.
//!
//! This module defines [`RunnelError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Construction-time errors (configuration, cycles, placeholders, output
//!   collisions) abort an invocation before any process is spawned
//! - [`RunnelError::ExternalProcess`] is recorded against a single task instance
//!   and never aborts the scheduler
//! - Use `anyhow::Error` (via `RunnelError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for runnel operations.
#[derive(Debug, Error)]
pub enum RunnelError {
    /// None of the candidate configuration files exist.
    #[error("No configuration found (searched: {searched})")]
    ConfigNotFound { searched: String },

    /// Failed to parse a configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Missing or invalid parameter, or an invalid task declaration.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The task graph contains a cycle.
    #[error("Cyclic dependency detected: {cycle}")]
    CyclicDependency { cycle: String },

    /// A command template references a placeholder with no binding.
    #[error("Unresolved placeholder ${{{placeholder}}} in task '{task}'")]
    UnresolvedPlaceholder { placeholder: String, task: String },

    /// A collaborator command exited unsuccessfully.
    #[error("Task '{instance}' failed with exit code {code:?}: {stderr}")]
    ExternalProcess {
        instance: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Two task instances declare the same output path.
    #[error("Output {path} is declared by both '{first}' and '{second}'")]
    OutputCollision {
        path: PathBuf,
        first: String,
        second: String,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RunnelError {
    /// Shorthand for a [`RunnelError::Configuration`] error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error was raised while building the graph, before any
    /// task executed.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigParseError { .. }
                | Self::Configuration { .. }
                | Self::CyclicDependency { .. }
                | Self::UnresolvedPlaceholder { .. }
                | Self::OutputCollision { .. }
        )
    }
}

/// Result type alias for runnel operations.
pub type Result<T> = std::result::Result<T, RunnelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_not_found_lists_candidates() {
        let err = RunnelError::ConfigNotFound {
            searched: "pipeline.yml, ../pipeline.yml".into(),
        };
        assert!(err.to_string().contains("../pipeline.yml"));
    }

    #[test]
    fn config_parse_error_displays_path_and_message() {
        let err = RunnelError::ConfigParseError {
            path: PathBuf::from("/pipeline.yml"),
            message: "invalid syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/pipeline.yml"));
        assert!(msg.contains("invalid syntax"));
    }

    #[test]
    fn configuration_error_displays_message() {
        let err = RunnelError::config("missing parameter 'GRM_dir'");
        assert!(err.to_string().contains("GRM_dir"));
    }

    #[test]
    fn cyclic_dependency_displays_cycle() {
        let err = RunnelError::CyclicDependency {
            cycle: "a -> b -> a".into(),
        };
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn unresolved_placeholder_displays_name_and_task() {
        let err = RunnelError::UnresolvedPlaceholder {
            placeholder: "pheno".into(),
            task: "mlm_gwa".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("${pheno}"));
        assert!(msg.contains("mlm_gwa"));
    }

    #[test]
    fn external_process_displays_instance_and_code() {
        let err = RunnelError::ExternalProcess {
            instance: "reformat[a.fastGWA]".into(),
            code: Some(3),
            stderr: "boom".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("reformat[a.fastGWA]"));
        assert!(msg.contains('3'));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn output_collision_names_both_tasks() {
        let err = RunnelError::OutputCollision {
            path: PathBuf::from("out/a.tsv"),
            first: "one".into(),
            second: "two".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("out/a.tsv"));
        assert!(msg.contains("one"));
        assert!(msg.contains("two"));
    }

    #[test]
    fn construction_errors_are_classified() {
        assert!(RunnelError::config("x").is_construction_error());
        assert!(RunnelError::CyclicDependency { cycle: "a".into() }.is_construction_error());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(!RunnelError::from(io).is_construction_error());
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: RunnelError = io_err.into();
        assert!(matches!(err, RunnelError::Io(_)));
    }
}
