//! Configuration loading and the Parameter Store.
//!
//! This module handles:
//! - Schema definitions in [`schema`]
//! - Candidate discovery and loading in [`loader`]
//! - First-found-wins merging in [`merger`]
//! - The flattened [`ParameterStore`] in [`params`]
//! - `${name}` placeholder resolution in [`interpolation`]
//!
//! # Example
//!
//! ```
//! use runnel::config::{load, ConfigPaths};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! fs::write(temp.path().join("pipeline.yml"), "params:\n  inp_title: test\n").unwrap();
//!
//! let loaded = load(&ConfigPaths::discover(temp.path(), None)).unwrap();
//! assert_eq!(loaded.params.get("inp_title").as_deref(), Some("test"));
//! ```

pub mod interpolation;
pub mod loader;
pub mod merger;
pub mod params;
pub mod schema;

pub use schema::{
    CommandConfig, FanOutConfig, PipelineConfig, Settings, TaskConfig, TransformConfig,
};

pub use loader::{
    load, load_config_value, parse_config, ConfigPaths, LoadedConfig, CONFIG_FILE_NAME,
};

pub use merger::{first_wins_merge, merge_configs};

pub use params::{scalar_to_string, ParameterStore};

pub use interpolation::{
    extract_variables, has_interpolation, parse_interpolation, resolve_string,
    InterpolationContext, Segment,
};
