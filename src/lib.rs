//! Runnel - a file-contract task pipeline runner.
//!
//! A pipeline is a YAML list of tasks. Each task declares the files it reads
//! and writes; runnel infers the dependency graph from those declarations,
//! fans tasks out over parameter lists, and runs only the instances whose
//! outputs are missing or older than their inputs.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading and the Parameter Store
//! - [`error`] - Error types and result aliases
//! - [`runner`] - Graph building, freshness checks and scheduling
//! - [`shell`] - Job execution and cancellation
//! - [`tasks`] - Task descriptors, path patterns and fan-out expansion
//! - [`ui`] - Terminal output
//!
//! # Example
//!
//! ```
//! use runnel::config::ParameterStore;
//! use runnel::runner::build;
//! use runnel::tasks::TaskDescriptor;
//!
//! let params = ParameterStore::new().with("out", "results");
//! let tasks = vec![
//!     TaskDescriptor::new("gwa").output("${out}/gwa.tsv"),
//!     TaskDescriptor::new("plot").input("${out}/*.tsv").output("${out}/qq.png"),
//! ];
//!
//! let graph = build(&params, &tasks).unwrap();
//! assert_eq!(graph.order_ids(), vec!["gwa", "plot"]);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod shell;
pub mod tasks;
pub mod ui;

pub use error::{Result, RunnelError};
