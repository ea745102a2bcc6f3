//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. Every command loads its
//! [`Pipeline`] the same way, so configuration and graph errors surface
//! before any process starts.

pub mod dispatcher;
pub mod list;
pub mod make;
pub mod pipeline;
pub mod show;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
pub use pipeline::Pipeline;
