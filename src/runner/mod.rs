//! Graph construction and execution.
//!
//! - [`builder`] - descriptors to a [`Graph`] of instances (the Dependency Graph Builder)
//! - [`dependency`] - index graph, topological order, cycle detection
//! - [`freshness`] - the Freshness Checker
//! - [`scheduler`] - the Scheduler/Executor
//! - [`report`] - the per-invocation Run Record

pub mod builder;
pub mod dependency;
pub mod freshness;
pub mod report;
pub mod scheduler;

pub use builder::{build, EdgeKind, Graph, GraphBuilder};
pub use dependency::DependencyGraph;
pub use freshness::{Freshness, StaleReason, Upstream};
pub use report::{InstanceOutcome, InstanceState, RunReport};
pub use scheduler::{RunEvent, ScheduleOptions, Scheduler};
