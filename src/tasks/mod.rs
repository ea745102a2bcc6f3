//! Task declarations and their instantiation.
//!
//! - [`TaskDescriptor`] - declarative, immutable description of one step
//! - [`CommandTemplate`] / [`CommandSpec`] - structured commands
//! - [`fanout`] - expansion of descriptors into [`TaskInstance`]s
//! - [`patterns`] - pure path pattern matching used for dependency inference

pub mod command;
pub mod descriptor;
pub mod fanout;
pub mod patterns;

pub use command::{CommandSpec, CommandTemplate};
pub use descriptor::{BindingSource, Expansion, TaskDescriptor, TransformRule};
pub use fanout::{bindings_for, expand, Binding, TaskInstance};
pub use patterns::{glob_match, PathPattern};
