//! The Job Runner and run cancellation.

pub mod cancel;
pub mod command;
pub mod mock;

pub use cancel::CancelFlag;
pub use command::{stderr_tail, write_log, Job, JobOutput, JobRunner, ProcessRunner};
pub use mock::MockRunner;
