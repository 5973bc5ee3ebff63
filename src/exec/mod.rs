// src/exec/mod.rs

//! Execution layer.
//!
//! - [`executor`] walks a schedule level by level and owns the per-task
//!   lifecycle (agent lease, workspace session, retries, episode).
//! - [`retry`] holds the exponential backoff policy.
//! - [`error`] classifies task failures into retryable and fatal ones.
//! - [`backend`] provides the `TaskRunner` seam between the executor and
//!   whatever performs a task's work.
//! - [`command`] is the production runner, spawning shell commands with
//!   `tokio::process::Command`.

pub mod backend;
pub mod command;
pub mod error;
pub mod executor;
pub mod retry;

pub use backend::{TaskContext, TaskOutput, TaskRunner};
pub use command::CommandRunner;
pub use error::TaskError;
pub use executor::{ExecutorConfig, WorkflowExecutor};
pub use retry::{RetryDecision, RetryOutcome, RetryPolicy};
