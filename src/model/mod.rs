// src/model/mod.rs

//! Workflow data model.
//!
//! - [`task`] defines [`Task`], its status state machine and requirements.
//! - [`workflow`] holds the task set, dependency map and metadata.
//! - [`builder`] offers fluent builders for both.
//! - [`result`] contains what an execution hands back to the caller.

pub mod builder;
pub mod result;
pub mod task;
pub mod workflow;

pub use builder::{TaskBuilder, WorkflowBuilder};
pub use result::{ExecutionMetrics, TaskOutcome, TaskResult, WorkflowResult, WorkflowStatus};
pub use task::{InvalidTransition, ResourceRequirements, Task, TaskStatus, TaskType};
pub use workflow::{ExecutionMode, Workflow, WorkflowMetadata};
