// src/dag/mod.rs

//! Task graph analysis: everything that happens before a task runs.
//!
//! - [`graph`] holds the adjacency view of a workflow.
//! - [`validate`] checks a workflow for cycles, dangling edges, bad
//!   requirements and an infeasible timeout.
//! - [`scheduler`] computes the topological order, levels and allocation.
//! - [`critical_path`] finds the longest chain of estimated work.
//! - [`error`] defines the validation and scheduling errors.

pub mod critical_path;
pub mod error;
pub mod graph;
pub mod scheduler;
pub mod validate;

pub use critical_path::{CriticalPath, TaskTiming};
pub use error::{SchedulingError, ValidationError, ValidationErrors};
pub use graph::DagGraph;
pub use scheduler::{
    ExecutionLevel, ExecutionSchedule, ResourceAllocation, Scheduler, create_schedule,
};
pub use validate::validate;
