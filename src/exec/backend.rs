// src/exec/backend.rs

//! Pluggable task runner abstraction.
//!
//! The executor owns scheduling, retries, agent leases and memory
//! bookkeeping; the actual work of a task is delegated to a [`TaskRunner`].
//! Production code uses [`CommandRunner`](super::CommandRunner), which runs
//! the task's `cmd` payload through the shell. Tests plug in a scripted fake.

use crate::model::TaskType;
use crate::types::{AgentId, BoxFuture, TaskId};

use super::error::TaskError;

/// Everything a runner gets to know about one attempt.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub workflow_id: String,
    pub task_id: TaskId,
    pub name: String,
    pub task_type: TaskType,
    pub payload: serde_json::Value,
    /// Agent the task was assigned to for this execution.
    pub agent: AgentId,
    /// Isolated workspace session opened for this task.
    pub session: String,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Successful result of an attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOutput {
    pub value: Option<serde_json::Value>,
    /// Entities the task touched; recorded in the task's episode.
    pub affected_entities: Vec<String>,
}

impl TaskOutput {
    pub fn value(value: serde_json::Value) -> Self {
        Self {
            value: Some(value),
            affected_entities: Vec::new(),
        }
    }
}

/// Trait abstracting how a task's work is performed.
///
/// Implementations must be shareable: the executor calls `run` concurrently
/// for every task of a parallel level.
pub trait TaskRunner: Send + Sync {
    fn run(&self, ctx: TaskContext) -> BoxFuture<'_, Result<TaskOutput, TaskError>>;
}
