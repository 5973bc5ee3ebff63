// src/model/result.rs

//! Per-task and per-workflow execution results.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::task::TaskStatus;
use crate::types::{AgentId, TaskId};

/// How a task ended.
///
/// `Failure` means the work itself failed; `Error` means the task could not
/// be run properly (no agent, unclassified system fault).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    Success,
    Failure,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub outcome: TaskOutcome,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration: Duration,
    /// Number of runner invocations (0 if no agent could be acquired).
    pub attempts: u32,
    pub agent: Option<AgentId>,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        self.outcome == TaskOutcome::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Completed,
    Failed,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::Completed => f.write_str("completed"),
            WorkflowStatus::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub cancelled_tasks: usize,
    /// Tasks left untouched, e.g. after a sequential level stopped early.
    pub pending_tasks: usize,
    pub total_attempts: u32,
    pub levels_executed: usize,
    pub elapsed: Duration,
}

impl ExecutionMetrics {
    /// Fraction of all tasks that completed, in `[0.0, 1.0]`.
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / self.total_tasks as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_id: String,
    /// True iff no task ended in `Failed`.
    pub success: bool,
    pub status: WorkflowStatus,
    pub task_results: BTreeMap<TaskId, TaskResult>,
    /// In the order the failures were observed.
    pub failed_tasks: Vec<TaskId>,
    pub cancelled_tasks: Vec<TaskId>,
    /// Final status of every task in the workflow.
    pub task_statuses: BTreeMap<TaskId, TaskStatus>,
    pub metrics: ExecutionMetrics,
}

impl WorkflowResult {
    pub fn result_of(&self, task: &str) -> Option<&TaskResult> {
        self.task_results.get(task)
    }

    pub fn status_of(&self, task: &str) -> Option<TaskStatus> {
        self.task_statuses.get(task).copied()
    }
}
