// src/model/workflow.rs

//! The workflow: a task set plus the dependency map between tasks.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::task::{InvalidTransition, Task, TaskStatus};
use crate::types::TaskId;

static NO_DEPENDENCIES: BTreeSet<TaskId> = BTreeSet::new();

/// How levels holding more than one task are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Every task in a level is dispatched concurrently.
    #[default]
    Parallel,
    /// Tasks run one at a time and a level stops at its first failure.
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub priority: u8,
    /// Overall budget checked by the validator.
    pub timeout: Duration,
    /// Attempts per task, including the first one.
    pub max_retries: u32,
    pub execution_mode: ExecutionMode,
}

impl Default for WorkflowMetadata {
    fn default() -> Self {
        Self {
            creator: String::from("agentdag"),
            created_at: Utc::now(),
            priority: 5,
            timeout: Duration::from_secs(24 * 60 * 60),
            max_retries: 3,
            execution_mode: ExecutionMode::Parallel,
        }
    }
}

/// A set of tasks and the edges between them.
///
/// `dependencies[t]` lists the tasks `t` waits for. The task list keeps
/// declaration order, which the scheduler uses to order tasks inside a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tasks: Vec<Task>,
    pub dependencies: BTreeMap<TaskId, BTreeSet<TaskId>>,
    pub metadata: WorkflowMetadata,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            tasks: Vec::new(),
            dependencies: BTreeMap::new(),
            metadata: WorkflowMetadata::default(),
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Direct dependencies of `id` (empty if it has none or is unknown).
    pub fn dependencies_of(&self, id: &str) -> &BTreeSet<TaskId> {
        self.dependencies.get(id).unwrap_or(&NO_DEPENDENCIES)
    }

    /// Record that `task` waits for `dependency`.
    pub fn add_dependency(&mut self, task: impl Into<TaskId>, dependency: impl Into<TaskId>) {
        self.dependencies
            .entry(task.into())
            .or_default()
            .insert(dependency.into());
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.task(id).map(|t| t.status)
    }

    /// Apply a checked status transition to one task.
    ///
    /// Unknown ids are ignored and reported as `Ok(false)`.
    pub fn transition(&mut self, id: &str, next: TaskStatus) -> Result<bool, InvalidTransition> {
        match self.task_mut(id) {
            Some(task) => task.transition(next).map(|_| true),
            None => Ok(false),
        }
    }

    /// Put every task back to `Pending` before a fresh execution.
    pub fn reset_statuses(&mut self) {
        for task in &mut self.tasks {
            task.status = TaskStatus::Pending;
        }
    }

    /// Sum of every task's estimated duration.
    pub fn total_estimated_duration(&self) -> Duration {
        self.tasks
            .iter()
            .fold(Duration::ZERO, |acc, t| acc.saturating_add(t.estimated_duration))
    }

    /// Ids of all tasks, in declaration order.
    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.id.as_str())
    }
}
