// src/model/task.rs

//! A single unit of work inside a workflow.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pool::TaskRequirements;
use crate::types::{Capability, TaskId};

/// Kind of work a task represents.
///
/// The scheduler never looks at this; it is carried through to runners and
/// to the memory bridge so episodes can be classified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
    #[default]
    Development,
    Review,
    Testing,
    Documentation,
    Custom(String),
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Development => f.write_str("development"),
            TaskType::Review => f.write_str("review"),
            TaskType::Testing => f.write_str("testing"),
            TaskType::Documentation => f.write_str("documentation"),
            TaskType::Custom(label) => f.write_str(label),
        }
    }
}

impl FromStr for TaskType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "development" | "dev" => TaskType::Development,
            "review" => TaskType::Review,
            "testing" | "test" => TaskType::Testing,
            "documentation" | "docs" => TaskType::Documentation,
            _ => TaskType::Custom(s.trim().to_string()),
        })
    }
}

impl From<String> for TaskType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }
}

impl From<TaskType> for String {
    fn from(t: TaskType) -> Self {
        t.to_string()
    }
}

/// Lifecycle of a task during one execution.
///
/// ```text
/// Pending -> Scheduled -> Running -> Completed | Failed | Cancelled
/// Pending -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a legal step of the state machine.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Scheduled)
                | (Pending, Cancelled)
                | (Scheduled, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task '{task}' cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub task: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Hardware needed to run a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// Must be at least 1 for a valid workflow.
    pub cores: u32,
    pub memory_mb: u64,
    pub accelerator: bool,
}

impl Default for ResourceRequirements {
    fn default() -> Self {
        Self {
            cores: 1,
            memory_mb: 0,
            accelerator: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub task_type: TaskType,
    /// Opaque input handed to the runner.
    pub payload: serde_json::Value,
    pub capabilities: BTreeSet<Capability>,
    pub estimated_duration: Duration,
    pub resources: ResourceRequirements,
    pub status: TaskStatus,
}

impl Task {
    /// Create a pending task with no capabilities, zero duration and default
    /// resources. Use [`TaskBuilder`](crate::model::TaskBuilder) for anything
    /// more involved.
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            task_type: TaskType::default(),
            payload: serde_json::Value::Null,
            capabilities: BTreeSet::new(),
            estimated_duration: Duration::ZERO,
            resources: ResourceRequirements::default(),
            status: TaskStatus::Pending,
        }
    }

    /// What an agent must offer to run this task.
    pub fn requirements(&self) -> TaskRequirements {
        TaskRequirements {
            capabilities: self.capabilities.clone(),
            accelerator: self.resources.accelerator,
        }
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                task: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_allowed() {
        let mut task = Task::new("t", "T");
        task.transition(TaskStatus::Scheduled).unwrap();
        task.transition(TaskStatus::Running).unwrap();
        task.transition(TaskStatus::Completed).unwrap();
        assert!(task.status.is_terminal());
    }

    #[test]
    fn running_cannot_be_skipped() {
        let mut task = Task::new("t", "T");
        let err = task.transition(TaskStatus::Completed).unwrap_err();
        assert_eq!(err.from, TaskStatus::Pending);
        assert_eq!(task.status, TaskStatus::Pending);

        task.transition(TaskStatus::Scheduled).unwrap();
        assert!(task.transition(TaskStatus::Failed).is_err());
    }

    #[test]
    fn pending_task_can_be_cancelled_directly() {
        let mut task = Task::new("t", "T");
        task.transition(TaskStatus::Cancelled).unwrap();
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::Running));
    }

    #[test]
    fn task_type_parses_known_and_custom_labels() {
        assert_eq!("Review".parse::<TaskType>().unwrap(), TaskType::Review);
        assert_eq!(
            "deploy".parse::<TaskType>().unwrap(),
            TaskType::Custom("deploy".into())
        );
        assert_eq!(TaskType::Custom("deploy".into()).to_string(), "deploy");
    }
}
