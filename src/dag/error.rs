// src/dag/error.rs

//! Errors raised before any task runs.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::types::{AgentId, Capability, TaskId};

/// One problem found by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cycle detected involving task '{task}' ({})", .path.join(" -> "))]
    CycleDetected {
        task: TaskId,
        /// Tasks on the cycle, starting and ending with `task`.
        path: Vec<TaskId>,
    },

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    DependencyNotFound { task: TaskId, dependency: TaskId },

    #[error("dependency map has an entry for unknown task '{task}'")]
    UnknownTask { task: TaskId },

    #[error("task id '{task}' is declared more than once")]
    DuplicateTask { task: TaskId },

    #[error("task '{task}' has invalid requirements: {reason}")]
    InvalidRequirements { task: TaskId, reason: String },

    #[error(
        "workflow timeout of {}s is shorter than the summed task estimates of {}s",
        .budget.as_secs(),
        .required.as_secs()
    )]
    TimeoutTooShort { required: Duration, budget: Duration },
}

impl ValidationError {
    /// Task the error points at, if it is about a single task.
    pub fn task(&self) -> Option<&str> {
        match self {
            ValidationError::CycleDetected { task, .. }
            | ValidationError::DependencyNotFound { task, .. }
            | ValidationError::UnknownTask { task }
            | ValidationError::DuplicateTask { task }
            | ValidationError::InvalidRequirements { task, .. } => Some(task),
            ValidationError::TimeoutTooShort { .. } => None,
        }
    }
}

/// Every problem found in one validation pass, in check order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub(crate) fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulingError {
    #[error(
        "no suitable agent for task '{task}' (capabilities {required:?}, accelerator: {accelerator})"
    )]
    NoSuitableAgent {
        task: TaskId,
        required: Vec<Capability>,
        accelerator: bool,
    },

    #[error("agent '{agent}' planned for task '{task}' is not registered")]
    AgentNotFound { task: TaskId, agent: AgentId },

    #[error("dependency cycle left {} task(s) unscheduled: {}", .remaining.len(), .remaining.join(", "))]
    CycleDetected { remaining: Vec<TaskId> },
}
