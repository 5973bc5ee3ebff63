// src/exec/error.rs

use thiserror::Error;

use crate::model::TaskOutcome;

/// Why a single task attempt failed.
///
/// The classification decides whether the executor retries: only transient
/// transport and availability problems are worth another attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("agent failure: {0}")]
    AgentFailure(String),

    #[error("system error: {0}")]
    System(String),

    #[error("no suitable agent: {0}")]
    NoSuitableAgent(String),
}

impl TaskError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TaskError::Network(_) | TaskError::Timeout(_) | TaskError::ServiceUnavailable(_)
        )
    }

    /// How a task that ends with this error is reported.
    pub fn outcome(&self) -> TaskOutcome {
        match self {
            TaskError::System(_) | TaskError::NoSuitableAgent(_) => TaskOutcome::Error,
            _ => TaskOutcome::Failure,
        }
    }
}
