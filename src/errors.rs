// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Each layer has its own error enum next to the code that produces it
//! (`dag::ValidationError`, `dag::SchedulingError`, `exec::TaskError`, ...).
//! [`AgentdagError`] is the umbrella used by the config loader and by the
//! top-level `run` entry point.

use thiserror::Error;

use crate::dag::{SchedulingError, ValidationErrors};
use crate::engine::OrchestratorError;
use crate::pool::PoolError;

#[derive(Error, Debug)]
pub enum AgentdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Workflow validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Scheduling failed: {0}")]
    Scheduling(#[from] SchedulingError),

    #[error("Agent pool error: {0}")]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<OrchestratorError> for AgentdagError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Validation(errors) => AgentdagError::Validation(errors),
            OrchestratorError::Scheduling(err) => AgentdagError::Scheduling(err),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AgentdagError>;
