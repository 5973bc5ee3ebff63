// src/memory/mod.rs

//! Memory bridge: the executor's view of the shared memory service.
//!
//! The executor opens one isolated workspace session per task, merges and
//! closes it when the task is done, stores an episode describing what
//! happened and keeps a task record in sync with the task's outcome.
//!
//! How the service isolates or merges workspaces is not our concern; the
//! executor only talks to the [`MemoryBridge`] trait.
//! [`InMemoryMemoryBridge`] records every call so tests can inspect them.

pub mod in_memory;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AgentId, TaskId};

pub use in_memory::InMemoryMemoryBridge;

/// Handle to an isolated workspace.
///
/// Deliberately not `Clone`: whoever opened the session owns it until it is
/// closed, and closing consumes the handle.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeId(pub String);

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which parts of shared memory a session may see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionScope {
    pub paths: Vec<String>,
    pub read_only_paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    #[default]
    Auto,
    Manual,
    Theirs,
    Mine,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MergeStrategy::Auto => "auto",
            MergeStrategy::Manual => "manual",
            MergeStrategy::Theirs => "theirs",
            MergeStrategy::Mine => "mine",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub changes_merged: usize,
    pub conflicts_resolved: usize,
    pub new_version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeType {
    Task,
    Feature,
    Bugfix,
    Refactor,
    Exploration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeOutcome {
    Success,
    Partial,
    Failure,
    Abandoned,
}

/// Structured record of one task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub episode_type: EpisodeType,
    pub task_id: TaskId,
    pub description: String,
    pub agent_id: AgentId,
    pub outcome: EpisodeOutcome,
    pub duration: Duration,
    pub attempts: u32,
    /// Entities the task touched, as reported by the runner.
    pub affected_entities: Vec<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for a new task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub title: String,
    pub description: String,
    pub workspace_id: Option<String>,
    pub estimated_hours: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    InProgress,
    #[serde(rename = "done")]
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub duration: Option<Duration>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("memory service unavailable: {0}")]
    Unavailable(String),

    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("task record '{0}' not found")]
    RecordNotFound(RecordId),
}

#[async_trait]
pub trait MemoryBridge: Send + Sync {
    async fn create_session(
        &self,
        owner: &AgentId,
        scope: SessionScope,
    ) -> Result<SessionId, MemoryError>;

    async fn merge_session(
        &self,
        session: &SessionId,
        strategy: MergeStrategy,
    ) -> Result<MergeReport, MemoryError>;

    async fn close_session(&self, session: SessionId, owner: &AgentId) -> Result<(), MemoryError>;

    async fn store_episode(&self, episode: Episode) -> Result<EpisodeId, MemoryError>;

    async fn create_task_record(&self, definition: TaskDefinition) -> Result<RecordId, MemoryError>;

    async fn update_task_record(
        &self,
        id: &RecordId,
        status: RecordStatus,
        metadata: RecordMetadata,
    ) -> Result<(), MemoryError>;
}
