// src/pool/mod.rs

//! Agent pool abstraction.
//!
//! The scheduler and the executor only ever see an `Arc<dyn AgentPool>`.
//! Implementations must be safe to share between concurrently running tasks:
//! `assign_task` / `release_task` are the only mutations and must be
//! serialised internally.
//!
//! [`InMemoryAgentPool`] is the implementation used by the CLI and tests.

pub mod in_memory;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AgentId, Capability, TaskId};

pub use in_memory::{AgentSpec, InMemoryAgentPool};

/// What a task needs from an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRequirements {
    pub capabilities: BTreeSet<Capability>,
    pub accelerator: bool,
}

/// Snapshot of an agent as returned by capability lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRef {
    pub id: AgentId,
    pub capabilities: BTreeSet<Capability>,
    pub current_load: usize,
    pub max_concurrent_tasks: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolStatistics {
    pub total_agents: usize,
    /// Agents with no task assigned.
    pub idle_agents: usize,
    /// Agents with at least one task but spare capacity.
    pub busy_agents: usize,
    /// Agents at their concurrency limit.
    pub saturated_agents: usize,
    pub active_assignments: usize,
    pub total_capacity: usize,
    /// Lifetime counters.
    pub tasks_assigned: u64,
    pub tasks_released: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("agent '{0}' is not registered")]
    AgentNotFound(AgentId),

    #[error("agent '{agent}' is at capacity ({max} concurrent tasks)")]
    AtCapacity { agent: AgentId, max: usize },

    #[error("task '{task}' is not assigned to agent '{agent}'")]
    NotAssigned { agent: AgentId, task: TaskId },

    #[error("agent '{0}' is already registered")]
    DuplicateAgent(AgentId),
}

pub trait AgentPool: Send + Sync {
    /// An agent whose capabilities cover `requirements` and that has spare
    /// capacity, lowest current load first. Nothing is reserved.
    fn find_suitable_agent(&self, requirements: &TaskRequirements) -> Option<AgentRef>;

    /// Whether any registered agent could ever run a task with these
    /// requirements, ignoring current load.
    fn can_satisfy(&self, requirements: &TaskRequirements) -> bool;

    /// Look up a registered agent by id.
    fn agent(&self, id: &str) -> Option<AgentRef>;

    fn assign_task(&self, agent: &str, task: &str) -> Result<(), PoolError>;

    fn release_task(&self, agent: &str, task: &str) -> Result<(), PoolError>;

    fn statistics(&self) -> PoolStatistics;
}
