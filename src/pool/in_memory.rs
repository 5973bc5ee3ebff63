// src/pool/in_memory.rs

//! Lock-guarded in-process agent pool.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use crate::pool::{AgentPool, AgentRef, PoolError, PoolStatistics, TaskRequirements};
use crate::types::{AgentId, Capability, TaskId};

/// Static description of an agent, as registered with the pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentSpec {
    pub id: AgentId,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    #[serde(default)]
    pub accelerator: bool,
}

fn default_max_concurrent_tasks() -> usize {
    1
}

impl AgentSpec {
    pub fn new<I, S>(id: impl Into<AgentId>, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Capability>,
    {
        Self {
            id: id.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            accelerator: false,
        }
    }

    pub fn with_capacity(mut self, max_concurrent_tasks: usize) -> Self {
        self.max_concurrent_tasks = max_concurrent_tasks;
        self
    }

    pub fn with_accelerator(mut self) -> Self {
        self.accelerator = true;
        self
    }

    fn covers(&self, requirements: &TaskRequirements) -> bool {
        (!requirements.accelerator || self.accelerator)
            && requirements.capabilities.is_subset(&self.capabilities)
    }
}

#[derive(Debug)]
struct AgentSlot {
    spec: AgentSpec,
    assigned: BTreeSet<TaskId>,
}

impl AgentSlot {
    fn has_capacity(&self) -> bool {
        self.assigned.len() < self.spec.max_concurrent_tasks
    }

    fn snapshot(&self) -> AgentRef {
        AgentRef {
            id: self.spec.id.clone(),
            capabilities: self.spec.capabilities.clone(),
            current_load: self.assigned.len(),
            max_concurrent_tasks: self.spec.max_concurrent_tasks,
        }
    }
}

#[derive(Debug, Default)]
struct PoolState {
    /// Keyed by id so iteration (and therefore tie-breaking) is stable.
    agents: BTreeMap<AgentId, AgentSlot>,
    by_capability: HashMap<Capability, BTreeSet<AgentId>>,
    tasks_assigned: u64,
    tasks_released: u64,
}

impl PoolState {
    /// Agents whose capability set is a superset of `required`.
    fn candidates<'a>(&'a self, required: &BTreeSet<Capability>) -> Vec<&'a AgentSlot> {
        let mut required = required.iter();
        let Some(first) = required.next() else {
            return self.agents.values().collect();
        };

        let Some(seed) = self.by_capability.get(first) else {
            return Vec::new();
        };

        seed.iter()
            .filter(|id| {
                required
                    .clone()
                    .all(|cap| self.by_capability.get(cap).is_some_and(|s| s.contains(*id)))
            })
            .filter_map(|id| self.agents.get(id))
            .collect()
    }
}

/// Agent pool backed by plain maps behind a single `RwLock`.
///
/// Lookups take the read lock; assign / release / register take the write
/// lock, which serialises every capacity change.
#[derive(Debug, Default)]
pub struct InMemoryAgentPool {
    state: RwLock<PoolState>,
}

impl InMemoryAgentPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from a list of agents, rejecting duplicate ids.
    pub fn with_agents(agents: impl IntoIterator<Item = AgentSpec>) -> Result<Self, PoolError> {
        let pool = Self::new();
        for agent in agents {
            pool.register(agent)?;
        }
        Ok(pool)
    }

    pub fn register(&self, spec: AgentSpec) -> Result<(), PoolError> {
        let mut state = self.state.write();
        if state.agents.contains_key(&spec.id) {
            return Err(PoolError::DuplicateAgent(spec.id));
        }

        for cap in &spec.capabilities {
            state
                .by_capability
                .entry(cap.clone())
                .or_default()
                .insert(spec.id.clone());
        }

        debug!(agent = %spec.id, capabilities = ?spec.capabilities, "registered agent");
        state.agents.insert(
            spec.id.clone(),
            AgentSlot {
                spec,
                assigned: BTreeSet::new(),
            },
        );
        Ok(())
    }

    /// Remove an agent. Tasks still assigned to it are forgotten.
    pub fn deregister(&self, agent: &str) -> Result<AgentSpec, PoolError> {
        let mut state = self.state.write();
        let slot = state
            .agents
            .remove(agent)
            .ok_or_else(|| PoolError::AgentNotFound(agent.to_string()))?;

        for cap in &slot.spec.capabilities {
            if let Some(ids) = state.by_capability.get_mut(cap) {
                ids.remove(agent);
            }
        }
        debug!(agent = %agent, "deregistered agent");
        Ok(slot.spec)
    }

    /// Current number of tasks assigned to `agent`.
    pub fn load_of(&self, agent: &str) -> Option<usize> {
        self.state.read().agents.get(agent).map(|s| s.assigned.len())
    }

    /// Tasks currently assigned to `agent`.
    pub fn assigned_tasks(&self, agent: &str) -> Vec<TaskId> {
        self.state
            .read()
            .agents
            .get(agent)
            .map(|s| s.assigned.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.state.read().agents.keys().cloned().collect()
    }
}

impl AgentPool for InMemoryAgentPool {
    fn find_suitable_agent(&self, requirements: &TaskRequirements) -> Option<AgentRef> {
        let state = self.state.read();
        state
            .candidates(&requirements.capabilities)
            .into_iter()
            .filter(|slot| slot.spec.covers(requirements) && slot.has_capacity())
            .min_by_key(|slot| slot.assigned.len())
            .map(AgentSlot::snapshot)
    }

    fn can_satisfy(&self, requirements: &TaskRequirements) -> bool {
        let state = self.state.read();
        state
            .candidates(&requirements.capabilities)
            .into_iter()
            .any(|slot| slot.spec.covers(requirements))
    }

    fn agent(&self, id: &str) -> Option<AgentRef> {
        self.state.read().agents.get(id).map(AgentSlot::snapshot)
    }

    fn assign_task(&self, agent: &str, task: &str) -> Result<(), PoolError> {
        let mut state = self.state.write();
        let slot = state
            .agents
            .get_mut(agent)
            .ok_or_else(|| PoolError::AgentNotFound(agent.to_string()))?;

        if slot.assigned.contains(task) {
            return Ok(());
        }
        if !slot.has_capacity() {
            return Err(PoolError::AtCapacity {
                agent: agent.to_string(),
                max: slot.spec.max_concurrent_tasks,
            });
        }

        slot.assigned.insert(task.to_string());
        let load = slot.assigned.len();
        state.tasks_assigned += 1;
        debug!(agent = %agent, task = %task, load, "assigned task");
        Ok(())
    }

    fn release_task(&self, agent: &str, task: &str) -> Result<(), PoolError> {
        let mut state = self.state.write();
        let slot = state
            .agents
            .get_mut(agent)
            .ok_or_else(|| PoolError::AgentNotFound(agent.to_string()))?;

        if !slot.assigned.remove(task) {
            return Err(PoolError::NotAssigned {
                agent: agent.to_string(),
                task: task.to_string(),
            });
        }
        let load = slot.assigned.len();
        state.tasks_released += 1;
        debug!(agent = %agent, task = %task, load, "released task");
        Ok(())
    }

    fn statistics(&self) -> PoolStatistics {
        let state = self.state.read();
        let mut stats = PoolStatistics {
            total_agents: state.agents.len(),
            tasks_assigned: state.tasks_assigned,
            tasks_released: state.tasks_released,
            ..PoolStatistics::default()
        };

        for slot in state.agents.values() {
            let load = slot.assigned.len();
            stats.active_assignments += load;
            stats.total_capacity += slot.spec.max_concurrent_tasks;
            if load == 0 {
                stats.idle_agents += 1;
            } else if slot.has_capacity() {
                stats.busy_agents += 1;
            } else {
                stats.saturated_agents += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reqs(caps: &[&str]) -> TaskRequirements {
        TaskRequirements {
            capabilities: caps.iter().map(|c| c.to_string()).collect(),
            accelerator: false,
        }
    }

    fn pool() -> InMemoryAgentPool {
        InMemoryAgentPool::with_agents([
            AgentSpec::new("dev-1", ["rust", "review"]).with_capacity(2),
            AgentSpec::new("dev-2", ["rust"]).with_capacity(1),
            AgentSpec::new("gpu-1", ["python", "ml"]).with_accelerator(),
        ])
        .unwrap()
    }

    #[test]
    fn capability_superset_is_required() {
        let pool = pool();
        let agent = pool.find_suitable_agent(&reqs(&["rust", "review"])).unwrap();
        assert_eq!(agent.id, "dev-1");
        assert!(pool.find_suitable_agent(&reqs(&["rust", "ml"])).is_none());
        assert!(!pool.can_satisfy(&reqs(&["go"])));
    }

    #[test]
    fn ties_break_on_lowest_load_then_id() {
        let pool = pool();
        assert_eq!(pool.find_suitable_agent(&reqs(&["rust"])).unwrap().id, "dev-1");

        pool.assign_task("dev-1", "t1").unwrap();
        assert_eq!(pool.find_suitable_agent(&reqs(&["rust"])).unwrap().id, "dev-2");
    }

    #[test]
    fn accelerator_requirement_filters_agents() {
        let pool = pool();
        let mut r = reqs(&["ml"]);
        r.accelerator = true;
        assert_eq!(pool.find_suitable_agent(&r).unwrap().id, "gpu-1");

        let mut r = reqs(&["rust"]);
        r.accelerator = true;
        assert!(!pool.can_satisfy(&r));
    }

    #[test]
    fn capacity_is_enforced_and_released() {
        let pool = pool();
        pool.assign_task("dev-2", "a").unwrap();
        let err = pool.assign_task("dev-2", "b").unwrap_err();
        assert!(matches!(err, PoolError::AtCapacity { max: 1, .. }));

        // Busy but still capable.
        assert!(pool.can_satisfy(&reqs(&["rust"])));

        pool.release_task("dev-2", "a").unwrap();
        pool.assign_task("dev-2", "b").unwrap();
        assert_eq!(pool.assigned_tasks("dev-2"), vec!["b".to_string()]);
    }

    #[test]
    fn unknown_agent_and_unassigned_task_are_errors() {
        let pool = pool();
        assert_eq!(
            pool.assign_task("ghost", "a"),
            Err(PoolError::AgentNotFound("ghost".into()))
        );
        assert!(matches!(
            pool.release_task("dev-1", "never"),
            Err(PoolError::NotAssigned { .. })
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let err = InMemoryAgentPool::with_agents([
            AgentSpec::new("a", ["x"]),
            AgentSpec::new("a", ["y"]),
        ])
        .unwrap_err();
        assert_eq!(err, PoolError::DuplicateAgent("a".into()));
    }

    #[test]
    fn statistics_track_load_buckets() {
        let pool = pool();
        pool.assign_task("dev-1", "a").unwrap();
        pool.assign_task("dev-2", "b").unwrap();
        pool.release_task("dev-2", "b").unwrap();
        pool.assign_task("dev-2", "c").unwrap();

        let stats = pool.statistics();
        assert_eq!(stats.total_agents, 3);
        assert_eq!(stats.idle_agents, 1);
        assert_eq!(stats.busy_agents, 1);
        assert_eq!(stats.saturated_agents, 1);
        assert_eq!(stats.active_assignments, 2);
        assert_eq!(stats.total_capacity, 4);
        assert_eq!(stats.tasks_assigned, 3);
        assert_eq!(stats.tasks_released, 1);
    }

    #[test]
    fn deregistered_agent_is_no_longer_found() {
        let pool = pool();
        pool.deregister("dev-1").unwrap();
        pool.deregister("dev-2").unwrap();
        assert!(!pool.can_satisfy(&reqs(&["rust"])));
        assert!(pool.load_of("dev-1").is_none());
    }
}
