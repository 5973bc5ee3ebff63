// src/dag/scheduler.rs

//! Turns a validated workflow into an [`ExecutionSchedule`].
//!
//! A schedule is a plan, not a reservation:
//! - the topological order (Kahn's algorithm, seeded in declaration order),
//! - execution levels (`level(t) = 1 + max(level(dep))`, roots at 0),
//! - the critical path over estimated durations,
//! - a task -> agent allocation picked from the pool without reserving
//!   capacity; the executor re-applies it when each task starts.
//!
//! Apart from the allocation, a schedule is a pure function of the graph.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::dag::critical_path::{CriticalPath, compute_critical_path};
use crate::dag::error::SchedulingError;
use crate::dag::graph::DagGraph;
use crate::model::{ExecutionMode, Task, Workflow};
use crate::pool::AgentPool;
use crate::types::{AgentId, TaskId};

/// Tasks whose dependencies all live in earlier levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLevel {
    pub index: usize,
    /// Declaration order of the workflow.
    pub tasks: Vec<TaskId>,
    /// Dispatch every task at once instead of one after another.
    pub parallel: bool,
}

/// Planned task -> agent mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceAllocation {
    assignments: BTreeMap<TaskId, AgentId>,
}

impl ResourceAllocation {
    pub fn agent_for(&self, task: &str) -> Option<&AgentId> {
        self.assignments.get(task)
    }

    pub fn insert(&mut self, task: impl Into<TaskId>, agent: impl Into<AgentId>) {
        self.assignments.insert(task.into(), agent.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskId, &AgentId)> {
        self.assignments.iter()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSchedule {
    pub topological_order: Vec<TaskId>,
    pub levels: Vec<ExecutionLevel>,
    pub critical_path: CriticalPath,
    pub allocation: ResourceAllocation,
}

impl ExecutionSchedule {
    /// Index of the level holding `task`.
    pub fn level_of(&self, task: &str) -> Option<usize> {
        self.levels
            .iter()
            .find(|l| l.tasks.iter().any(|t| t == task))
            .map(|l| l.index)
    }

    pub fn task_count(&self) -> usize {
        self.levels.iter().map(|l| l.tasks.len()).sum()
    }

    /// Minimum possible makespan given unlimited agents.
    pub fn estimated_duration(&self) -> Duration {
        self.critical_path.duration
    }
}

/// Kahn's algorithm. Roots are seeded in declaration order and dependents are
/// released in declaration order, so the result is deterministic.
pub fn topological_order(graph: &DagGraph) -> Result<Vec<TaskId>, SchedulingError> {
    let mut in_degree: HashMap<&str, usize> = graph
        .tasks()
        .map(|t| (t, graph.dependencies_of(t).len()))
        .collect();

    let mut ready: VecDeque<&str> = graph
        .tasks()
        .filter(|t| in_degree.get(t).copied() == Some(0))
        .collect();

    let mut order: Vec<TaskId> = Vec::with_capacity(graph.len());
    while let Some(task) = ready.pop_front() {
        order.push(task.to_string());
        for dependent in graph.dependents_of(task) {
            if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(dependent.as_str());
                }
            }
        }
    }

    if order.len() != graph.len() {
        let remaining: Vec<TaskId> = graph
            .tasks()
            .filter(|t| in_degree.get(t).is_some_and(|d| *d > 0))
            .map(str::to_string)
            .collect();
        return Err(SchedulingError::CycleDetected { remaining });
    }

    Ok(order)
}

/// Group tasks into levels. `order` must be a topological order of `graph`.
pub fn compute_levels(graph: &DagGraph, order: &[TaskId], mode: ExecutionMode) -> Vec<ExecutionLevel> {
    let mut level_of: HashMap<&str, usize> = HashMap::with_capacity(order.len());
    for task in order {
        let level = graph
            .dependencies_of(task)
            .iter()
            .filter_map(|dep| level_of.get(dep.as_str()))
            .map(|l| l + 1)
            .max()
            .unwrap_or(0);
        level_of.insert(task.as_str(), level);
    }

    let depth = level_of.values().max().map_or(0, |m| m + 1);
    let mut buckets: Vec<Vec<TaskId>> = vec![Vec::new(); depth];
    for task in graph.tasks() {
        if let Some(&level) = level_of.get(task) {
            buckets[level].push(task.to_string());
        }
    }

    buckets
        .into_iter()
        .enumerate()
        .map(|(index, tasks)| ExecutionLevel {
            index,
            parallel: mode == ExecutionMode::Parallel && tasks.len() > 1,
            tasks,
        })
        .collect()
}

/// Pick an agent for every task, level by level.
pub fn allocate(
    workflow: &Workflow,
    levels: &[ExecutionLevel],
    pool: &dyn AgentPool,
) -> Result<ResourceAllocation, SchedulingError> {
    let tasks = tasks_by_id(workflow);
    let mut allocation = ResourceAllocation::default();

    for task_id in levels.iter().flat_map(|l| l.tasks.iter()) {
        let Some(task) = tasks.get(task_id.as_str()) else {
            continue;
        };
        let requirements = task.requirements();
        match pool.find_suitable_agent(&requirements) {
            Some(agent) => {
                debug!(task = %task_id, agent = %agent.id, load = agent.current_load, "planned agent");
                allocation.insert(task_id.clone(), agent.id);
            }
            None => {
                return Err(SchedulingError::NoSuitableAgent {
                    task: task_id.clone(),
                    required: requirements.capabilities.into_iter().collect(),
                    accelerator: requirements.accelerator,
                });
            }
        }
    }

    Ok(allocation)
}

/// Build a full schedule for `workflow` against `pool`.
pub fn create_schedule(
    workflow: &Workflow,
    pool: &dyn AgentPool,
) -> Result<ExecutionSchedule, SchedulingError> {
    let graph = DagGraph::from_workflow(workflow);
    let topological_order = topological_order(&graph)?;
    let levels = compute_levels(&graph, &topological_order, workflow.metadata.execution_mode);

    let durations: HashMap<&str, Duration> = workflow
        .tasks
        .iter()
        .rev()
        .map(|t| (t.id.as_str(), t.estimated_duration))
        .collect();
    let critical_path = compute_critical_path(&graph, &topological_order, &durations);
    let allocation = allocate(workflow, &levels, pool)?;

    info!(
        workflow = %workflow.id,
        tasks = topological_order.len(),
        levels = levels.len(),
        critical_path = ?critical_path.tasks,
        estimated_secs = critical_path.duration.as_secs(),
        "schedule created"
    );

    Ok(ExecutionSchedule {
        topological_order,
        levels,
        critical_path,
        allocation,
    })
}

/// Scheduler bound to one agent pool.
#[derive(Clone)]
pub struct Scheduler {
    pool: Arc<dyn AgentPool>,
}

impl Scheduler {
    pub fn new(pool: Arc<dyn AgentPool>) -> Self {
        Self { pool }
    }

    pub fn create_schedule(&self, workflow: &Workflow) -> Result<ExecutionSchedule, SchedulingError> {
        create_schedule(workflow, self.pool.as_ref())
    }

    /// Check that every planned agent is still registered.
    ///
    /// Useful when a schedule was created ahead of time and the pool may
    /// have changed since.
    pub fn verify_allocation(&self, schedule: &ExecutionSchedule) -> Result<(), SchedulingError> {
        for (task, agent) in schedule.allocation.iter() {
            if self.pool.agent(agent).is_none() {
                return Err(SchedulingError::AgentNotFound {
                    task: task.clone(),
                    agent: agent.clone(),
                });
            }
        }
        Ok(())
    }
}

/// First declaration wins when ids are duplicated.
fn tasks_by_id(workflow: &Workflow) -> HashMap<&str, &Task> {
    workflow
        .tasks
        .iter()
        .rev()
        .map(|t| (t.id.as_str(), t))
        .collect()
}
