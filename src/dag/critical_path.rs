// src/dag/critical_path.rs

//! Critical path analysis over estimated task durations.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::Serialize;

use crate::dag::graph::DagGraph;
use crate::types::TaskId;

/// Timing of one task in an unconstrained schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskTiming {
    pub earliest_start: Duration,
    pub latest_finish: Duration,
    pub slack: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CriticalPath {
    /// Zero-slack tasks, ordered by earliest start.
    pub tasks: Vec<TaskId>,
    /// Length of the longest dependency chain: the shortest possible makespan.
    pub duration: Duration,
    pub timings: BTreeMap<TaskId, TaskTiming>,
}

impl CriticalPath {
    pub fn contains(&self, task: &str) -> bool {
        self.tasks.iter().any(|t| t == task)
    }

    pub fn timing_of(&self, task: &str) -> Option<&TaskTiming> {
        self.timings.get(task)
    }
}

/// Two-pass critical path computation.
///
/// `order` must be a topological order of `graph`. Tasks missing from
/// `durations` count as zero length.
pub fn compute_critical_path(
    graph: &DagGraph,
    order: &[TaskId],
    durations: &HashMap<&str, Duration>,
) -> CriticalPath {
    let duration_of = |task: &str| durations.get(task).copied().unwrap_or_default();

    // Forward pass.
    let mut earliest_start: HashMap<&str, Duration> = HashMap::with_capacity(order.len());
    for task in order {
        let start = graph
            .dependencies_of(task)
            .iter()
            .map(|dep| {
                earliest_start.get(dep.as_str()).copied().unwrap_or_default()
                    + duration_of(dep.as_str())
            })
            .max()
            .unwrap_or_default();
        earliest_start.insert(task.as_str(), start);
    }

    let total = order
        .iter()
        .map(|t| earliest_start[t.as_str()] + duration_of(t.as_str()))
        .max()
        .unwrap_or_default();

    // Backward pass.
    let mut latest_finish: HashMap<&str, Duration> = HashMap::with_capacity(order.len());
    for task in order.iter().rev() {
        let finish = graph
            .dependents_of(task)
            .iter()
            .map(|dep| {
                latest_finish
                    .get(dep.as_str())
                    .copied()
                    .unwrap_or(total)
                    .saturating_sub(duration_of(dep.as_str()))
            })
            .min()
            .unwrap_or(total);
        latest_finish.insert(task.as_str(), finish);
    }

    let mut timings = BTreeMap::new();
    let mut critical: Vec<(Duration, TaskId)> = Vec::new();
    for task in order {
        let es = earliest_start[task.as_str()];
        let lf = latest_finish[task.as_str()];
        let slack = lf.saturating_sub(es).saturating_sub(duration_of(task.as_str()));
        if slack.is_zero() {
            critical.push((es, task.clone()));
        }
        timings.insert(
            task.clone(),
            TaskTiming {
                earliest_start: es,
                latest_finish: lf,
                slack,
            },
        );
    }

    // Stable: ties on earliest start keep topological order.
    critical.sort_by_key(|(es, _)| *es);

    CriticalPath {
        tasks: critical.into_iter().map(|(_, t)| t).collect(),
        duration: total,
        timings,
    }
}
