use std::collections::{HashMap, HashSet};
use std::time::Duration;

use proptest::prelude::*;

use agentdag::dag::scheduler::topological_order;
use agentdag::dag::{DagGraph, SchedulingError, ValidationError, create_schedule, validate};
use agentdag::model::{TaskBuilder, Workflow, WorkflowBuilder};
use agentdag::pool::{AgentSpec, InMemoryAgentPool};

// Strategy to generate an acyclic workflow.
// We ensure acyclicity by only allowing task N to depend on tasks 0..N-1.
fn dag_workflow_strategy(max_tasks: usize) -> impl Strategy<Value = Workflow> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        let deps_strat = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        );
        let durations_strat = proptest::collection::vec(0u64..5_000, num_tasks);

        (deps_strat, durations_strat).prop_map(move |(raw_deps, durations)| {
            let mut builder = WorkflowBuilder::new("prop", "Property")
                .timeout(Duration::from_secs(u64::MAX / 4));
            for (i, potential_deps) in raw_deps.into_iter().enumerate() {
                let mut task = TaskBuilder::new(format!("task_{i}"))
                    .capability("rust")
                    .duration_secs(durations[i]);

                // Sanitize dependencies: only allow deps < i
                let valid: HashSet<usize> = if i == 0 {
                    HashSet::new()
                } else {
                    potential_deps.into_iter().map(|d| d % i).collect()
                };
                for dep in valid {
                    task = task.after(format!("task_{dep}"));
                }
                builder = builder.task(task);
            }
            builder.build()
        })
    })
}

fn pool() -> InMemoryAgentPool {
    InMemoryAgentPool::with_agents([AgentSpec::new("agent", ["rust"])]).unwrap()
}

/// Longest chain ending at each task, computed independently of the
/// scheduler: earliest finish = max(dependency finishes) + own duration.
fn earliest_finishes(workflow: &Workflow) -> HashMap<String, Duration> {
    let mut finish: HashMap<String, Duration> = HashMap::new();
    // Tasks were declared so that every dependency precedes its dependent.
    for task in &workflow.tasks {
        let start = workflow
            .dependencies_of(&task.id)
            .iter()
            .map(|d| finish[d])
            .max()
            .unwrap_or_default();
        finish.insert(task.id.clone(), start + task.estimated_duration);
    }
    finish
}

proptest! {
    #[test]
    fn acyclic_workflows_validate(workflow in dag_workflow_strategy(12)) {
        prop_assert!(validate(&workflow).is_ok());
    }

    #[test]
    fn topological_order_covers_every_task_once(workflow in dag_workflow_strategy(12)) {
        let graph = DagGraph::from_workflow(&workflow);
        let order = topological_order(&graph).unwrap();

        prop_assert_eq!(order.len(), workflow.tasks.len());
        let unique: HashSet<&String> = order.iter().collect();
        prop_assert_eq!(unique.len(), order.len());

        let pos: HashMap<&str, usize> =
            order.iter().enumerate().map(|(i, t)| (t.as_str(), i)).collect();
        for (task, deps) in &workflow.dependencies {
            for dep in deps {
                prop_assert!(pos[dep.as_str()] < pos[task.as_str()]);
            }
        }
    }

    #[test]
    fn dependencies_live_in_strictly_earlier_levels(workflow in dag_workflow_strategy(12)) {
        let schedule = create_schedule(&workflow, &pool()).unwrap();

        prop_assert_eq!(schedule.task_count(), workflow.tasks.len());
        for (task, deps) in &workflow.dependencies {
            let level = schedule.level_of(task).unwrap();
            for dep in deps {
                prop_assert!(schedule.level_of(dep).unwrap() < level);
            }
        }
        // Every non-root task sits right after its deepest dependency.
        for task in &workflow.tasks {
            let level = schedule.level_of(&task.id).unwrap();
            let expected = workflow
                .dependencies_of(&task.id)
                .iter()
                .map(|d| schedule.level_of(d).unwrap() + 1)
                .max()
                .unwrap_or(0);
            prop_assert_eq!(level, expected);
        }
    }

    #[test]
    fn critical_path_length_is_the_longest_chain(workflow in dag_workflow_strategy(12)) {
        let schedule = create_schedule(&workflow, &pool()).unwrap();
        let expected = earliest_finishes(&workflow)
            .into_values()
            .max()
            .unwrap_or_default();

        prop_assert_eq!(schedule.critical_path.duration, expected);

        let sum: Duration = schedule
            .critical_path
            .tasks
            .iter()
            .filter_map(|t| workflow.task(t))
            .map(|t| t.estimated_duration)
            .sum();
        prop_assert!(sum >= expected);
    }

    #[test]
    fn removing_a_slack_task_keeps_the_critical_length(
        workflow in dag_workflow_strategy(12),
        pick in any::<usize>(),
    ) {
        let schedule = create_schedule(&workflow, &pool()).unwrap();

        let slack: Vec<String> = workflow
            .tasks
            .iter()
            .filter(|t| !schedule.critical_path.contains(&t.id))
            .map(|t| t.id.clone())
            .collect();
        prop_assume!(!slack.is_empty());
        let removed = slack[pick % slack.len()].clone();

        // Dependents of the removed task inherit its dependencies, so every
        // chain through it survives minus its own duration.
        let inherited = workflow.dependencies_of(&removed).clone();
        let mut trimmed = workflow.clone();
        trimmed.tasks.retain(|t| t.id != removed);
        trimmed.dependencies.remove(&removed);
        for deps in trimmed.dependencies.values_mut() {
            if deps.remove(&removed) {
                deps.extend(inherited.iter().cloned());
            }
        }
        prop_assert!(validate(&trimmed).is_ok());

        let again = create_schedule(&trimmed, &pool()).unwrap();
        prop_assert_eq!(again.critical_path.duration, schedule.critical_path.duration);
    }

    #[test]
    fn a_back_edge_is_reported_as_a_cycle(
        workflow in dag_workflow_strategy(12),
        a in any::<usize>(),
        b in any::<usize>(),
    ) {
        let n = workflow.tasks.len();
        prop_assume!(n >= 2);
        let lo = a % (n - 1);
        let hi = lo + 1 + b % (n - 1 - lo);
        let (lo, hi) = (format!("task_{lo}"), format!("task_{hi}"));

        // `hi` after `lo` and `lo` after `hi` closes a loop.
        let mut cyclic = workflow.clone();
        cyclic.add_dependency(hi.clone(), lo.clone());
        cyclic.add_dependency(lo.clone(), hi.clone());

        let errors = validate(&cyclic).unwrap_err().into_vec();
        let cycle = errors.iter().find_map(|e| match e {
            ValidationError::CycleDetected { task, path } => Some((task, path)),
            _ => None,
        });
        prop_assert!(cycle.is_some(), "no cycle in {:?}", errors);
        let (task, path) = cycle.unwrap();

        prop_assert!(path.len() >= 3);
        prop_assert_eq!(path.first(), Some(task));
        prop_assert_eq!(path.last(), Some(task));
        // Each step of the reported path is a real dependency edge.
        for pair in path.windows(2) {
            prop_assert!(cyclic.dependencies_of(&pair[0]).contains(&pair[1]));
        }

        match topological_order(&DagGraph::from_workflow(&cyclic)) {
            Err(SchedulingError::CycleDetected { remaining }) => {
                prop_assert!(remaining.contains(&lo));
                prop_assert!(remaining.contains(&hi));
            }
            other => prop_assert!(false, "expected CycleDetected, got {:?}", other),
        }
    }

    #[test]
    fn scheduling_twice_gives_the_same_plan(workflow in dag_workflow_strategy(10)) {
        let pool = pool();
        let first = create_schedule(&workflow, &pool).unwrap();
        let second = create_schedule(&workflow, &pool).unwrap();
        prop_assert_eq!(first, second);
    }
}
