#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use agentdag::model::{ExecutionMode, TaskBuilder, Workflow, WorkflowBuilder};
use agentdag::pool::{AgentSpec, InMemoryAgentPool};

/// The five-task release flow used across the scheduler and executor tests.
///
/// ```text
/// A (1800s) -> B (3600s) -> C (1800s) -> D (900s)
///                      \-> E (600s)
/// ```
///
/// Levels are `[A] [B] [C, E] [D]`; the critical path is `A B C D` (8100s).
pub fn example_workflow() -> Workflow {
    WorkflowBuilder::new("release", "Release flow")
        .timeout(Duration::from_secs(10 * 60 * 60))
        .task(dev_task("A", 1800))
        .task(dev_task("B", 3600).after("A"))
        .task(dev_task("C", 1800).after("B"))
        .task(dev_task("D", 900).after("C"))
        .task(dev_task("E", 600).after("B"))
        .build()
}

/// A linear chain `ids[0] -> ids[1] -> ...` run in sequential mode.
pub fn sequential_chain(ids: &[&str]) -> Workflow {
    let mut builder = WorkflowBuilder::new("chain", "Sequential chain")
        .execution_mode(ExecutionMode::Sequential);
    let mut prev: Option<&str> = None;
    for &id in ids {
        let mut task = dev_task(id, 60);
        if let Some(dep) = prev {
            task = task.after(dep);
        }
        builder = builder.task(task);
        prev = Some(id);
    }
    builder.build()
}

/// `ids` as independent siblings: a single level.
pub fn fan_out(ids: &[&str]) -> Workflow {
    ids.iter()
        .fold(WorkflowBuilder::new("fan-out", "Fan out"), |b, id| {
            b.task(dev_task(id, 60))
        })
        .build()
}

/// A task needing the `rust` capability, with the given estimate.
pub fn dev_task(id: &str, duration_secs: u64) -> TaskBuilder {
    TaskBuilder::new(id)
        .capability("rust")
        .duration_secs(duration_secs)
}

/// `count` agents named `agent-1..=count`, each offering `rust` and able to
/// take `capacity` tasks at once.
pub fn rust_pool(count: usize, capacity: usize) -> Arc<InMemoryAgentPool> {
    let specs = (1..=count)
        .map(|i| AgentSpec::new(format!("agent-{i}"), ["rust"]).with_capacity(capacity));
    Arc::new(InMemoryAgentPool::with_agents(specs).expect("unique agent ids"))
}
