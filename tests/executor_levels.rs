// tests/executor_levels.rs

mod common;
use crate::common::builders::{dev_task, example_workflow, fan_out, rust_pool, sequential_chain};
use crate::common::{Harness, ScriptedRunner, fast_retry, init_tracing, with_timeout};

use std::time::Duration;

use agentdag::exec::{ExecutorConfig, TaskError};
use agentdag::memory::{EpisodeOutcome, RecordStatus};
use agentdag::model::{ExecutionMode, TaskOutcome, TaskStatus, WorkflowBuilder, WorkflowStatus};
use agentdag::pool::AgentPool;

#[tokio::test]
async fn release_flow_runs_level_by_level() {
    init_tracing();
    let harness = Harness::new(rust_pool(2, 1), ScriptedRunner::new());
    let mut workflow = example_workflow();

    let result = with_timeout(harness.run(&mut workflow)).await;

    assert!(result.success);
    assert_eq!(result.status, WorkflowStatus::Completed);
    assert_eq!(result.metrics.completed_tasks, 5);
    assert_eq!(result.metrics.levels_executed, 4);
    assert_eq!(result.metrics.success_rate(), 1.0);
    for id in ["A", "B", "C", "D", "E"] {
        assert_eq!(workflow.status_of(id), Some(TaskStatus::Completed));
        assert!(result.result_of(id).unwrap().agent.is_some());
    }

    let started = harness.runner.started_tasks();
    let pos = |id: &str| started.iter().position(|t| t == id).unwrap();
    assert!(pos("A") < pos("B"));
    assert!(pos("B") < pos("C") && pos("B") < pos("E"));
    assert!(pos("C") < pos("D") && pos("E") < pos("D"), "level barrier before D");
}

#[tokio::test]
async fn sequential_level_stops_at_first_failure() {
    let runner =
        ScriptedRunner::new().always_fail("Y", TaskError::InvalidInput("bad payload".into()), 1);
    let harness = Harness::with_config(rust_pool(1, 1), runner, fast_retry());
    let mut workflow = WorkflowBuilder::new("seq", "Sequential")
        .execution_mode(ExecutionMode::Sequential)
        .task(dev_task("X", 10))
        .task(dev_task("Y", 10))
        .task(dev_task("Z", 10))
        .build();

    let result = with_timeout(harness.run(&mut workflow)).await;

    assert!(!result.success);
    assert_eq!(result.failed_tasks, vec!["Y"]);
    assert_eq!(workflow.status_of("X"), Some(TaskStatus::Completed));
    assert_eq!(workflow.status_of("Y"), Some(TaskStatus::Failed));
    assert_eq!(workflow.status_of("Z"), Some(TaskStatus::Pending));
    assert!(result.result_of("Z").is_none());
    assert_eq!(result.metrics.pending_tasks, 1);
    assert_eq!(harness.runner.started_tasks(), vec!["X", "Y"]);
}

#[tokio::test]
async fn sequential_runner_panic_fails_only_that_task() {
    init_tracing();
    let runner = ScriptedRunner::new().panic_on("Y");
    let harness = Harness::with_config(rust_pool(3, 1), runner, fast_retry());
    let mut workflow = WorkflowBuilder::new("seq-panic", "Sequential panic")
        .execution_mode(ExecutionMode::Sequential)
        .task(dev_task("X", 10))
        .task(dev_task("Y", 10))
        .task(dev_task("Z", 10))
        .build();

    let result = with_timeout(harness.run(&mut workflow)).await;

    assert!(!result.success);
    assert_eq!(result.failed_tasks, vec!["Y"]);
    assert_eq!(workflow.status_of("X"), Some(TaskStatus::Completed));
    assert_eq!(workflow.status_of("Y"), Some(TaskStatus::Failed));
    assert_eq!(workflow.status_of("Z"), Some(TaskStatus::Pending));

    let y = result.result_of("Y").unwrap();
    assert_eq!(y.outcome, TaskOutcome::Error);
    assert_eq!(y.attempts, 1, "a panic is not retried");
    assert!(y.error.as_deref().unwrap().contains("panicked"));
    assert_eq!(harness.runner.calls_for("Y").len(), 1);

    // Bookkeeping still ran for the panicking task.
    assert_eq!(harness.memory.open_sessions(), 0);
    assert_eq!(
        harness.memory.record_titled("Y").unwrap().status,
        RecordStatus::Failed
    );
    let episodes = harness.memory.episodes();
    assert_eq!(episodes.len(), 2);
    assert!(
        episodes
            .iter()
            .any(|e| e.task_id == "Y" && e.outcome == EpisodeOutcome::Failure)
    );
    assert_eq!(harness.pool.statistics().active_assignments, 0);
}

#[tokio::test]
async fn parallel_runner_panic_leaves_siblings_alone() {
    let runner = ScriptedRunner::new()
        .with_delay(Duration::from_millis(10))
        .panic_on("b");
    let harness = Harness::with_config(rust_pool(3, 1), runner, fast_retry());
    let mut workflow = fan_out(&["a", "b", "c"]);

    let result = with_timeout(harness.run(&mut workflow)).await;

    assert_eq!(result.status, WorkflowStatus::Failed);
    assert_eq!(result.failed_tasks, vec!["b"]);
    assert_eq!(workflow.status_of("a"), Some(TaskStatus::Completed));
    assert_eq!(workflow.status_of("c"), Some(TaskStatus::Completed));
    assert_eq!(result.result_of("b").unwrap().outcome, TaskOutcome::Error);

    assert_eq!(harness.memory.open_sessions(), 0);
    assert_eq!(
        harness.memory.record_titled("b").unwrap().status,
        RecordStatus::Failed
    );
    assert_eq!(harness.memory.episodes().len(), 3);
    assert_eq!(harness.pool.statistics().active_assignments, 0);
}

#[tokio::test]
async fn failure_cancels_every_later_level() {
    let runner = ScriptedRunner::new().always_fail("two", TaskError::AgentFailure("exit 1".into()), 1);
    let harness = Harness::with_config(rust_pool(1, 1), runner, fast_retry());
    let mut workflow = sequential_chain(&["one", "two", "three", "four"]);

    let result = with_timeout(harness.run(&mut workflow)).await;

    assert_eq!(result.status, WorkflowStatus::Failed);
    assert_eq!(result.cancelled_tasks, vec!["three", "four"]);
    assert_eq!(workflow.status_of("three"), Some(TaskStatus::Cancelled));
    assert_eq!(workflow.status_of("four"), Some(TaskStatus::Cancelled));
    assert_eq!(result.metrics.levels_executed, 2);
    assert!(harness.runner.calls_for("three").is_empty());
}

#[tokio::test]
async fn parallel_siblings_finish_despite_a_failure() {
    let runner = ScriptedRunner::new()
        .with_delay(Duration::from_millis(20))
        .always_fail("Q", TaskError::InvalidInput("no".into()), 1);
    let harness = Harness::with_config(rust_pool(3, 1), runner, fast_retry());
    let mut workflow = WorkflowBuilder::new("par", "Parallel")
        .task(dev_task("P", 10))
        .task(dev_task("Q", 10))
        .task(dev_task("R", 10))
        .task(dev_task("S", 10).after("P"))
        .build();

    let result = with_timeout(harness.run(&mut workflow)).await;

    assert_eq!(result.failed_tasks, vec!["Q"]);
    assert_eq!(workflow.status_of("P"), Some(TaskStatus::Completed));
    assert_eq!(workflow.status_of("R"), Some(TaskStatus::Completed));
    assert_eq!(workflow.status_of("S"), Some(TaskStatus::Cancelled));
    assert_eq!(result.metrics.completed_tasks, 2);
    assert_eq!(result.metrics.failed_tasks, 1);
    assert_eq!(result.metrics.cancelled_tasks, 1);
}

#[tokio::test(start_paused = true)]
async fn parallel_level_is_bounded_by_max_concurrency() {
    let runner = ScriptedRunner::new().with_delay(Duration::from_millis(100));
    let config = ExecutorConfig {
        max_concurrency: 2,
        ..fast_retry()
    };
    let harness = Harness::with_config(rust_pool(8, 1), runner, config);
    let mut workflow = fan_out(&["a", "b", "c", "d", "e", "f"]);

    let result = with_timeout(harness.run(&mut workflow)).await;

    assert!(result.success);
    assert_eq!(harness.runner.peak_concurrency(), 2);
}

#[tokio::test(start_paused = true)]
async fn tasks_wait_for_a_busy_agent() {
    let runner = ScriptedRunner::new().with_delay(Duration::from_millis(50));
    let harness = Harness::with_config(rust_pool(1, 1), runner, fast_retry());
    let mut workflow = fan_out(&["a", "b", "c"]);

    let result = with_timeout(harness.run(&mut workflow)).await;

    assert!(result.success);
    assert_eq!(harness.runner.peak_concurrency(), 1);
    assert!(
        result
            .task_results
            .values()
            .all(|r| r.agent.as_deref() == Some("agent-1"))
    );
}

#[tokio::test]
async fn rerunning_resets_previous_statuses() {
    let harness = Harness::with_config(rust_pool(1, 1), ScriptedRunner::new(), fast_retry());
    let mut workflow = sequential_chain(&["one", "two"]);

    let first = with_timeout(harness.run(&mut workflow)).await;
    let second = with_timeout(harness.run(&mut workflow)).await;

    assert!(first.success && second.success);
    assert_eq!(harness.runner.calls().len(), 4);
}
