// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod memory;
pub mod model;
pub mod pool;
pub mod types;

use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::{build_workflow, load_and_validate};
use crate::dag::{DagGraph, ExecutionSchedule};
use crate::engine::{Orchestrator, OrchestratorError};
use crate::errors::AgentdagError;
use crate::exec::CommandRunner;
use crate::memory::InMemoryMemoryBridge;
use crate::model::{Workflow, WorkflowResult};
use crate::pool::InMemoryAgentPool;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - workflow file loading
/// - the in-memory agent pool and memory bridge
/// - validation + scheduling
/// - execution through the shell command runner
pub async fn run(args: CliArgs) -> Result<()> {
    let file = load_and_validate(&args.config)?;
    let mut workflow = build_workflow(&file)?;

    if args.dot {
        print!("{}", DagGraph::from_workflow(&workflow).to_dot());
        return Ok(());
    }

    let pool = Arc::new(
        InMemoryAgentPool::with_agents(file.agent.iter().cloned()).map_err(AgentdagError::from)?,
    );
    let memory = Arc::new(InMemoryMemoryBridge::new());

    let mut exec_config = file.executor_config();
    if let Some(n) = args.max_concurrency {
        if n == 0 {
            bail!("--max-concurrency must be >= 1");
        }
        exec_config.max_concurrency = n;
    }

    let orchestrator = Orchestrator::new(pool, memory, Arc::new(CommandRunner::new()), exec_config);

    let schedule = match orchestrator.plan(&workflow) {
        Ok(schedule) => schedule,
        Err(OrchestratorError::Validation(errors)) => {
            eprintln!("workflow '{}' is invalid:", workflow.id);
            for error in errors.iter() {
                eprintln!("  - {error}");
            }
            return Err(AgentdagError::Validation(errors).into());
        }
        Err(err) => return Err(AgentdagError::from(err).into()),
    };

    if args.dry_run {
        print_dry_run(&workflow, &schedule);
        return Ok(());
    }

    info!(
        workflow = %workflow.id,
        tasks = schedule.task_count(),
        levels = schedule.levels.len(),
        "starting workflow"
    );
    let result = orchestrator
        .execute_plan(&mut workflow, &schedule)
        .await
        .map_err(AgentdagError::from)?;

    print_summary(&result);

    if !result.success {
        bail!(
            "workflow '{}' failed: {} task(s) failed",
            result.workflow_id,
            result.failed_tasks.len()
        );
    }
    Ok(())
}

/// Dry-run output: levels, agents and the critical path.
fn print_dry_run(workflow: &Workflow, schedule: &ExecutionSchedule) {
    println!("agentdag dry-run: {} ({})", workflow.name, workflow.id);
    println!(
        "  execution_mode = {:?}, max_retries = {}, timeout = {}s",
        workflow.metadata.execution_mode,
        workflow.metadata.max_retries,
        workflow.metadata.timeout.as_secs()
    );
    println!();

    println!("levels ({}):", schedule.levels.len());
    for level in &schedule.levels {
        let mode = if level.parallel { "parallel" } else { "sequential" };
        println!("  [{}] {mode}", level.index);
        for task in &level.tasks {
            let agent = schedule
                .allocation
                .agent_for(task)
                .map(String::as_str)
                .unwrap_or("-");
            let marker = if schedule.critical_path.contains(task) { " *" } else { "" };
            println!("      {task} -> {agent}{marker}");
        }
    }
    println!();

    println!(
        "critical path ({}s): {}",
        schedule.critical_path.duration.as_secs(),
        schedule.critical_path.tasks.join(" -> ")
    );

    debug!("dry-run complete (no execution)");
}

fn print_summary(result: &WorkflowResult) {
    let metrics = &result.metrics;
    println!("workflow {}: {}", result.workflow_id, result.status);
    println!(
        "  completed {}/{} ({:.0}%), failed {}, cancelled {}, pending {}",
        metrics.completed_tasks,
        metrics.total_tasks,
        metrics.success_rate() * 100.0,
        metrics.failed_tasks,
        metrics.cancelled_tasks,
        metrics.pending_tasks
    );
    println!(
        "  {} attempt(s) over {} level(s) in {:.1}s",
        metrics.total_attempts,
        metrics.levels_executed,
        metrics.elapsed.as_secs_f64()
    );
    for task in &result.failed_tasks {
        let reason = result
            .result_of(task)
            .and_then(|r| r.error.as_deref())
            .unwrap_or("unknown error");
        println!("  failed: {task}: {reason}");
    }
}
