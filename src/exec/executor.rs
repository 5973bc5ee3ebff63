// src/exec/executor.rs

//! Level-by-level workflow execution.
//!
//! The executor walks an [`ExecutionSchedule`] one level at a time with a
//! full barrier between levels:
//!
//! - a parallel level dispatches every task at once (bounded by
//!   `max_concurrency`) and waits for all of them, even after one failed;
//! - a sequential level runs tasks in order and stops at the first failure,
//!   leaving the rest of that level `Pending`;
//! - once anything failed, every later level is marked `Cancelled`.
//!
//! Per task the executor leases an agent from the pool, opens a workspace
//! session and a task record in the memory bridge, runs the retry loop
//! around the [`TaskRunner`], then merges and closes the session, stores an
//! episode and releases the agent. The lease is released on every exit path.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Notify, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::dag::{ExecutionLevel, ExecutionSchedule};
use crate::memory::{
    Episode, EpisodeOutcome, EpisodeType, MemoryBridge, MergeStrategy, RecordId, RecordMetadata,
    RecordStatus, SessionScope, TaskDefinition,
};
use crate::model::{
    ExecutionMetrics, TaskOutcome, TaskResult, TaskStatus, TaskType, Workflow, WorkflowResult,
    WorkflowStatus,
};
use crate::pool::{AgentPool, TaskRequirements};
use crate::types::{AgentId, TaskId};

use super::backend::{TaskContext, TaskOutput, TaskRunner};
use super::error::TaskError;
use super::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Upper bound on tasks running at the same time within one level.
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    pub merge_strategy: MergeStrategy,
    /// How often a task waiting for agent capacity re-checks the pool when
    /// no release has been observed.
    pub acquire_poll_interval: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            retry: RetryPolicy::default(),
            merge_strategy: MergeStrategy::Auto,
            acquire_poll_interval: Duration::from_millis(100),
        }
    }
}

/// Owned snapshot of one task, enough to run it on another tokio task.
#[derive(Debug, Clone)]
struct TaskJob {
    task_id: TaskId,
    name: String,
    task_type: TaskType,
    payload: serde_json::Value,
    requirements: TaskRequirements,
    planned_agent: Option<AgentId>,
    estimated_duration: Duration,
}

/// Pool assignment that is released when dropped.
struct AgentLease {
    pool: Arc<dyn AgentPool>,
    released: Arc<Notify>,
    agent: AgentId,
    task: TaskId,
}

impl AgentLease {
    fn agent(&self) -> &AgentId {
        &self.agent
    }
}

impl Drop for AgentLease {
    fn drop(&mut self) {
        if let Err(err) = self.pool.release_task(&self.agent, &self.task) {
            warn!(task = %self.task, agent = %self.agent, error = %err, "failed to release agent");
        }
        self.released.notify_waiters();
    }
}

/// State shared by every task of one execution.
struct Dispatcher {
    workflow_id: String,
    pool: Arc<dyn AgentPool>,
    memory: Arc<dyn MemoryBridge>,
    runner: Arc<dyn TaskRunner>,
    retry: RetryPolicy,
    merge_strategy: MergeStrategy,
    max_attempts: u32,
    poll_interval: Duration,
    released: Arc<Notify>,
}

impl Dispatcher {
    /// Assign the task to an agent, preferring the planned one.
    ///
    /// Waits while every capable agent is busy; fails once no registered
    /// agent can run the task at all.
    async fn acquire_agent(&self, job: &TaskJob) -> Result<AgentLease, TaskError> {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(planned) = &job.planned_agent {
                match self.pool.assign_task(planned, &job.task_id) {
                    Ok(()) => return Ok(self.lease(planned.clone(), job)),
                    Err(err) => {
                        debug!(task = %job.task_id, agent = %planned, error = %err, "planned agent unavailable")
                    }
                }
            }

            if let Some(agent) = self.pool.find_suitable_agent(&job.requirements) {
                match self.pool.assign_task(&agent.id, &job.task_id) {
                    Ok(()) => return Ok(self.lease(agent.id, job)),
                    // Lost a race with a sibling task; look again.
                    Err(err) => {
                        debug!(task = %job.task_id, agent = %agent.id, error = %err, "assignment raced");
                        continue;
                    }
                }
            }

            if !self.pool.can_satisfy(&job.requirements) {
                return Err(TaskError::NoSuitableAgent(format!(
                    "no registered agent offers {:?}{}",
                    job.requirements.capabilities,
                    if job.requirements.accelerator {
                        " with an accelerator"
                    } else {
                        ""
                    }
                )));
            }

            debug!(task = %job.task_id, "all capable agents busy; waiting for a release");
            let _ = tokio::time::timeout(self.poll_interval, notified).await;
        }
    }

    /// One runner call on its own tokio task, so a panicking runner turns into
    /// a `System` error and the session and record still get closed.
    async fn attempt(&self, ctx: TaskContext) -> Result<TaskOutput, TaskError> {
        let runner = Arc::clone(&self.runner);
        let task_id = ctx.task_id.clone();
        match tokio::spawn(async move { runner.run(ctx).await }).await {
            Ok(result) => result,
            Err(err) => {
                error!(task = %task_id, error = %err, "task runner panicked");
                Err(TaskError::System(format!("task runner panicked: {err}")))
            }
        }
    }

    fn lease(&self, agent: AgentId, job: &TaskJob) -> AgentLease {
        AgentLease {
            pool: Arc::clone(&self.pool),
            released: Arc::clone(&self.released),
            agent,
            task: job.task_id.clone(),
        }
    }

    async fn run_task(self: Arc<Self>, job: TaskJob) -> TaskResult {
        let started = Instant::now();

        let lease = match self.acquire_agent(&job).await {
            Ok(lease) => lease,
            Err(err) => {
                error!(task = %job.task_id, error = %err, "could not acquire an agent");
                return failed_result(&job, err, 0, None, started.elapsed());
            }
        };
        let agent = lease.agent().clone();
        info!(task = %job.task_id, agent = %agent, "task started");

        let record = self.open_record(&job).await;

        let scope = SessionScope {
            paths: vec![format!("workflows/{}/tasks/{}", self.workflow_id, job.task_id)],
            read_only_paths: vec![format!("workflows/{}", self.workflow_id)],
        };
        let session = match self.memory.create_session(&agent, scope).await {
            Ok(session) => session,
            Err(err) => {
                let err = TaskError::ServiceUnavailable(format!("could not open workspace: {err}"));
                error!(task = %job.task_id, error = %err, "task failed before its first attempt");
                let elapsed = started.elapsed();
                self.close_record(record.as_ref(), &job, false, elapsed, Some(err.to_string()))
                    .await;
                return failed_result(&job, err, 0, Some(agent), elapsed);
            }
        };

        let outcome = self
            .retry
            .run(self.max_attempts, |attempt| {
                let ctx = TaskContext {
                    workflow_id: self.workflow_id.clone(),
                    task_id: job.task_id.clone(),
                    name: job.name.clone(),
                    task_type: job.task_type.clone(),
                    payload: job.payload.clone(),
                    agent: agent.clone(),
                    session: session.to_string(),
                    attempt,
                };
                debug!(task = %job.task_id, attempt, "running attempt");
                self.attempt(ctx)
            })
            .await;
        let elapsed = started.elapsed();

        match self.memory.merge_session(&session, self.merge_strategy).await {
            Ok(report) => debug!(
                task = %job.task_id,
                version = report.new_version,
                changes = report.changes_merged,
                "merged workspace"
            ),
            Err(err) => warn!(task = %job.task_id, error = %err, "failed to merge workspace"),
        }
        if let Err(err) = self.memory.close_session(session, &agent).await {
            warn!(task = %job.task_id, error = %err, "failed to close workspace");
        }

        let (result, affected) = match outcome.result {
            Ok(output) => {
                let TaskOutput {
                    value,
                    affected_entities,
                } = output;
                info!(task = %job.task_id, attempts = outcome.attempts, "task completed");
                (
                    TaskResult {
                        task_id: job.task_id.clone(),
                        outcome: TaskOutcome::Success,
                        output: value,
                        error: None,
                        duration: elapsed,
                        attempts: outcome.attempts,
                        agent: Some(agent.clone()),
                    },
                    affected_entities,
                )
            }
            Err(err) => {
                error!(task = %job.task_id, attempts = outcome.attempts, error = %err, "task failed");
                (
                    failed_result(&job, err, outcome.attempts, Some(agent.clone()), elapsed),
                    Vec::new(),
                )
            }
        };

        self.store_episode(&job, &result, &agent, affected).await;
        self.close_record(
            record.as_ref(),
            &job,
            result.is_success(),
            elapsed,
            result.error.clone(),
        )
        .await;

        drop(lease);
        result
    }

    async fn open_record(&self, job: &TaskJob) -> Option<RecordId> {
        let definition = TaskDefinition {
            title: job.task_id.clone(),
            description: job.name.clone(),
            workspace_id: Some(self.workflow_id.clone()),
            estimated_hours: Some(job.estimated_duration.as_secs_f64() / 3600.0),
        };
        let id = match self.memory.create_task_record(definition).await {
            Ok(id) => id,
            Err(err) => {
                warn!(task = %job.task_id, error = %err, "failed to create task record");
                return None;
            }
        };
        if let Err(err) = self
            .memory
            .update_task_record(&id, RecordStatus::InProgress, RecordMetadata::default())
            .await
        {
            warn!(task = %job.task_id, error = %err, "failed to update task record");
        }
        Some(id)
    }

    async fn close_record(
        &self,
        record: Option<&RecordId>,
        job: &TaskJob,
        success: bool,
        elapsed: Duration,
        notes: Option<String>,
    ) {
        let Some(id) = record else {
            return;
        };
        let status = if success {
            RecordStatus::Completed
        } else {
            RecordStatus::Failed
        };
        let metadata = RecordMetadata {
            duration: Some(elapsed),
            notes,
        };
        if let Err(err) = self.memory.update_task_record(id, status, metadata).await {
            warn!(task = %job.task_id, error = %err, "failed to update task record");
        }
    }

    async fn store_episode(
        &self,
        job: &TaskJob,
        result: &TaskResult,
        agent: &AgentId,
        affected_entities: Vec<String>,
    ) {
        let episode = Episode {
            episode_type: EpisodeType::Task,
            task_id: job.task_id.clone(),
            description: format!("{} ({})", job.name, job.task_type),
            agent_id: agent.clone(),
            outcome: if result.is_success() {
                EpisodeOutcome::Success
            } else {
                EpisodeOutcome::Failure
            },
            duration: result.duration,
            attempts: result.attempts,
            affected_entities,
            error: result.error.clone(),
            created_at: Utc::now(),
        };
        if let Err(err) = self.memory.store_episode(episode).await {
            warn!(task = %job.task_id, error = %err, "failed to store episode");
        }
    }
}

fn failed_result(
    job: &TaskJob,
    err: TaskError,
    attempts: u32,
    agent: Option<AgentId>,
    duration: Duration,
) -> TaskResult {
    TaskResult {
        task_id: job.task_id.clone(),
        outcome: err.outcome(),
        output: None,
        error: Some(err.to_string()),
        duration,
        attempts,
        agent,
    }
}

fn panicked_result(job: &TaskJob, err: &JoinError) -> TaskResult {
    error!(task = %job.task_id, error = %err, "task panicked");
    failed_result(
        job,
        TaskError::System(format!("task panicked: {err}")),
        0,
        None,
        Duration::ZERO,
    )
}

/// Runs schedules against an agent pool, a memory bridge and a task runner.
pub struct WorkflowExecutor {
    pool: Arc<dyn AgentPool>,
    memory: Arc<dyn MemoryBridge>,
    runner: Arc<dyn TaskRunner>,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    pub fn new(
        pool: Arc<dyn AgentPool>,
        memory: Arc<dyn MemoryBridge>,
        runner: Arc<dyn TaskRunner>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            pool,
            memory,
            runner,
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute `schedule` for `workflow`.
    ///
    /// Task statuses are written back into `workflow`. Task failures never
    /// escape as errors: they are part of the returned [`WorkflowResult`].
    pub async fn execute(&self, workflow: &mut Workflow, schedule: &ExecutionSchedule) -> WorkflowResult {
        let started = Instant::now();
        workflow.reset_statuses();

        let dispatcher = Arc::new(Dispatcher {
            workflow_id: workflow.id.clone(),
            pool: Arc::clone(&self.pool),
            memory: Arc::clone(&self.memory),
            runner: Arc::clone(&self.runner),
            retry: self.config.retry,
            merge_strategy: self.config.merge_strategy,
            max_attempts: workflow.metadata.max_retries.max(1),
            poll_interval: self.config.acquire_poll_interval,
            released: Arc::new(Notify::new()),
        });

        info!(
            workflow = %workflow.id,
            levels = schedule.levels.len(),
            tasks = schedule.task_count(),
            "starting workflow execution"
        );

        let mut results: BTreeMap<TaskId, TaskResult> = BTreeMap::new();
        let mut failed_tasks: Vec<TaskId> = Vec::new();
        let mut cancelled_tasks: Vec<TaskId> = Vec::new();
        let mut levels_executed = 0;

        for level in &schedule.levels {
            if !failed_tasks.is_empty() {
                for task_id in &level.tasks {
                    set_status(workflow, task_id, TaskStatus::Cancelled);
                    cancelled_tasks.push(task_id.clone());
                }
                debug!(level = level.index, tasks = ?level.tasks, "level cancelled");
                continue;
            }

            info!(
                level = level.index,
                tasks = ?level.tasks,
                parallel = level.parallel,
                "executing level"
            );
            levels_executed += 1;

            let level_results = if level.parallel {
                self.run_parallel(&dispatcher, workflow, schedule, level).await
            } else {
                self.run_sequential(&dispatcher, workflow, schedule, level).await
            };

            for result in level_results {
                let status = if result.is_success() {
                    TaskStatus::Completed
                } else {
                    failed_tasks.push(result.task_id.clone());
                    TaskStatus::Failed
                };
                set_status(workflow, &result.task_id, status);
                results.insert(result.task_id.clone(), result);
            }
        }

        let task_statuses: BTreeMap<TaskId, TaskStatus> = workflow
            .tasks
            .iter()
            .map(|t| (t.id.clone(), t.status))
            .collect();
        let metrics = collect_metrics(&task_statuses, &results, levels_executed, started.elapsed());
        let success = failed_tasks.is_empty();
        let status = if success {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Failed
        };

        info!(
            workflow = %workflow.id,
            %status,
            completed = metrics.completed_tasks,
            failed = metrics.failed_tasks,
            cancelled = metrics.cancelled_tasks,
            elapsed_ms = metrics.elapsed.as_millis() as u64,
            "workflow execution finished"
        );

        WorkflowResult {
            workflow_id: workflow.id.clone(),
            success,
            status,
            task_results: results,
            failed_tasks,
            cancelled_tasks,
            task_statuses,
            metrics,
        }
    }

    async fn run_sequential(
        &self,
        dispatcher: &Arc<Dispatcher>,
        workflow: &mut Workflow,
        schedule: &ExecutionSchedule,
        level: &ExecutionLevel,
    ) -> Vec<TaskResult> {
        let mut results = Vec::with_capacity(level.tasks.len());
        for task_id in &level.tasks {
            let Some(job) = dispatch(workflow, schedule, task_id) else {
                continue;
            };
            let fallback = job.clone();
            let result = match tokio::spawn(Arc::clone(dispatcher).run_task(job)).await {
                Ok(result) => result,
                Err(err) => panicked_result(&fallback, &err),
            };
            let failed = !result.is_success();
            results.push(result);
            if failed {
                debug!(level = level.index, task = %task_id, "sequential level stopped at failure");
                break;
            }
        }
        results
    }

    async fn run_parallel(
        &self,
        dispatcher: &Arc<Dispatcher>,
        workflow: &mut Workflow,
        schedule: &ExecutionSchedule,
        level: &ExecutionLevel,
    ) -> Vec<TaskResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut join_set: JoinSet<TaskResult> = JoinSet::new();
        let mut spawned: HashMap<tokio::task::Id, TaskJob> = HashMap::new();

        for task_id in &level.tasks {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let Some(job) = dispatch(workflow, schedule, task_id) else {
                continue;
            };
            let dispatcher = Arc::clone(dispatcher);
            let fallback = job.clone();
            let handle = join_set.spawn(async move {
                let result = dispatcher.run_task(job).await;
                drop(permit);
                result
            });
            spawned.insert(handle.id(), fallback);
        }

        let mut results = Vec::with_capacity(spawned.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(err) => {
                    let Some(job) = spawned.get(&err.id()) else {
                        error!(error = %err, "unknown task panicked");
                        continue;
                    };
                    results.push(panicked_result(job, &err));
                }
            }
        }

        // Keep level order in the result list regardless of completion order.
        results.sort_by_key(|r| level.tasks.iter().position(|t| *t == r.task_id));
        results
    }
}

/// Move a task to `Running` and snapshot it for execution.
fn dispatch(workflow: &mut Workflow, schedule: &ExecutionSchedule, task_id: &str) -> Option<TaskJob> {
    let Some(task) = workflow.task(task_id) else {
        warn!(task = %task_id, "scheduled task is not part of the workflow; skipping");
        return None;
    };
    let job = TaskJob {
        task_id: task.id.clone(),
        name: task.name.clone(),
        task_type: task.task_type.clone(),
        payload: task.payload.clone(),
        requirements: task.requirements(),
        planned_agent: schedule.allocation.agent_for(task_id).cloned(),
        estimated_duration: task.estimated_duration,
    };

    set_status(workflow, task_id, TaskStatus::Scheduled);
    set_status(workflow, task_id, TaskStatus::Running);
    Some(job)
}

fn set_status(workflow: &mut Workflow, task_id: &str, status: TaskStatus) {
    if let Err(err) = workflow.transition(task_id, status) {
        warn!(error = %err, "ignoring illegal status transition");
    }
}

fn collect_metrics(
    statuses: &BTreeMap<TaskId, TaskStatus>,
    results: &BTreeMap<TaskId, TaskResult>,
    levels_executed: usize,
    elapsed: Duration,
) -> ExecutionMetrics {
    let count = |wanted: TaskStatus| statuses.values().filter(|s| **s == wanted).count();
    ExecutionMetrics {
        total_tasks: statuses.len(),
        completed_tasks: count(TaskStatus::Completed),
        failed_tasks: count(TaskStatus::Failed),
        cancelled_tasks: count(TaskStatus::Cancelled),
        pending_tasks: count(TaskStatus::Pending),
        total_attempts: results.values().map(|r| r.attempts).sum(),
        levels_executed,
        elapsed,
    }
}
