// src/engine/orchestrator.rs

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::dag::{ExecutionSchedule, Scheduler, SchedulingError, ValidationErrors, validate};
use crate::exec::{ExecutorConfig, TaskRunner, WorkflowExecutor};
use crate::memory::MemoryBridge;
use crate::model::{Workflow, WorkflowResult};
use crate::pool::AgentPool;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("workflow is invalid: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("workflow cannot be scheduled: {0}")]
    Scheduling(#[from] SchedulingError),
}

/// Validate -> schedule -> execute, against one pool and memory bridge.
pub struct Orchestrator {
    scheduler: Scheduler,
    executor: WorkflowExecutor,
}

impl Orchestrator {
    pub fn new(
        pool: Arc<dyn AgentPool>,
        memory: Arc<dyn MemoryBridge>,
        runner: Arc<dyn TaskRunner>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(Arc::clone(&pool)),
            executor: WorkflowExecutor::new(pool, memory, runner, config),
        }
    }

    /// Validate and schedule without running anything.
    pub fn plan(&self, workflow: &Workflow) -> Result<ExecutionSchedule, OrchestratorError> {
        if let Err(errors) = validate(workflow) {
            warn!(workflow = %workflow.id, %errors, "workflow rejected");
            return Err(errors.into());
        }
        Ok(self.scheduler.create_schedule(workflow)?)
    }

    /// Run the whole pipeline.
    pub async fn run(&self, workflow: &mut Workflow) -> Result<WorkflowResult, OrchestratorError> {
        let schedule = self.plan(workflow)?;
        Ok(self.executor.execute(workflow, &schedule).await)
    }

    /// Execute a schedule produced earlier by [`plan`](Self::plan).
    ///
    /// The workflow is re-validated and every planned agent must still be
    /// registered.
    pub async fn execute_plan(
        &self,
        workflow: &mut Workflow,
        schedule: &ExecutionSchedule,
    ) -> Result<WorkflowResult, OrchestratorError> {
        validate(workflow)?;
        self.scheduler.verify_allocation(schedule)?;
        info!(workflow = %workflow.id, "executing precomputed schedule");
        Ok(self.executor.execute(workflow, schedule).await)
    }
}
