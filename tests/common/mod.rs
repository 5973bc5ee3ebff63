#![allow(dead_code, unused_imports)]

pub use agentdag_test_utils::builders;
pub use agentdag_test_utils::fake_runner::{RunRecord, ScriptedRunner};
pub use agentdag_test_utils::{init_tracing, with_timeout};

use std::sync::Arc;
use std::time::Duration;

use agentdag::dag::ExecutionSchedule;
use agentdag::exec::{ExecutorConfig, RetryPolicy, WorkflowExecutor};
use agentdag::memory::InMemoryMemoryBridge;
use agentdag::model::{Workflow, WorkflowResult};
use agentdag::pool::InMemoryAgentPool;

/// Everything one executor test needs, with handles kept for inspection.
pub struct Harness {
    pub pool: Arc<InMemoryAgentPool>,
    pub memory: Arc<InMemoryMemoryBridge>,
    pub runner: Arc<ScriptedRunner>,
    pub executor: WorkflowExecutor,
}

impl Harness {
    pub fn new(pool: Arc<InMemoryAgentPool>, runner: ScriptedRunner) -> Self {
        Self::with_config(pool, runner, ExecutorConfig::default())
    }

    pub fn with_config(
        pool: Arc<InMemoryAgentPool>,
        runner: ScriptedRunner,
        config: ExecutorConfig,
    ) -> Self {
        let memory = Arc::new(InMemoryMemoryBridge::new());
        let runner = Arc::new(runner);
        let executor = WorkflowExecutor::new(
            pool.clone(),
            memory.clone(),
            runner.clone(),
            config,
        );
        Self {
            pool,
            memory,
            runner,
            executor,
        }
    }

    pub fn schedule(&self, workflow: &Workflow) -> ExecutionSchedule {
        agentdag::dag::create_schedule(workflow, self.pool.as_ref()).expect("schedulable workflow")
    }

    pub async fn run(&self, workflow: &mut Workflow) -> WorkflowResult {
        let schedule = self.schedule(workflow);
        self.executor.execute(workflow, &schedule).await
    }
}

/// Retry policy with millisecond pauses, for tests that only care about
/// attempt counts.
pub fn fast_retry() -> ExecutorConfig {
    ExecutorConfig {
        retry: RetryPolicy {
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(10),
        },
        acquire_poll_interval: Duration::from_millis(5),
        ..ExecutorConfig::default()
    }
}
