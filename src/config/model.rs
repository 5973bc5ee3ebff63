// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::{ExecutorConfig, RetryPolicy};
use crate::model::{ExecutionMode, TaskType};
use crate::pool::AgentSpec;

/// Workflow file exactly as read from TOML, before any checks.
///
/// ```toml
/// [workflow]
/// id = "release"
/// timeout_secs = 36000
///
/// [executor]
/// max_concurrency = 4
///
/// [retry]
/// initial_delay_ms = 1000
///
/// [[agent]]
/// id = "builder-1"
/// capabilities = ["rust"]
///
/// [task.build]
/// capabilities = ["rust"]
/// duration_secs = 1800
/// after = ["fetch"]
/// payload = { cmd = "cargo build" }
/// ```
///
/// Every section except `[task.*]` is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkflowFile {
    #[serde(default)]
    pub workflow: WorkflowSection,

    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub retry: RetrySection,

    /// `[[agent]]` entries registered with the in-memory pool.
    #[serde(default)]
    pub agent: Vec<AgentSpec>,

    /// All tasks from `[task.<id>]`, keyed by task id.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Workflow file that passed the file-level checks in `validate.rs`.
///
/// Graph-level checks (cycles, dangling `after`) are left to
/// [`crate::dag::validate`], which runs on the built [`Workflow`](crate::model::Workflow).
#[derive(Debug, Clone)]
pub struct WorkflowFile {
    pub workflow: WorkflowSection,
    pub executor: ExecutorSection,
    pub retry: RetrySection,
    pub agent: Vec<AgentSpec>,
    pub task: BTreeMap<String, TaskConfig>,
}

impl WorkflowFile {
    pub(crate) fn new_unchecked(raw: RawWorkflowFile) -> Self {
        Self {
            workflow: raw.workflow,
            executor: raw.executor,
            retry: raw.retry,
            agent: raw.agent,
            task: raw.task,
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_concurrency: self.executor.max_concurrency,
            retry: RetryPolicy {
                initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
                backoff_multiplier: self.retry.backoff_multiplier,
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
            },
            ..ExecutorConfig::default()
        }
    }
}

/// `[workflow]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSection {
    #[serde(default = "default_workflow_id")]
    pub id: String,

    /// Defaults to the id.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_creator")]
    pub creator: String,

    #[serde(default = "default_priority")]
    pub priority: u8,

    /// Overall budget, compared against the summed task estimates.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per task, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub execution_mode: ExecutionMode,
}

fn default_workflow_id() -> String {
    "workflow".to_string()
}

fn default_creator() -> String {
    "agentdag".to_string()
}

fn default_priority() -> u8 {
    5
}

fn default_timeout_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_retries() -> u32 {
    3
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            id: default_workflow_id(),
            name: None,
            description: String::new(),
            creator: default_creator(),
            priority: default_priority(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            execution_mode: ExecutionMode::default(),
        }
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    /// Maximum number of tasks of one level running at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    4
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// `[task.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Human-readable name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,

    /// `development`, `review`, `testing`, `documentation` or any other label.
    #[serde(default, rename = "type")]
    pub task_type: TaskType,

    /// Capabilities an agent must offer to run the task.
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Estimated duration used for the timeout check and critical path.
    #[serde(default)]
    pub duration_secs: u64,

    #[serde(default = "default_cores")]
    pub cores: u32,

    #[serde(default)]
    pub memory_mb: u64,

    #[serde(default)]
    pub accelerator: bool,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Handed to the runner untouched. The shell runner reads `cmd` and
    /// `timeout_secs` from it.
    #[serde(default)]
    pub payload: Option<toml::Table>,
}

fn default_cores() -> u32 {
    1
}
