use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentdag::exec::{TaskContext, TaskError, TaskOutput, TaskRunner};
use agentdag::types::{AgentId, BoxFuture, TaskId};
use tokio::time::Instant;
use tracing::debug;

/// One observed call to [`ScriptedRunner::run`].
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub task: TaskId,
    pub attempt: u32,
    pub agent: AgentId,
    pub session: String,
    /// Tokio clock, so paused-time tests can measure backoff.
    pub started_at: Instant,
}

/// A fake runner that:
/// - records every attempt it sees
/// - answers each attempt from a per-task script, falling back to success
/// - optionally sleeps before answering, to hold agents busy
/// - tracks how many attempts were in flight at once
/// - panics on demand, to exercise the executor's containment
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<TaskId, VecDeque<Result<TaskOutput, TaskError>>>>,
    panics: HashSet<TaskId>,
    calls: Arc<Mutex<Vec<RunRecord>>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every attempt sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue the answers for the next attempts of `task`, in order.
    pub fn script(
        self,
        task: &str,
        outcomes: impl IntoIterator<Item = Result<TaskOutput, TaskError>>,
    ) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(task.to_string())
            .or_default()
            .extend(outcomes);
        self
    }

    /// Every attempt of `task` panics instead of answering.
    pub fn panic_on(mut self, task: &str) -> Self {
        self.panics.insert(task.to_string());
        self
    }

    /// `task` fails every attempt with `err`.
    pub fn always_fail(self, task: &str, err: TaskError, attempts: usize) -> Self {
        self.script(task, std::iter::repeat_n(Err(err), attempts))
    }

    pub fn calls(&self) -> Vec<RunRecord> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, task: &str) -> Vec<RunRecord> {
        self.calls()
            .into_iter()
            .filter(|c| c.task == task)
            .collect()
    }

    /// Task ids in the order their first attempt started.
    pub fn started_tasks(&self) -> Vec<TaskId> {
        let mut seen = Vec::new();
        for call in self.calls() {
            if !seen.contains(&call.task) {
                seen.push(call.task);
            }
        }
        seen
    }

    /// Highest number of attempts observed running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, task: &str) -> Result<TaskOutput, TaskError> {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(task)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(TaskOutput::value(serde_json::json!({ "task": task }))))
    }
}

impl TaskRunner for ScriptedRunner {
    fn run(&self, ctx: TaskContext) -> BoxFuture<'_, Result<TaskOutput, TaskError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(RunRecord {
                task: ctx.task_id.clone(),
                attempt: ctx.attempt,
                agent: ctx.agent.clone(),
                session: ctx.session.clone(),
                started_at: Instant::now(),
            });

            if self.panics.contains(&ctx.task_id) {
                panic!("runner blew up on {}", ctx.task_id);
            }

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let outcome = self.next_outcome(&ctx.task_id);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            debug!(task = %ctx.task_id, attempt = ctx.attempt, ok = outcome.is_ok(), "scripted attempt");
            outcome
        })
    }
}
