// src/exec/command.rs

//! Shell command runner.
//!
//! A task's payload is expected to look like:
//!
//! ```json
//! { "cmd": "cargo build", "timeout_secs": 600 }
//! ```
//!
//! The command runs through `sh -c` (`cmd /C` on Windows). A zero exit code
//! is success and stdout becomes the task output; a non-zero exit is an agent
//! failure. `timeout_secs` is optional and turns a hung command into a
//! retryable `Timeout`.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::process::Command;
use tracing::{debug, info};

use crate::types::BoxFuture;

use super::backend::{TaskContext, TaskOutput, TaskRunner};
use super::error::TaskError;

/// Lines of stderr kept in the failure message.
const STDERR_TAIL_LINES: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl TaskRunner for CommandRunner {
    fn run(&self, ctx: TaskContext) -> BoxFuture<'_, Result<TaskOutput, TaskError>> {
        Box::pin(run_command(ctx))
    }
}

async fn run_command(ctx: TaskContext) -> Result<TaskOutput, TaskError> {
    let cmd = ctx
        .payload
        .get("cmd")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            TaskError::InvalidInput(format!("task '{}' has no `cmd` string in its payload", ctx.task_id))
        })?
        .to_string();
    let timeout = ctx
        .payload
        .get("timeout_secs")
        .and_then(|v| v.as_u64())
        .map(Duration::from_secs);

    info!(
        task = %ctx.task_id,
        agent = %ctx.agent,
        attempt = ctx.attempt,
        cmd = %cmd,
        "starting task process"
    );

    let run = spawn_and_wait(&ctx, &cmd);
    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
            TaskError::Timeout(format!("command did not finish within {}s", limit.as_secs()))
        })?,
        None => run.await,
    }
    .map_err(|err| TaskError::System(format!("{err:#}")))?;

    let code = output.status.code().unwrap_or(-1);
    info!(
        task = %ctx.task_id,
        exit_code = code,
        success = output.status.success(),
        "task process exited"
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines() {
        debug!(task = %ctx.task_id, "stderr: {}", line);
    }

    if !output.status.success() {
        let tail: Vec<&str> = stderr.lines().rev().take(STDERR_TAIL_LINES).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        return Err(TaskError::AgentFailure(format!(
            "command exited with status {code}{}{}",
            if tail.is_empty() { "" } else { ": " },
            tail.join(" | ")
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    Ok(TaskOutput::value(json!({
        "exit_code": code,
        "stdout": stdout,
    })))
}

async fn spawn_and_wait(ctx: &TaskContext, cmd: &str) -> Result<std::process::Output> {
    // Build a shell command appropriate for the platform.
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .env("AGENTDAG_WORKFLOW_ID", &ctx.workflow_id)
        .env("AGENTDAG_TASK_ID", &ctx.task_id)
        .env("AGENTDAG_AGENT_ID", &ctx.agent)
        .env("AGENTDAG_SESSION_ID", &ctx.session)
        .env("AGENTDAG_ATTEMPT", ctx.attempt.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", ctx.task_id))?;

    child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for process of task '{}'", ctx.task_id))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::model::TaskType;

    fn ctx(payload: serde_json::Value) -> TaskContext {
        TaskContext {
            workflow_id: "wf".into(),
            task_id: "t".into(),
            name: "T".into(),
            task_type: TaskType::Development,
            payload,
            agent: "local".into(),
            session: "s".into(),
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn successful_command_captures_stdout() {
        let out = CommandRunner::new()
            .run(ctx(json!({ "cmd": "echo \"$AGENTDAG_TASK_ID-$AGENTDAG_ATTEMPT\"" })))
            .await
            .unwrap();
        assert_eq!(out.value.unwrap()["stdout"], "t-1");
    }

    #[tokio::test]
    async fn non_zero_exit_is_agent_failure() {
        let err = CommandRunner::new()
            .run(ctx(json!({ "cmd": "echo boom >&2; exit 3" })))
            .await
            .unwrap_err();
        assert_eq!(err, TaskError::AgentFailure("command exited with status 3: boom".into()));
    }

    #[tokio::test]
    async fn missing_cmd_is_invalid_input() {
        let err = CommandRunner::new()
            .run(ctx(json!({ "script": "x" })))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let err = CommandRunner::new()
            .run(ctx(json!({ "cmd": "sleep 5", "timeout_secs": 0 })))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
