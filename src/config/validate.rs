// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{RawWorkflowFile, WorkflowFile};
use crate::errors::{AgentdagError, Result};

impl TryFrom<RawWorkflowFile> for WorkflowFile {
    type Error = AgentdagError;

    fn try_from(raw: RawWorkflowFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_file(&raw)?;
        Ok(WorkflowFile::new_unchecked(raw))
    }
}

fn validate_raw_file(file: &RawWorkflowFile) -> Result<()> {
    ensure_has_tasks(file)?;
    validate_workflow_section(file)?;
    validate_executor(file)?;
    validate_retry(file)?;
    validate_agents(file)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> AgentdagError {
    AgentdagError::ConfigError(msg.into())
}

fn ensure_has_tasks(file: &RawWorkflowFile) -> Result<()> {
    if file.task.is_empty() {
        return Err(config_error(
            "workflow file must contain at least one [task.<id>] section",
        ));
    }
    Ok(())
}

fn validate_workflow_section(file: &RawWorkflowFile) -> Result<()> {
    if file.workflow.id.trim().is_empty() {
        return Err(config_error("[workflow].id must not be empty"));
    }
    if file.workflow.timeout_secs == 0 {
        return Err(config_error("[workflow].timeout_secs must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_executor(file: &RawWorkflowFile) -> Result<()> {
    if file.executor.max_concurrency == 0 {
        return Err(config_error(
            "[executor].max_concurrency must be >= 1 (got 0)",
        ));
    }
    Ok(())
}

fn validate_retry(file: &RawWorkflowFile) -> Result<()> {
    let retry = &file.retry;
    if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
        return Err(config_error(format!(
            "[retry].backoff_multiplier must be a finite number >= 1.0 (got {})",
            retry.backoff_multiplier
        )));
    }
    if retry.max_delay_ms < retry.initial_delay_ms {
        return Err(config_error(format!(
            "[retry].max_delay_ms ({}) must not be smaller than initial_delay_ms ({})",
            retry.max_delay_ms, retry.initial_delay_ms
        )));
    }
    Ok(())
}

fn validate_agents(file: &RawWorkflowFile) -> Result<()> {
    let mut seen = HashSet::new();
    for agent in &file.agent {
        if !seen.insert(agent.id.as_str()) {
            return Err(config_error(format!(
                "agent '{}' is declared more than once",
                agent.id
            )));
        }
        if agent.max_concurrent_tasks == 0 {
            return Err(config_error(format!(
                "agent '{}' must accept at least one concurrent task",
                agent.id
            )));
        }
    }
    Ok(())
}
