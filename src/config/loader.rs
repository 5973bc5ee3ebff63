// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::model::{RawWorkflowFile, TaskConfig, WorkflowFile};
use crate::errors::{AgentdagError, Result};
use crate::model::{TaskBuilder, Workflow, WorkflowBuilder};

/// Load a workflow file from a given path and return the raw `RawWorkflowFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for the
/// file-level checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawWorkflowFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let file: RawWorkflowFile = toml::from_str(&contents)?;

    Ok(file)
}

/// Load a workflow file from path and run the file-level checks.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks section sanity (tasks present, concurrency, retry bounds,
///   unique agents).
///
/// The graph itself is checked later by [`crate::dag::validate`] once
/// [`build_workflow`] turned the file into a [`Workflow`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<WorkflowFile> {
    let raw = load_from_path(&path)?;
    let file = WorkflowFile::try_from(raw)?;
    Ok(file)
}

/// Turn a checked workflow file into a [`Workflow`].
///
/// Tasks are declared in id order, since TOML tables are read into a sorted
/// map.
pub fn build_workflow(file: &WorkflowFile) -> Result<Workflow> {
    let section = &file.workflow;
    let mut builder = WorkflowBuilder::new(
        section.id.clone(),
        section.name.clone().unwrap_or_else(|| section.id.clone()),
    )
    .description(section.description.clone())
    .creator(section.creator.clone())
    .priority(section.priority)
    .timeout(Duration::from_secs(section.timeout_secs))
    .max_retries(section.max_retries)
    .execution_mode(section.execution_mode);

    for (id, task) in &file.task {
        builder = builder.task(task_builder(id, task)?);
    }

    Ok(builder.build())
}

fn task_builder(id: &str, task: &TaskConfig) -> Result<TaskBuilder> {
    let payload = match &task.payload {
        Some(table) => serde_json::to_value(table).map_err(|e| {
            AgentdagError::ConfigError(format!("task '{id}' has an unsupported payload: {e}"))
        })?,
        None => serde_json::Value::Null,
    };

    let mut builder = TaskBuilder::new(id)
        .name(task.name.clone().unwrap_or_else(|| id.to_string()))
        .task_type(task.task_type.clone())
        .capabilities(task.capabilities.iter().cloned())
        .duration_secs(task.duration_secs)
        .cores(task.cores)
        .memory_mb(task.memory_mb)
        .accelerator(task.accelerator)
        .payload(payload);

    for dep in &task.after {
        builder = builder.after(dep.clone());
    }
    Ok(builder)
}

/// Helper to resolve a default workflow file path.
///
/// Currently this just returns `Workflow.toml` in the current working
/// directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Workflow.toml")
}
