// src/model/builder.rs

//! Fluent construction of workflows.
//!
//! The builders never validate: a builder happily produces a cyclic or
//! dangling graph so that the validator can report every problem at once.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::model::task::{ResourceRequirements, Task, TaskStatus, TaskType};
use crate::model::workflow::{ExecutionMode, Workflow, WorkflowMetadata};
use crate::types::TaskId;

#[derive(Debug, Clone)]
pub struct TaskBuilder {
    task: Task,
    after: Vec<TaskId>,
}

impl TaskBuilder {
    /// Start a task whose name defaults to its id.
    pub fn new(id: impl Into<TaskId>) -> Self {
        let id = id.into();
        Self {
            task: Task::new(id.clone(), id),
            after: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.task.name = name.into();
        self
    }

    pub fn task_type(mut self, task_type: TaskType) -> Self {
        self.task.task_type = task_type;
        self
    }

    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.task.capabilities.insert(capability.into());
        self
    }

    pub fn capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.task
            .capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.task.estimated_duration = duration;
        self
    }

    pub fn duration_secs(self, secs: u64) -> Self {
        self.duration(Duration::from_secs(secs))
    }

    pub fn cores(mut self, cores: u32) -> Self {
        self.task.resources.cores = cores;
        self
    }

    pub fn memory_mb(mut self, memory_mb: u64) -> Self {
        self.task.resources.memory_mb = memory_mb;
        self
    }

    pub fn accelerator(mut self, accelerator: bool) -> Self {
        self.task.resources.accelerator = accelerator;
        self
    }

    pub fn resources(mut self, resources: ResourceRequirements) -> Self {
        self.task.resources = resources;
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.task.payload = payload;
        self
    }

    /// This task waits for `dependency`.
    pub fn after(mut self, dependency: impl Into<TaskId>) -> Self {
        self.after.push(dependency.into());
        self
    }

    /// Finish the task alone, dropping any `after` edges.
    pub fn build(self) -> Task {
        self.task
    }

    fn into_parts(self) -> (Task, Vec<TaskId>) {
        (self.task, self.after)
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    workflow: Workflow,
}

impl WorkflowBuilder {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            workflow: Workflow::new(id, name),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.workflow.description = description.into();
        self
    }

    pub fn creator(mut self, creator: impl Into<String>) -> Self {
        self.workflow.metadata.creator = creator.into();
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.workflow.metadata.priority = priority;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.workflow.metadata.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.workflow.metadata.max_retries = max_retries;
        self
    }

    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.workflow.metadata.execution_mode = mode;
        self
    }

    pub fn metadata(mut self, metadata: WorkflowMetadata) -> Self {
        self.workflow.metadata = metadata;
        self
    }

    /// Append a task; its `after` edges go into the dependency map.
    pub fn task(mut self, builder: TaskBuilder) -> Self {
        let (mut task, after) = builder.into_parts();
        task.status = TaskStatus::Pending;
        if !after.is_empty() {
            let deps: &mut BTreeSet<TaskId> =
                self.workflow.dependencies.entry(task.id.clone()).or_default();
            deps.extend(after);
        }
        self.workflow.tasks.push(task);
        self
    }

    /// Add an edge after the fact; neither end has to exist yet.
    pub fn depends_on(mut self, task: impl Into<TaskId>, dependency: impl Into<TaskId>) -> Self {
        self.workflow.add_dependency(task, dependency);
        self
    }

    pub fn build(self) -> Workflow {
        self.workflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn after_edges_land_in_dependency_map() {
        let wf = WorkflowBuilder::new("wf", "Workflow")
            .task(TaskBuilder::new("a").capability("rust"))
            .task(TaskBuilder::new("b").capability("rust").after("a"))
            .depends_on("b", "c")
            .build();

        let deps: Vec<&str> = wf.dependencies_of("b").iter().map(String::as_str).collect();
        assert_eq!(deps, vec!["a", "c"]);
        assert!(wf.dependencies_of("a").is_empty());
        assert_eq!(wf.task_ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn task_builder_sets_requirements() {
        let task = TaskBuilder::new("gpu")
            .name("Train")
            .capabilities(["ml", "python"])
            .cores(8)
            .memory_mb(4096)
            .accelerator(true)
            .duration_secs(60)
            .build();

        assert_eq!(task.name, "Train");
        assert_eq!(task.capabilities.len(), 2);
        assert_eq!(task.resources.cores, 8);
        assert!(task.requirements().accelerator);
        assert_eq!(task.estimated_duration, Duration::from_secs(60));
    }
}
