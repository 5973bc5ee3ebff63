// src/dag/validate.rs

//! Structural validation of a workflow before it is scheduled.
//!
//! Checks run in a fixed order and every violation is collected:
//!
//! 1. dependency cycles (DFS with an on-stack set, every task tried as root)
//! 2. referential integrity of the dependency map, plus duplicate ids
//! 3. per-task requirement sanity
//! 4. the workflow timeout against the summed task estimates
//!
//! The timeout check is intentionally conservative: it ignores parallelism
//! and compares against the sum of all estimates, not the critical path.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::dag::error::{ValidationError, ValidationErrors};
use crate::model::Workflow;
use crate::types::TaskId;

/// Validate `workflow`, returning every problem found.
pub fn validate(workflow: &Workflow) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    check_cycles(workflow, &mut errors);
    check_references(workflow, &mut errors);
    check_requirements(workflow, &mut errors);
    check_timeout(workflow, &mut errors);

    match ValidationErrors::from_vec(errors) {
        Some(errors) => {
            debug!(workflow = %workflow.id, count = errors.len(), "workflow failed validation");
            Err(errors)
        }
        None => Ok(()),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnStack,
    Done,
}

struct CycleFinder<'a> {
    workflow: &'a Workflow,
    known: HashSet<&'a str>,
    marks: HashMap<&'a str, Mark>,
    stack: Vec<&'a str>,
}

impl<'a> CycleFinder<'a> {
    fn visit(&mut self, task: &'a str, errors: &mut Vec<ValidationError>) {
        let workflow = self.workflow;
        self.marks.insert(task, Mark::OnStack);
        self.stack.push(task);

        for dep in workflow.dependencies_of(task) {
            let dep = dep.as_str();
            if !self.known.contains(dep) {
                continue;
            }
            match self.marks.get(dep) {
                Some(Mark::OnStack) => errors.push(self.cycle_through(dep)),
                Some(Mark::Done) => {}
                None => self.visit(dep, errors),
            }
        }

        self.stack.pop();
        self.marks.insert(task, Mark::Done);
    }

    /// Build the error for a back edge into `task`, which is on the stack.
    fn cycle_through(&self, task: &str) -> ValidationError {
        let start = self
            .stack
            .iter()
            .position(|t| *t == task)
            .unwrap_or_default();
        let mut path: Vec<TaskId> = self.stack[start..].iter().map(|t| t.to_string()).collect();
        path.push(task.to_string());

        ValidationError::CycleDetected {
            task: task.to_string(),
            path,
        }
    }
}

fn check_cycles(workflow: &Workflow, errors: &mut Vec<ValidationError>) {
    let mut finder = CycleFinder {
        workflow,
        known: workflow.task_ids().collect(),
        marks: HashMap::new(),
        stack: Vec::new(),
    };

    for task in workflow.task_ids() {
        if !finder.marks.contains_key(task) {
            finder.visit(task, errors);
        }
    }
}

fn check_references(workflow: &Workflow, errors: &mut Vec<ValidationError>) {
    let mut seen: HashSet<&str> = HashSet::new();
    for task in workflow.task_ids() {
        if !seen.insert(task) {
            errors.push(ValidationError::DuplicateTask {
                task: task.to_string(),
            });
        }
    }

    for (task, deps) in &workflow.dependencies {
        if !seen.contains(task.as_str()) {
            errors.push(ValidationError::UnknownTask { task: task.clone() });
        }
        for dep in deps {
            if !seen.contains(dep.as_str()) {
                errors.push(ValidationError::DependencyNotFound {
                    task: task.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }
}

fn check_requirements(workflow: &Workflow, errors: &mut Vec<ValidationError>) {
    for task in &workflow.tasks {
        if task.capabilities.is_empty() {
            errors.push(ValidationError::InvalidRequirements {
                task: task.id.clone(),
                reason: "at least one required capability must be declared".to_string(),
            });
        }
        if task.resources.cores == 0 {
            errors.push(ValidationError::InvalidRequirements {
                task: task.id.clone(),
                reason: "at least one CPU core is required".to_string(),
            });
        }
    }
}

fn check_timeout(workflow: &Workflow, errors: &mut Vec<ValidationError>) {
    let required = workflow.total_estimated_duration();
    let budget = workflow.metadata.timeout;
    if required > budget {
        errors.push(ValidationError::TimeoutTooShort { required, budget });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::{TaskBuilder, WorkflowBuilder};

    fn task(id: &str) -> TaskBuilder {
        TaskBuilder::new(id).capability("rust").duration_secs(10)
    }

    fn errors_of(workflow: &Workflow) -> Vec<ValidationError> {
        validate(workflow).unwrap_err().into_vec()
    }

    #[test]
    fn acyclic_workflow_is_valid() {
        let wf = WorkflowBuilder::new("wf", "ok")
            .task(task("a"))
            .task(task("b").after("a"))
            .task(task("c").after("a").after("b"))
            .build();
        assert!(validate(&wf).is_ok());
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let wf = WorkflowBuilder::new("wf", "loop")
            .task(task("a").after("a"))
            .build();
        let errors = errors_of(&wf);
        assert_eq!(
            errors,
            vec![ValidationError::CycleDetected {
                task: "a".into(),
                path: vec!["a".into(), "a".into()],
            }]
        );
    }

    #[test]
    fn cycle_in_disconnected_component_is_found() {
        let wf = WorkflowBuilder::new("wf", "split")
            .task(task("solo"))
            .task(task("x").after("z"))
            .task(task("y").after("x"))
            .task(task("z").after("y"))
            .build();

        let errors = errors_of(&wf);
        assert_eq!(errors.len(), 1);
        let ValidationError::CycleDetected { task, path } = &errors[0] else {
            panic!("expected a cycle, got {errors:?}");
        };
        assert!(["x", "y", "z"].contains(&task.as_str()));
        assert_eq!(path.first(), path.last());
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn missing_dependency_names_both_tasks() {
        let wf = WorkflowBuilder::new("wf", "dangling")
            .task(task("a").after("ghost"))
            .depends_on("phantom", "a")
            .build();

        let errors = errors_of(&wf);
        assert!(errors.contains(&ValidationError::DependencyNotFound {
            task: "a".into(),
            dependency: "ghost".into(),
        }));
        assert!(errors.contains(&ValidationError::UnknownTask {
            task: "phantom".into()
        }));
    }

    #[test]
    fn every_requirement_violation_is_reported() {
        let wf = WorkflowBuilder::new("wf", "bad")
            .task(TaskBuilder::new("no-caps"))
            .task(task("no-cores").cores(0))
            .task(TaskBuilder::new("both").cores(0))
            .build();

        let errors = errors_of(&wf);
        let offenders: Vec<_> = errors.iter().filter_map(|e| e.task()).collect();
        assert_eq!(offenders, vec!["no-caps", "no-cores", "both", "both"]);
    }

    #[test]
    fn timeout_uses_summed_durations() {
        let wf = WorkflowBuilder::new("wf", "tight")
            .timeout(Duration::from_secs(15))
            .task(task("a"))
            .task(task("b"))
            .build();

        assert_eq!(
            errors_of(&wf),
            vec![ValidationError::TimeoutTooShort {
                required: Duration::from_secs(20),
                budget: Duration::from_secs(15),
            }]
        );
    }

    #[test]
    fn duplicate_ids_are_reported() {
        let wf = WorkflowBuilder::new("wf", "dup")
            .task(task("a"))
            .task(task("a"))
            .build();
        assert_eq!(
            errors_of(&wf),
            vec![ValidationError::DuplicateTask { task: "a".into() }]
        );
    }

    #[test]
    fn problems_from_different_checks_are_collected_together() {
        let wf = WorkflowBuilder::new("wf", "mess")
            .timeout(Duration::from_secs(1))
            .task(task("a").after("b"))
            .task(task("b").after("a").after("missing"))
            .task(TaskBuilder::new("c"))
            .build();

        let errors = validate(&wf).unwrap_err();
        assert_eq!(errors.len(), 4);
        let text = errors.to_string();
        assert!(text.contains("cycle detected"));
        assert!(text.contains("unknown task 'missing'"));
        assert!(text.contains("invalid requirements"));
        assert!(text.contains("timeout"));
    }
}
