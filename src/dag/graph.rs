// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;

use crate::model::Workflow;
use crate::types::TaskId;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Tasks that must finish before this one can run.
    deps: Vec<TaskId>,
    /// Tasks that list this one as a dependency.
    dependents: Vec<TaskId>,
}

/// Adjacency view of a workflow, keyed by task id.
///
/// Edges pointing at unknown tasks are dropped, so the graph is always
/// internally consistent even for a workflow that failed validation.
/// Both adjacency lists follow task declaration order.
#[derive(Debug, Clone)]
pub struct DagGraph {
    order: Vec<TaskId>,
    nodes: HashMap<TaskId, DagNode>,
}

impl DagGraph {
    pub fn from_workflow(workflow: &Workflow) -> Self {
        let mut order: Vec<TaskId> = Vec::with_capacity(workflow.tasks.len());
        let mut nodes: HashMap<TaskId, DagNode> = HashMap::new();

        // First pass: one node per distinct task, in declaration order.
        for task in &workflow.tasks {
            if nodes.contains_key(&task.id) {
                continue;
            }
            order.push(task.id.clone());
            nodes.insert(task.id.clone(), DagNode::default());
        }

        // Second pass: wire up edges, walking tasks in declaration order so the
        // dependents lists come out ordered too.
        for name in &order {
            let deps: Vec<TaskId> = order
                .iter()
                .filter(|dep| workflow.dependencies_of(name).contains(*dep))
                .cloned()
                .collect();

            for dep in &deps {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(name.clone());
                }
            }
            if let Some(node) = nodes.get_mut(name) {
                node.deps = deps;
            }
        }

        Self { order, nodes }
    }

    /// Task ids in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &[TaskId] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[TaskId] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Render the graph in Graphviz DOT format, edges pointing from a
    /// dependency to its dependent.
    pub fn to_dot(&self) -> String {
        let mut graph: DiGraph<&str, &str> = DiGraph::new();
        let index: HashMap<&str, _> = self
            .tasks()
            .map(|name| (name, graph.add_node(name)))
            .collect();

        for name in self.tasks() {
            for dep in self.dependencies_of(name) {
                if let (Some(&from), Some(&to)) = (index.get(dep.as_str()), index.get(name)) {
                    graph.add_edge(from, to, "");
                }
            }
        }

        format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskBuilder, WorkflowBuilder};

    fn diamond() -> Workflow {
        WorkflowBuilder::new("wf", "Diamond")
            .task(TaskBuilder::new("a"))
            .task(TaskBuilder::new("c").after("a"))
            .task(TaskBuilder::new("b").after("a"))
            .task(TaskBuilder::new("d").after("b").after("c").after("ghost"))
            .build()
    }

    #[test]
    fn adjacency_follows_declaration_order() {
        let graph = DagGraph::from_workflow(&diamond());
        assert_eq!(graph.tasks().collect::<Vec<_>>(), vec!["a", "c", "b", "d"]);
        assert_eq!(graph.dependents_of("a"), ["c", "b"]);
        assert_eq!(graph.dependencies_of("d"), ["c", "b"]);
    }

    #[test]
    fn unknown_dependencies_are_dropped() {
        let graph = DagGraph::from_workflow(&diamond());
        assert!(!graph.contains("ghost"));
        assert!(graph.dependents_of("ghost").is_empty());
    }

    #[test]
    fn dot_output_lists_nodes_and_edges() {
        let dot = DagGraph::from_workflow(&diamond()).to_dot();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("\"a\""));
        assert_eq!(dot.matches("->").count(), 4);
    }
}
