//! Whole-registry dependency graph using petgraph.
//!
//! The executor only walks the part of the graph reachable from the task it
//! runs. This view covers every task at once and backs `validate` and
//! `graph`.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::error::Result;
use crate::executor::build_task_order;
use crate::registry::Registry;
use crate::task::TaskId;

/// Kind of edge between two tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// `from` depends on `to`.
    Dependency,
    /// `to` is a step of `from`'s pipeline.
    PipelineStep,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeKind::Dependency => f.write_str("depends on"),
            EdgeKind::PipelineStep => f.write_str("step"),
        }
    }
}

/// Directed graph of task → dependency (and pipeline → step) edges.
#[derive(Debug)]
pub struct TaskGraph {
    graph: DiGraph<String, EdgeKind>,
    node_map: HashMap<TaskId, NodeIndex>,
    topological_order: Vec<String>,
}

impl TaskGraph {
    /// Builds the graph of every registered task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicDependency`] naming a cycle if one exists.
    ///
    /// [`Error::CyclicDependency`]: crate::Error::CyclicDependency
    pub fn new(registry: &Registry) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::with_capacity(registry.len());

        for task in registry.tasks() {
            let node = graph.add_node(task.name().to_string());
            node_map.insert(task.id(), node);
        }

        for task in registry.tasks() {
            let from = node_map[&task.id()];
            for dep in task.deps() {
                graph.add_edge(from, node_map[dep], EdgeKind::Dependency);
            }
            for step in task.pipeline_steps() {
                graph.add_edge(from, node_map[step], EdgeKind::PipelineStep);
            }
        }

        let sorted = match toposort(&graph, None) {
            Ok(sorted) => sorted,
            Err(cycle) => {
                let name = &graph[cycle.node_id()];
                let id = registry.lookup(name)?;
                // Re-walk from the offending task to name the whole cycle.
                build_task_order(registry, id)?;
                return Err(crate::Error::CyclicDependency {
                    cycle: format!("cycle involving {}", name),
                });
            }
        };

        let topological_order = sorted
            .into_iter()
            .rev()
            .map(|idx| graph[idx].clone())
            .collect();

        Ok(Self {
            graph,
            node_map,
            topological_order,
        })
    }

    /// All tasks, dependencies before dependents.
    #[inline]
    pub fn topological_order(&self) -> &[String] {
        &self.topological_order
    }

    /// Every edge as `(from, to, kind)`.
    pub fn edges(&self) -> Vec<(&str, &str, EdgeKind)> {
        self.graph
            .edge_indices()
            .filter_map(|edge| {
                let (from, to) = self.graph.edge_endpoints(edge)?;
                Some((
                    self.graph[from].as_str(),
                    self.graph[to].as_str(),
                    self.graph[edge],
                ))
            })
            .collect()
    }

    /// Tasks that directly depend on `id` or run it as a pipeline step.
    pub fn dependents(&self, id: TaskId) -> Vec<&str> {
        let Some(node) = self.node_map.get(&id) else {
            return Vec::new();
        };
        let mut dependents: Vec<&str> = self
            .graph
            .neighbors_directed(*node, Direction::Incoming)
            .map(|idx| self.graph[idx].as_str())
            .collect();
        dependents.sort_unstable();
        dependents.dedup();
        dependents
    }

    /// The underlying petgraph graph, e.g. for DOT output.
    #[inline]
    pub fn inner(&self) -> &DiGraph<String, EdgeKind> {
        &self.graph
    }
}
