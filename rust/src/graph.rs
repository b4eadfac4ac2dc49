//! Directed task graph with precedence edges and Kahn topological ordering.
//!
//! Nodes live in a `Vec` in insertion order and every lookup after the ID
//! boundary uses plain indices, so the forward and backward passes walk
//! predecessor/successor lists without hashing.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

/// A single opaque metadata value attached to a task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

/// Default task payload. The scheduling passes never look inside it.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Errors raised while building or ordering a task graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),
    #[error("Task not found: {0}")]
    UnknownTask(String),
    #[error("Task {0} cannot depend on itself")]
    SelfLoop(String),
    #[error("Task {task} has invalid duration {duration} (must be positive)")]
    InvalidDuration { task: String, duration: f64 },
    /// Every task Kahn's algorithm could not release, in insertion order.
    #[error("Circular dependency detected among tasks: {}", .tasks.join(", "))]
    CircularDependency { tasks: Vec<String> },
}

/// A task node: identifier, duration in working days, opaque payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskNode<M = Metadata> {
    pub id: String,
    pub duration: f64,
    pub metadata: M,
}

/// Directed acyclic (once sorted) graph of tasks.
///
/// Cycles are tolerated while edges are being added and only reported by
/// [`TaskGraph::topological_sort`], so callers can add all nodes and then all
/// edges in any order.
#[derive(Clone, Debug)]
pub struct TaskGraph<M = Metadata> {
    nodes: Vec<TaskNode<M>>,
    index: FxHashMap<String, usize>,
    predecessors: Vec<Vec<usize>>,
    successors: Vec<Vec<usize>>,
    edge_count: usize,
}

impl<M> Default for TaskGraph<M> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<M> TaskGraph<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            predecessors: Vec::with_capacity(capacity),
            successors: Vec::with_capacity(capacity),
            edge_count: 0,
        }
    }

    /// Add a task. Fails if the ID is already present or the duration is not
    /// a positive finite number.
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        duration: f64,
        metadata: M,
    ) -> Result<(), GraphError> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateTask(id));
        }
        if !duration.is_finite() || duration <= 0.0 {
            return Err(GraphError::InvalidDuration { task: id, duration });
        }

        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(TaskNode {
            id,
            duration,
            metadata,
        });
        self.predecessors.push(Vec::new());
        self.successors.push(Vec::new());
        Ok(())
    }

    /// Add a precedence edge: `from` must finish before `to` starts.
    ///
    /// Adding an edge that already exists is a no-op.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        let from_ix = self.require(from)?;
        let to_ix = self.require(to)?;
        if from_ix == to_ix {
            return Err(GraphError::SelfLoop(from.to_string()));
        }
        if self.predecessors[to_ix].contains(&from_ix) {
            return Ok(());
        }
        self.predecessors[to_ix].push(from_ix);
        self.successors[from_ix].push(to_ix);
        self.edge_count += 1;
        Ok(())
    }

    /// Direct predecessors of a task, in edge insertion order.
    pub fn get_dependencies(&self, id: &str) -> Result<Vec<&str>, GraphError> {
        let ix = self.require(id)?;
        Ok(self.predecessors[ix]
            .iter()
            .map(|&p| self.nodes[p].id.as_str())
            .collect())
    }

    /// Direct successors of a task, in edge insertion order.
    pub fn get_successors(&self, id: &str) -> Result<Vec<&str>, GraphError> {
        let ix = self.require(id)?;
        Ok(self.successors[ix]
            .iter()
            .map(|&s| self.nodes[s].id.as_str())
            .collect())
    }

    pub fn has_dependencies(&self, id: &str) -> Result<bool, GraphError> {
        let ix = self.require(id)?;
        Ok(!self.predecessors[ix].is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&TaskNode<M>> {
        self.index.get(id).map(|&ix| &self.nodes[ix])
    }

    /// Task IDs in insertion order.
    pub fn task_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes.iter().map(|n| n.id.as_str())
    }

    /// Task IDs ordered so every dependency precedes its dependents.
    ///
    /// Uses Kahn's algorithm with the ready queue seeded and drained in
    /// insertion order, so the output is deterministic. If some tasks can
    /// never be released, all of them are named in the error.
    pub fn topological_sort(&self) -> Result<Vec<String>, GraphError> {
        Ok(self
            .topological_order()?
            .into_iter()
            .map(|ix| self.nodes[ix].id.clone())
            .collect())
    }

    pub(crate) fn topological_order(&self) -> Result<Vec<usize>, GraphError> {
        let n = self.nodes.len();
        let mut in_degree: Vec<usize> = self.predecessors.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = (0..n).filter(|&ix| in_degree[ix] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(ix) = queue.pop_front() {
            order.push(ix);
            for &succ in &self.successors[ix] {
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    queue.push_back(succ);
                }
            }
        }

        if order.len() < n {
            let tasks = (0..n)
                .filter(|&ix| in_degree[ix] > 0)
                .map(|ix| self.nodes[ix].id.clone())
                .collect();
            return Err(GraphError::CircularDependency { tasks });
        }
        Ok(order)
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn node_at(&self, ix: usize) -> &TaskNode<M> {
        &self.nodes[ix]
    }

    pub(crate) fn predecessors_of(&self, ix: usize) -> &[usize] {
        &self.predecessors[ix]
    }

    pub(crate) fn successors_of(&self, ix: usize) -> &[usize] {
        &self.successors[ix]
    }

    /// Node durations indexed like the graph.
    pub(crate) fn durations(&self) -> Vec<f64> {
        self.nodes.iter().map(|n| n.duration).collect()
    }

    fn require(&self, id: &str) -> Result<usize, GraphError> {
        self.index_of(id)
            .ok_or_else(|| GraphError::UnknownTask(id.to_string()))
    }
}

impl<M: Default> TaskGraph<M> {
    /// Add a task with an empty payload.
    pub fn add_task(&mut self, id: impl Into<String>, duration: f64) -> Result<(), GraphError> {
        self.add_node(id, duration, M::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(ids: &[(&str, f64)]) -> TaskGraph {
        let mut graph = TaskGraph::new();
        for (id, duration) in ids {
            graph.add_task(*id, *duration).unwrap();
        }
        graph
    }

    #[test]
    fn test_add_node_rejects_duplicates() {
        let mut graph = chain(&[("T001", 1.0)]);
        assert_eq!(
            graph.add_task("T001", 2.0),
            Err(GraphError::DuplicateTask("T001".to_string()))
        );
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_add_node_rejects_non_positive_duration() {
        let mut graph: TaskGraph = TaskGraph::new();
        assert!(matches!(
            graph.add_task("A", 0.0),
            Err(GraphError::InvalidDuration { .. })
        ));
        assert!(matches!(
            graph.add_task("B", f64::NAN),
            Err(GraphError::InvalidDuration { .. })
        ));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_metadata_is_carried() {
        let mut graph = TaskGraph::new();
        let mut metadata = Metadata::new();
        metadata.insert("owner".to_string(), MetadataValue::Text("ana".into()));
        metadata.insert("points".to_string(), MetadataValue::Number(3.0));
        graph.add_node("T001", 2.0, metadata.clone()).unwrap();
        assert_eq!(graph.node("T001").unwrap().metadata, metadata);
    }

    #[test]
    fn test_add_edge_validation() {
        let mut graph = chain(&[("A", 1.0), ("B", 1.0)]);
        assert_eq!(
            graph.add_edge("A", "Z"),
            Err(GraphError::UnknownTask("Z".to_string()))
        );
        assert_eq!(
            graph.add_edge("A", "A"),
            Err(GraphError::SelfLoop("A".to_string()))
        );
        graph.add_edge("A", "B").unwrap();
        graph.add_edge("A", "B").unwrap();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.get_dependencies("B").unwrap(), vec!["A"]);
        assert_eq!(graph.get_successors("A").unwrap(), vec!["B"]);
        assert!(graph.has_dependencies("B").unwrap());
        assert!(!graph.has_dependencies("A").unwrap());
        assert!(graph.get_dependencies("Q").is_err());
    }

    #[test]
    fn test_topological_sort_respects_edges() {
        // Added in reverse so insertion order alone would be wrong
        let mut graph = chain(&[("D", 1.0), ("C", 1.0), ("B", 1.0), ("A", 1.0)]);
        graph.add_edge("A", "B").unwrap();
        graph.add_edge("A", "C").unwrap();
        graph.add_edge("B", "D").unwrap();
        graph.add_edge("C", "D").unwrap();

        let order = graph.topological_sort().unwrap();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert_eq!(order.len(), 4);
        assert!(pos("A") < pos("B"));
        assert!(pos("A") < pos("C"));
        assert!(pos("B") < pos("D"));
        assert!(pos("C") < pos("D"));
    }

    #[test]
    fn test_topological_sort_is_deterministic() {
        let graph = chain(&[("X", 1.0), ("Y", 1.0), ("Z", 1.0)]);
        assert_eq!(graph.topological_sort().unwrap(), vec!["X", "Y", "Z"]);
        assert_eq!(graph.topological_sort().unwrap(), vec!["X", "Y", "Z"]);
    }

    #[test]
    fn test_cycle_names_remaining_tasks() {
        let mut graph = chain(&[("T001", 1.0), ("T002", 1.0), ("T003", 1.0)]);
        graph.add_edge("T001", "T002").unwrap();
        graph.add_edge("T002", "T001").unwrap();
        match graph.topological_sort() {
            Err(GraphError::CircularDependency { tasks }) => {
                assert_eq!(tasks, vec!["T001", "T002"]);
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_graph_sorts_to_nothing() {
        let graph: TaskGraph = TaskGraph::new();
        assert!(graph.is_empty());
        assert!(graph.topological_sort().unwrap().is_empty());
    }
}
