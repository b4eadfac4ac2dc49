//! Critical path calculation using forward and backward passes.

use thiserror::Error;

use crate::graph::{GraphError, TaskGraph};

use super::types::{is_zero_slack, CriticalPathResult, TaskScheduleData};

/// Error types for critical path calculation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CriticalPathError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Task {task} has invalid duration {duration}")]
    InvalidDuration { task: String, duration: f64 },
    #[error("Expected {expected} durations, got {actual}")]
    DurationCountMismatch { expected: usize, actual: usize },
}

/// Raw pass output indexed like the graph.
///
/// Simulation trials only need this, so the string-keyed
/// [`CriticalPathResult`] is built on demand.
#[derive(Clone, Debug, Default)]
pub(crate) struct PassTimings {
    pub early_start: Vec<f64>,
    pub early_finish: Vec<f64>,
    pub late_start: Vec<f64>,
    pub late_finish: Vec<f64>,
    pub project_duration: f64,
}

impl PassTimings {
    pub fn slack(&self, ix: usize) -> f64 {
        self.late_start[ix] - self.early_start[ix]
    }

    pub fn is_critical(&self, ix: usize) -> bool {
        is_zero_slack(self.slack(ix))
    }
}

/// Reusable CPM calculator over one graph.
///
/// The topological order is computed once at construction, so a graph with a
/// cycle fails here and every later calculation reuses the order. Simulation
/// trials call [`CriticalPathCalculator::calculate_with_durations`] with
/// sampled durations.
pub struct CriticalPathCalculator<'g, M> {
    graph: &'g TaskGraph<M>,
    order: Vec<usize>,
}

impl<'g, M> CriticalPathCalculator<'g, M> {
    pub fn new(graph: &'g TaskGraph<M>) -> Result<Self, CriticalPathError> {
        let order = graph.topological_order()?;
        Ok(Self { graph, order })
    }

    pub fn graph(&self) -> &'g TaskGraph<M> {
        self.graph
    }

    /// Graph indices in topological order.
    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }

    /// CPM over the durations stored on the graph's nodes.
    pub fn calculate(&self) -> Result<CriticalPathResult, CriticalPathError> {
        self.calculate_with_durations(&self.graph.durations())
    }

    /// CPM with durations overridden, indexed in graph insertion order.
    pub fn calculate_with_durations(
        &self,
        durations: &[f64],
    ) -> Result<CriticalPathResult, CriticalPathError> {
        let timings = self.timings(durations)?;
        Ok(self.build_result(durations, &timings))
    }

    pub(crate) fn timings(&self, durations: &[f64]) -> Result<PassTimings, CriticalPathError> {
        self.validate_durations(durations)?;
        let (early_start, early_finish) = self.forward_pass(durations);
        Ok(self.backward_pass(durations, early_start, early_finish))
    }

    pub(crate) fn validate_durations(&self, durations: &[f64]) -> Result<(), CriticalPathError> {
        if durations.len() != self.graph.len() {
            return Err(CriticalPathError::DurationCountMismatch {
                expected: self.graph.len(),
                actual: durations.len(),
            });
        }
        for (ix, &duration) in durations.iter().enumerate() {
            if !duration.is_finite() || duration < 0.0 {
                return Err(CriticalPathError::InvalidDuration {
                    task: self.graph.node_at(ix).id.clone(),
                    duration,
                });
            }
        }
        Ok(())
    }

    /// ES = max EF over direct predecessors (0 without any); EF = ES + duration.
    fn forward_pass(&self, durations: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let n = self.graph.len();
        let mut early_start = vec![0.0; n];
        let mut early_finish = vec![0.0; n];

        for &ix in &self.order {
            let es = self
                .graph
                .predecessors_of(ix)
                .iter()
                .map(|&p| early_finish[p])
                .fold(0.0, f64::max);
            early_start[ix] = es;
            early_finish[ix] = es + durations[ix];
        }

        (early_start, early_finish)
    }

    /// Late dates in reverse topological order from precomputed early dates.
    ///
    /// LF = project end for tasks without successors, else the minimum LS of
    /// the direct successors; LS = LF - duration.
    pub(crate) fn backward_pass(
        &self,
        durations: &[f64],
        early_start: Vec<f64>,
        early_finish: Vec<f64>,
    ) -> PassTimings {
        let n = self.graph.len();
        let project_duration = early_finish.iter().copied().fold(0.0, f64::max);
        let mut late_start = vec![0.0; n];
        let mut late_finish = vec![0.0; n];

        for &ix in self.order.iter().rev() {
            let successors = self.graph.successors_of(ix);
            let lf = if successors.is_empty() {
                project_duration
            } else {
                successors
                    .iter()
                    .map(|&s| late_start[s])
                    .fold(f64::INFINITY, f64::min)
            };
            late_finish[ix] = lf;
            late_start[ix] = lf - durations[ix];
        }

        PassTimings {
            early_start,
            early_finish,
            late_start,
            late_finish,
            project_duration,
        }
    }

    /// Critical-path task indices in topological order.
    pub(crate) fn critical_indices<'a>(
        &'a self,
        timings: &'a PassTimings,
    ) -> impl Iterator<Item = usize> + 'a {
        self.order
            .iter()
            .copied()
            .filter(move |&ix| timings.is_critical(ix))
    }

    pub(crate) fn build_result(&self, durations: &[f64], timings: &PassTimings) -> CriticalPathResult {
        let mut result = CriticalPathResult {
            project_duration: timings.project_duration,
            ..Default::default()
        };

        for &ix in &self.order {
            let node = self.graph.node_at(ix);
            let slack = timings.slack(ix);
            let dependencies = self
                .graph
                .predecessors_of(ix)
                .iter()
                .map(|&p| self.graph.node_at(p).id.clone())
                .collect();
            result.tasks.insert(
                node.id.clone(),
                TaskScheduleData {
                    duration: durations[ix],
                    dependencies,
                    early_start: timings.early_start[ix],
                    early_finish: timings.early_finish[ix],
                    late_start: timings.late_start[ix],
                    late_finish: timings.late_finish[ix],
                    slack,
                    is_critical: is_zero_slack(slack),
                },
            );
        }

        result.critical_path = self
            .critical_indices(timings)
            .map(|ix| self.graph.node_at(ix).id.clone())
            .collect();
        result
    }
}

/// Run the critical path method over a graph's own durations.
///
/// An empty graph yields an empty result. A cycle fails with the cyclic task
/// set; no partial schedule is produced.
pub fn calculate_critical_path<M>(
    graph: &TaskGraph<M>,
) -> Result<CriticalPathResult, CriticalPathError> {
    CriticalPathCalculator::new(graph)?.calculate()
}
