//! Critical chain buffers: project buffer, feeding buffers and their status.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::graph::{GraphError, TaskGraph};

/// Location of the project buffer.
pub const PROJECT_BUFFER_LOCATION: &str = "end";

/// Feeding buffers are this share of their chain's duration.
pub const FEEDING_BUFFER_RATIO: f64 = 0.5;

/// Project buffer share of the chain duration for [`BufferMethod::Simple`].
pub const SIMPLE_BUFFER_RATIO: f64 = 0.5;

/// Consumed fractions at or below these limits are GREEN and YELLOW.
const GREEN_LIMIT: f64 = 0.33;
const YELLOW_LIMIT: f64 = 0.66;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BufferError {
    #[error("Unknown buffer method {0:?} (expected simple or root_square)")]
    UnknownMethod(String),
    #[error("No duration given for task {0}")]
    MissingDuration(String),
    #[error("Task {task} has invalid duration {duration}")]
    InvalidDuration { task: String, duration: f64 },
    #[error("Invalid buffer size {0} (must be finite and non-negative)")]
    InvalidSize(f64),
    #[error("Invalid buffer consumption {0} (must be finite and non-negative)")]
    InvalidConsumption(f64),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// How the project buffer is sized from the critical chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferMethod {
    /// Half the chain's total duration.
    #[default]
    Simple,
    /// Square root of the sum of squared durations.
    RootSquare,
}

impl BufferMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            BufferMethod::Simple => "simple",
            BufferMethod::RootSquare => "root_square",
        }
    }
}

impl FromStr for BufferMethod {
    type Err = BufferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(BufferMethod::Simple),
            "root_square" => Ok(BufferMethod::RootSquare),
            _ => Err(BufferError::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for BufferMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BufferType {
    Project,
    Feeding,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BufferStatus {
    Green,
    Yellow,
    Red,
}

/// A time buffer protecting the critical chain, in working days.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Buffer {
    pub buffer_type: BufferType,
    pub size: f64,
    /// Joining task id, or [`PROJECT_BUFFER_LOCATION`].
    pub location: String,
    pub consumed: f64,
}

impl Buffer {
    pub fn new(buffer_type: BufferType, size: f64, location: impl Into<String>) -> Result<Self, BufferError> {
        if !size.is_finite() || size < 0.0 {
            return Err(BufferError::InvalidSize(size));
        }
        Ok(Self {
            buffer_type,
            size,
            location: location.into(),
            consumed: 0.0,
        })
    }

    /// Record `amount` more working days of consumption.
    pub fn consume(&mut self, amount: f64) -> Result<(), BufferError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(BufferError::InvalidConsumption(amount));
        }
        self.consumed += amount;
        Ok(())
    }

    pub fn remaining(&self) -> f64 {
        (self.size - self.consumed).max(0.0)
    }

    fn consumed_fraction(&self) -> f64 {
        if self.size > 0.0 {
            self.consumed / self.size
        } else if self.consumed > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }

    /// Consumption as a percentage of size; infinite for a consumed
    /// zero-size buffer.
    pub fn percent_consumed(&self) -> f64 {
        self.consumed_fraction() * 100.0
    }

    pub fn status(&self) -> BufferStatus {
        let fraction = self.consumed_fraction();
        if fraction <= GREEN_LIMIT {
            BufferStatus::Green
        } else if fraction <= YELLOW_LIMIT {
            BufferStatus::Yellow
        } else {
            BufferStatus::Red
        }
    }
}

/// Non-critical tasks feeding into the critical chain at `joins`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedingChain {
    /// Roots first; the last task is a direct predecessor of `joins`.
    pub tasks: Vec<String>,
    pub joins: String,
}

fn duration_of(durations: &BTreeMap<String, f64>, task: &str) -> Result<f64, BufferError> {
    let duration = *durations
        .get(task)
        .ok_or_else(|| BufferError::MissingDuration(task.to_string()))?;
    if !duration.is_finite() || duration < 0.0 {
        return Err(BufferError::InvalidDuration {
            task: task.to_string(),
            duration,
        });
    }
    Ok(duration)
}

fn total_duration(tasks: &[String], durations: &BTreeMap<String, f64>) -> Result<f64, BufferError> {
    tasks.iter().map(|t| duration_of(durations, t)).sum()
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BufferCalculator {
    method: BufferMethod,
}

impl BufferCalculator {
    pub fn new(method: BufferMethod) -> Self {
        Self { method }
    }

    /// Parse the method name (`"simple"` or `"root_square"`).
    pub fn from_method_name(name: &str) -> Result<Self, BufferError> {
        Ok(Self::new(name.parse()?))
    }

    pub fn method(&self) -> BufferMethod {
        self.method
    }

    pub fn project_buffer(
        &self,
        chain: &[String],
        durations: &BTreeMap<String, f64>,
    ) -> Result<Buffer, BufferError> {
        let size = match self.method {
            BufferMethod::Simple => total_duration(chain, durations)? * SIMPLE_BUFFER_RATIO,
            BufferMethod::RootSquare => chain
                .iter()
                .map(|t| duration_of(durations, t).map(|d| d * d))
                .sum::<Result<f64, _>>()?
                .sqrt(),
        };
        Buffer::new(BufferType::Project, size, PROJECT_BUFFER_LOCATION)
    }

    pub fn feeding_buffer(
        &self,
        feeding: &FeedingChain,
        durations: &BTreeMap<String, f64>,
    ) -> Result<Buffer, BufferError> {
        let size = total_duration(&feeding.tasks, durations)? * FEEDING_BUFFER_RATIO;
        Buffer::new(BufferType::Feeding, size, feeding.joins.clone())
    }

    /// Project buffer first, then one feeding buffer per feeding chain.
    pub fn calculate<M>(
        &self,
        chain: &[String],
        durations: &BTreeMap<String, f64>,
        graph: &TaskGraph<M>,
    ) -> Result<Vec<Buffer>, BufferError> {
        let mut buffers = vec![self.project_buffer(chain, durations)?];
        for feeding in find_feeding_chains(chain, graph)? {
            buffers.push(self.feeding_buffer(&feeding, durations)?);
        }
        Ok(buffers)
    }
}

/// Feeding chains in discovery order: chain tasks in order, then each
/// task's predecessors in edge order.
///
/// Each non-chain predecessor of a chain task roots a backward depth-first
/// walk that stops at chain tasks and at tasks already claimed by an earlier
/// feeding chain.
pub fn find_feeding_chains<M>(chain: &[String], graph: &TaskGraph<M>) -> Result<Vec<FeedingChain>, BufferError> {
    let on_chain: FxHashSet<&str> = chain.iter().map(String::as_str).collect();
    let mut visited: FxHashSet<String> = FxHashSet::default();
    let mut chains = Vec::new();

    for joins in chain {
        for predecessor in graph.get_dependencies(joins)? {
            if on_chain.contains(predecessor) || visited.contains(predecessor) {
                continue;
            }
            let mut tasks = Vec::new();
            collect_feeding(predecessor, graph, &on_chain, &mut visited, &mut tasks)?;
            chains.push(FeedingChain {
                tasks,
                joins: joins.clone(),
            });
        }
    }
    Ok(chains)
}

/// Post-order walk over predecessors, so roots land first.
fn collect_feeding<M>(
    task: &str,
    graph: &TaskGraph<M>,
    on_chain: &FxHashSet<&str>,
    visited: &mut FxHashSet<String>,
    out: &mut Vec<String>,
) -> Result<(), BufferError> {
    visited.insert(task.to_string());
    for predecessor in graph.get_dependencies(task)? {
        if !on_chain.contains(predecessor) && !visited.contains(predecessor) {
            collect_feeding(predecessor, graph, on_chain, visited, out)?;
        }
    }
    out.push(task.to_string());
    Ok(())
}

/// Buffers for a critical chain with the given project buffer method.
pub fn calculate_buffers<M>(
    chain: &[String],
    durations: &BTreeMap<String, f64>,
    graph: &TaskGraph<M>,
    method: BufferMethod,
) -> Result<Vec<Buffer>, BufferError> {
    BufferCalculator::new(method).calculate(chain, durations, graph)
}
