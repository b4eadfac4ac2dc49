//! Monte Carlo schedule simulation.
//!
//! Every trial samples all task durations, reruns the (optionally
//! resource-constrained) critical path pass over the fixed graph topology and
//! records the project duration. Trials are independent and run on rayon.

mod cancel;
mod engine;
pub mod statistics;

use thiserror::Error;

use crate::calendar::CalendarError;
use crate::critical_path::CriticalPathError;
use crate::resources::ResourceError;
use crate::sampler::TaskDistributionError;
use crate::schedule::ScheduleError;

pub use cancel::CancellationToken;
pub(crate) use engine::Trial;
pub use engine::{run_simulation, MonteCarloEngine, MonteCarloResult, ResourceContext};

/// Why a single trial failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrialError {
    #[error("Task {task} sampled invalid duration {duration} (must be positive)")]
    NonPositiveDuration { task: String, duration: f64 },
    #[error(transparent)]
    CriticalPath(#[from] CriticalPathError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

/// Error types for simulation and risk analysis.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Iterations must be between {min} and {max}, got {iterations}")]
    InvalidIterations {
        iterations: usize,
        min: usize,
        max: usize,
    },
    #[error("Simulation requires at least one iteration")]
    NoIterations,
    #[error("Percentile {0} is outside 0-100")]
    InvalidPercentile(f64),
    #[error("Invalid {name} {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
    #[error("Invalid simulation input: {0}")]
    InvalidInput(#[from] ScheduleError),
    #[error(transparent)]
    InvalidDistribution(#[from] TaskDistributionError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error("Simulation iteration {iteration} failed: {source}")]
    Iteration {
        iteration: usize,
        #[source]
        source: TrialError,
    },
    #[error("Simulation cancelled")]
    Cancelled,
}
