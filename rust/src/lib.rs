//! Project scheduling computation core.
//!
//! Deterministic critical path scheduling over working-day calendars,
//! resource-constrained scheduling, Monte Carlo duration simulation, schedule
//! risk analysis and critical chain buffer sizing.
//!
//! Everything is pure computation over in-memory inputs. The optional
//! `python` feature exposes the entry points as the `scheduling_core` module.

pub mod logging;

pub mod buffers;
pub mod calendar;
pub mod config;
pub mod critical_path;
pub mod dependency;
pub mod distributions;
pub mod graph;
pub mod models;
pub mod resources;
pub mod risk;
pub mod sampler;
pub mod schedule;
pub mod simulation;

#[cfg(feature = "python")]
mod python;

pub use buffers::{
    calculate_buffers, find_feeding_chains, Buffer, BufferCalculator, BufferError, BufferMethod,
    BufferStatus, BufferType, FeedingChain,
};
pub use calendar::{calculate_task_dates, weekday_from_iso, CalendarError, WorkCalendar, WorkWeek};
pub use config::{CalendarConfig, RiskConfig, SimulationConfig};
pub use critical_path::{
    calculate_critical_path, CriticalPathCalculator, CriticalPathError, CriticalPathResult,
    TaskScheduleData,
};
pub use dependency::{parse_dependencies, DependencyParseError};
pub use distributions::{Distribution, DistributionError, DistributionSpec};
pub use graph::{GraphError, Metadata, MetadataValue, TaskGraph, TaskNode};
pub use models::{ProjectSchedule, SimulationTaskInput, TaskInput};
pub use resources::{
    ConflictReason, Resource, ResourceAllocation, ResourceConflict, ResourceConflictDetector,
    ResourceConstrainedResult, ResourceConstrainedScheduler, ResourceError, ResourcePool,
    ResourceType, TaskResourceRequirement,
};
pub use risk::{analyze_risk, RiskAnalyzer, RiskMetrics, TaskCriticalityData};
pub use sampler::{TaskDistributionError, TaskSampler};
pub use schedule::{build_task_graph, calculate_schedule, ScheduleError};
pub use simulation::{
    run_simulation, CancellationToken, MonteCarloEngine, MonteCarloResult, ResourceContext,
    SimulationError, TrialError,
};
