//! PyO3 bindings: the `scheduling_core` Python module.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::NaiveDate;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{IntoPyDict, PyDict};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

use crate::buffers::{self, Buffer, BufferMethod, BufferStatus, BufferType};
use crate::calendar::{weekday_from_iso, WorkCalendar};
use crate::config::{RiskConfig, SimulationConfig, DEFAULT_CONFIDENCE_PERCENTILES, DEFAULT_PERCENTILES};
use crate::distributions::DistributionSpec;
use crate::models::{SimulationTaskInput, TaskInput};
use crate::resources::{Resource, ResourcePool, ResourceType, TaskResourceRequirement};
use crate::risk::{self, RiskMetrics};
use crate::schedule::{self, build_task_graph};
use crate::simulation::{self, MonteCarloResult, ResourceContext};

// Note: We use std HashMap here for PyO3 interface compatibility

fn value_error(e: impl Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Calendar from optional holidays and ISO weekday numbers (1 = Monday).
fn build_calendar(holidays: Option<Vec<NaiveDate>>, workdays: Option<Vec<u32>>) -> PyResult<WorkCalendar> {
    let mut calendar = match workdays {
        Some(days) => {
            let weekdays = days
                .into_iter()
                .map(|n| weekday_from_iso(n).ok_or_else(|| value_error(format!("Invalid ISO weekday {n}"))))
                .collect::<PyResult<Vec<_>>>()?;
            WorkCalendar::new(weekdays, std::iter::empty()).map_err(value_error)?
        }
        None => WorkCalendar::default(),
    };
    if let Some(holidays) = holidays {
        calendar.add_holidays(&holidays);
    }
    Ok(calendar)
}

/// A task with a fixed duration.
#[pyclass(name = "TaskInput")]
#[derive(Clone, Debug)]
pub struct PyTaskInput {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    pub duration: f64,
    #[pyo3(get, set)]
    pub dependencies: Option<String>,
}

#[pymethods]
impl PyTaskInput {
    #[new]
    #[pyo3(signature = (id, duration, dependencies=None))]
    fn new(id: String, duration: f64, dependencies: Option<String>) -> Self {
        Self {
            id,
            duration,
            dependencies,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "TaskInput(id={:?}, duration={}, dependencies={:?})",
            self.id, self.duration, self.dependencies
        )
    }
}

impl From<PyTaskInput> for TaskInput {
    fn from(task: PyTaskInput) -> Self {
        TaskInput {
            id: task.id,
            duration: task.duration,
            dependencies: task.dependencies,
        }
    }
}

/// A task whose duration is drawn from a named distribution.
#[pyclass(name = "SimulationTask")]
#[derive(Clone, Debug)]
pub struct PySimulationTask {
    #[pyo3(get, set)]
    pub id: String,
    /// `triangular`, `uniform`, `normal` or `fixed`
    #[pyo3(get, set)]
    pub distribution: String,
    #[pyo3(get, set)]
    pub params: HashMap<String, f64>,
    #[pyo3(get, set)]
    pub dependencies: Option<String>,
}

#[pymethods]
impl PySimulationTask {
    #[new]
    #[pyo3(signature = (id, distribution, params, dependencies=None))]
    fn new(id: String, distribution: String, params: HashMap<String, f64>, dependencies: Option<String>) -> Self {
        Self {
            id,
            distribution,
            params,
            dependencies,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "SimulationTask(id={:?}, distribution={:?}, dependencies={:?})",
            self.id, self.distribution, self.dependencies
        )
    }
}

impl From<PySimulationTask> for SimulationTaskInput {
    fn from(task: PySimulationTask) -> Self {
        let params: BTreeMap<String, f64> = task.params.into_iter().collect();
        SimulationTaskInput {
            id: task.id,
            distribution: DistributionSpec::new(task.distribution, params),
            dependencies: task.dependencies,
        }
    }
}

/// A resource in the pool available to simulation trials.
#[pyclass(name = "Resource")]
#[derive(Clone, Debug)]
pub struct PyResource {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    pub name: String,
    #[pyo3(get, set)]
    pub resource_type: String,
    #[pyo3(get, set)]
    pub capacity: f64,
    #[pyo3(get, set)]
    pub unavailable_dates: Vec<NaiveDate>,
}

#[pymethods]
impl PyResource {
    #[new]
    #[pyo3(signature = (id, name, resource_type="person".to_string(), capacity=1.0, unavailable_dates=Vec::new()))]
    fn new(
        id: String,
        name: String,
        resource_type: String,
        capacity: f64,
        unavailable_dates: Vec<NaiveDate>,
    ) -> Self {
        Self {
            id,
            name,
            resource_type,
            capacity,
            unavailable_dates,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Resource(id={:?}, type={}, capacity={})",
            self.id, self.resource_type, self.capacity
        )
    }
}

/// What a task needs from the pool while it runs.
#[pyclass(name = "ResourceRequirement")]
#[derive(Clone, Debug)]
pub struct PyResourceRequirement {
    #[pyo3(get, set)]
    pub task_id: String,
    #[pyo3(get, set)]
    pub resource_type: String,
    #[pyo3(get, set)]
    pub quantity: f64,
    #[pyo3(get, set)]
    pub resource_ids: Vec<String>,
}

#[pymethods]
impl PyResourceRequirement {
    #[new]
    #[pyo3(signature = (task_id, resource_type="person".to_string(), quantity=1.0, resource_ids=Vec::new()))]
    fn new(task_id: String, resource_type: String, quantity: f64, resource_ids: Vec<String>) -> Self {
        Self {
            task_id,
            resource_type,
            quantity,
            resource_ids,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "ResourceRequirement(task_id={:?}, type={}, quantity={}, resources={:?})",
            self.task_id, self.resource_type, self.quantity, self.resource_ids
        )
    }
}

fn build_pool(resources: Vec<PyResource>) -> PyResult<ResourcePool> {
    let mut pool = ResourcePool::new();
    for resource in resources {
        let resource_type: ResourceType = resource.resource_type.parse().map_err(value_error)?;
        let built = Resource::new(resource.id, resource.name, resource_type, resource.capacity)
            .map_err(value_error)?
            .with_unavailable_dates(resource.unavailable_dates);
        pool.add(built).map_err(value_error)?;
    }
    Ok(pool)
}

fn build_requirements(requirements: Vec<PyResourceRequirement>) -> PyResult<Vec<TaskResourceRequirement>> {
    requirements
        .into_iter()
        .map(|r| {
            let resource_type: ResourceType = r.resource_type.parse().map_err(value_error)?;
            Ok(TaskResourceRequirement::new(r.task_id, resource_type, r.quantity)
                .map_err(value_error)?
                .with_resources(r.resource_ids))
        })
        .collect()
}

/// Per-task CPM output with calendar dates.
#[pyclass(name = "TaskSchedule")]
#[derive(Clone, Debug)]
pub struct PyTaskSchedule {
    #[pyo3(get)]
    pub duration: f64,
    #[pyo3(get)]
    pub dependencies: Vec<String>,
    #[pyo3(get)]
    pub early_start: f64,
    #[pyo3(get)]
    pub early_finish: f64,
    #[pyo3(get)]
    pub late_start: f64,
    #[pyo3(get)]
    pub late_finish: f64,
    #[pyo3(get)]
    pub slack: f64,
    #[pyo3(get)]
    pub is_critical: bool,
    #[pyo3(get)]
    pub start_date: NaiveDate,
    #[pyo3(get)]
    pub end_date: NaiveDate,
}

#[pymethods]
impl PyTaskSchedule {
    fn __repr__(&self) -> String {
        format!(
            "TaskSchedule(es={}, ef={}, slack={}, critical={}, {}..{})",
            self.early_start, self.early_finish, self.slack, self.is_critical, self.start_date, self.end_date
        )
    }
}

#[pyclass(name = "ScheduleResult")]
#[derive(Clone, Debug)]
pub struct PyScheduleResult {
    #[pyo3(get)]
    pub tasks: HashMap<String, PyTaskSchedule>,
    #[pyo3(get)]
    pub critical_path: Vec<String>,
    #[pyo3(get)]
    pub project_duration: f64,
    #[pyo3(get)]
    pub project_start: NaiveDate,
    #[pyo3(get)]
    pub project_end: NaiveDate,
}

#[pymethods]
impl PyScheduleResult {
    fn __repr__(&self) -> String {
        format!(
            "ScheduleResult(tasks={}, duration={}, end={})",
            self.tasks.len(),
            self.project_duration,
            self.project_end
        )
    }
}

#[pyclass(name = "SimulationResult")]
#[derive(Clone, Debug)]
pub struct PySimulationResult {
    #[pyo3(get)]
    pub mean_duration: f64,
    #[pyo3(get)]
    pub median_duration: f64,
    #[pyo3(get)]
    pub std_dev: f64,
    pub percentiles: Vec<(f64, f64)>,
    #[pyo3(get)]
    pub iterations: usize,
    #[pyo3(get)]
    pub durations: Vec<f64>,
}

#[pymethods]
impl PySimulationResult {
    /// Requested percentile -> duration.
    #[getter]
    fn percentiles<'py>(&self, py: Python<'py>) -> Bound<'py, PyDict> {
        self.percentiles.clone().into_py_dict_bound(py)
    }

    /// Share of trials finishing within `duration` working days.
    fn probability_within(&self, duration: f64) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        let hits = self.durations.iter().filter(|&&d| d <= duration).count();
        hits as f64 / self.durations.len() as f64
    }

    fn __repr__(&self) -> String {
        format!(
            "SimulationResult(mean={:.2}, median={:.2}, std_dev={:.2}, iterations={})",
            self.mean_duration, self.median_duration, self.std_dev, self.iterations
        )
    }
}

impl From<MonteCarloResult> for PySimulationResult {
    fn from(result: MonteCarloResult) -> Self {
        Self {
            mean_duration: result.mean_duration,
            median_duration: result.median_duration,
            std_dev: result.std_dev,
            percentiles: result.percentiles,
            iterations: result.iterations,
            durations: result.durations,
        }
    }
}

#[pyclass(name = "TaskCriticality")]
#[derive(Clone, Debug)]
pub struct PyTaskCriticality {
    #[pyo3(get)]
    pub criticality_index: f64,
    #[pyo3(get)]
    pub critical_count: usize,
    #[pyo3(get)]
    pub total_iterations: usize,
    #[pyo3(get)]
    pub mean_duration: f64,
    #[pyo3(get)]
    pub duration_variance: f64,
    #[pyo3(get)]
    pub is_risk_driver: bool,
}

#[pyclass(name = "RiskMetrics")]
#[derive(Clone, Debug)]
pub struct PyRiskMetrics {
    #[pyo3(get)]
    pub task_criticality: HashMap<String, PyTaskCriticality>,
    #[pyo3(get)]
    pub probabilistic_critical_path: Vec<String>,
    #[pyo3(get)]
    pub risk_drivers: Vec<String>,
    pub completion_confidence: Vec<(f64, NaiveDate)>,
    #[pyo3(get)]
    pub simulation: PySimulationResult,
}

#[pymethods]
impl PyRiskMetrics {
    /// Percentile -> completion date.
    #[getter]
    fn completion_confidence<'py>(&self, py: Python<'py>) -> Bound<'py, PyDict> {
        self.completion_confidence.clone().into_py_dict_bound(py)
    }

    fn __repr__(&self) -> String {
        format!(
            "RiskMetrics(tasks={}, risk_drivers={:?})",
            self.task_criticality.len(),
            self.risk_drivers
        )
    }
}

impl From<RiskMetrics> for PyRiskMetrics {
    fn from(metrics: RiskMetrics) -> Self {
        let task_criticality = metrics
            .task_criticality
            .into_iter()
            .map(|(id, data)| {
                (
                    id,
                    PyTaskCriticality {
                        criticality_index: data.criticality_index,
                        critical_count: data.critical_count,
                        total_iterations: data.total_iterations,
                        mean_duration: data.mean_duration,
                        duration_variance: data.duration_variance,
                        is_risk_driver: data.is_risk_driver,
                    },
                )
            })
            .collect();
        Self {
            task_criticality,
            probabilistic_critical_path: metrics.probabilistic_critical_path,
            risk_drivers: metrics.risk_drivers,
            completion_confidence: metrics.completion_confidence,
            simulation: metrics.simulation.into(),
        }
    }
}

#[pyclass(name = "Buffer")]
#[derive(Clone, Debug)]
pub struct PyBuffer {
    /// `PROJECT` or `FEEDING`
    #[pyo3(get)]
    pub buffer_type: String,
    #[pyo3(get)]
    pub size: f64,
    #[pyo3(get)]
    pub location: String,
    #[pyo3(get, set)]
    pub consumed: f64,
}

impl PyBuffer {
    fn as_buffer(&self) -> Buffer {
        let buffer_type = match self.buffer_type.as_str() {
            "PROJECT" => BufferType::Project,
            _ => BufferType::Feeding,
        };
        Buffer {
            buffer_type,
            size: self.size,
            location: self.location.clone(),
            consumed: self.consumed,
        }
    }
}

#[pymethods]
impl PyBuffer {
    fn remaining(&self) -> f64 {
        self.as_buffer().remaining()
    }

    fn percent_consumed(&self) -> f64 {
        self.as_buffer().percent_consumed()
    }

    /// `GREEN`, `YELLOW` or `RED`
    fn status(&self) -> &'static str {
        match self.as_buffer().status() {
            BufferStatus::Green => "GREEN",
            BufferStatus::Yellow => "YELLOW",
            BufferStatus::Red => "RED",
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Buffer(type={}, size={}, location={:?}, consumed={})",
            self.buffer_type, self.size, self.location, self.consumed
        )
    }
}

impl From<Buffer> for PyBuffer {
    fn from(buffer: Buffer) -> Self {
        let buffer_type = match buffer.buffer_type {
            BufferType::Project => "PROJECT",
            BufferType::Feeding => "FEEDING",
        };
        Self {
            buffer_type: buffer_type.to_string(),
            size: buffer.size,
            location: buffer.location,
            consumed: buffer.consumed,
        }
    }
}

/// Compute the critical path schedule for fixed-duration tasks.
///
/// # Arguments
/// * `tasks` - Tasks with comma-separated dependency text
/// * `project_start` - First day of the project
/// * `holidays` - Non-working dates
/// * `workdays` - ISO weekday numbers that are working days (default Monday-Friday)
///
/// # Raises
/// * ValueError on duplicate IDs, unknown or malformed dependencies, cycles
#[pyfunction]
#[pyo3(name = "calculate_schedule", signature = (tasks, project_start, holidays=None, workdays=None))]
fn py_calculate_schedule(
    tasks: Vec<PyTaskInput>,
    project_start: NaiveDate,
    holidays: Option<Vec<NaiveDate>>,
    workdays: Option<Vec<u32>>,
) -> PyResult<PyScheduleResult> {
    let calendar = build_calendar(holidays, workdays)?;
    let tasks: Vec<TaskInput> = tasks.into_iter().map(Into::into).collect();
    let schedule = schedule::calculate_schedule(&tasks, project_start, &calendar).map_err(value_error)?;

    let mut result = HashMap::with_capacity(schedule.tasks.len());
    for (id, data) in schedule.tasks {
        let (start_date, end_date) = schedule
            .task_dates
            .get(&id)
            .copied()
            .ok_or_else(|| value_error(format!("No dates computed for task {id}")))?;
        result.insert(
            id,
            PyTaskSchedule {
                duration: data.duration,
                dependencies: data.dependencies,
                early_start: data.early_start,
                early_finish: data.early_finish,
                late_start: data.late_start,
                late_finish: data.late_finish,
                slack: data.slack,
                is_critical: data.is_critical,
                start_date,
                end_date,
            },
        );
    }

    Ok(PyScheduleResult {
        tasks: result,
        critical_path: schedule.critical_path,
        project_duration: schedule.project_duration,
        project_start: schedule.project_start,
        project_end: schedule.project_end,
    })
}

/// Run a Monte Carlo simulation of the project duration.
///
/// # Arguments
/// * `iterations` - Number of trials, 100 to 100000
/// * `percentiles` - Percentiles to report (default 10, 50, 90, 95, 99)
/// * `seed` - Base seed for reproducible runs
/// * `resources`, `requirements` - Switch trials to resource-constrained scheduling
///
/// # Raises
/// * ValueError on invalid input, iteration count or a failed trial
#[pyfunction]
#[pyo3(name = "run_simulation", signature = (
    tasks,
    project_start,
    iterations=10000,
    holidays=None,
    workdays=None,
    percentiles=None,
    seed=None,
    resources=None,
    requirements=None,
    verbosity=0
))]
#[allow(clippy::too_many_arguments)]
fn py_run_simulation(
    py: Python<'_>,
    tasks: Vec<PySimulationTask>,
    project_start: NaiveDate,
    iterations: usize,
    holidays: Option<Vec<NaiveDate>>,
    workdays: Option<Vec<u32>>,
    percentiles: Option<Vec<f64>>,
    seed: Option<u64>,
    resources: Option<Vec<PyResource>>,
    requirements: Option<Vec<PyResourceRequirement>>,
    verbosity: u8,
) -> PyResult<PySimulationResult> {
    let calendar = build_calendar(holidays, workdays)?;
    let tasks: Vec<SimulationTaskInput> = tasks.into_iter().map(Into::into).collect();
    let mut config = SimulationConfig::default()
        .with_iterations(iterations)
        .with_percentiles(percentiles.unwrap_or_else(|| DEFAULT_PERCENTILES.to_vec()))
        .with_verbosity(verbosity);
    config.seed = seed;
    let pool = build_pool(resources.unwrap_or_default())?;
    let requirements = build_requirements(requirements.unwrap_or_default())?;

    let result = py.allow_threads(|| {
        let context = (!requirements.is_empty()).then_some(ResourceContext {
            pool: &pool,
            requirements: &requirements,
        });
        simulation::run_simulation(&tasks, project_start, &calendar, &config, context)
    });
    result.map(Into::into).map_err(value_error)
}

/// Run a schedule risk analysis: criticality, risk drivers, completion dates.
///
/// # Raises
/// * ValueError on invalid input, thresholds, iteration count or a failed trial
#[pyfunction]
#[pyo3(name = "analyze_risk", signature = (
    tasks,
    project_start,
    num_iterations=10000,
    criticality_threshold=0.5,
    variance_threshold=1.0,
    holidays=None,
    workdays=None,
    confidence_percentiles=None,
    seed=None,
    resources=None,
    requirements=None,
    verbosity=0
))]
#[allow(clippy::too_many_arguments)]
fn py_analyze_risk(
    py: Python<'_>,
    tasks: Vec<PySimulationTask>,
    project_start: NaiveDate,
    num_iterations: usize,
    criticality_threshold: f64,
    variance_threshold: f64,
    holidays: Option<Vec<NaiveDate>>,
    workdays: Option<Vec<u32>>,
    confidence_percentiles: Option<Vec<f64>>,
    seed: Option<u64>,
    resources: Option<Vec<PyResource>>,
    requirements: Option<Vec<PyResourceRequirement>>,
    verbosity: u8,
) -> PyResult<PyRiskMetrics> {
    let calendar = build_calendar(holidays, workdays)?;
    let tasks: Vec<SimulationTaskInput> = tasks.into_iter().map(Into::into).collect();
    let mut config = RiskConfig::default()
        .with_iterations(num_iterations)
        .with_thresholds(criticality_threshold, variance_threshold)
        .with_confidence_percentiles(
            confidence_percentiles.unwrap_or_else(|| DEFAULT_CONFIDENCE_PERCENTILES.to_vec()),
        )
        .with_verbosity(verbosity);
    config.seed = seed;
    let pool = build_pool(resources.unwrap_or_default())?;
    let requirements = build_requirements(requirements.unwrap_or_default())?;

    let metrics = py.allow_threads(|| {
        let context = (!requirements.is_empty()).then_some(ResourceContext {
            pool: &pool,
            requirements: &requirements,
        });
        risk::analyze_risk(&tasks, project_start, &calendar, &config, context)
    });
    metrics.map(Into::into).map_err(value_error)
}

/// Size the project buffer and the feeding buffers of a critical chain.
///
/// # Arguments
/// * `critical_chain` - Critical task IDs in chain order
/// * `durations` - Dict mapping task ID to duration in working days
/// * `tasks` - The task network the chain was taken from
/// * `method` - `simple` or `root_square`
///
/// # Returns
/// * Project buffer first, then one feeding buffer per feeding chain
#[pyfunction]
#[pyo3(name = "calculate_buffers", signature = (critical_chain, durations, tasks, method="simple"))]
fn py_calculate_buffers(
    critical_chain: Vec<String>,
    durations: HashMap<String, f64>,
    tasks: Vec<PyTaskInput>,
    method: &str,
) -> PyResult<Vec<PyBuffer>> {
    let method: BufferMethod = method.parse().map_err(value_error)?;
    let graph = build_task_graph(
        tasks
            .iter()
            .map(|t| (t.id.as_str(), t.duration, t.dependencies.as_deref())),
    )
    .map_err(value_error)?;
    let durations: BTreeMap<String, f64> = durations.into_iter().collect();

    let buffers =
        buffers::calculate_buffers(&critical_chain, &durations, &graph, method).map_err(value_error)?;
    Ok(buffers.into_iter().map(Into::into).collect())
}

/// The scheduling_core Python module.
#[pymodule]
fn scheduling_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Inputs
    m.add_class::<PyTaskInput>()?;
    m.add_class::<PySimulationTask>()?;
    m.add_class::<PyResource>()?;
    m.add_class::<PyResourceRequirement>()?;

    // Results
    m.add_class::<PyTaskSchedule>()?;
    m.add_class::<PyScheduleResult>()?;
    m.add_class::<PySimulationResult>()?;
    m.add_class::<PyTaskCriticality>()?;
    m.add_class::<PyRiskMetrics>()?;
    m.add_class::<PyBuffer>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(py_calculate_schedule, m)?)?;
    m.add_function(wrap_pyfunction!(py_run_simulation, m)?)?;
    m.add_function(wrap_pyfunction!(py_analyze_risk, m)?)?;
    m.add_function(wrap_pyfunction!(py_calculate_buffers, m)?)?;

    Ok(())
}
