use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::calendar::WorkCalendar;
use crate::config::{validate_percentiles, SimulationConfig};
use crate::critical_path::CriticalPathCalculator;
use crate::graph::{Metadata, TaskGraph};
use crate::models::SimulationTaskInput;
use crate::resources::{ResourceConstrainedScheduler, ResourcePool, TaskResourceRequirement};
use crate::sampler::TaskSampler;
use crate::schedule::{build_task_graph, ScheduleError};
use crate::{log_changes, log_debug};

use super::statistics;
use super::{CancellationToken, SimulationError, TrialError};

/// Aggregate outcome of a simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub mean_duration: f64,
    pub median_duration: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// `(percentile, duration)` pairs in the order they were requested.
    pub percentiles: Vec<(f64, f64)>,
    pub iterations: usize,
    /// Project duration of every trial, in iteration order.
    pub durations: Vec<f64>,
}

impl MonteCarloResult {
    pub fn from_durations(durations: Vec<f64>, percentiles: &[f64]) -> Self {
        let sorted = statistics::sorted(&durations);
        Self {
            mean_duration: statistics::mean(&durations),
            median_duration: statistics::median(&sorted),
            std_dev: statistics::population_std_dev(&durations),
            percentiles: percentiles
                .iter()
                .map(|&p| (p, statistics::percentile(&sorted, p)))
                .collect(),
            iterations: durations.len(),
            durations,
        }
    }

    /// Duration at a requested percentile; `None` if `p` was not requested.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|(requested, _)| *requested == p)
            .map(|&(_, value)| value)
    }

    /// Fraction of trials finishing within `duration` working days.
    pub fn probability_within(&self, duration: f64) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        let hits = self.durations.iter().filter(|&&d| d <= duration).count();
        hits as f64 / self.durations.len() as f64
    }
}

/// Pool and requirements that switch trials to the resource-constrained pass.
#[derive(Clone, Copy, Debug)]
pub struct ResourceContext<'a> {
    pub pool: &'a ResourcePool,
    pub requirements: &'a [TaskResourceRequirement],
}

/// One trial's sampled durations (graph order) and CPM outcome.
pub(crate) struct Trial {
    pub durations: Vec<f64>,
    pub project_duration: f64,
    /// Graph indices of the trial's critical tasks.
    pub critical: Vec<usize>,
}

/// Runs independent schedule trials over a fixed task graph.
///
/// The graph is built and checked for cycles once, at construction; trials
/// only swap durations. Trial `i` draws from a `StdRng` seeded with
/// `seed + i`, so a seeded run gives the same result on any thread count.
pub struct MonteCarloEngine<'a> {
    graph: TaskGraph,
    /// Indexed like the graph.
    samplers: Vec<TaskSampler>,
    config: SimulationConfig,
    resources: Option<ResourceConstrainedScheduler<'a>>,
    cancel: CancellationToken,
}

/// Graph nodes need a positive duration; trials override it.
fn nominal_duration(sampler: &TaskSampler) -> f64 {
    let mean = sampler.mean_duration();
    if mean.is_finite() && mean > 0.0 {
        mean
    } else {
        f64::EPSILON
    }
}

impl<'a> MonteCarloEngine<'a> {
    /// Structural problems (duplicate id, malformed or unknown dependency,
    /// cycle) fail here as `InvalidInput`, before any trial runs.
    pub fn new(samplers: Vec<TaskSampler>, config: SimulationConfig) -> Result<Self, SimulationError> {
        validate_percentiles(&config.percentiles)?;
        let graph = build_task_graph(
            samplers
                .iter()
                .map(|s| (s.task_id(), nominal_duration(s), s.dependencies())),
        )?;
        CriticalPathCalculator::new(&graph).map_err(ScheduleError::from)?;

        Ok(Self {
            graph,
            samplers,
            config,
            resources: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn from_inputs(tasks: &[SimulationTaskInput], config: SimulationConfig) -> Result<Self, SimulationError> {
        let samplers = tasks
            .iter()
            .map(TaskSampler::from_input)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(samplers, config)
    }

    /// Run every trial through the resource-constrained pass.
    pub fn with_resources(mut self, scheduler: ResourceConstrainedScheduler<'a>) -> Self {
        self.resources = Some(scheduler.with_verbosity(self.config.verbosity));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn samplers(&self) -> &[TaskSampler] {
        &self.samplers
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn run(&self) -> Result<MonteCarloResult, SimulationError> {
        self.run_with_sampler(|sampler, rng| sampler.sample_duration(rng))
    }

    /// Run with a custom draw for each task in place of its own distribution.
    pub fn run_with_sampler<F>(&self, sample: F) -> Result<MonteCarloResult, SimulationError>
    where
        F: Fn(&TaskSampler, &mut StdRng) -> f64 + Sync,
    {
        let durations = self.run_trials(&sample, |trial| trial.project_duration)?;
        let result = MonteCarloResult::from_durations(durations, &self.config.percentiles);
        log_changes!(
            self.config.verbosity,
            "Simulation finished: {} iterations, mean {:.2}, p50 {:.2}, std dev {:.2}",
            result.iterations,
            result.mean_duration,
            result.median_duration,
            result.std_dev
        );
        Ok(result)
    }

    /// Run all trials, mapping each through `collect`, in iteration order.
    ///
    /// Any failing trial aborts the run; nothing partial is returned.
    pub(crate) fn run_trials<F, G, T>(&self, sample: &F, collect: G) -> Result<Vec<T>, SimulationError>
    where
        F: Fn(&TaskSampler, &mut StdRng) -> f64 + Sync,
        G: Fn(Trial) -> T + Sync,
        T: Send,
    {
        if self.config.iterations == 0 {
            return Err(SimulationError::NoIterations);
        }
        let calculator = CriticalPathCalculator::new(&self.graph).map_err(ScheduleError::from)?;
        let base_seed = self.config.seed.unwrap_or_else(|| rand::rng().random());
        log_changes!(
            self.config.verbosity,
            "Running {} iterations over {} tasks (base seed {})",
            self.config.iterations,
            self.graph.len(),
            base_seed
        );

        (0..self.config.iterations)
            .into_par_iter()
            .map(|iteration| {
                if self.cancel.is_cancelled() {
                    return Err(SimulationError::Cancelled);
                }
                let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(iteration as u64));
                let trial = self
                    .trial(&calculator, sample, &mut rng)
                    .map_err(|source| SimulationError::Iteration { iteration, source })?;
                log_debug!(
                    self.config.verbosity,
                    iteration,
                    "Trial duration {:.3}",
                    trial.project_duration
                );
                Ok(collect(trial))
            })
            .collect()
    }

    fn trial<F>(
        &self,
        calculator: &CriticalPathCalculator<'_, Metadata>,
        sample: &F,
        rng: &mut StdRng,
    ) -> Result<Trial, TrialError>
    where
        F: Fn(&TaskSampler, &mut StdRng) -> f64,
    {
        let mut durations = Vec::with_capacity(self.samplers.len());
        for sampler in &self.samplers {
            let duration = sample(sampler, rng);
            if !(duration.is_finite() && duration > 0.0) {
                return Err(TrialError::NonPositiveDuration {
                    task: sampler.task_id().to_string(),
                    duration,
                });
            }
            durations.push(duration);
        }

        let timings = match &self.resources {
            Some(scheduler) => scheduler.timings(calculator, &durations)?.timings,
            None => calculator.timings(&durations)?,
        };
        let critical = calculator.critical_indices(&timings).collect();

        Ok(Trial {
            project_duration: timings.project_duration,
            durations,
            critical,
        })
    }
}

/// Simulation entry point.
///
/// Checks the iteration bounds and percentiles, builds one sampler per task
/// and runs the engine. With a resource context, trials use the
/// resource-constrained pass anchored at `project_start` on `calendar`.
pub fn run_simulation(
    tasks: &[SimulationTaskInput],
    project_start: NaiveDate,
    calendar: &WorkCalendar,
    config: &SimulationConfig,
    resources: Option<ResourceContext<'_>>,
) -> Result<MonteCarloResult, SimulationError> {
    config.validate()?;
    let mut engine = MonteCarloEngine::from_inputs(tasks, config.clone())?;
    if let Some(context) = resources {
        let scheduler =
            ResourceConstrainedScheduler::new(context.pool, calendar, project_start, context.requirements)?;
        engine = engine.with_resources(scheduler);
    }
    engine.run()
}
