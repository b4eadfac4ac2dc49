//! Schedule risk analysis: criticality indices, risk drivers and
//! completion-date confidence.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::calendar::{CalendarError, WorkCalendar};
use crate::config::RiskConfig;
use crate::models::SimulationTaskInput;
use crate::resources::ResourceConstrainedScheduler;
use crate::simulation::statistics;
use crate::simulation::{
    CancellationToken, MonteCarloEngine, MonteCarloResult, ResourceContext, SimulationError, Trial,
};
use crate::{log_changes, log_checks};

/// How often one task drove the schedule across the simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskCriticalityData {
    /// `critical_count / total_iterations`, in `[0, 1]`.
    pub criticality_index: f64,
    pub critical_count: usize,
    pub total_iterations: usize,
    pub mean_duration: f64,
    /// Population variance of the sampled durations.
    pub duration_variance: f64,
    pub is_risk_driver: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub task_criticality: BTreeMap<String, TaskCriticalityData>,
    /// Every task, most critical first; ties keep task insertion order.
    pub probabilistic_critical_path: Vec<String>,
    /// Risk drivers in probabilistic critical path order.
    pub risk_drivers: Vec<String>,
    /// `(percentile, completion date)` in the configured order; the date is
    /// the project's last working day.
    pub completion_confidence: Vec<(f64, NaiveDate)>,
    pub simulation: MonteCarloResult,
    pub criticality_threshold: f64,
    pub variance_threshold: f64,
}

/// Monte Carlo analysis that keeps each trial's critical set and samples.
pub struct RiskAnalyzer<'a> {
    engine: MonteCarloEngine<'a>,
    config: RiskConfig,
    project_start: NaiveDate,
    calendar: &'a WorkCalendar,
}

impl<'a> RiskAnalyzer<'a> {
    pub fn new(
        tasks: &[SimulationTaskInput],
        project_start: NaiveDate,
        calendar: &'a WorkCalendar,
        config: RiskConfig,
    ) -> Result<Self, SimulationError> {
        config.validate_thresholds()?;
        let engine = MonteCarloEngine::from_inputs(tasks, config.simulation())?;
        Ok(Self {
            engine,
            config,
            project_start,
            calendar,
        })
    }

    pub fn with_resources(mut self, scheduler: ResourceConstrainedScheduler<'a>) -> Self {
        self.engine = self.engine.with_resources(scheduler);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.engine = self.engine.with_cancellation(token);
        self
    }

    pub fn analyze(&self) -> Result<RiskMetrics, SimulationError> {
        let trials: Vec<Trial> = self
            .engine
            .run_trials(&|sampler, rng| sampler.sample_duration(rng), |trial| trial)?;
        let graph = self.engine.graph();
        let iterations = trials.len();

        let mut critical_counts = vec![0usize; graph.len()];
        let mut samples: Vec<Vec<f64>> = vec![Vec::with_capacity(iterations); graph.len()];
        let mut project_durations = Vec::with_capacity(iterations);
        for trial in &trials {
            for &ix in &trial.critical {
                critical_counts[ix] += 1;
            }
            for (ix, &duration) in trial.durations.iter().enumerate() {
                samples[ix].push(duration);
            }
            project_durations.push(trial.project_duration);
        }

        let mut task_criticality = BTreeMap::new();
        let mut ranked = Vec::with_capacity(graph.len());
        for (ix, task_id) in graph.task_ids().enumerate() {
            let criticality_index = critical_counts[ix] as f64 / iterations as f64;
            let duration_variance = statistics::population_variance(&samples[ix]);
            let is_risk_driver = criticality_index >= self.config.criticality_threshold
                && duration_variance >= self.config.variance_threshold;
            log_checks!(
                self.config.verbosity,
                task = task_id,
                "Criticality {:.3}, variance {:.3}{}",
                criticality_index,
                duration_variance,
                if is_risk_driver { " (risk driver)" } else { "" }
            );
            task_criticality.insert(
                task_id.to_string(),
                TaskCriticalityData {
                    criticality_index,
                    critical_count: critical_counts[ix],
                    total_iterations: iterations,
                    mean_duration: statistics::mean(&samples[ix]),
                    duration_variance,
                    is_risk_driver,
                },
            );
            ranked.push((task_id, criticality_index));
        }

        // Stable sort: equal indices stay in insertion order.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let probabilistic_critical_path: Vec<String> =
            ranked.iter().map(|(id, _)| id.to_string()).collect();
        let risk_drivers: Vec<String> = probabilistic_critical_path
            .iter()
            .filter(|id| task_criticality.get(*id).is_some_and(|data| data.is_risk_driver))
            .cloned()
            .collect();

        let completion_confidence = self.completion_confidence(&project_durations)?;
        let simulation =
            MonteCarloResult::from_durations(project_durations, &self.engine.config().percentiles);

        log_changes!(
            self.config.verbosity,
            "Risk analysis finished: {} iterations, {} risk drivers",
            iterations,
            risk_drivers.len()
        );

        Ok(RiskMetrics {
            task_criticality,
            probabilistic_critical_path,
            risk_drivers,
            completion_confidence,
            simulation,
            criticality_threshold: self.config.criticality_threshold,
            variance_threshold: self.config.variance_threshold,
        })
    }

    /// Percentiles over completion-date ordinals, rounded down to a whole day.
    fn completion_confidence(&self, durations: &[f64]) -> Result<Vec<(f64, NaiveDate)>, SimulationError> {
        let ordinals = durations
            .iter()
            .map(|&duration| {
                self.calendar
                    .span_end(self.project_start, duration)
                    .map(|date| f64::from(date.num_days_from_ce()))
            })
            .collect::<Result<Vec<f64>, CalendarError>>()?;
        let sorted = statistics::sorted(&ordinals);

        self.config
            .confidence_percentiles
            .iter()
            .map(|&p| {
                let ordinal = statistics::percentile(&sorted, p).floor() as i32;
                NaiveDate::from_num_days_from_ce_opt(ordinal)
                    .map(|date| (p, date))
                    .ok_or(SimulationError::Calendar(CalendarError::DateOutOfRange))
            })
            .collect()
    }
}

/// Risk analysis entry point; checks the iteration bounds and thresholds.
pub fn analyze_risk(
    tasks: &[SimulationTaskInput],
    project_start: NaiveDate,
    calendar: &WorkCalendar,
    config: &RiskConfig,
    resources: Option<ResourceContext<'_>>,
) -> Result<RiskMetrics, SimulationError> {
    config.validate()?;
    let mut analyzer = RiskAnalyzer::new(tasks, project_start, calendar, config.clone())?;
    if let Some(context) = resources {
        let scheduler =
            ResourceConstrainedScheduler::new(context.pool, calendar, project_start, context.requirements)?;
        analyzer = analyzer.with_resources(scheduler);
    }
    analyzer.analyze()
}
