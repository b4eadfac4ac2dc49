//! Configuration types for simulation, risk analysis and calendars.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::WorkWeek;
use crate::logging::VERBOSITY_SILENT;
use crate::simulation::SimulationError;

/// Inclusive iteration bounds accepted by the simulation entry points.
pub const MIN_ITERATIONS: usize = 100;
pub const MAX_ITERATIONS: usize = 100_000;

pub const DEFAULT_ITERATIONS: usize = 10_000;
pub const DEFAULT_PERCENTILES: [f64; 5] = [10.0, 50.0, 90.0, 95.0, 99.0];
pub const DEFAULT_CONFIDENCE_PERCENTILES: [f64; 3] = [50.0, 75.0, 90.0];
pub const DEFAULT_CRITICALITY_THRESHOLD: f64 = 0.5;
pub const DEFAULT_VARIANCE_THRESHOLD: f64 = 1.0;

pub(crate) fn validate_iterations(iterations: usize) -> Result<(), SimulationError> {
    if (MIN_ITERATIONS..=MAX_ITERATIONS).contains(&iterations) {
        Ok(())
    } else {
        Err(SimulationError::InvalidIterations {
            iterations,
            min: MIN_ITERATIONS,
            max: MAX_ITERATIONS,
        })
    }
}

/// Each percentile must be a finite number in `[0, 100]`.
pub(crate) fn validate_percentiles(percentiles: &[f64]) -> Result<(), SimulationError> {
    match percentiles.iter().find(|p| !(0.0..=100.0).contains(*p)) {
        Some(&p) => Err(SimulationError::InvalidPercentile(p)),
        None => Ok(()),
    }
}

/// Configuration for Monte Carlo schedule simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of trials, in `[MIN_ITERATIONS, MAX_ITERATIONS]` at the entry point
    pub iterations: usize,
    /// Percentiles reported on the duration distribution (0-100)
    pub percentiles: Vec<f64>,
    /// Base seed; trial `i` uses `seed + i`. `None` draws a random base seed.
    pub seed: Option<u64>,
    /// Logging verbosity (see [`crate::logging`])
    pub verbosity: u8,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            seed: None,
            verbosity: VERBOSITY_SILENT,
        }
    }
}

impl SimulationConfig {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_percentiles(mut self, percentiles: Vec<f64>) -> Self {
        self.percentiles = percentiles;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Check the entry-point bounds on iterations and percentiles.
    pub fn validate(&self) -> Result<(), SimulationError> {
        validate_iterations(self.iterations)?;
        validate_percentiles(&self.percentiles)
    }
}

/// Configuration for schedule risk analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub iterations: usize,
    /// Minimum criticality index (0-1) for a task to be a risk driver
    pub criticality_threshold: f64,
    /// Minimum sampled-duration variance for a task to be a risk driver
    pub variance_threshold: f64,
    /// Percentiles of the completion-date distribution to report
    pub confidence_percentiles: Vec<f64>,
    pub seed: Option<u64>,
    pub verbosity: u8,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            criticality_threshold: DEFAULT_CRITICALITY_THRESHOLD,
            variance_threshold: DEFAULT_VARIANCE_THRESHOLD,
            confidence_percentiles: DEFAULT_CONFIDENCE_PERCENTILES.to_vec(),
            seed: None,
            verbosity: VERBOSITY_SILENT,
        }
    }
}

impl RiskConfig {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_thresholds(mut self, criticality_threshold: f64, variance_threshold: f64) -> Self {
        self.criticality_threshold = criticality_threshold;
        self.variance_threshold = variance_threshold;
        self
    }

    pub fn with_confidence_percentiles(mut self, percentiles: Vec<f64>) -> Self {
        self.confidence_percentiles = percentiles;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// The simulation settings the analyzer's trials run with.
    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            iterations: self.iterations,
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            seed: self.seed,
            verbosity: self.verbosity,
        }
    }

    /// Check the entry-point bounds plus [`RiskConfig::validate_thresholds`].
    pub fn validate(&self) -> Result<(), SimulationError> {
        validate_iterations(self.iterations)?;
        self.validate_thresholds()
    }

    /// Check thresholds and confidence percentiles, ignoring iteration bounds.
    pub fn validate_thresholds(&self) -> Result<(), SimulationError> {
        validate_percentiles(&self.confidence_percentiles)?;
        if !(0.0..=1.0).contains(&self.criticality_threshold) {
            return Err(SimulationError::InvalidThreshold {
                name: "criticality_threshold",
                value: self.criticality_threshold,
            });
        }
        if !self.variance_threshold.is_finite() || self.variance_threshold < 0.0 {
            return Err(SimulationError::InvalidThreshold {
                name: "variance_threshold",
                value: self.variance_threshold,
            });
        }
        Ok(())
    }
}

/// Working week and holidays for a [`crate::calendar::WorkCalendar`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub working_days: Vec<Weekday>,
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self::from_work_week(WorkWeek::MondayToFriday)
    }
}

impl CalendarConfig {
    pub fn from_work_week(week: WorkWeek) -> Self {
        Self {
            working_days: week.working_days().to_vec(),
            holidays: Vec::new(),
        }
    }

    pub fn with_working_days(mut self, working_days: Vec<Weekday>) -> Self {
        self.working_days = working_days;
        self
    }

    pub fn with_holidays(mut self, holidays: Vec<NaiveDate>) -> Self {
        self.holidays = holidays;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.iterations, 10_000);
        assert_eq!(config.percentiles, vec![10.0, 50.0, 90.0, 95.0, 99.0]);
        assert!(config.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_iteration_bounds() {
        assert!(SimulationConfig::default().with_iterations(100).validate().is_ok());
        assert!(SimulationConfig::default().with_iterations(100_000).validate().is_ok());
        assert_eq!(
            SimulationConfig::default().with_iterations(99).validate(),
            Err(SimulationError::InvalidIterations {
                iterations: 99,
                min: 100,
                max: 100_000
            })
        );
        assert!(SimulationConfig::default()
            .with_iterations(100_001)
            .validate()
            .is_err());
    }

    #[test]
    fn test_percentile_bounds() {
        let config = SimulationConfig::default().with_percentiles(vec![0.0, 97.5, 100.0]);
        assert!(config.validate().is_ok());
        let config = SimulationConfig::default().with_percentiles(vec![50.0, 100.5]);
        assert_eq!(config.validate(), Err(SimulationError::InvalidPercentile(100.5)));
        let config = SimulationConfig::default().with_percentiles(vec![-5.0]);
        assert_eq!(config.validate(), Err(SimulationError::InvalidPercentile(-5.0)));
        let config = SimulationConfig::default().with_percentiles(vec![f64::NAN]);
        assert!(matches!(config.validate(), Err(SimulationError::InvalidPercentile(p)) if p.is_nan()));
        let config = RiskConfig::default().with_confidence_percentiles(vec![f64::INFINITY]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_risk_thresholds() {
        assert!(RiskConfig::default().validate().is_ok());
        assert!(RiskConfig::default().with_thresholds(1.5, 1.0).validate().is_err());
        assert!(RiskConfig::default().with_thresholds(0.5, -1.0).validate().is_err());
        assert!(RiskConfig::default()
            .with_thresholds(f64::NAN, 1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_calendar_config_round_trips_through_json() {
        let config = CalendarConfig::from_work_week(WorkWeek::SundayToThursday)
            .with_holidays(vec![NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()]);
        let json = serde_json::to_string(&config).unwrap();
        let back: CalendarConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.working_days[0], Weekday::Sun);
    }
}
