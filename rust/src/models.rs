//! Input and output records exchanged with the calling layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::critical_path::TaskScheduleData;
use crate::distributions::DistributionSpec;

/// A task with a fixed duration, as accepted by the scheduling entry point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    pub id: String,
    /// Working days; must be positive.
    pub duration: f64,
    /// Comma-separated predecessor IDs, e.g. `"T001, T002"`.
    #[serde(default)]
    pub dependencies: Option<String>,
}

impl TaskInput {
    pub fn new(id: impl Into<String>, duration: f64) -> Self {
        Self {
            id: id.into(),
            duration,
            dependencies: None,
        }
    }

    pub fn with_dependencies(mut self, dependencies: impl Into<String>) -> Self {
        self.dependencies = Some(dependencies.into());
        self
    }
}

/// A task whose duration is drawn from a distribution on every trial.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationTaskInput {
    pub id: String,
    pub distribution: DistributionSpec,
    #[serde(default)]
    pub dependencies: Option<String>,
}

impl SimulationTaskInput {
    pub fn new(id: impl Into<String>, distribution: DistributionSpec) -> Self {
        Self {
            id: id.into(),
            distribution,
            dependencies: None,
        }
    }

    pub fn with_dependencies(mut self, dependencies: impl Into<String>) -> Self {
        self.dependencies = Some(dependencies.into());
        self
    }
}

/// A calendar-anchored CPM schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectSchedule {
    pub tasks: BTreeMap<String, TaskScheduleData>,
    /// Zero-slack tasks in topological order.
    pub critical_path: Vec<String>,
    /// Working days from project start to the last finish.
    pub project_duration: f64,
    /// task id -> (start date, end date), both inclusive.
    pub task_dates: BTreeMap<String, (NaiveDate, NaiveDate)>,
    pub project_start: NaiveDate,
    /// Last working day of the project.
    pub project_end: NaiveDate,
}
