//! Result types for critical path calculation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Slack below this many working days counts as zero.
///
/// Absorbs rounding accumulated across long chains of fractional durations.
pub const CRITICAL_SLACK_TOLERANCE: f64 = 0.001;

/// Per-task output of one CPM run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskScheduleData {
    pub duration: f64,
    /// Direct predecessors of the task.
    pub dependencies: Vec<String>,
    pub early_start: f64,
    pub early_finish: f64,
    pub late_start: f64,
    pub late_finish: f64,
    /// `late_start - early_start`.
    pub slack: f64,
    pub is_critical: bool,
}

pub(crate) fn is_zero_slack(slack: f64) -> bool {
    slack.abs() < CRITICAL_SLACK_TOLERANCE
}

/// Output of one CPM run over a whole graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalPathResult {
    pub tasks: BTreeMap<String, TaskScheduleData>,
    /// Zero-slack tasks in topological order.
    pub critical_path: Vec<String>,
    /// Largest early finish over all tasks.
    pub project_duration: f64,
}

impl CriticalPathResult {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: &str) -> Option<&TaskScheduleData> {
        self.tasks.get(id)
    }

    pub fn is_critical(&self, id: &str) -> bool {
        self.tasks.get(id).is_some_and(|t| t.is_critical)
    }

    /// Durations keyed by task ID, as the buffer calculator consumes them.
    pub fn durations(&self) -> BTreeMap<String, f64> {
        self.tasks
            .iter()
            .map(|(id, data)| (id.clone(), data.duration))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_slack_tolerance() {
        assert!(is_zero_slack(0.0));
        assert!(is_zero_slack(0.0009));
        assert!(is_zero_slack(-0.0009));
        assert!(!is_zero_slack(0.001));
        assert!(!is_zero_slack(4.0));
    }

    #[test]
    fn test_empty_result() {
        let result = CriticalPathResult::default();
        assert!(result.is_empty());
        assert!(!result.is_critical("T001"));
        assert_eq!(result.project_duration, 0.0);
    }
}
