//! Critical path method.
//!
//! Forward pass for early dates, backward pass for late dates, slack and the
//! zero-slack critical path over a [`crate::graph::TaskGraph`].

mod calculation;
mod types;

pub(crate) use calculation::PassTimings;
pub use calculation::{calculate_critical_path, CriticalPathCalculator, CriticalPathError};
pub use types::{CriticalPathResult, TaskScheduleData, CRITICAL_SLACK_TOLERANCE};
