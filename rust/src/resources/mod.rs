//! Resource model and resource-constrained scheduling.
//!
//! - [`pool`]: resources and the pool that owns them
//! - [`allocation`]: task requirements and the allocations made for them
//! - [`conflicts`]: over-capacity and unavailability detection
//! - [`constrained`]: CPM forward pass that waits for free capacity

mod allocation;
mod conflicts;
mod constrained;
mod pool;
mod usage;

use chrono::NaiveDate;
use thiserror::Error;

use crate::calendar::CalendarError;
use crate::critical_path::CriticalPathError;

pub use allocation::{ResourceAllocation, TaskResourceRequirement};
pub use conflicts::{ConflictReason, ResourceConflict, ResourceConflictDetector};
pub use constrained::{
    ResourceConstrainedResult, ResourceConstrainedScheduler, SLOT_SEARCH_HORIZON_DAYS,
};
pub use pool::{Resource, ResourcePool, ResourceType, DEFAULT_CAPACITY};

/// Error types for the resource model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("Duplicate resource id: {0}")]
    DuplicateResource(String),
    #[error("Unknown resource: {0}")]
    UnknownResource(String),
    #[error("Unknown resource type {0:?} (expected person, equipment or material)")]
    UnknownResourceType(String),
    #[error("Resource {resource} has invalid capacity {capacity} (must be positive)")]
    InvalidCapacity { resource: String, capacity: f64 },
    #[error("Task {task} requests invalid quantity {quantity} (must be positive)")]
    InvalidQuantity { task: String, quantity: f64 },
    #[error("Allocation of {resource} to {task} ends on {end}, before it starts on {start}")]
    InvalidAllocationRange {
        task: String,
        resource: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("Resource requirement references unknown task {0}")]
    UnknownTask(String),
    #[error(transparent)]
    CriticalPath(#[from] CriticalPathError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}
