//! What a task asks of the pool, and what the pool granted it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ResourceError, ResourceType};

fn validate_quantity(task: &str, quantity: f64) -> Result<(), ResourceError> {
    if quantity.is_finite() && quantity > 0.0 {
        Ok(())
    } else {
        Err(ResourceError::InvalidQuantity {
            task: task.to_string(),
            quantity,
        })
    }
}

/// What a task needs from the pool while it runs.
///
/// Without explicit resource ids any pool resource of `resource_type` may
/// serve. With explicit ids, every listed resource must supply `quantity`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskResourceRequirement {
    pub task_id: String,
    pub resource_type: ResourceType,
    pub quantity: f64,
    #[serde(default)]
    pub resource_ids: Vec<String>,
}

impl TaskResourceRequirement {
    pub fn new(
        task_id: impl Into<String>,
        resource_type: ResourceType,
        quantity: f64,
    ) -> Result<Self, ResourceError> {
        let task_id = task_id.into();
        validate_quantity(&task_id, quantity)?;
        Ok(Self {
            task_id,
            resource_type,
            quantity,
            resource_ids: Vec::new(),
        })
    }

    pub fn with_resources<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_explicit(&self) -> bool {
        !self.resource_ids.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), ResourceError> {
        validate_quantity(&self.task_id, self.quantity)
    }
}

/// A resource booked for a task over an inclusive date range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub task_id: String,
    pub resource_id: String,
    pub start: NaiveDate,
    /// Inclusive.
    pub end: NaiveDate,
    pub quantity: f64,
}

impl ResourceAllocation {
    pub fn new(
        task_id: impl Into<String>,
        resource_id: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
        quantity: f64,
    ) -> Result<Self, ResourceError> {
        let allocation = Self {
            task_id: task_id.into(),
            resource_id: resource_id.into(),
            start,
            end,
            quantity,
        };
        allocation.validate()?;
        Ok(allocation)
    }

    /// Check the date range and quantity of an allocation built field by field.
    pub fn validate(&self) -> Result<(), ResourceError> {
        if self.end < self.start {
            return Err(ResourceError::InvalidAllocationRange {
                task: self.task_id.clone(),
                resource: self.resource_id.clone(),
                start: self.start,
                end: self.end,
            });
        }
        validate_quantity(&self.task_id, self.quantity)
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Same resource and intersecting date ranges.
    pub fn overlaps(&self, other: &ResourceAllocation) -> bool {
        self.resource_id == other.resource_id && self.start <= other.end && other.start <= self.end
    }
}
