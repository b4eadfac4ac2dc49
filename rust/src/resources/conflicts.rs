//! Conflict detection over a set of allocations: bookings on unavailable
//! dates and days where booked quantity exceeds capacity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::usage::CAPACITY_TOLERANCE;
use super::{ResourceAllocation, ResourceError, ResourcePool};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// Booked on a date the resource is marked unavailable.
    Unavailable,
    /// Booked quantities exceed capacity.
    OverAllocated,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::Unavailable => f.write_str("resource unavailable"),
            ConflictReason::OverAllocated => f.write_str("over-allocated"),
        }
    }
}

/// A problem with a resource's bookings over an inclusive date range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceConflict {
    pub resource_id: String,
    /// Sorted, without duplicates.
    pub task_ids: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total_allocated: f64,
    pub capacity: f64,
    pub reason: ConflictReason,
}

impl fmt::Display for ResourceConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} from {} to {}: {} allocated against capacity {} (tasks: {})",
            self.resource_id,
            self.reason,
            self.start,
            self.end,
            self.total_allocated,
            self.capacity,
            self.task_ids.join(", ")
        )
    }
}

/// Finds allocations that a pool cannot honour.
pub struct ResourceConflictDetector<'a> {
    pool: &'a ResourcePool,
}

impl<'a> ResourceConflictDetector<'a> {
    pub fn new(pool: &'a ResourcePool) -> Self {
        Self { pool }
    }

    /// Conflicts ordered by resource id, then by start date.
    ///
    /// Allocations are grouped by resource. Each allocation touching an
    /// unavailable date yields one conflict spanning those dates; each
    /// maximal run of days with the same over-capacity task set yields one
    /// more. Identical task-set/date-range conflicts are reported once.
    ///
    /// An allocation ending before it starts, or with a non-positive
    /// quantity, fails the whole call.
    pub fn detect(&self, allocations: &[ResourceAllocation]) -> Result<Vec<ResourceConflict>, ResourceError> {
        let mut by_resource: BTreeMap<&str, Vec<&ResourceAllocation>> = BTreeMap::new();
        for allocation in allocations {
            allocation.validate()?;
            by_resource
                .entry(allocation.resource_id.as_str())
                .or_default()
                .push(allocation);
        }

        let mut conflicts = Vec::new();
        for (resource_id, group) in by_resource {
            let resource = self.pool.require(resource_id)?;
            let mut found = unavailable_conflicts(resource, &group);
            found.extend(capacity_conflicts(resource_id, resource.capacity(), &group));

            let mut seen = BTreeSet::new();
            found.retain(|c| seen.insert((c.reason, c.task_ids.clone(), c.start, c.end)));
            found.sort_by(|a, b| (a.start, a.end, a.reason).cmp(&(b.start, b.end, b.reason)));
            conflicts.extend(found);
        }
        Ok(conflicts)
    }
}

fn unavailable_conflicts(
    resource: &super::Resource,
    group: &[&ResourceAllocation],
) -> Vec<ResourceConflict> {
    group
        .iter()
        .filter_map(|allocation| {
            let mut dates = resource.unavailable_between(allocation.start, allocation.end);
            let first = dates.next()?;
            let last = dates.next_back().unwrap_or(first);
            Some(ResourceConflict {
                resource_id: resource.id().to_string(),
                task_ids: vec![allocation.task_id.clone()],
                start: first,
                end: last,
                total_allocated: allocation.quantity,
                capacity: resource.capacity(),
                reason: ConflictReason::Unavailable,
            })
        })
        .collect()
}

/// Sweep the date boundaries of a resource's allocations, merging adjacent
/// over-capacity segments that share a task set.
fn capacity_conflicts(
    resource_id: &str,
    capacity: f64,
    group: &[&ResourceAllocation],
) -> Vec<ResourceConflict> {
    let mut boundaries = BTreeSet::new();
    for allocation in group {
        boundaries.insert(allocation.start);
        if let Some(after) = allocation.end.succ_opt() {
            boundaries.insert(after);
        }
    }
    let boundaries: Vec<NaiveDate> = boundaries.into_iter().collect();

    let mut conflicts: Vec<ResourceConflict> = Vec::new();
    for window in boundaries.windows(2) {
        let (segment_start, next) = (window[0], window[1]);
        let Some(segment_end) = next.pred_opt() else {
            continue;
        };

        let active: Vec<&&ResourceAllocation> = group.iter().filter(|a| a.covers(segment_start)).collect();
        let total: f64 = active.iter().map(|a| a.quantity).sum();
        if active.is_empty() || total <= capacity + CAPACITY_TOLERANCE {
            continue;
        }

        let mut task_ids: Vec<String> = active.iter().map(|a| a.task_id.clone()).collect();
        task_ids.sort();
        task_ids.dedup();

        if let Some(last) = conflicts.last_mut() {
            if last.task_ids == task_ids && last.end.succ_opt() == Some(segment_start) {
                last.end = segment_end;
                continue;
            }
        }
        conflicts.push(ResourceConflict {
            resource_id: resource_id.to_string(),
            task_ids,
            start: segment_start,
            end: segment_end,
            total_allocated: total,
            capacity,
            reason: ConflictReason::OverAllocated,
        });
    }
    conflicts
}
