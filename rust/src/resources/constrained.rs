//! Resource-constrained critical path scheduling.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::calendar::WorkCalendar;
use crate::critical_path::{CriticalPathCalculator, CriticalPathResult, PassTimings};
use crate::graph::TaskGraph;
use crate::logging::VERBOSITY_SILENT;
use crate::{log_changes, log_checks};

use super::usage::{ResourceUsage, CAPACITY_TOLERANCE};
use super::{Resource, ResourceAllocation, ResourceError, ResourcePool, TaskResourceRequirement};

/// Working days past a task's dependency early start that the slot search
/// may look before giving up.
pub const SLOT_SEARCH_HORIZON_DAYS: u32 = 730;

/// Output of a resource-constrained pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceConstrainedResult {
    pub schedule: CriticalPathResult,
    pub allocations: Vec<ResourceAllocation>,
    /// Tasks placed at their dependency early start because no slot was found.
    pub horizon_fallbacks: Vec<String>,
}

/// Index-level output, used by simulation trials.
pub(crate) struct ConstrainedTimings {
    pub timings: PassTimings,
    pub allocations: Vec<ResourceAllocation>,
    pub horizon_fallbacks: Vec<String>,
}

struct Placement {
    offset: f64,
    start: NaiveDate,
    end: NaiveDate,
    resources: Vec<(String, f64)>,
    fell_back: bool,
}

enum Fit {
    Assigned(Vec<(String, f64)>),
    /// No start on or before this date can work.
    Blocked(NaiveDate),
}

/// CPM whose forward pass waits for free resource capacity.
///
/// A task starts at the later of its dependency early start and the earliest
/// slot in which every requirement can be met for the task's whole span.
/// The backward pass is the plain CPM one over the resulting early dates, so
/// late dates ignore resource contention.
///
/// Bookings made during a pass live only for that pass; the pool is borrowed
/// immutably and may back any number of passes at once.
pub struct ResourceConstrainedScheduler<'a> {
    pool: &'a ResourcePool,
    calendar: &'a WorkCalendar,
    project_start: NaiveDate,
    requirements: FxHashMap<String, Vec<TaskResourceRequirement>>,
    horizon_days: u32,
    verbosity: u8,
}

impl<'a> ResourceConstrainedScheduler<'a> {
    /// Fails on an invalid quantity or an explicit resource id the pool lacks.
    pub fn new(
        pool: &'a ResourcePool,
        calendar: &'a WorkCalendar,
        project_start: NaiveDate,
        requirements: &[TaskResourceRequirement],
    ) -> Result<Self, ResourceError> {
        let mut by_task: FxHashMap<String, Vec<TaskResourceRequirement>> = FxHashMap::default();
        for requirement in requirements {
            requirement.validate()?;
            for id in &requirement.resource_ids {
                pool.require(id)?;
            }
            by_task
                .entry(requirement.task_id.clone())
                .or_default()
                .push(requirement.clone());
        }

        Ok(Self {
            pool,
            calendar,
            project_start,
            requirements: by_task,
            horizon_days: SLOT_SEARCH_HORIZON_DAYS,
            verbosity: VERBOSITY_SILENT,
        })
    }

    pub fn with_horizon_days(mut self, horizon_days: u32) -> Self {
        self.horizon_days = horizon_days;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn calendar(&self) -> &WorkCalendar {
        self.calendar
    }

    pub fn project_start(&self) -> NaiveDate {
        self.project_start
    }

    /// Schedule a graph over its own node durations.
    pub fn schedule<M>(&self, graph: &TaskGraph<M>) -> Result<ResourceConstrainedResult, ResourceError> {
        let calculator = CriticalPathCalculator::new(graph)?;
        self.schedule_with_durations(&calculator, &graph.durations())
    }

    /// Schedule with durations overridden, indexed like the calculator's graph.
    pub fn schedule_with_durations<M>(
        &self,
        calculator: &CriticalPathCalculator<'_, M>,
        durations: &[f64],
    ) -> Result<ResourceConstrainedResult, ResourceError> {
        let pass = self.timings(calculator, durations)?;
        Ok(ResourceConstrainedResult {
            schedule: calculator.build_result(durations, &pass.timings),
            allocations: pass.allocations,
            horizon_fallbacks: pass.horizon_fallbacks,
        })
    }

    pub(crate) fn timings<M>(
        &self,
        calculator: &CriticalPathCalculator<'_, M>,
        durations: &[f64],
    ) -> Result<ConstrainedTimings, ResourceError> {
        calculator.validate_durations(durations)?;
        let graph = calculator.graph();
        if let Some(task) = self.requirements.keys().find(|id| !graph.contains(id)) {
            return Err(ResourceError::UnknownTask(task.clone()));
        }

        let n = graph.len();
        let mut early_start = vec![0.0; n];
        let mut early_finish = vec![0.0; n];
        let mut usage = ResourceUsage::new();
        let mut allocations = Vec::new();
        let mut horizon_fallbacks = Vec::new();

        for &ix in calculator.order() {
            let dependency_es = graph
                .predecessors_of(ix)
                .iter()
                .map(|&p| early_finish[p])
                .fold(0.0, f64::max);
            let task_id = &graph.node_at(ix).id;

            let start = match self.requirements.get(task_id) {
                None => dependency_es,
                Some(requirements) => {
                    let placement = self.place(requirements, dependency_es, durations[ix], &usage)?;
                    if placement.fell_back {
                        log_changes!(
                            self.verbosity,
                            task = %task_id,
                            "No resource slot within {} working days; starting at dependency early start {}",
                            self.horizon_days,
                            dependency_es
                        );
                        horizon_fallbacks.push(task_id.clone());
                    } else if placement.offset > dependency_es {
                        log_checks!(
                            self.verbosity,
                            task = %task_id,
                            "Delayed from {} to {} waiting for resources",
                            dependency_es,
                            placement.offset
                        );
                    }
                    for (resource_id, quantity) in placement.resources {
                        usage.book(&resource_id, placement.start, placement.end, quantity);
                        allocations.push(ResourceAllocation {
                            task_id: task_id.clone(),
                            resource_id,
                            start: placement.start,
                            end: placement.end,
                            quantity,
                        });
                    }
                    placement.offset
                }
            };

            early_start[ix] = start;
            early_finish[ix] = start + durations[ix];
        }

        Ok(ConstrainedTimings {
            timings: calculator.backward_pass(durations, early_start, early_finish),
            allocations,
            horizon_fallbacks,
        })
    }

    /// Dates touched by `[offset, offset + duration)`, counting partly used
    /// first and last days as held.
    fn span(&self, offset: f64, duration: f64) -> Result<(NaiveDate, NaiveDate), ResourceError> {
        let first_day = offset.floor();
        let last_day = ((offset + duration).ceil() - 1.0).max(first_day);
        let start = self.calendar.add_working_days(self.project_start, first_day)?;
        let end = self.calendar.add_working_days(self.project_start, last_day)?;
        Ok((start, end))
    }

    fn candidates(&self, requirement: &TaskResourceRequirement) -> Result<Vec<&'a Resource>, ResourceError> {
        if requirement.is_explicit() {
            requirement
                .resource_ids
                .iter()
                .map(|id| self.pool.require(id))
                .collect()
        } else {
            Ok(self.pool.by_type(requirement.resource_type).collect())
        }
    }

    /// Greedy forward search from the dependency early start.
    fn place(
        &self,
        requirements: &[TaskResourceRequirement],
        dependency_es: f64,
        duration: f64,
        usage: &ResourceUsage,
    ) -> Result<Placement, ResourceError> {
        let candidates = requirements
            .iter()
            .map(|r| self.candidates(r))
            .collect::<Result<Vec<_>, _>>()?;

        let fits_capacity = |r: &Resource, quantity: f64| r.capacity() + CAPACITY_TOLERANCE >= quantity;
        let satisfiable = requirements.iter().zip(&candidates).all(|(req, cands)| {
            if req.is_explicit() {
                cands.iter().all(|r| fits_capacity(r, req.quantity))
            } else {
                cands.iter().any(|r| fits_capacity(r, req.quantity))
            }
        });

        if satisfiable {
            let limit = dependency_es + f64::from(self.horizon_days);
            let mut offset = dependency_es;
            while offset <= limit {
                let (start, end) = self.span(offset, duration)?;
                match try_fit(requirements, &candidates, start, end, usage) {
                    Fit::Assigned(resources) => {
                        return Ok(Placement {
                            offset,
                            start,
                            end,
                            resources,
                            fell_back: false,
                        });
                    }
                    Fit::Blocked(until) => {
                        let skipped = self.calendar.count_working_days(start, until)?.max(1);
                        offset = offset.floor() + skipped as f64;
                    }
                }
            }
        }

        // Book the preferred resources anyway so the conflict detector sees them.
        let (start, end) = self.span(dependency_es, duration)?;
        let resources = requirements
            .iter()
            .zip(&candidates)
            .flat_map(|(req, cands)| {
                let chosen: Vec<&Resource> = if req.is_explicit() {
                    cands.clone()
                } else {
                    cands
                        .iter()
                        .find(|r| fits_capacity(r, req.quantity))
                        .or_else(|| cands.first())
                        .into_iter()
                        .copied()
                        .collect()
                };
                chosen
                    .into_iter()
                    .map(move |r| (r.id().to_string(), req.quantity))
            })
            .collect();

        Ok(Placement {
            offset: dependency_es,
            start,
            end,
            resources,
            fell_back: true,
        })
    }
}

/// Try to meet every requirement over `[start, end]`.
///
/// Type-based requirements take the first resource in id order with room.
/// Quantities already claimed by earlier requirements of the same task count
/// against capacity.
fn try_fit(
    requirements: &[TaskResourceRequirement],
    candidates: &[Vec<&Resource>],
    start: NaiveDate,
    end: NaiveDate,
    usage: &ResourceUsage,
) -> Fit {
    let mut pending: FxHashMap<&str, f64> = FxHashMap::default();
    let mut assigned = Vec::new();
    let mut blocked: Option<NaiveDate> = None;

    for (requirement, resources) in requirements.iter().zip(candidates) {
        let quantity = requirement.quantity;
        if requirement.is_explicit() {
            for resource in resources {
                let claimed = pending.get(resource.id()).copied().unwrap_or(0.0);
                match usage.last_conflict(resource, start, end, quantity + claimed) {
                    Some(date) => blocked = blocked.max(Some(date)),
                    None => {
                        *pending.entry(resource.id()).or_insert(0.0) += quantity;
                        assigned.push((resource.id().to_string(), quantity));
                    }
                }
            }
        } else {
            let mut earliest_block: Option<NaiveDate> = None;
            let mut chosen = None;
            for resource in resources {
                let claimed = pending.get(resource.id()).copied().unwrap_or(0.0);
                match usage.last_conflict(resource, start, end, quantity + claimed) {
                    None => {
                        chosen = Some(*resource);
                        break;
                    }
                    Some(date) => {
                        earliest_block = Some(earliest_block.map_or(date, |b| b.min(date)));
                    }
                }
            }
            match chosen {
                Some(resource) => {
                    *pending.entry(resource.id()).or_insert(0.0) += quantity;
                    assigned.push((resource.id().to_string(), quantity));
                }
                None => blocked = blocked.max(earliest_block.or(Some(end))),
            }
        }
    }

    match blocked {
        Some(date) => Fit::Blocked(date),
        None => Fit::Assigned(assigned),
    }
}
