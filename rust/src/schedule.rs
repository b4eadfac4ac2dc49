//! Deterministic scheduling entry point: task records in, dated CPM schedule out.

use chrono::NaiveDate;
use thiserror::Error;

use crate::calendar::{calculate_task_dates, CalendarError, WorkCalendar};
use crate::critical_path::{calculate_critical_path, CriticalPathError};
use crate::dependency::{parse_dependencies, DependencyParseError};
use crate::graph::{GraphError, TaskGraph};
use crate::models::{ProjectSchedule, TaskInput};

/// Errors that can occur while scheduling a task list.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),
    #[error("Task {task} has invalid duration {duration} (must be positive)")]
    InvalidDuration { task: String, duration: f64 },
    #[error("Task {task} has malformed dependencies: {source}")]
    MalformedDependencies {
        task: String,
        #[source]
        source: DependencyParseError,
    },
    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },
    #[error("Task {0} cannot depend on itself")]
    SelfDependency(String),
    #[error("Circular dependency detected among tasks: {}", .tasks.join(", "))]
    CircularDependency { tasks: Vec<String> },
    #[error("Task not found: {0}")]
    UnknownTask(String),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    CriticalPath(CriticalPathError),
}

impl From<GraphError> for ScheduleError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::DuplicateTask(id) => ScheduleError::DuplicateTask(id),
            GraphError::InvalidDuration { task, duration } => {
                ScheduleError::InvalidDuration { task, duration }
            }
            GraphError::SelfLoop(id) => ScheduleError::SelfDependency(id),
            GraphError::CircularDependency { tasks } => ScheduleError::CircularDependency { tasks },
            GraphError::UnknownTask(id) => ScheduleError::UnknownTask(id),
        }
    }
}

impl From<CriticalPathError> for ScheduleError {
    fn from(err: CriticalPathError) -> Self {
        match err {
            CriticalPathError::Graph(g) => g.into(),
            CriticalPathError::InvalidDuration { task, duration } => {
                ScheduleError::InvalidDuration { task, duration }
            }
            other => ScheduleError::CriticalPath(other),
        }
    }
}

/// Build a task graph from `(id, duration, dependency text)` records.
///
/// All nodes are added before any edge, so records may reference tasks that
/// appear later in the list. Cycles are not checked here.
pub fn build_task_graph<'a, I>(records: I) -> Result<TaskGraph, ScheduleError>
where
    I: IntoIterator<Item = (&'a str, f64, Option<&'a str>)>,
{
    let records: Vec<(&str, f64, Option<&str>)> = records.into_iter().collect();
    let mut graph = TaskGraph::with_capacity(records.len());
    let mut edges: Vec<(String, &str)> = Vec::new();

    for (id, duration, dependency_text) in &records {
        graph.add_task(*id, *duration)?;
        let dependencies = parse_dependencies(*dependency_text).map_err(|source| {
            ScheduleError::MalformedDependencies {
                task: id.to_string(),
                source,
            }
        })?;
        edges.extend(dependencies.into_iter().map(|dep| (dep, *id)));
    }

    for (dependency, task) in edges {
        if !graph.contains(&dependency) {
            return Err(ScheduleError::UnknownDependency {
                task: task.to_string(),
                dependency,
            });
        }
        graph.add_edge(&dependency, task)?;
    }

    Ok(graph)
}

/// Compute the calendar-anchored critical path schedule for a task list.
///
/// Fails with a named error (duplicate ID, invalid duration, malformed or
/// unknown dependency, cycle) instead of returning a partial schedule.
pub fn calculate_schedule(
    tasks: &[TaskInput],
    project_start: NaiveDate,
    calendar: &WorkCalendar,
) -> Result<ProjectSchedule, ScheduleError> {
    let graph = build_task_graph(
        tasks
            .iter()
            .map(|t| (t.id.as_str(), t.duration, t.dependencies.as_deref())),
    )?;
    let result = calculate_critical_path(&graph)?;
    let task_dates = calculate_task_dates(&result, project_start, calendar)?;
    let project_end = calendar.span_end(project_start, result.project_duration)?;

    Ok(ProjectSchedule {
        tasks: result.tasks,
        critical_path: result.critical_path,
        project_duration: result.project_duration,
        task_dates,
        project_start,
        project_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_single_task_dates() {
        let tasks = vec![TaskInput::new("T001", 5.0)];
        let schedule = calculate_schedule(&tasks, d(2025, 1, 13), &WorkCalendar::default()).unwrap();
        assert_eq!(schedule.project_duration, 5.0);
        assert_eq!(schedule.critical_path, vec!["T001"]);
        assert_eq!(schedule.task_dates["T001"], (d(2025, 1, 13), d(2025, 1, 17)));
        assert_eq!(schedule.project_end, d(2025, 1, 17));
    }

    #[test]
    fn test_dependent_task_dates_cross_weekend() {
        let tasks = vec![
            TaskInput::new("T001", 3.0),
            TaskInput::new("T002", 5.0).with_dependencies("T001"),
        ];
        let schedule = calculate_schedule(&tasks, d(2025, 1, 13), &WorkCalendar::default()).unwrap();
        assert_eq!(schedule.project_duration, 8.0);
        assert_eq!(schedule.critical_path, vec!["T001", "T002"]);
        assert_eq!(schedule.task_dates["T001"], (d(2025, 1, 13), d(2025, 1, 15)));
        assert_eq!(schedule.task_dates["T002"], (d(2025, 1, 16), d(2025, 1, 22)));
    }

    #[test]
    fn test_holiday_shifts_dates() {
        let mut calendar = WorkCalendar::default();
        calendar.add_holiday(d(2025, 1, 14));
        let tasks = vec![TaskInput::new("T001", 2.0)];
        let schedule = calculate_schedule(&tasks, d(2025, 1, 13), &calendar).unwrap();
        assert_eq!(schedule.task_dates["T001"], (d(2025, 1, 13), d(2025, 1, 15)));
    }

    #[test]
    fn test_dependency_declared_before_task() {
        let tasks = vec![
            TaskInput::new("B", 2.0).with_dependencies("A"),
            TaskInput::new("A", 1.0),
        ];
        let schedule = calculate_schedule(&tasks, d(2025, 1, 13), &WorkCalendar::default()).unwrap();
        assert_eq!(schedule.tasks["B"].early_start, 1.0);
    }

    #[test]
    fn test_named_errors() {
        let start = d(2025, 1, 13);
        let cal = WorkCalendar::default();

        let dup = vec![TaskInput::new("A", 1.0), TaskInput::new("A", 2.0)];
        assert_eq!(
            calculate_schedule(&dup, start, &cal),
            Err(ScheduleError::DuplicateTask("A".to_string()))
        );

        let unknown = vec![TaskInput::new("A", 1.0).with_dependencies("Z")];
        assert_eq!(
            calculate_schedule(&unknown, start, &cal),
            Err(ScheduleError::UnknownDependency {
                task: "A".to_string(),
                dependency: "Z".to_string()
            })
        );

        let malformed = vec![TaskInput::new("A", 1.0).with_dependencies("B,,C")];
        assert!(matches!(
            calculate_schedule(&malformed, start, &cal),
            Err(ScheduleError::MalformedDependencies { .. })
        ));

        let self_dep = vec![TaskInput::new("A", 1.0).with_dependencies("A")];
        assert_eq!(
            calculate_schedule(&self_dep, start, &cal),
            Err(ScheduleError::SelfDependency("A".to_string()))
        );

        let zero = vec![TaskInput::new("A", 0.0)];
        assert!(matches!(
            calculate_schedule(&zero, start, &cal),
            Err(ScheduleError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_cycle_error_names_tasks() {
        let tasks = vec![
            TaskInput::new("T001", 1.0).with_dependencies("T002"),
            TaskInput::new("T002", 1.0).with_dependencies("T001"),
        ];
        let err = calculate_schedule(&tasks, d(2025, 1, 13), &WorkCalendar::default()).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::CircularDependency {
                tasks: vec!["T001".to_string(), "T002".to_string()]
            }
        );
        assert!(err.to_string().contains("T001, T002"));
    }

    #[test]
    fn test_empty_task_list() {
        let schedule = calculate_schedule(&[], d(2025, 1, 13), &WorkCalendar::default()).unwrap();
        assert!(schedule.tasks.is_empty());
        assert_eq!(schedule.project_duration, 0.0);
        assert_eq!(schedule.project_end, d(2025, 1, 13));
    }
}
