use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use scheduling_core::{
    analyze_risk, calculate_buffers, calculate_schedule, run_simulation, BufferMethod, Distribution,
    DistributionSpec, ResourceContext, Resource, ResourceConflictDetector, ResourceConstrainedScheduler,
    ResourcePool, ResourceType, RiskConfig, ScheduleError, SimulationConfig, SimulationTaskInput,
    TaskInput, TaskResourceRequirement, WorkCalendar,
};

fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

#[test]
fn test_single_task() {
    let tasks = vec![TaskInput::new("T001", 5.0)];
    let schedule = calculate_schedule(&tasks, d(2025, 1, 13), &WorkCalendar::default()).unwrap();

    assert_eq!(schedule.project_duration, 5.0);
    assert_eq!(schedule.task_dates["T001"], (d(2025, 1, 13), d(2025, 1, 17)));
    assert_eq!(schedule.critical_path, vec!["T001"]);
}

#[test]
fn test_two_task_chain() {
    let tasks = vec![
        TaskInput::new("T001", 3.0),
        TaskInput::new("T002", 5.0).with_dependencies("T001"),
    ];
    let schedule = calculate_schedule(&tasks, d(2025, 1, 13), &WorkCalendar::default()).unwrap();

    assert_eq!(schedule.project_duration, 8.0);
    assert_eq!(schedule.critical_path, vec!["T001", "T002"]);
}

#[test]
fn test_parallel_branches() {
    let tasks = vec![
        TaskInput::new("T001", 5.0),
        TaskInput::new("T002", 3.0).with_dependencies("T001"),
        TaskInput::new("T003", 7.0).with_dependencies("T001"),
    ];
    let schedule = calculate_schedule(&tasks, d(2025, 1, 13), &WorkCalendar::default()).unwrap();

    assert_eq!(schedule.project_duration, 12.0);
    assert!(schedule.critical_path.contains(&"T001".to_string()));
    assert!(schedule.critical_path.contains(&"T003".to_string()));
    assert!(!schedule.critical_path.contains(&"T002".to_string()));
    assert_eq!(schedule.tasks["T002"].slack, 4.0);
}

#[test]
fn test_cycle_is_rejected() {
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
}

#[test]
fn test_degenerate_triangular_is_constant() {
    let distribution = Distribution::triangular(3.0, 3.0, 3.0).unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..1_000 {
        assert_eq!(distribution.sample(&mut rng), 3.0);
    }
}

#[test]
fn test_zero_variance_simulation() {
    let tasks = vec![
        SimulationTaskInput::new("T001", DistributionSpec::fixed(3.0)),
        SimulationTaskInput::new("T002", DistributionSpec::fixed(5.0)).with_dependencies("T001"),
    ];
    let config = SimulationConfig::default().with_iterations(10_000).with_seed(2025);
    let result = run_simulation(&tasks, d(2025, 1, 13), &WorkCalendar::default(), &config, None).unwrap();

    assert_eq!(result.iterations, 10_000);
    assert_eq!(result.mean_duration, 8.0);
    assert!(result.std_dev.abs() < 1e-12);
    for (p, value) in &result.percentiles {
        assert_eq!(*value, 8.0, "p{p}");
    }
}

#[test]
fn test_shared_resource_end_to_end() {
    // Two independent tasks on one person run back to back.
    let mut pool = ResourcePool::new();
    pool.add(Resource::with_default_capacity("alice", "Alice", ResourceType::Person))
        .unwrap();
    let requirements = vec![
        TaskResourceRequirement::new("A", ResourceType::Person, 1.0)
            .unwrap()
            .with_resources(["alice"]),
        TaskResourceRequirement::new("B", ResourceType::Person, 1.0)
            .unwrap()
            .with_resources(["alice"]),
    ];
    let calendar = WorkCalendar::default();
    let graph = scheduling_core::build_task_graph([("A", 3.0, None), ("B", 2.0, None)]).unwrap();

    let scheduler = ResourceConstrainedScheduler::new(&pool, &calendar, d(2025, 1, 13), &requirements).unwrap();
    let result = scheduler.schedule(&graph).unwrap();
    assert_eq!(result.schedule.project_duration, 5.0);
    assert!(ResourceConflictDetector::new(&pool)
        .detect(&result.allocations)
        .unwrap()
        .is_empty());

    let tasks = vec![
        SimulationTaskInput::new("A", DistributionSpec::fixed(3.0)),
        SimulationTaskInput::new("B", DistributionSpec::fixed(2.0)),
    ];
    let context = ResourceContext {
        pool: &pool,
        requirements: &requirements,
    };
    let config = SimulationConfig::default().with_iterations(100).with_seed(3);
    let result = run_simulation(&tasks, d(2025, 1, 13), &calendar, &config, Some(context)).unwrap();
    assert_eq!(result.mean_duration, 5.0);
}

#[test]
fn test_schedule_then_buffers() {
    let tasks = vec![
        TaskInput::new("A", 4.0),
        TaskInput::new("B", 6.0).with_dependencies("A"),
        TaskInput::new("F", 2.0),
        TaskInput::new("C", 2.0).with_dependencies("B, F"),
    ];
    let schedule = calculate_schedule(&tasks, d(2025, 1, 13), &WorkCalendar::default()).unwrap();
    assert_eq!(schedule.critical_path, vec!["A", "B", "C"]);

    let graph = scheduling_core::build_task_graph(
        tasks
            .iter()
            .map(|t| (t.id.as_str(), t.duration, t.dependencies.as_deref())),
    )
    .unwrap();
    let durations = schedule
        .tasks
        .iter()
        .map(|(id, data)| (id.clone(), data.duration))
        .collect();
    let buffers = calculate_buffers(&schedule.critical_path, &durations, &graph, BufferMethod::Simple).unwrap();

    assert_eq!(buffers.len(), 2);
    assert_eq!(buffers[0].size, 6.0);
    assert_eq!(buffers[0].location, "end");
    assert_eq!(buffers[1].size, 1.0);
    assert_eq!(buffers[1].location, "C");
}

#[test]
fn test_risk_analysis_with_seed_is_reproducible() {
    let tasks = vec![
        SimulationTaskInput::new("A", DistributionSpec::triangular(2.0, 4.0, 8.0)),
        SimulationTaskInput::new("B", DistributionSpec::triangular(3.0, 4.0, 6.0)),
        SimulationTaskInput::new("C", DistributionSpec::uniform(1.0, 2.0)).with_dependencies("A, B"),
    ];
    let config = RiskConfig::default().with_iterations(1_000).with_seed(99);
    let calendar = WorkCalendar::default();

    let first = analyze_risk(&tasks, d(2025, 1, 13), &calendar, &config, None).unwrap();
    let second = analyze_risk(&tasks, d(2025, 1, 13), &calendar, &config, None).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.task_criticality["C"].criticality_index, 1.0);
}
