use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use scheduling_core::simulation::statistics;
use scheduling_core::{
    analyze_risk, calculate_critical_path, calculate_schedule, DistributionSpec, MonteCarloEngine,
    MonteCarloResult, RiskConfig, SimulationConfig, SimulationTaskInput, TaskGraph, TaskInput,
    WorkCalendar,
};

const TOLERANCE: f64 = 1e-9;

fn task_id(ix: usize) -> String {
    format!("T{ix:03}")
}

/// Durations plus forward-only edges, so the graph is always acyclic.
fn arb_dag() -> impl Strategy<Value = (Vec<f64>, Vec<(usize, usize)>)> {
    (1usize..20).prop_flat_map(|n| {
        let durations = prop::collection::vec(1u32..20, n)
            .prop_map(|v| v.into_iter().map(f64::from).collect::<Vec<_>>());
        let edges = prop::collection::vec((0..n, 0..n), 0..n * 2)
            .prop_map(|pairs| pairs.into_iter().filter(|(a, b)| a < b).collect::<Vec<_>>());
        (durations, edges)
    })
}

fn build_graph(durations: &[f64], edges: &[(usize, usize)]) -> TaskGraph {
    let mut graph = TaskGraph::new();
    for (ix, duration) in durations.iter().enumerate() {
        graph.add_task(task_id(ix), *duration).unwrap();
    }
    for (from, to) in edges {
        graph.add_edge(&task_id(*from), &task_id(*to)).unwrap();
    }
    graph
}

fn task_inputs(durations: &[f64], edges: &[(usize, usize)]) -> Vec<TaskInput> {
    durations
        .iter()
        .enumerate()
        .map(|(ix, duration)| {
            let deps: Vec<String> = edges
                .iter()
                .filter(|(_, to)| *to == ix)
                .map(|(from, _)| task_id(*from))
                .collect();
            let task = TaskInput::new(task_id(ix), *duration);
            if deps.is_empty() {
                task
            } else {
                task.with_dependencies(deps.join(", "))
            }
        })
        .collect()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
}

// ── Topological order ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn topological_order_respects_every_edge((durations, edges) in arb_dag()) {
        let graph = build_graph(&durations, &edges);
        let order = graph.topological_sort().unwrap();
        prop_assert_eq!(order.len(), graph.len());

        let position = |id: &str| order.iter().position(|o| o == id).unwrap();
        for (from, to) in &edges {
            prop_assert!(position(&task_id(*from)) < position(&task_id(*to)));
        }
    }
}

// ── CPM identities ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn cpm_identities_hold((durations, edges) in arb_dag()) {
        let graph = build_graph(&durations, &edges);
        let result = calculate_critical_path(&graph).unwrap();

        let mut max_finish: f64 = 0.0;
        for data in result.tasks.values() {
            prop_assert!((data.slack - (data.late_start - data.early_start)).abs() < TOLERANCE);
            prop_assert!((data.early_finish - (data.early_start + data.duration)).abs() < TOLERANCE);
            prop_assert!((data.late_finish - (data.late_start + data.duration)).abs() < TOLERANCE);
            prop_assert!(data.slack > -TOLERANCE);
            max_finish = max_finish.max(data.early_finish);
        }
        prop_assert!((result.project_duration - max_finish).abs() < TOLERANCE);
        prop_assert!(!result.critical_path.is_empty());
    }

    #[test]
    fn schedule_is_idempotent((durations, edges) in arb_dag()) {
        let tasks = task_inputs(&durations, &edges);
        let calendar = WorkCalendar::default();
        let first = calculate_schedule(&tasks, monday(), &calendar).unwrap();
        let second = calculate_schedule(&tasks, monday(), &calendar).unwrap();
        prop_assert_eq!(first, second);
    }
}

// ── Calendar ───────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn working_day_count_round_trips(start_offset in 0i64..60, span in 0i64..120) {
        let calendar = WorkCalendar::default();
        let start = monday() + Duration::days(start_offset);
        let end = start + Duration::days(span);
        prop_assume!(calendar.is_working_day(start) && calendar.is_working_day(end));

        let count = calendar.count_working_days(start, end).unwrap();
        let back = calendar.add_working_days(start, (count - 1) as f64).unwrap();
        prop_assert_eq!(back, end);
    }
}

// ── Simulation statistics ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn percentiles_are_monotonic(
        values in prop::collection::vec(0.0f64..1000.0, 1..200),
        p1 in 0.0f64..=100.0,
        p2 in 0.0f64..=100.0,
    ) {
        let (low, high) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
        let result = MonteCarloResult::from_durations(values, &[low, high]);
        prop_assert!(result.percentile(low).unwrap() <= result.percentile(high).unwrap());

        let sorted = statistics::sorted(&result.durations);
        prop_assert!(statistics::percentile(&sorted, 0.0) <= result.median_duration);
        prop_assert!(result.median_duration <= statistics::percentile(&sorted, 100.0));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn zero_variance_simulation_converges(value in 1u32..50, iterations in 1usize..300, seed in any::<u64>()) {
        let duration = f64::from(value);
        let tasks = vec![SimulationTaskInput::new("T001", DistributionSpec::fixed(duration))];
        let config = SimulationConfig::default().with_iterations(iterations).with_seed(seed);
        let result = MonteCarloEngine::from_inputs(&tasks, config).unwrap().run().unwrap();

        prop_assert_eq!(result.iterations, iterations);
        prop_assert_eq!(result.mean_duration, duration);
        prop_assert_eq!(result.median_duration, duration);
        prop_assert_eq!(result.std_dev, 0.0);
    }

    #[test]
    fn criticality_indices_are_bounded((durations, edges) in arb_dag(), seed in any::<u64>()) {
        let tasks: Vec<SimulationTaskInput> = task_inputs(&durations, &edges)
            .into_iter()
            .map(|t| {
                let spec = DistributionSpec::triangular(t.duration * 0.5, t.duration, t.duration * 2.0);
                let input = SimulationTaskInput::new(t.id, spec);
                match t.dependencies {
                    Some(deps) => input.with_dependencies(deps),
                    None => input,
                }
            })
            .collect();
        let config = RiskConfig::default().with_iterations(100).with_seed(seed);
        let metrics = analyze_risk(&tasks, monday(), &WorkCalendar::default(), &config, None).unwrap();

        prop_assert_eq!(metrics.probabilistic_critical_path.len(), tasks.len());
        for data in metrics.task_criticality.values() {
            prop_assert!((0.0..=1.0).contains(&data.criticality_index));
            prop_assert!(data.critical_count <= data.total_iterations);
            prop_assert_eq!(data.total_iterations, 100);
        }
    }
}
