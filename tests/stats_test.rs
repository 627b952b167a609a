//! Statistics aggregation tests

use intersection_sim::simulation::{
    snapshot, Direction, MetricsHistory, MetricsSummary, SignalPlan, SignalTiming, SimConfig,
    SimIntersection,
};

fn quiet_config() -> SimConfig {
    SimConfig::default()
        .with_arrival_rate(0.0)
        .with_timing(SignalTiming {
            min_duration: 1.0,
            max_duration: 120.0,
            default_duration: 10.0,
        })
        .with_signal_plan(SignalPlan::two_phase(10.0, 10.0))
}

#[test]
fn test_fresh_snapshot_has_no_division_by_zero() {
    let intersection = SimIntersection::new(quiet_config()).unwrap();

    let snapshot = intersection.snapshot();

    assert_eq!(snapshot.total_served, 0);
    assert_eq!(snapshot.overall_avg_wait, 0.0);
    assert_eq!(snapshot.throughput, 0.0);
    assert_eq!(snapshot.emergency_avg_wait, 0.0);
    assert_eq!(snapshot.elapsed_time, 0.0);
    assert_eq!(snapshot.phase, "NS");
    assert_eq!(snapshot.favored, vec![Direction::North, Direction::South]);
    assert_eq!(snapshot.time_remaining, 10.0);
}

#[test]
fn test_zero_served_after_ticks_reports_zero_rates() {
    let mut intersection = SimIntersection::new(quiet_config()).unwrap();
    for _ in 0..30 {
        intersection.tick().unwrap();
    }

    let snapshot = intersection.snapshot();

    assert_eq!(snapshot.elapsed_time, 30.0);
    assert_eq!(snapshot.overall_avg_wait, 0.0);
    assert_eq!(snapshot.throughput, 0.0);
    assert_eq!(snapshot.cycles_completed, 1);
}

#[test]
fn test_snapshot_aggregates_all_directions() {
    let mut intersection = SimIntersection::new(quiet_config()).unwrap();
    intersection.spawn_vehicle(Direction::North, false);
    intersection.spawn_vehicle(Direction::South, false);
    intersection.spawn_vehicle(Direction::East, false);
    intersection.spawn_vehicle(Direction::West, true);

    intersection.tick().unwrap();
    intersection.tick().unwrap();

    let snapshot = snapshot(&intersection);

    // North, South and the West emergency vehicle left after one second
    assert_eq!(snapshot.total_served, 3);
    assert_eq!(snapshot.total_in_system, 1);
    assert_eq!(snapshot.total_wait, 3.0);
    assert_eq!(snapshot.overall_avg_wait, 1.0);
    assert_eq!(snapshot.emergency_count, 1);
    assert_eq!(snapshot.emergency_served, 1);
    assert_eq!(snapshot.emergency_avg_wait, 1.0);
    // 3 vehicles in 2 simulated seconds
    assert_eq!(snapshot.throughput, 90.0);
    assert_eq!(snapshot.ticks, 2);

    let per_direction_served: u64 = snapshot.directions.iter().map(|(_, s)| s.total_served).sum();
    assert_eq!(per_direction_served, snapshot.total_served);
    assert_eq!(snapshot.directions.get(Direction::East).current_length, 1);
}

#[test]
fn test_overall_average_matches_per_direction_sums() {
    let config = quiet_config().with_arrival_rate(0.5).with_seed(99);
    let mut intersection = SimIntersection::new(config).unwrap();
    for _ in 0..300 {
        intersection.tick().unwrap();
    }

    let snapshot = intersection.snapshot();
    let total_wait: f64 = intersection.queues().map(|q| q.total_wait()).sum();
    let total_served: u64 = intersection.queues().map(|q| q.total_served()).sum();

    assert!(total_served > 0);
    assert_eq!(snapshot.total_served, total_served);
    assert!((snapshot.overall_avg_wait - total_wait / total_served as f64).abs() < 1e-9);
}

#[test]
fn test_snapshot_is_idempotent() {
    let config = quiet_config().with_arrival_rate(0.5).with_seed(4);
    let mut intersection = SimIntersection::new(config).unwrap();
    for _ in 0..40 {
        intersection.tick().unwrap();
    }

    assert_eq!(intersection.snapshot(), intersection.snapshot());
}

#[test]
fn test_metrics_summary_from_snapshot() {
    let mut intersection = SimIntersection::new(quiet_config()).unwrap();
    intersection.spawn_vehicle(Direction::North, true);
    intersection.tick().unwrap();

    let summary = MetricsSummary::from(&intersection.snapshot());

    assert_eq!(summary.total_vehicles, 1);
    assert_eq!(summary.avg_wait_time, 1.0);
    assert_eq!(summary.emergency_count, 1);
    assert_eq!(summary.throughput, 60.0);
}

#[test]
fn test_snapshot_serializes_directions_by_code() {
    let intersection = SimIntersection::new(quiet_config()).unwrap();

    let value = serde_json::to_value(intersection.snapshot()).unwrap();

    assert_eq!(value["directions"]["N"]["direction"], "N");
    assert_eq!(value["directions"]["W"]["current_length"], 0);
    assert_eq!(value["favored"], serde_json::json!(["N", "S"]));
}

#[test]
fn test_history_evicts_oldest_snapshots() {
    let mut intersection = SimIntersection::new(quiet_config()).unwrap();
    let mut history = MetricsHistory::new(3);
    assert!(history.is_empty());
    assert_eq!(history.peak_in_system(), 0);
    assert_eq!(history.mean_throughput(), 0.0);

    for tick in 0..5 {
        if tick == 1 {
            intersection.spawn_vehicle(Direction::East, false);
            intersection.spawn_vehicle(Direction::East, false);
        }
        intersection.tick().unwrap();
        history.record(intersection.snapshot());
    }

    assert_eq!(history.len(), 3);
    let ticks: Vec<u64> = history.recent(10).iter().map(|s| s.ticks).collect();
    assert_eq!(ticks, vec![3, 4, 5]);
    assert_eq!(history.recent(1)[0].ticks, 5);
    assert_eq!(history.latest().map(|s| s.ticks), Some(5));
    assert_eq!(history.peak_in_system(), 2);

    history.clear();
    assert!(history.latest().is_none());
}
