//! Statistics derived from the intersection state
//!
//! Everything here reads the model and never mutates it.

use serde::Serialize;
use std::collections::VecDeque;

use super::intersection::SimIntersection;
use super::queue::DirectionStats;
use super::types::{Direction, PerDirection};

/// Number of snapshots kept by `MetricsHistory` by default
pub const DEFAULT_HISTORY_CAPACITY: usize = 300;

/// Immutable summary of an intersection at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntersectionSnapshot {
    pub directions: PerDirection<DirectionStats>,
    pub total_in_system: usize,
    pub total_served: u64,
    pub total_wait: f64,
    pub overall_avg_wait: f64,
    pub phase: String,
    pub favored: Vec<Direction>,
    pub phase_elapsed: f64,
    pub phase_duration: f64,
    pub time_remaining: f64,
    pub cycles_completed: u64,
    pub elapsed_time: f64,
    pub ticks: u64,
    /// Vehicles served per simulated minute
    pub throughput: f64,
    pub emergency_count: u64,
    pub emergency_served: u64,
    pub emergency_avg_wait: f64,
    pub rejected_arrivals: u64,
}

/// Cumulative figures answered by `get_metrics`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total_vehicles: u64,
    pub avg_wait_time: f64,
    pub emergency_count: u64,
    pub throughput: f64,
}

impl From<&IntersectionSnapshot> for MetricsSummary {
    fn from(snapshot: &IntersectionSnapshot) -> Self {
        Self {
            total_vehicles: snapshot.total_served,
            avg_wait_time: snapshot.overall_avg_wait,
            emergency_count: snapshot.emergency_count,
            throughput: snapshot.throughput,
        }
    }
}

/// Summarize the intersection
pub fn snapshot(intersection: &SimIntersection) -> IntersectionSnapshot {
    let directions = PerDirection(Direction::ALL.map(|d| intersection.queue(d).stats()));

    let total_in_system = directions.0.iter().map(|s| s.current_length).sum();
    let total_served: u64 = directions.0.iter().map(|s| s.total_served).sum();
    let total_wait: f64 = directions.0.iter().map(|s| s.total_wait).sum();

    let emergency_served: u64 = intersection.queues().map(|q| q.emergency_served()).sum();
    let emergency_wait: f64 = intersection.queues().map(|q| q.emergency_wait()).sum();

    let signal = intersection.signal();
    let phase = signal.current_phase();
    let elapsed_time = intersection.time();

    IntersectionSnapshot {
        directions,
        total_in_system,
        total_served,
        total_wait,
        overall_avg_wait: ratio(total_wait, total_served as f64),
        phase: phase.name.clone(),
        favored: phase.favored.clone(),
        phase_elapsed: signal.elapsed(),
        phase_duration: signal.phase_duration(),
        time_remaining: signal.time_remaining(),
        cycles_completed: signal.cycles_completed(),
        elapsed_time,
        ticks: intersection.ticks(),
        throughput: ratio(total_served as f64 * 60.0, elapsed_time),
        emergency_count: intersection.emergency_count(),
        emergency_served,
        emergency_avg_wait: ratio(emergency_wait, emergency_served as f64),
        rejected_arrivals: intersection.rejected_arrivals(),
    }
}

/// `numerator / denominator`, or 0 when the denominator is 0
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Bounded window of recent snapshots
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    capacity: usize,
    snapshots: VecDeque<IntersectionSnapshot>,
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl MetricsHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            snapshots: VecDeque::with_capacity(capacity),
        }
    }

    /// Store a snapshot, evicting the oldest when full
    pub fn record(&mut self, snapshot: IntersectionSnapshot) {
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn latest(&self) -> Option<&IntersectionSnapshot> {
        self.snapshots.back()
    }

    /// The most recent `count` snapshots, oldest first
    pub fn recent(&self, count: usize) -> Vec<&IntersectionSnapshot> {
        let skip = self.snapshots.len().saturating_sub(count);
        self.snapshots.iter().skip(skip).collect()
    }

    /// Largest number of vehicles waiting at once within the window
    pub fn peak_in_system(&self) -> usize {
        self.snapshots
            .iter()
            .map(|s| s.total_in_system)
            .max()
            .unwrap_or(0)
    }

    pub fn mean_throughput(&self) -> f64 {
        let sum: f64 = self.snapshots.iter().map(|s| s.throughput).sum();
        ratio(sum, self.snapshots.len() as f64)
    }
}
