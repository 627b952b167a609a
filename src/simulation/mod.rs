//! Intersection simulation core
//!
//! This module contains the signal state machine, the per-approach queues,
//! the intersection model that drives them, and the statistics derived from
//! it. It performs no I/O and never sleeps; pacing belongs to the caller.

mod config;
mod error;
mod intersection;
mod queue;
mod signal;
mod stats;
mod types;

// Re-export public types for external use
pub use config::{
    ServiceModel, SignalTiming, SimConfig, DEFAULT_ARRIVAL_RATE, DEFAULT_CARS_PER_GREEN,
    DEFAULT_CROSSING_DISTANCE, DEFAULT_CROSSING_STEP, DEFAULT_EMERGENCY_RATE,
    DEFAULT_MAX_VEHICLES, DEFAULT_PHASE_DURATION, DEFAULT_SECONDS_PER_TICK,
    EMERGENCY_SPEED_FACTOR, MAX_PHASE_DURATION, MIN_PHASE_DURATION,
};
pub use error::SimError;
pub use intersection::{SimIntersection, TickReport};
pub use queue::{DirectionQueue, DirectionStats};
pub use signal::{Phase, SignalController, SignalPlan};
pub use stats::{
    snapshot, IntersectionSnapshot, MetricsHistory, MetricsSummary, DEFAULT_HISTORY_CAPACITY,
};
pub use types::{Direction, PerDirection, QueueLengths, SimVehicle, VehicleId};
