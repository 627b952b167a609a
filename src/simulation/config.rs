//! Static configuration for the intersection simulation
//!
//! A `SimConfig` is built once (usually from the command line) and handed to
//! `SimIntersection::new`, which validates it. Nothing in the core mutates it.

use super::error::SimError;
use super::signal::SignalPlan;

/// Probability per tick that a vehicle arrives on a given approach
pub const DEFAULT_ARRIVAL_RATE: f64 = 0.3;
/// Probability that a new vehicle is an emergency vehicle
pub const DEFAULT_EMERGENCY_RATE: f64 = 0.05;
/// Maximum number of vehicles waiting at the intersection at once
pub const DEFAULT_MAX_VEHICLES: usize = 100;
/// Simulated seconds covered by one tick
pub const DEFAULT_SECONDS_PER_TICK: f64 = 1.0;

/// Signal timing bounds (seconds)
pub const MIN_PHASE_DURATION: f64 = 20.0;
pub const MAX_PHASE_DURATION: f64 = 60.0;
pub const DEFAULT_PHASE_DURATION: f64 = 30.0;

/// Vehicles released per favored approach per tick
pub const DEFAULT_CARS_PER_GREEN: usize = 1;
/// Distance a vehicle covers to clear the intersection in the crossing model
pub const DEFAULT_CROSSING_DISTANCE: f64 = 100.0;
/// Distance covered per tick with a green light in the crossing model
pub const DEFAULT_CROSSING_STEP: f64 = 1.0;
/// Emergency vehicles cross this many times faster than regular traffic
pub const EMERGENCY_SPEED_FACTOR: f64 = 2.0;

/// Bounds every phase duration must respect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalTiming {
    pub min_duration: f64,
    pub max_duration: f64,
    pub default_duration: f64,
}

impl Default for SignalTiming {
    fn default() -> Self {
        Self {
            min_duration: MIN_PHASE_DURATION,
            max_duration: MAX_PHASE_DURATION,
            default_duration: DEFAULT_PHASE_DURATION,
        }
    }
}

impl SignalTiming {
    pub fn validate(&self) -> Result<(), SimError> {
        if !positive(self.min_duration) || !self.max_duration.is_finite() {
            return Err(SimError::Configuration(format!(
                "signal timing bounds must be positive and finite, got [{}, {}]",
                self.min_duration, self.max_duration
            )));
        }
        if self.min_duration > self.max_duration {
            return Err(SimError::Configuration(format!(
                "min_duration {} exceeds max_duration {}",
                self.min_duration, self.max_duration
            )));
        }
        self.check_duration("default", self.default_duration)
    }

    /// Reject a phase duration outside `[min_duration, max_duration]`
    pub fn check_duration(&self, phase: &str, duration: f64) -> Result<(), SimError> {
        if duration < self.min_duration || duration > self.max_duration || duration.is_nan() {
            return Err(SimError::Configuration(format!(
                "duration {duration} for phase '{phase}' is outside [{}, {}]",
                self.min_duration, self.max_duration
            )));
        }
        Ok(())
    }

    /// Two-phase plan with both phases at `default_duration`
    pub fn default_plan(&self) -> SignalPlan {
        SignalPlan::two_phase(self.default_duration, self.default_duration)
    }

    pub fn clamp(&self, duration: f64) -> f64 {
        duration.clamp(self.min_duration, self.max_duration)
    }
}

/// How favored approaches release vehicles
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServiceModel {
    /// Release up to `cars_per_green` vehicles per favored approach per tick
    Discharge { cars_per_green: usize },
    /// Move every vehicle on a favored approach forward by `step`; vehicles
    /// that reach `distance` have cleared the intersection
    Crossing { step: f64, distance: f64 },
}

impl Default for ServiceModel {
    fn default() -> Self {
        ServiceModel::Discharge {
            cars_per_green: DEFAULT_CARS_PER_GREEN,
        }
    }
}

/// Complete configuration of one intersection
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub arrival_rate: f64,
    pub emergency_rate: f64,
    /// Ticks during which no new emergency vehicle is drawn after one spawns
    pub emergency_cooldown_ticks: u32,
    /// Cap on vehicles currently in the system; `None` disables it
    pub max_vehicles: Option<usize>,
    pub seconds_per_tick: f64,
    pub timing: SignalTiming,
    pub signal_plan: SignalPlan,
    pub service: ServiceModel,
    /// Seed for reproducible arrivals; `None` uses the thread RNG
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        let timing = SignalTiming::default();
        Self {
            arrival_rate: DEFAULT_ARRIVAL_RATE,
            emergency_rate: DEFAULT_EMERGENCY_RATE,
            emergency_cooldown_ticks: 0,
            max_vehicles: Some(DEFAULT_MAX_VEHICLES),
            seconds_per_tick: DEFAULT_SECONDS_PER_TICK,
            signal_plan: timing.default_plan(),
            timing,
            service: ServiceModel::default(),
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_arrival_rate(mut self, arrival_rate: f64) -> Self {
        self.arrival_rate = arrival_rate;
        self
    }

    pub fn with_emergency_rate(mut self, emergency_rate: f64) -> Self {
        self.emergency_rate = emergency_rate;
        self
    }

    pub fn with_signal_plan(mut self, plan: SignalPlan) -> Self {
        self.signal_plan = plan;
        self
    }

    pub fn with_timing(mut self, timing: SignalTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_service(mut self, service: ServiceModel) -> Self {
        self.service = service;
        self
    }

    pub fn with_max_vehicles(mut self, max_vehicles: Option<usize>) -> Self {
        self.max_vehicles = max_vehicles;
        self
    }

    /// Check every field; the intersection refuses to start with a bad config
    pub fn validate(&self) -> Result<(), SimError> {
        check_probability("arrival_rate", self.arrival_rate)?;
        check_probability("emergency_rate", self.emergency_rate)?;

        if !self.seconds_per_tick.is_finite() || self.seconds_per_tick <= 0.0 {
            return Err(SimError::Configuration(format!(
                "seconds_per_tick must be positive, got {}",
                self.seconds_per_tick
            )));
        }

        match self.service {
            ServiceModel::Discharge { cars_per_green: 0 } => {
                return Err(SimError::Configuration(
                    "cars_per_green must be at least 1".to_string(),
                ));
            }
            ServiceModel::Crossing { step, distance } if !positive(step) || !positive(distance) => {
                return Err(SimError::Configuration(format!(
                    "crossing step {step} and distance {distance} must be positive"
                )));
            }
            _ => {}
        }

        self.timing.validate()?;
        self.signal_plan.validate(&self.timing)
    }
}

fn check_probability(name: &str, value: f64) -> Result<(), SimError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(SimError::Configuration(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
