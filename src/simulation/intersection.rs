//! The intersection model
//!
//! Owns the signal and one queue per approach, and drives them one tick at a
//! time: arrivals, then signal advance, then service.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use super::config::{ServiceModel, SimConfig, EMERGENCY_SPEED_FACTOR};
use super::error::SimError;
use super::queue::DirectionQueue;
use super::signal::SignalController;
use super::stats::{self, IntersectionSnapshot};
use super::types::{Direction, PerDirection, QueueLengths, SimVehicle, VehicleId};

/// What happened during one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Index of the tick that just ran (0-based)
    pub tick: u64,
    pub arrivals: Vec<VehicleId>,
    /// Arrivals turned away because the intersection was full
    pub rejected: u64,
    pub departed: Vec<SimVehicle>,
    pub phase_changes: usize,
}

/// A single signalized intersection
pub struct SimIntersection {
    config: SimConfig,
    signal: SignalController,
    queues: PerDirection<DirectionQueue>,
    next_id: u64,
    /// Simulation clock in seconds
    time: f64,
    ticks: u64,
    emergency_count: u64,
    emergency_cooldown: u32,
    rejected_arrivals: u64,
    /// Seeded RNG for reproducible runs; `None` uses the thread RNG
    rng: Option<StdRng>,
}

impl SimIntersection {
    /// Build an intersection, rejecting invalid configuration up front
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let signal = SignalController::new(config.signal_plan.clone(), config.timing)?;
        let rng = config.seed.map(StdRng::seed_from_u64);
        Ok(Self {
            config,
            signal,
            queues: PerDirection(Direction::ALL.map(DirectionQueue::new)),
            next_id: 0,
            time: 0.0,
            ticks: 0,
            emergency_count: 0,
            emergency_cooldown: 0,
            rejected_arrivals: 0,
            rng,
        })
    }

    /// Restore the construction-time state
    ///
    /// Vehicle ids restart at 0 and a seeded RNG is reseeded, so a reset
    /// intersection replays exactly like a fresh one.
    pub fn reset(&mut self) {
        for queue in self.queues.0.iter_mut() {
            queue.reset();
        }
        self.signal.reset();
        self.next_id = 0;
        self.time = 0.0;
        self.ticks = 0;
        self.emergency_count = 0;
        self.emergency_cooldown = 0;
        self.rejected_arrivals = 0;
        self.rng = self.config.seed.map(StdRng::seed_from_u64);
        info!("Intersection reset");
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn signal(&self) -> &SignalController {
        &self.signal
    }

    pub fn queue(&self, direction: Direction) -> &DirectionQueue {
        self.queues.get(direction)
    }

    pub fn queues(&self) -> impl Iterator<Item = &DirectionQueue> {
        self.queues.0.iter()
    }

    /// Every waiting vehicle, grouped by approach in N, S, E, W order
    pub fn vehicles(&self) -> impl Iterator<Item = &SimVehicle> {
        self.queues().flat_map(|q| q.vehicles())
    }

    /// Current simulation time in seconds
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Emergency vehicles generated since the last reset
    pub fn emergency_count(&self) -> u64 {
        self.emergency_count
    }

    pub fn rejected_arrivals(&self) -> u64 {
        self.rejected_arrivals
    }

    pub fn queue_lengths(&self) -> QueueLengths {
        PerDirection(Direction::ALL.map(|d| self.queues.get(d).len()))
    }

    pub fn total_in_system(&self) -> usize {
        self.queues().map(DirectionQueue::len).sum()
    }

    pub fn snapshot(&self) -> IntersectionSnapshot {
        stats::snapshot(self)
    }

    /// Add a vehicle to an approach at the current time
    ///
    /// Returns `None` when the vehicle cap is reached.
    pub fn spawn_vehicle(&mut self, direction: Direction, is_emergency: bool) -> Option<VehicleId> {
        if let Some(max) = self.config.max_vehicles {
            if self.total_in_system() >= max {
                self.rejected_arrivals += 1;
                debug!("Arrival on {direction} rejected, {max} vehicles already waiting");
                return None;
            }
        }

        let id = VehicleId(self.next_id);
        self.next_id += 1;
        let vehicle = SimVehicle::new(id, direction, self.time, is_emergency);
        // The vehicle is built for this queue's direction, so enqueue cannot fail
        if self.queues.get_mut(direction).enqueue(vehicle).is_err() {
            return None;
        }

        if is_emergency {
            self.emergency_count += 1;
            debug!("Emergency vehicle {} arrived on {direction}", id.0);
        }
        Some(id)
    }

    /// Run one tick starting at the model clock
    pub fn tick(&mut self) -> Result<TickReport, SimError> {
        self.tick_at(self.time)
    }

    /// Run one tick starting at `current_time`
    ///
    /// The clock may jump forward but never backward.
    pub fn tick_at(&mut self, current_time: f64) -> Result<TickReport, SimError> {
        if current_time < self.time || !current_time.is_finite() {
            return Err(SimError::ClockRegression {
                clock: self.time,
                requested: current_time,
            });
        }
        self.time = current_time;

        let mut report = TickReport {
            tick: self.ticks,
            ..TickReport::default()
        };

        self.generate_arrivals(&mut report);

        let delta = self.config.seconds_per_tick;
        let lengths = self.queue_lengths();
        report.phase_changes = self.signal.advance_for_tick(self.ticks, delta, &lengths);

        self.time += delta;
        self.ticks += 1;

        report.departed = self.serve_queues()?;
        Ok(report)
    }

    fn random_unit(&mut self) -> f64 {
        match &mut self.rng {
            Some(rng) => rng.random_range(0.0..1.0),
            None => rand::rng().random_range(0.0..1.0),
        }
    }

    fn generate_arrivals(&mut self, report: &mut TickReport) {
        if self.emergency_cooldown > 0 {
            self.emergency_cooldown -= 1;
        }

        for direction in Direction::ALL {
            if self.random_unit() >= self.config.arrival_rate {
                continue;
            }
            // Always draw so the random stream does not depend on the cooldown
            let draw = self.random_unit();
            let is_emergency = self.emergency_cooldown == 0 && draw < self.config.emergency_rate;

            match self.spawn_vehicle(direction, is_emergency) {
                Some(id) => {
                    report.arrivals.push(id);
                    if is_emergency {
                        self.emergency_cooldown = self.config.emergency_cooldown_ticks;
                    }
                }
                None => report.rejected += 1,
            }
        }
    }

    /// Release vehicles at the end of a tick
    ///
    /// Emergency vehicles are released on every approach, favored or not.
    /// Regular vehicles only move on favored approaches.
    fn serve_queues(&mut self) -> Result<Vec<SimVehicle>, SimError> {
        let now = self.time;
        let mut departed = Vec::new();

        for direction in Direction::ALL {
            let green = self.signal.favors(direction);
            let queue = self.queues.get_mut(direction);
            match self.config.service {
                ServiceModel::Discharge { cars_per_green } => {
                    let emergencies = queue.serve_emergency(cars_per_green, now)?;
                    let capacity = cars_per_green - emergencies.len();
                    departed.extend(emergencies);
                    if green {
                        departed.extend(queue.serve(capacity, now)?);
                    }
                }
                ServiceModel::Crossing { step, distance } => {
                    let emergency_step = step * EMERGENCY_SPEED_FACTOR;
                    departed.extend(
                        queue.advance_crossing(green, step, emergency_step, distance, now)?,
                    );
                }
            }
        }

        for vehicle in departed.iter().filter(|v| v.is_emergency) {
            info!(
                "Emergency vehicle {} cleared the intersection from {} after {:.1}s",
                vehicle.id.0,
                vehicle.direction,
                now - vehicle.arrival_time
            );
        }
        Ok(departed)
    }
}
