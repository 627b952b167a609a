//! Per-approach vehicle queue
//!
//! Each approach keeps its waiting vehicles in arrival order together with
//! cumulative service counters. The current length is always read from the
//! queue itself; no cached length is kept.

use serde::Serialize;
use std::collections::VecDeque;

use super::error::SimError;
use super::types::{Direction, SimVehicle};

/// Point-in-time statistics for one approach
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionStats {
    pub direction: Direction,
    pub current_length: usize,
    pub total_served: u64,
    pub average_wait: f64,
    pub max_length: usize,
    pub total_wait: f64,
}

/// FIFO of vehicles waiting on one approach
#[derive(Debug, Clone)]
pub struct DirectionQueue {
    direction: Direction,
    vehicles: VecDeque<SimVehicle>,
    total_served: u64,
    total_wait: f64,
    max_length: usize,
    emergency_served: u64,
    emergency_wait: f64,
}

impl DirectionQueue {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            vehicles: VecDeque::new(),
            total_served: 0,
            total_wait: 0.0,
            max_length: 0,
            emergency_served: 0,
            emergency_wait: 0.0,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Waiting vehicles, head first
    pub fn vehicles(&self) -> impl Iterator<Item = &SimVehicle> {
        self.vehicles.iter()
    }

    pub fn total_served(&self) -> u64 {
        self.total_served
    }

    pub fn total_wait(&self) -> f64 {
        self.total_wait
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn emergency_served(&self) -> u64 {
        self.emergency_served
    }

    pub fn emergency_wait(&self) -> f64 {
        self.emergency_wait
    }

    /// Append a vehicle to the tail
    pub fn enqueue(&mut self, vehicle: SimVehicle) -> Result<(), SimError> {
        if vehicle.direction != self.direction {
            return Err(SimError::WrongDirection {
                expected: self.direction,
                found: vehicle.direction,
            });
        }
        self.vehicles.push_back(vehicle);
        self.max_length = self.max_length.max(self.vehicles.len());
        Ok(())
    }

    /// Release up to `max_count` vehicles from the head
    ///
    /// Fails without touching the queue if any released vehicle arrived after
    /// `current_time`.
    pub fn serve(
        &mut self,
        max_count: usize,
        current_time: f64,
    ) -> Result<Vec<SimVehicle>, SimError> {
        let count = max_count.min(self.vehicles.len());
        if count == 0 {
            return Ok(Vec::new());
        }

        for vehicle in self.vehicles.iter().take(count) {
            check_wait(vehicle, current_time)?;
        }

        let served: Vec<SimVehicle> = self.vehicles.drain(..count).collect();
        for vehicle in &served {
            self.record(vehicle, current_time);
        }
        Ok(served)
    }

    /// Release up to `max_count` emergency vehicles regardless of their place
    /// in the queue; the remaining vehicles keep their order
    pub fn serve_emergency(
        &mut self,
        max_count: usize,
        current_time: f64,
    ) -> Result<Vec<SimVehicle>, SimError> {
        let picked: Vec<usize> = self
            .vehicles
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_emergency)
            .map(|(i, _)| i)
            .take(max_count)
            .collect();
        if picked.is_empty() {
            return Ok(Vec::new());
        }

        for &i in &picked {
            check_wait(&self.vehicles[i], current_time)?;
        }

        // Remove back to front so earlier indices stay valid
        let mut served = Vec::with_capacity(picked.len());
        for &i in picked.iter().rev() {
            if let Some(vehicle) = self.vehicles.remove(i) {
                served.push(vehicle);
            }
        }
        served.reverse();

        for vehicle in &served {
            self.record(vehicle, current_time);
        }
        Ok(served)
    }

    /// Move vehicles forward for the crossing model
    ///
    /// With `green`, every vehicle moves; otherwise only emergency vehicles do.
    /// Vehicles whose position reaches `distance` leave the queue.
    pub fn advance_crossing(
        &mut self,
        green: bool,
        step: f64,
        emergency_step: f64,
        distance: f64,
        current_time: f64,
    ) -> Result<Vec<SimVehicle>, SimError> {
        let moves: Vec<f64> = self
            .vehicles
            .iter()
            .map(|v| match (v.is_emergency, green) {
                (true, _) => emergency_step,
                (false, true) => step,
                (false, false) => 0.0,
            })
            .collect();

        for (vehicle, delta) in self.vehicles.iter().zip(&moves) {
            if vehicle.position + delta >= distance {
                check_wait(vehicle, current_time)?;
            }
        }

        let mut served = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.vehicles.len());
        for (mut vehicle, delta) in self.vehicles.drain(..).zip(moves) {
            vehicle.position += delta;
            if vehicle.position >= distance {
                served.push(vehicle);
            } else {
                remaining.push_back(vehicle);
            }
        }
        self.vehicles = remaining;

        for vehicle in &served {
            self.record(vehicle, current_time);
        }
        Ok(served)
    }

    pub fn stats(&self) -> DirectionStats {
        let average_wait = if self.total_served == 0 {
            0.0
        } else {
            self.total_wait / self.total_served as f64
        };
        DirectionStats {
            direction: self.direction,
            current_length: self.vehicles.len(),
            total_served: self.total_served,
            average_wait,
            max_length: self.max_length,
            total_wait: self.total_wait,
        }
    }

    /// Drop all vehicles and counters
    pub fn reset(&mut self) {
        *self = Self::new(self.direction);
    }

    fn record(&mut self, vehicle: &SimVehicle, current_time: f64) {
        let wait = current_time - vehicle.arrival_time;
        self.total_served += 1;
        self.total_wait += wait;
        if vehicle.is_emergency {
            self.emergency_served += 1;
            self.emergency_wait += wait;
        }
    }
}

fn check_wait(vehicle: &SimVehicle, current_time: f64) -> Result<(), SimError> {
    if current_time < vehicle.arrival_time {
        return Err(SimError::InvalidTime {
            arrival_time: vehicle.arrival_time,
            current_time,
        });
    }
    Ok(())
}
