//! Signal state machine for the intersection
//!
//! The signal walks an ordered rotation of phases. Each phase grants right of
//! way to a set of approaches for a bounded duration. Transitions are purely
//! time-triggered; the only external override is `reset`.

use log::debug;

use super::config::SignalTiming;
use super::error::SimError;
use super::types::{Direction, QueueLengths};

/// A signal configuration granting right of way to some approaches
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub name: String,
    pub favored: Vec<Direction>,
    /// Base duration in seconds
    pub duration: f64,
}

impl Phase {
    pub fn new(name: impl Into<String>, favored: Vec<Direction>, duration: f64) -> Self {
        Self {
            name: name.into(),
            favored,
            duration,
        }
    }

    pub fn favors(&self, direction: Direction) -> bool {
        self.favored.contains(&direction)
    }
}

/// Ordered rotation of phases
#[derive(Debug, Clone, PartialEq)]
pub struct SignalPlan {
    pub phases: Vec<Phase>,
    /// Extra green seconds per queued vehicle when a phase starts.
    /// Zero keeps every phase at its base duration.
    pub extension_per_vehicle: f64,
}

impl SignalPlan {
    pub fn new(phases: Vec<Phase>) -> Self {
        Self {
            phases,
            extension_per_vehicle: 0.0,
        }
    }

    /// North-South green followed by East-West green
    pub fn two_phase(ns_duration: f64, ew_duration: f64) -> Self {
        Self::new(vec![
            Phase::new("NS", vec![Direction::North, Direction::South], ns_duration),
            Phase::new("EW", vec![Direction::East, Direction::West], ew_duration),
        ])
    }

    /// One approach at a time: N -> S -> E -> W
    pub fn round_robin(duration: f64) -> Self {
        Self::new(
            Direction::ALL
                .iter()
                .map(|&direction| Phase::new(direction.code(), vec![direction], duration))
                .collect(),
        )
    }

    pub fn with_extension_per_vehicle(mut self, seconds: f64) -> Self {
        self.extension_per_vehicle = seconds;
        self
    }

    pub fn validate(&self, timing: &SignalTiming) -> Result<(), SimError> {
        if self.phases.is_empty() {
            return Err(SimError::Configuration(
                "signal plan needs at least one phase".to_string(),
            ));
        }
        if !self.extension_per_vehicle.is_finite() || self.extension_per_vehicle < 0.0 {
            return Err(SimError::Configuration(format!(
                "extension_per_vehicle must be non-negative, got {}",
                self.extension_per_vehicle
            )));
        }
        for phase in &self.phases {
            timing.check_duration(&phase.name, phase.duration)?;
        }
        Ok(())
    }
}

/// Runtime state of the signal
#[derive(Debug, Clone)]
pub struct SignalController {
    plan: SignalPlan,
    timing: SignalTiming,
    current: usize,
    elapsed: f64,
    /// Effective duration of the current phase (base plus any extension)
    duration: f64,
    cycles_completed: u64,
    /// Last tick index applied through `advance_for_tick`
    last_tick: Option<u64>,
}

impl SignalController {
    pub fn new(plan: SignalPlan, timing: SignalTiming) -> Result<Self, SimError> {
        timing.validate()?;
        plan.validate(&timing)?;
        let duration = plan.phases[0].duration;
        Ok(Self {
            plan,
            timing,
            current: 0,
            elapsed: 0.0,
            duration,
            cycles_completed: 0,
            last_tick: None,
        })
    }

    pub fn current_phase(&self) -> &Phase {
        &self.plan.phases[self.current]
    }

    pub fn phase_index(&self) -> usize {
        self.current
    }

    pub fn plan(&self) -> &SignalPlan {
        &self.plan
    }

    /// Seconds spent in the current phase
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Effective duration of the current phase
    pub fn phase_duration(&self) -> f64 {
        self.duration
    }

    pub fn time_remaining(&self) -> f64 {
        (self.duration - self.elapsed).max(0.0)
    }

    /// Full rotations completed back to the first phase
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    pub fn favors(&self, direction: Direction) -> bool {
        self.current_phase().favors(direction)
    }

    /// Advance the signal by `delta` seconds
    ///
    /// Excess time past the end of a phase carries into the next one.
    /// Returns how many phase transitions happened.
    pub fn advance(&mut self, delta: f64, queues: &QueueLengths) -> usize {
        if !delta.is_finite() || delta <= 0.0 {
            return 0;
        }

        self.elapsed += delta;
        let mut transitions = 0;
        while self.elapsed >= self.duration {
            self.elapsed -= self.duration;
            self.current = (self.current + 1) % self.plan.phases.len();
            if self.current == 0 {
                self.cycles_completed += 1;
            }
            self.duration = self.effective_duration(self.current, queues);
            transitions += 1;
            debug!(
                "Signal switched to phase {} for {:.1}s (cycle {})",
                self.current_phase().name,
                self.duration,
                self.cycles_completed
            );
        }
        transitions
    }

    /// Advance once for the given tick index
    ///
    /// A second call with the same (or an older) tick index is a no-op.
    pub fn advance_for_tick(
        &mut self,
        tick: u64,
        delta: f64,
        queues: &QueueLengths,
    ) -> usize {
        if self.last_tick.is_some_and(|last| tick <= last) {
            return 0;
        }
        self.last_tick = Some(tick);
        self.advance(delta, queues)
    }

    /// Return to the first phase with all counters cleared
    pub fn reset(&mut self) {
        self.current = 0;
        self.elapsed = 0.0;
        self.duration = self.plan.phases[0].duration;
        self.cycles_completed = 0;
        self.last_tick = None;
    }

    fn effective_duration(&self, index: usize, queues: &QueueLengths) -> f64 {
        let phase = &self.plan.phases[index];
        if self.plan.extension_per_vehicle <= 0.0 {
            return phase.duration;
        }
        let queued: usize = phase.favored.iter().map(|&d| *queues.get(d)).sum();
        self.timing
            .clamp(phase.duration + self.plan.extension_per_vehicle * queued as f64)
    }
}
