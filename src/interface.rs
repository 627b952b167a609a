//! Line-oriented command interface
//!
//! Translates textual commands into calls on the intersection model and turns
//! the results (and every failure) into JSON-serializable replies. This is the
//! only part of the crate the driving loop talks to.

use log::{info, warn};
use serde::Serialize;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::simulation::{
    Direction, IntersectionSnapshot, MetricsHistory, MetricsSummary, QueueLengths, SimError,
    SimIntersection, SimVehicle, TickReport,
};

/// A parsed command line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GetState,
    GetMetrics,
    /// Recent snapshots; `None` returns the whole window
    GetHistory(Option<usize>),
    SetSpeed(f64),
    Reset,
    /// Blank line: advance the simulation by one tick
    Step,
}

impl FromStr for Command {
    type Err = SimError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(Command::Step);
        };
        let argument = words.next();
        if let Some(extra) = words.next() {
            return Err(SimError::Parse(format!(
                "unexpected argument '{extra}' for '{name}'"
            )));
        }

        match (name, argument) {
            ("get_state", None) => Ok(Command::GetState),
            ("get_metrics", None) => Ok(Command::GetMetrics),
            ("reset", None) => Ok(Command::Reset),
            ("get_history", None) => Ok(Command::GetHistory(None)),
            ("get_history", Some(count)) => count
                .parse::<usize>()
                .map(|n| Command::GetHistory(Some(n)))
                .map_err(|_| SimError::Parse(format!("invalid history length '{count}'"))),
            ("set_speed", Some(value)) => parse_speed(value).map(Command::SetSpeed),
            ("set_speed", None) => Err(SimError::Parse("set_speed needs a value".to_string())),
            ("get_state" | "get_metrics" | "reset", Some(arg)) => Err(SimError::Parse(format!(
                "'{name}' takes no argument, got '{arg}'"
            ))),
            (other, _) => Err(SimError::Parse(format!("unknown command '{other}'"))),
        }
    }
}

/// Slowest accepted pacing multiplier (one tick every ~11.6 days)
pub const MIN_SPEED: f64 = 1e-6;

/// Parse a pacing multiplier; it must be finite and at least `MIN_SPEED`
pub fn parse_speed(value: &str) -> Result<f64, SimError> {
    let speed: f64 = value
        .parse()
        .map_err(|_| SimError::Parse(format!("invalid speed '{value}'")))?;
    if !speed.is_finite() || speed < MIN_SPEED {
        return Err(SimError::Parse(format!(
            "speed must be a finite number of at least {MIN_SPEED}, got '{value}'"
        )));
    }
    Ok(speed)
}

/// Signal part of the `get_state` reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalState {
    pub current: String,
    pub favored: Vec<Direction>,
    pub elapsed: f64,
    pub duration: f64,
    pub time_remaining: f64,
    pub cycles_completed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateReply {
    pub time: f64,
    pub vehicles: Vec<SimVehicle>,
    pub signal: SignalState,
    pub queues: QueueLengths,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReply {
    #[serde(flatten)]
    pub summary: MetricsSummary,
    pub snapshot: IntersectionSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryReply {
    pub history: Vec<IntersectionSnapshot>,
    pub peak_in_system: usize,
    pub mean_throughput: f64,
}

/// Response to one command line, written as a single JSON object
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    State(StateReply),
    Metrics(Box<MetricsReply>),
    History(HistoryReply),
    Ack {
        status: &'static str,
        command: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        speed: Option<f64>,
    },
    Error {
        status: &'static str,
        kind: &'static str,
        message: String,
    },
}

impl Reply {
    fn ack(command: &'static str) -> Self {
        Reply::Ack {
            status: "ok",
            command,
            speed: None,
        }
    }

    pub fn error(err: &SimError) -> Self {
        Reply::Error {
            status: "error",
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// The pacing multiplier the driving loop should switch to, if any
    pub fn new_speed(&self) -> Option<f64> {
        match self {
            Reply::Ack { speed, .. } => *speed,
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }
}

/// State guarded by the interface's single lock
struct Shared {
    intersection: SimIntersection,
    history: MetricsHistory,
}

/// The command/query facade over one intersection
///
/// Cloning is cheap and every clone serializes through the same lock, so a
/// command thread and a stepping thread can share it.
#[derive(Clone)]
pub struct CommandInterface {
    shared: Arc<Mutex<Shared>>,
}

impl CommandInterface {
    pub fn new(intersection: SimIntersection) -> Self {
        Self::with_history(intersection, MetricsHistory::default())
    }

    pub fn with_history(intersection: SimIntersection, history: MetricsHistory) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                intersection,
                history,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parse and execute one line; failures become error replies
    pub fn handle_line(&self, line: &str) -> Option<Reply> {
        let result = line.parse::<Command>().and_then(|cmd| self.execute(cmd));
        match result {
            Ok(reply) => reply,
            Err(err) => {
                warn!("Command '{}' failed: {err}", line.trim());
                Some(Reply::error(&err))
            }
        }
    }

    /// Execute a parsed command; `Step` produces no reply
    pub fn execute(&self, command: Command) -> Result<Option<Reply>, SimError> {
        match command {
            Command::GetState => Ok(Some(Reply::State(self.state()))),
            Command::GetMetrics => {
                let snapshot = self.snapshot();
                Ok(Some(Reply::Metrics(Box::new(MetricsReply {
                    summary: MetricsSummary::from(&snapshot),
                    snapshot,
                }))))
            }
            Command::GetHistory(count) => Ok(Some(Reply::History(self.history(count)))),
            Command::SetSpeed(speed) => {
                info!("Simulation speed set to {speed}");
                Ok(Some(Reply::Ack {
                    status: "ok",
                    command: "set_speed",
                    speed: Some(speed),
                }))
            }
            Command::Reset => {
                self.reset();
                Ok(Some(Reply::ack("reset")))
            }
            Command::Step => {
                self.step()?;
                Ok(None)
            }
        }
    }

    /// Advance one tick and record the resulting snapshot
    pub fn step(&self) -> Result<TickReport, SimError> {
        let mut shared = self.lock();
        let report = shared.intersection.tick()?;
        let snapshot = shared.intersection.snapshot();
        shared.history.record(snapshot);
        Ok(report)
    }

    pub fn reset(&self) {
        let mut shared = self.lock();
        shared.intersection.reset();
        shared.history.clear();
    }

    pub fn snapshot(&self) -> IntersectionSnapshot {
        self.lock().intersection.snapshot()
    }

    pub fn queue_lengths(&self) -> QueueLengths {
        self.lock().intersection.queue_lengths()
    }

    pub fn state(&self) -> StateReply {
        let shared = self.lock();
        let intersection = &shared.intersection;
        let signal = intersection.signal();
        StateReply {
            time: intersection.time(),
            vehicles: intersection.vehicles().cloned().collect(),
            signal: SignalState {
                current: signal.current_phase().name.clone(),
                favored: signal.current_phase().favored.clone(),
                elapsed: signal.elapsed(),
                duration: signal.phase_duration(),
                time_remaining: signal.time_remaining(),
                cycles_completed: signal.cycles_completed(),
            },
            queues: intersection.queue_lengths(),
        }
    }

    pub fn history(&self, count: Option<usize>) -> HistoryReply {
        let shared = self.lock();
        let history = &shared.history;
        HistoryReply {
            history: history
                .recent(count.unwrap_or(history.len()))
                .into_iter()
                .cloned()
                .collect(),
            peak_in_system: history.peak_in_system(),
            mean_throughput: history.mean_throughput(),
        }
    }

    /// Run `f` against the intersection while holding the lock
    pub fn with_intersection<R>(&self, f: impl FnOnce(&mut SimIntersection) -> R) -> R {
        f(&mut self.lock().intersection)
    }
}
