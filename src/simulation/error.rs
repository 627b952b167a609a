use std::fmt;

use super::types::Direction;

/// Errors raised by the simulation core and the command interface
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Malformed command or malformed numeric argument
    Parse(String),
    /// A vehicle would depart before it arrived
    InvalidTime { arrival_time: f64, current_time: f64 },
    /// The model clock was asked to move backwards
    ClockRegression { clock: f64, requested: f64 },
    /// Configuration rejected at construction time
    Configuration(String),
    /// A vehicle was routed to the queue of another approach
    WrongDirection { expected: Direction, found: Direction },
}

impl SimError {
    /// Stable identifier used in structured error replies
    pub fn kind(&self) -> &'static str {
        match self {
            SimError::Parse(_) => "parse_error",
            SimError::InvalidTime { .. } | SimError::ClockRegression { .. } => "invalid_time",
            // Misrouting a vehicle is a wiring bug, reported like bad configuration
            SimError::Configuration(_) | SimError::WrongDirection { .. } => "configuration_error",
        }
    }
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Parse(msg) => write!(f, "Parse error: {msg}"),
            SimError::InvalidTime {
                arrival_time,
                current_time,
            } => write!(
                f,
                "Invalid time: vehicle arrived at {arrival_time} but current time is {current_time}"
            ),
            SimError::ClockRegression { clock, requested } => write!(
                f,
                "Invalid time: clock is at {clock} and cannot move back to {requested}"
            ),
            SimError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            SimError::WrongDirection { expected, found } => {
                write!(f, "Vehicle from {found} cannot join the {expected} queue")
            }
        }
    }
}

impl std::error::Error for SimError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_invalid_time() {
        let err = SimError::InvalidTime {
            arrival_time: 5.0,
            current_time: 3.0,
        };
        let msg = format!("{err}");
        assert!(msg.contains("arrived at 5"), "got: {msg}");
        assert!(msg.contains("current time is 3"), "got: {msg}");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(SimError::Parse("x".into()).kind(), "parse_error");
        assert_eq!(SimError::Configuration("x".into()).kind(), "configuration_error");
        let err = SimError::InvalidTime {
            arrival_time: 1.0,
            current_time: 0.0,
        };
        assert_eq!(err.kind(), "invalid_time");
    }

    #[test]
    fn test_clock_regression_does_not_mention_a_vehicle() {
        let err = SimError::ClockRegression {
            clock: 11.0,
            requested: 4.0,
        };
        let msg = format!("{err}");
        assert_eq!(err.kind(), "invalid_time");
        assert!(msg.contains("clock is at 11"), "got: {msg}");
        assert!(!msg.contains("vehicle"), "got: {msg}");
    }

    #[test]
    fn test_wrong_direction_uses_a_reply_kind() {
        let err = SimError::WrongDirection {
            expected: Direction::North,
            found: Direction::West,
        };
        assert_eq!(err.kind(), "configuration_error");
    }
}
