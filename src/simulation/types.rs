//! Core types for the intersection simulation
//!
//! These are standalone types with no dependency on the driving loop.

use serde::Serialize;
use std::fmt;

/// One of the four approaches into the intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Direction {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "W")]
    West,
}

impl Direction {
    /// All approaches in their canonical order
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Position of this direction inside `Direction::ALL`
    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::South => 1,
            Direction::East => 2,
            Direction::West => 3,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::South => "S",
            Direction::East => "E",
            Direction::West => "W",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A unique identifier for vehicles
/// Allocated from a counter scoped to one intersection's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VehicleId(pub u64);

/// A vehicle waiting at (or crossing) the intersection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimVehicle {
    pub id: VehicleId,
    pub direction: Direction,
    /// Simulation time (seconds) at which the vehicle joined its queue
    pub arrival_time: f64,
    /// Emergency vehicles may cross regardless of the current phase
    pub is_emergency: bool,
    /// Progress through the intersection, only used by the crossing model
    pub position: f64,
}

impl SimVehicle {
    pub fn new(id: VehicleId, direction: Direction, arrival_time: f64, is_emergency: bool) -> Self {
        Self {
            id,
            direction,
            arrival_time,
            is_emergency,
            position: 0.0,
        }
    }
}

/// Per-direction values stored in `Direction::ALL` order
///
/// Serializes as a map keyed by direction code (`{"N": .., "S": .., ...}`).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerDirection<T>(pub [T; 4]);

impl<T> PerDirection<T> {
    pub fn get(&self, direction: Direction) -> &T {
        &self.0[direction.index()]
    }

    pub fn get_mut(&mut self, direction: Direction) -> &mut T {
        &mut self.0[direction.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> {
        Direction::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T: Serialize> Serialize for PerDirection<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(4))?;
        for (direction, value) in self.iter() {
            map.serialize_entry(direction.code(), value)?;
        }
        map.end()
    }
}

/// Queue length per approach
pub type QueueLengths = PerDirection<usize>;
