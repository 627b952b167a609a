//! Intersection Simulation Library
//!
//! A discrete-time model of one signalized intersection, with a line-oriented
//! command interface that an external loop can drive.

pub mod interface;
pub mod simulation;
