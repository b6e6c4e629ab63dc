//! Error types for the simulation core.
//!
//! Every failure is a local precondition violation. A step that returns an
//! error has not touched any particle state.

use std::fmt;

/// Errors raised by particle creation, tree construction and stepping.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Mass was zero, negative or not finite.
    InvalidMass { index: Option<usize>, mass: f64 },
    /// A position or velocity component was NaN or infinite.
    InvalidPosition { index: Option<usize> },
    /// A node side length was not a positive finite number.
    InvalidSideLength(f64),
    /// A simulation parameter was outside its valid range.
    InvalidParameter { name: &'static str, value: f64 },
    /// Force evaluation produced NaN or infinity for a particle.
    NonFiniteForce { index: usize },
    /// An operation needed a tree but there were no particles to build one from.
    EmptyTree,
    /// A scenario description could not be turned into particles.
    InvalidScenario(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::InvalidMass { index: Some(i), mass } => {
                write!(f, "Particle {} has invalid mass {} (must be positive and finite)", i, mass)
            }
            SimError::InvalidMass { index: None, mass } => {
                write!(f, "Invalid mass {} (must be positive and finite)", mass)
            }
            SimError::InvalidPosition { index: Some(i) } => {
                write!(f, "Particle {} has a non-finite position or velocity", i)
            }
            SimError::InvalidPosition { index: None } => {
                write!(f, "Non-finite position or velocity")
            }
            SimError::InvalidSideLength(side) => {
                write!(f, "Invalid node side length {} (must be positive and finite)", side)
            }
            SimError::InvalidParameter { name, value } => {
                write!(f, "Invalid value {} for parameter `{}`", value, name)
            }
            SimError::NonFiniteForce { index } => {
                write!(f, "Force on particle {} is not finite", index)
            }
            SimError::EmptyTree => write!(f, "No tree available: the particle set is empty"),
            SimError::InvalidScenario(msg) => write!(f, "Invalid scenario: {}", msg),
        }
    }
}

impl std::error::Error for SimError {}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;
