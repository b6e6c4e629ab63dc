//! Numerical and physical parameters for the simulation
//!
//! `Parameters` is passed explicitly into every step:
//! - gravitational constant and softening length (`g`, `eps`),
//! - opening-angle threshold `theta`,
//! - time step `dt` and whether to refresh the informational velocity,
//! - the tree depth safeguard and the softening law,
//! - whether force evaluation runs on the rayon pool.

use crate::error::{Result, SimError};

/// Default cap on octree depth. Halving a side 48 times is well past the
/// resolution of any realistic particle distribution.
pub const DEFAULT_MAX_DEPTH: usize = 48;

/// Hard ceiling on `max_depth`. Tree building and traversal recurse once per
/// level, so deeper settings would let coincident particles exhaust the stack.
pub const MAX_TREE_DEPTH: usize = 64;

/// How the softened denominator `(|r|^2 + eps^2)^k` is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SofteningLaw {
    /// k = 3/2, the physically correct inverse-square law.
    #[default]
    Newtonian,
    /// k = 1, reproduces references that truncated the literal `3/2` with
    /// integer division. Only for output parity with such runs.
    LegacyTruncated,
}

impl SofteningLaw {
    pub fn exponent(self) -> f64 {
        match self {
            SofteningLaw::Newtonian => 1.5,
            SofteningLaw::LegacyTruncated => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub g: f64, // gravitational constant
    pub eps: f64, // softening length
    pub theta: f64, // opening-angle threshold
    pub dt: f64, // time step
    pub update_velocity: bool, // recompute informational velocity after each step
    pub max_depth: usize, // octree depth safeguard
    pub softening: SofteningLaw,
    pub parallel: bool, // evaluate forces on the rayon pool
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            g: 20.0,
            eps: 0.1,
            theta: 0.9,
            dt: 0.1,
            update_velocity: false,
            max_depth: DEFAULT_MAX_DEPTH,
            softening: SofteningLaw::Newtonian,
            parallel: false,
        }
    }
}

impl Parameters {
    /// Reject parameter values the step cannot work with.
    ///
    /// `theta <= 0` is accepted: it opens every node and degenerates to
    /// direct summation.
    pub fn validate(&self) -> Result<()> {
        if !self.g.is_finite() {
            return Err(SimError::InvalidParameter { name: "G", value: self.g });
        }
        if !(self.eps.is_finite() && self.eps >= 0.0) {
            return Err(SimError::InvalidParameter { name: "eps", value: self.eps });
        }
        if self.theta.is_nan() || self.theta == f64::INFINITY {
            return Err(SimError::InvalidParameter { name: "theta", value: self.theta });
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(SimError::InvalidParameter { name: "dt", value: self.dt });
        }
        if self.max_depth == 0 || self.max_depth > MAX_TREE_DEPTH {
            return Err(SimError::InvalidParameter { name: "max_depth", value: self.max_depth as f64 });
        }
        Ok(())
    }

    pub fn eps2(&self) -> f64 {
        self.eps * self.eps
    }
}
