//! Configuration types for loading simulation scenarios from YAML.
//!
//! A scenario consists of:
//!
//! - [`EngineConfig`]     – force model and tree options
//! - [`ParametersConfig`] – physical constants, time step and step count
//! - [`BodyConfig`]       – explicit initial state for each body, or
//! - [`RandomConfig`]     – a uniformly random cloud of equal-mass bodies
//! - [`ScenarioConfig`]   – top-level wrapper used to load a scenario from YAML
//!
//! # YAML format
//!
//! ```yaml
//! engine:
//!   barnes_hut: true
//!   theta: 0.9
//!   parallel: true
//!   max_depth: 48
//!   softening: "newtonian"   # or "legacy_truncated"
//!
//! parameters:
//!   G: 20.0
//!   eps: 0.1
//!   dt: 0.1
//!   steps: 2000
//!   update_velocity: false
//!
//! random:
//!   count: 100000
//!   mass: 2.0
//!   range: 9000.0
//!   random_velocity: false
//!   seed: 7
//! ```
//!
//! Instead of `random`, bodies can be listed one by one:
//!
//! ```yaml
//! bodies:
//!   - x: [ -1.0, 0.0, 0.0 ]
//!     v: [  0.0, 0.0, 0.0 ]
//!     m: 1.0
//! ```
//!
//! Both may be given; listed bodies come first.

use serde::Deserialize;

use crate::simulation::params::SofteningLaw;

/// Which softening exponent the force law uses
/// `softening: "newtonian"` or `softening: "legacy_truncated"`
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SofteningConfig {
    #[serde(rename = "newtonian")] // (|r|^2 + eps^2)^(3/2), the default
    #[default]
    Newtonian,

    #[serde(rename = "legacy_truncated")] // (|r|^2 + eps^2)^1, parity with truncated-exponent runs
    LegacyTruncated,
}

impl From<SofteningConfig> for SofteningLaw {
    fn from(cfg: SofteningConfig) -> Self {
        match cfg {
            SofteningConfig::Newtonian => SofteningLaw::Newtonian,
            SofteningConfig::LegacyTruncated => SofteningLaw::LegacyTruncated,
        }
    }
}

/// Force model and tree configuration
#[derive(Deserialize, Debug, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub barnes_hut: bool, // `true` - octree approximation, `false` - direct N^2 summation
    pub theta: Option<f64>, // opening-angle threshold
    #[serde(default)]
    pub parallel: bool, // evaluate forces on all cores
    pub max_depth: Option<usize>, // octree depth safeguard
    #[serde(default)]
    pub softening: SofteningConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            barnes_hut: true,
            theta: None,
            parallel: false,
            max_depth: None,
            softening: SofteningConfig::default(),
        }
    }
}

/// Global numerical and physical parameters for a scenario
#[derive(Deserialize, Debug, Clone)]
pub struct ParametersConfig {
    #[serde(rename = "G", alias = "g")]
    pub g: f64, // gravitational constant
    pub eps: f64, // softening length
    pub dt: f64, // time step size
    pub steps: usize, // number of frames to run
    #[serde(default)]
    pub update_velocity: bool,
}

/// Configuration for a single body's initial state
#[derive(Deserialize, Debug, Clone)]
pub struct BodyConfig {
    pub x: Vec<f64>, // initial position
    #[serde(default)]
    pub v: Vec<f64>, // initial velocity, empty means at rest
    pub m: f64, // mass, must be positive
}

/// A cloud of equal-mass bodies placed uniformly at random in `[-range, range]^3`
#[derive(Deserialize, Debug, Clone)]
pub struct RandomConfig {
    pub count: usize,
    #[serde(default = "default_mass")]
    pub mass: f64,
    #[serde(default = "default_range")]
    pub range: f64,
    #[serde(default)]
    pub random_velocity: bool, // velocities in [-range/10, range/10]^3
    pub seed: Option<u64>, // fixed seed for reproducible runs
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    pub parameters: ParametersConfig,
    #[serde(default)]
    pub bodies: Vec<BodyConfig>,
    pub random: Option<RandomConfig>,
}

fn default_true() -> bool {
    true
}

fn default_mass() -> f64 {
    2.0
}

fn default_range() -> f64 {
    9000.0
}
