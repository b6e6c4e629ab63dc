//! Build fully-initialized simulation scenarios from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a runtime bundle
//! containing:
//! - engine settings (`Engine`)
//! - numerical parameters (`Parameters`)
//! - particle state (`ParticleStore`)
//! - active force set (`ForceSet`)
//!
//! The bundle then steps itself forward with [`Scenario::step`] and
//! [`Scenario::run`].

use log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::configuration::config::{BodyConfig, RandomConfig, ScenarioConfig};
use crate::error::{Result, SimError};
use crate::simulation::engine::{advance_with, Engine, StepReport};
use crate::simulation::forces::ForceSet;
use crate::simulation::params::{Parameters, DEFAULT_MAX_DEPTH};
use crate::simulation::states::{NVec3, Particle, ParticleStore};

/// Opening angle used when the scenario does not set one.
pub const DEFAULT_THETA: f64 = 0.9;

pub struct Scenario {
    pub engine: Engine,
    pub parameters: Parameters,
    pub store: ParticleStore,
    pub forces: ForceSet,
    pub steps: usize, // frames requested by the scenario
    pub step_count: usize, // frames completed so far
}

impl Scenario {
    /// Turn a scenario description into runnable state.
    ///
    /// Fails on malformed vectors, non-positive masses or invalid parameters.
    pub fn build_scenario(cfg: ScenarioConfig) -> Result<Self> {
        let e_cfg = cfg.engine;
        let p_cfg = cfg.parameters;

        let parameters = Parameters {
            g: p_cfg.g,
            eps: p_cfg.eps,
            theta: e_cfg.theta.unwrap_or(DEFAULT_THETA),
            dt: p_cfg.dt,
            update_velocity: p_cfg.update_velocity,
            max_depth: e_cfg.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            softening: e_cfg.softening.into(),
            parallel: e_cfg.parallel,
        };
        parameters.validate()?;

        let engine = Engine {
            barnes_hut: e_cfg.barnes_hut,
        };

        let random_count = cfg.random.as_ref().map_or(0, |r| r.count);
        let mut store = ParticleStore::with_capacity(cfg.bodies.len() + random_count);

        // Bodies: map `BodyConfig` -> runtime `Particle`
        for (i, bc) in cfg.bodies.iter().enumerate() {
            store.push(body_from_config(i, bc, parameters.dt)?);
        }

        if let Some(r_cfg) = &cfg.random {
            random_cloud(r_cfg, parameters.dt, &mut store)?;
        }

        info!(
            "scenario: {} particles, {} steps, {}",
            store.len(),
            p_cfg.steps,
            if engine.barnes_hut { "barnes-hut" } else { "direct" }
        );

        Ok(Self {
            forces: engine.force_set(),
            engine,
            parameters,
            store,
            steps: p_cfg.steps,
            step_count: 0,
        })
    }

    /// Advance by one step.
    pub fn step(&mut self) -> Result<StepReport> {
        let report = advance_with(&mut self.store, &self.parameters, &self.forces)?;
        self.step_count += 1;
        Ok(report)
    }

    /// Advance by `steps` steps, stopping at the first failure.
    pub fn run(&mut self, steps: usize) -> Result<Vec<StepReport>> {
        let mut reports = Vec::with_capacity(steps);
        for _ in 0..steps {
            let report = self.step()?;
            debug!("frame {} done", self.step_count);
            reports.push(report);
        }
        Ok(reports)
    }
}

fn body_from_config(index: usize, bc: &BodyConfig, dt: f64) -> Result<Particle> {
    let x = vec3(&bc.x).ok_or_else(|| {
        SimError::InvalidScenario(format!("body {}: position needs 3 components, got {}", index, bc.x.len()))
    })?;
    let v = if bc.v.is_empty() {
        NVec3::zeros()
    } else {
        vec3(&bc.v).ok_or_else(|| {
            SimError::InvalidScenario(format!("body {}: velocity needs 3 components, got {}", index, bc.v.len()))
        })?
    };

    Particle::from_initial_state(bc.m, x, v, dt).map_err(|e| with_index(e, index))
}

/// Attach the store index to a particle construction error.
fn with_index(e: SimError, index: usize) -> SimError {
    match e {
        SimError::InvalidMass { mass, .. } => SimError::InvalidMass { index: Some(index), mass },
        SimError::InvalidPosition { .. } => SimError::InvalidPosition { index: Some(index) },
        other => other,
    }
}

/// Scatter `cfg.count` equal-mass particles uniformly in `[-range, range]^3`.
fn random_cloud(cfg: &RandomConfig, dt: f64, store: &mut ParticleStore) -> Result<()> {
    if !(cfg.range.is_finite() && cfg.range > 0.0) {
        return Err(SimError::InvalidScenario(format!("random range must be positive, got {}", cfg.range)));
    }

    let mut rng = match cfg.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };

    let range = cfg.range;
    let vel_range = range / 10.0;

    for _ in 0..cfg.count {
        let x = NVec3::new(
            rng.gen_range(-range..=range),
            rng.gen_range(-range..=range),
            rng.gen_range(-range..=range),
        );
        let v = if cfg.random_velocity {
            NVec3::new(
                rng.gen_range(-vel_range..=vel_range),
                rng.gen_range(-vel_range..=vel_range),
                rng.gen_range(-vel_range..=vel_range),
            )
        } else {
            NVec3::zeros()
        };
        let index = store.len();
        let particle = Particle::from_initial_state(cfg.mass, x, v, dt).map_err(|e| with_index(e, index))?;
        store.push(particle);
    }

    Ok(())
}

fn vec3(components: &[f64]) -> Option<NVec3> {
    match components {
        [x, y, z] => Some(NVec3::new(*x, *y, *z)),
        _ => None,
    }
}
