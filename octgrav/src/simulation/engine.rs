//! Per-step driver
//!
//! One step runs strictly in order:
//! `BuildTree -> AggregateMass -> EvaluateForces -> Integrate -> ResetForces -> ReleaseTree`.
//!
//! Inputs are validated and all forces are computed into a scratch buffer
//! before any particle is touched, so a failing step leaves the store as it
//! was.

use log::debug;

use crate::error::{Result, SimError};
use crate::simulation::forces::{ForceSet, InteractionCounts};
use crate::simulation::integrator::stormer_verlet;
use crate::simulation::params::Parameters;
use crate::simulation::states::{NVec3, ParticleStore};

/// Which force model a scenario runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct Engine {
    pub barnes_hut: bool, // false = direct summation, true = octree
}

impl Default for Engine {
    fn default() -> Self {
        Self { barnes_hut: true }
    }
}

impl Engine {
    pub fn force_set(&self) -> ForceSet {
        if self.barnes_hut {
            ForceSet::barnes_hut()
        } else {
            ForceSet::direct()
        }
    }
}

/// What one step did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub particles: usize,
    pub interactions: InteractionCounts,
}

/// Advance every particle by one step using Barnes–Hut gravity.
///
/// Positions are updated in place and force accumulators are zero on return.
/// An empty store is a no-op.
pub fn advance(store: &mut ParticleStore, params: &Parameters) -> Result<StepReport> {
    advance_with(store, params, &ForceSet::barnes_hut())
}

/// Advance every particle by one step using the given force model.
pub fn advance_with(store: &mut ParticleStore, params: &Parameters, forces: &ForceSet) -> Result<StepReport> {
    params.validate()?;
    store.validate()?;

    let n = store.len();
    if n == 0 {
        return Ok(StepReport::default());
    }

    // Tree build, aggregation, evaluation and release happen inside the
    // force terms; every particle is evaluated before any is integrated.
    let mut buffer = vec![NVec3::zeros(); n];
    let interactions = forces.accumulate_forces(store.as_slice(), params, &mut buffer)?;

    if let Some(i) = buffer.iter().position(|f| !f.iter().all(|c| c.is_finite())) {
        return Err(SimError::NonFiniteForce { index: i });
    }

    for (p, f) in store.as_mut_slice().iter_mut().zip(buffer.iter()) {
        p.add_ext_force(*f);
    }

    stormer_verlet(store, params);
    store.reset_forces();

    debug!(
        "step: {} particles, {} direct and {} approximated interactions",
        n, interactions.direct, interactions.approximated
    );

    Ok(StepReport {
        particles: n,
        interactions,
    })
}
