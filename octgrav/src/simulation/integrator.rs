//! Störmer–Verlet position integrator
//!
//! `x_{n+1} = 2 x_n - x_{n-1} + (F / m) dt^2`
//!
//! The scheme carries no velocity. When requested, an approximate velocity
//! `(x_{n+1} - x_n) / dt` is stored on the particle for inspection only.

use super::params::Parameters;
use super::states::{Particle, ParticleStore};

/// Advance one particle by one step using its accumulated external force.
///
/// The force accumulator must already hold the full force for this step.
/// It is left untouched; the caller resets it before the next step.
pub fn stormer_verlet_step(p: &mut Particle, dt: f64, update_velocity: bool) {
    let accel = p.ext_force() / p.mass();
    let next = 2.0 * p.pos() - p.prev_pos() + accel * (dt * dt);

    p.commit_position(next);

    if update_velocity {
        p.set_vel((p.pos() - p.prev_pos()) / dt);
    }
}

/// Advance every particle in the store by one step.
pub fn stormer_verlet(store: &mut ParticleStore, params: &Parameters) {
    for p in store.as_mut_slice() {
        stormer_verlet_step(p, params.dt, params.update_velocity);
    }
}
