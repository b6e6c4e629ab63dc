//! Core state types for the N-body simulation.
//!
//! - `Particle` holds mass, current and previous position, an informational
//!   velocity and the per-step external force accumulator.
//! - `ParticleStore` owns every particle for the lifetime of the simulation.
//!   Tree nodes refer to particles by their index in the store.

use nalgebra::Vector3;

use crate::error::{Result, SimError};

pub type NVec3 = Vector3<f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    mass: f64, // fixed at creation
    pos: NVec3, // current position
    prev_pos: NVec3, // position one step ago, used by the integrator
    vel: NVec3, // only meaningful right after an integrator step that updates it
    ext_force: NVec3, // summed each step, reset afterwards
}

impl Particle {
    /// Create a particle at rest at `pos`.
    pub fn new(mass: f64, pos: NVec3) -> Result<Self> {
        Self::from_initial_state(mass, pos, NVec3::zeros(), 1.0)
    }

    /// Create a particle that starts at `start` moving with `vel`.
    ///
    /// The previous position is `start` and the current position is one step
    /// of size `dt` along `vel`, which seeds the Störmer–Verlet recurrence.
    pub fn from_initial_state(mass: f64, start: NVec3, vel: NVec3, dt: f64) -> Result<Self> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(SimError::InvalidMass { index: None, mass });
        }
        if !is_finite_vec(&start) || !is_finite_vec(&vel) || !dt.is_finite() {
            return Err(SimError::InvalidPosition { index: None });
        }

        Ok(Self {
            mass,
            pos: start + vel * dt,
            prev_pos: start,
            vel,
            ext_force: NVec3::zeros(),
        })
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn pos(&self) -> NVec3 {
        self.pos
    }

    pub fn prev_pos(&self) -> NVec3 {
        self.prev_pos
    }

    pub fn vel(&self) -> NVec3 {
        self.vel
    }

    pub fn ext_force(&self) -> NVec3 {
        self.ext_force
    }

    pub fn add_ext_force(&mut self, force: NVec3) {
        self.ext_force += force;
    }

    pub fn set_ext_force(&mut self, force: NVec3) {
        self.ext_force = force;
    }

    pub fn reset_ext_force(&mut self) {
        self.ext_force = NVec3::zeros();
    }

    /// Commit an integrator-advanced position.
    pub(crate) fn commit_position(&mut self, next: NVec3) {
        self.prev_pos = self.pos;
        self.pos = next;
    }

    pub(crate) fn set_vel(&mut self, vel: NVec3) {
        self.vel = vel;
    }

    /// True when position and previous position are finite.
    pub fn is_finite(&self) -> bool {
        is_finite_vec(&self.pos) && is_finite_vec(&self.prev_pos)
    }
}

/// Owner of every particle in the simulation.
#[derive(Debug, Clone, Default)]
pub struct ParticleStore {
    particles: Vec<Particle>,
}

impl ParticleStore {
    pub fn new() -> Self {
        Self { particles: Vec::new() }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self { particles: Vec::with_capacity(n) }
    }

    /// Returns the index the particle is stored under.
    pub fn push(&mut self, particle: Particle) -> usize {
        self.particles.push(particle);
        self.particles.len() - 1
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }

    pub fn as_mut_slice(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }

    pub fn reset_forces(&mut self) {
        for p in self.particles.iter_mut() {
            p.reset_ext_force();
        }
    }

    pub fn total_mass(&self) -> f64 {
        self.particles.iter().map(|p| p.mass).sum()
    }

    /// Mass-weighted mean position, `None` for an empty store.
    pub fn center_of_mass(&self) -> Option<NVec3> {
        if self.particles.is_empty() {
            return None;
        }
        let weighted = self
            .particles
            .iter()
            .fold(NVec3::zeros(), |acc, p| acc + p.pos * p.mass);
        Some(weighted / self.total_mass())
    }

    /// Check every particle before a step touches any of them.
    pub fn validate(&self) -> Result<()> {
        for (i, p) in self.particles.iter().enumerate() {
            if !(p.mass.is_finite() && p.mass > 0.0) {
                return Err(SimError::InvalidMass { index: Some(i), mass: p.mass });
            }
            if !p.is_finite() {
                return Err(SimError::InvalidPosition { index: Some(i) });
            }
        }
        Ok(())
    }
}

impl FromIterator<Particle> for ParticleStore {
    fn from_iter<I: IntoIterator<Item = Particle>>(iter: I) -> Self {
        Self { particles: iter.into_iter().collect() }
    }
}

impl From<Vec<Particle>> for ParticleStore {
    fn from(particles: Vec<Particle>) -> Self {
        Self { particles }
    }
}

fn is_finite_vec(v: &NVec3) -> bool {
    v.iter().all(|c| c.is_finite())
}
