//! Gravitational force contributors for the n-body engine
//!
//! - `softened_force`: the softened Newtonian pair force.
//! - `evaluate`: Barnes–Hut traversal of an [`Octree`] for one particle.
//! - `ForceTerm` / `ForceSet`: pluggable force models (direct O(n^2) sum and
//!   Barnes–Hut) that fill a per-particle force buffer.

use std::ops::{Add, AddAssign};

use rayon::prelude::*;

use crate::error::Result;
use crate::simulation::octree::Octree;
use crate::simulation::params::{Parameters, SofteningLaw};
use crate::simulation::states::{NVec3, Particle};

/// Number of force evaluations performed, split by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionCounts {
    /// Particle-particle evaluations (leaf particles or direct summation).
    pub direct: u64,
    /// Whole subtrees approximated as a single point mass.
    pub approximated: u64,
}

impl InteractionCounts {
    pub fn total(&self) -> u64 {
        self.direct + self.approximated
    }
}

impl Add for InteractionCounts {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            direct: self.direct + rhs.direct,
            approximated: self.approximated + rhs.approximated,
        }
    }
}

impl AddAssign for InteractionCounts {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Softened gravitational force on a body of mass `m1` from a body of mass
/// `m2`, where `r = pos(body) - pos(other)`:
///
/// `F = -G m1 m2 r / (|r|^2 + eps^2)^k`, with `k` from the softening law.
///
/// Exactly coincident bodies with zero softening give a zero force.
pub fn softened_force(r: NVec3, m1: f64, m2: f64, g: f64, eps2: f64, law: SofteningLaw) -> NVec3 {
    let d2 = r.norm_squared() + eps2;
    if d2 == 0.0 {
        return NVec3::zeros();
    }

    let denom = match law {
        SofteningLaw::Newtonian => d2 * d2.sqrt(),
        SofteningLaw::LegacyTruncated => d2,
    };

    r * (-g * m1 * m2 / denom)
}

/// Sum the force on particle `i` by walking `tree` depth-first.
///
/// For each node:
/// - **Leaf**: direct interaction with every particle it owns, skipping `i`
///   itself by index. Empty leaves contribute nothing.
/// - **Internal**: with `d` the distance from particle `i` to the node's
///   center of mass, the node is treated as one point mass when
///   `side / d < theta`; otherwise all 8 children are visited. A node whose
///   center of mass coincides with the particle is always opened.
///
/// `counts` records how many evaluations of each kind were made.
pub fn evaluate(
    tree: &Octree,
    i: usize,
    particles: &[Particle],
    params: &Parameters,
    counts: &mut InteractionCounts,
) -> NVec3 {
    let mut force = NVec3::zeros();
    traverse(tree, tree.root_index(), i, particles, params, &mut force, counts);
    force
}

fn traverse(
    tree: &Octree,
    node_idx: usize,
    i: usize,
    particles: &[Particle],
    params: &Parameters,
    force: &mut NVec3,
    counts: &mut InteractionCounts,
) {
    let node = tree.node(node_idx);
    let p = &particles[i];
    let eps2 = params.eps2();

    let Some(children) = node.children() else {
        // Leaf: usually one particle, several only when depth-capped
        for &j in node.particles() {
            if j == i {
                continue;
            }
            let other = &particles[j];
            *force += softened_force(p.pos() - other.pos(), p.mass(), other.mass(), params.g, eps2, params.softening);
            counts.direct += 1;
        }
        return;
    };

    let Some(moment) = node.moment() else {
        return;
    };

    let r = p.pos() - moment.com;
    let d = r.norm();

    if d > 0.0 && node.side() / d < params.theta {
        *force += softened_force(r, p.mass(), moment.mass, params.g, eps2, params.softening);
        counts.approximated += 1;
    } else {
        for &child in children {
            traverse(tree, child, i, particles, params, force, counts);
        }
    }
}

/// A source of external force on every particle.
///
/// Implementations add their contribution for particle `i` into `out[i]` and
/// must not modify the particles.
pub trait ForceTerm {
    fn accumulate(&self, particles: &[Particle], params: &Parameters, out: &mut [NVec3]) -> Result<InteractionCounts>;
}

/// Collection of force terms whose contributions are summed per particle.
pub struct ForceSet {
    terms: Vec<Box<dyn ForceTerm + Send + Sync>>,
}

impl Default for ForceSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ForceSet {
    /// Create an empty force set
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    /// Force set with only Barnes–Hut gravity.
    pub fn barnes_hut() -> Self {
        Self::new().with(BarnesHutGravity)
    }

    /// Force set with only direct-summation gravity.
    pub fn direct() -> Self {
        Self::new().with(DirectGravity)
    }

    /// Add a force term
    pub fn with(mut self, term: impl ForceTerm + Send + Sync + 'static) -> Self {
        self.terms.push(Box::new(term));
        self
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Zero `out` and fill it with the summed force of every term.
    pub fn accumulate_forces(&self, particles: &[Particle], params: &Parameters, out: &mut [NVec3]) -> Result<InteractionCounts> {
        debug_assert_eq!(particles.len(), out.len());
        for f in out.iter_mut() {
            *f = NVec3::zeros();
        }

        let mut counts = InteractionCounts::default();
        for term in &self.terms {
            counts += term.accumulate(particles, params, out)?;
        }
        Ok(counts)
    }
}

/// Exact pairwise gravity, O(n^2).
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectGravity;

impl ForceTerm for DirectGravity {
    fn accumulate(&self, particles: &[Particle], params: &Parameters, out: &mut [NVec3]) -> Result<InteractionCounts> {
        let n = particles.len();
        let eps2 = params.eps2();
        let mut counts = InteractionCounts::default();

        // Each unordered pair once, applied equal and opposite
        for i in 0..n {
            let pi = &particles[i];
            for j in (i + 1)..n {
                let pj = &particles[j];
                let f = softened_force(pi.pos() - pj.pos(), pi.mass(), pj.mass(), params.g, eps2, params.softening);
                out[i] += f;
                out[j] -= f;
                counts.direct += 2;
            }
        }

        Ok(counts)
    }
}

/// Gravity approximated through a Barnes–Hut octree.
///
/// Builds the tree over the current positions, evaluates every particle
/// against it, then releases it. With `params.parallel` the per-particle
/// evaluations run on the rayon pool; each task writes only its own slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct BarnesHutGravity;

impl ForceTerm for BarnesHutGravity {
    fn accumulate(&self, particles: &[Particle], params: &Parameters, out: &mut [NVec3]) -> Result<InteractionCounts> {
        if particles.is_empty() {
            return Ok(InteractionCounts::default());
        }

        let tree = Octree::build(particles, params.max_depth)?;

        let counts = if params.parallel {
            out.par_iter_mut()
                .enumerate()
                .map(|(i, f)| {
                    let mut c = InteractionCounts::default();
                    *f += evaluate(&tree, i, particles, params, &mut c);
                    c
                })
                .reduce(InteractionCounts::default, |a, b| a + b)
        } else {
            let mut c = InteractionCounts::default();
            for (i, f) in out.iter_mut().enumerate() {
                *f += evaluate(&tree, i, particles, params, &mut c);
            }
            c
        };

        tree.release();
        Ok(counts)
    }
}
