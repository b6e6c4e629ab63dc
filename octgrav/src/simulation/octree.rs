//! # Barnes–Hut Octree (3D)
//!
//! Adaptive spatial decomposition rebuilt from scratch every step.
//!
//! - The root is the smallest cube that encloses every particle.
//! - A node holding more than one particle is split into exactly 8 octants,
//!   each with half the parent's side and a center offset by `±side/4` along
//!   every axis.
//! - Each node owns a fixed list of particle indices, assigned once when the
//!   node is created and never changed afterwards.
//! - Total mass and center of mass are computed once per node right after its
//!   particles are assigned. They are never updated incrementally.
//!
//! Nodes live in an arena (`Vec<Node>`) and refer to their children by index.
//! Particles are referred to by their index in the [`ParticleStore`] slice, so
//! the tree never borrows or owns particle data past construction.
//!
//! ## Octant convention
//!
//! Child index bits: bit 0 = x, bit 1 = y, bit 2 = z. A set bit means the
//! upper half along that axis. Partitioning is half-open: a coordinate equal
//! to the parent's center goes to the upper half. Every particle therefore
//! lands in exactly one child, even when it sits on a partition plane.
//!
//! ## Depth safeguard
//!
//! Particles with identical positions can never be separated. Subdivision
//! stops at `max_depth` (at most [`MAX_TREE_DEPTH`]), or earlier once the
//! child centers would round back onto the parent's center. Such a node keeps
//! all of its particles as a single leaf group, and force evaluation falls
//! back to direct summation inside the group.
//!
//! [`ParticleStore`]: crate::simulation::states::ParticleStore

use log::{trace, warn};

use crate::error::{Result, SimError};
use crate::simulation::params::MAX_TREE_DEPTH;
use crate::simulation::states::{NVec3, Particle};

/// Total mass and center of mass of the particles owned by a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassMoment {
    pub mass: f64,
    pub com: NVec3,
}

/// A single cubic region of the octree.
#[derive(Debug, Clone)]
pub struct Node {
    center: NVec3,
    side: f64,
    depth: usize,
    moment: Option<MassMoment>, // None until aggregated, and forever for empty nodes
    children: Option<[usize; 8]>, // indices into Octree::nodes, Some once subdivided
    particles: Box<[usize]>, // indices into the particle slice
}

impl Node {
    /// Create an empty leaf covering the cube at `center` with edge `side`.
    pub fn new(center: NVec3, side: f64) -> Result<Self> {
        if !(side.is_finite() && side > 0.0) {
            return Err(SimError::InvalidSideLength(side));
        }
        if !center.iter().all(|c| c.is_finite()) {
            return Err(SimError::InvalidPosition { index: None });
        }
        Ok(Self {
            center,
            side,
            depth: 0,
            moment: None,
            children: None,
            particles: Box::default(),
        })
    }

    /// Attach the node's particles. The list is frozen into a boxed slice,
    /// so its capacity is exactly the caller's count.
    pub fn assign(&mut self, particles: Vec<usize>) {
        self.particles = particles.into_boxed_slice();
        self.moment = None;
    }

    /// Compute total mass and mass-weighted center of mass from the owned
    /// particles.
    ///
    /// A node without particles has no mass attributes and is left
    /// unaggregated; it must never be used as a mass contributor.
    pub fn aggregate(&mut self, particles: &[Particle]) {
        if self.particles.is_empty() {
            self.moment = None;
            return;
        }

        let mut mass = 0.0;
        let mut weighted = NVec3::zeros();
        for &i in self.particles.iter() {
            let p = &particles[i];
            mass += p.mass();
            weighted += p.pos() * p.mass();
        }

        self.moment = Some(MassMoment {
            mass,
            com: weighted / mass,
        });
    }

    pub fn center(&self) -> NVec3 {
        self.center
    }

    pub fn side(&self) -> f64 {
        self.side
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn moment(&self) -> Option<MassMoment> {
        self.moment
    }

    /// Total mass, `None` if the node holds no particles.
    pub fn total_mass(&self) -> Option<f64> {
        self.moment.map(|m| m.mass)
    }

    /// Center of mass, `None` if the node holds no particles.
    pub fn com(&self) -> Option<NVec3> {
        self.moment.map(|m| m.com)
    }

    pub fn has_children(&self) -> bool {
        self.children.is_some()
    }

    pub fn children(&self) -> Option<&[usize; 8]> {
        self.children.as_ref()
    }

    pub fn particles(&self) -> &[usize] {
        &self.particles
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    /// Inclusive axis-aligned bounding test.
    ///
    /// Child bounds are derived from rounded centers, so the faces are
    /// widened by a few ulps of the side.
    pub fn contains(&self, point: &NVec3) -> bool {
        let half = self.side * 0.5;
        let tol = self.side * 1e-12;
        (0..3).all(|k| {
            let lo = self.center[k] - half - tol;
            let hi = self.center[k] + half + tol;
            lo <= point[k] && point[k] <= hi
        })
    }

    /// Octant a point falls into under the half-open convention.
    pub fn octant_of(&self, point: &NVec3) -> usize {
        let mut idx = 0;

        if point.x >= self.center.x { idx |= 1; } // bit 0
        if point.y >= self.center.y { idx |= 2; } // bit 1
        if point.z >= self.center.z { idx |= 4; } // bit 2

        idx
    }

    /// True while the `±side/4` child offsets still move the center on
    /// every axis in floating point.
    pub fn can_split(&self) -> bool {
        let q = self.side * 0.25;
        q > 0.0 && self.center.iter().all(|&c| c + q != c && c - q != c)
    }

    /// Center of child octant `octant`: offset by `±side/4` on each axis.
    pub fn child_center(&self, octant: usize) -> NVec3 {
        let q = self.side * 0.25;
        let offset = |bit: usize| if octant & bit != 0 { q } else { -q };
        self.center + NVec3::new(offset(1), offset(2), offset(4))
    }
}

/// Shape summary of a built tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub nodes: usize,
    pub leaves: usize,
    pub empty_leaves: usize,
    /// Leaves left holding more than one particle by the depth safeguard.
    pub capped_leaves: usize,
    pub max_depth: usize,
}

/// A complete octree built over one step's particle positions.
///
/// The tree exclusively owns all of its nodes for the duration of a step.
pub struct Octree {
    nodes: Vec<Node>,
    root: usize,
    max_depth: usize,
}

impl Octree {
    /// Build an octree over `particles`.
    ///
    /// 1. Computes the enclosing root cube.
    /// 2. Assigns every particle index to the root and aggregates it.
    /// 3. Recursively subdivides until each leaf holds at most one particle,
    ///    or the depth limit is reached.
    ///
    /// # Errors
    /// - [`SimError::EmptyTree`] if `particles` is empty.
    /// - [`SimError::InvalidParameter`] if `max_depth` is zero or above
    ///   [`MAX_TREE_DEPTH`].
    /// - [`SimError::InvalidPosition`] if any position is not finite.
    pub fn build(particles: &[Particle], max_depth: usize) -> Result<Self> {
        if particles.is_empty() {
            return Err(SimError::EmptyTree);
        }
        if max_depth == 0 || max_depth > MAX_TREE_DEPTH {
            return Err(SimError::InvalidParameter { name: "max_depth", value: max_depth as f64 });
        }
        if let Some(i) = particles.iter().position(|p| !p.is_finite()) {
            return Err(SimError::InvalidPosition { index: Some(i) });
        }

        let (center, side) = root_cube(particles);
        let mut root = Node::new(center, side)?;
        root.assign((0..particles.len()).collect());
        root.aggregate(particles);

        let mut tree = Octree {
            nodes: vec![root],
            root: 0,
            max_depth,
        };
        tree.build_tree(tree.root, particles);

        let stats = tree.stats();
        trace!(
            "octree built: {} nodes, {} leaves, depth {}",
            stats.nodes, stats.leaves, stats.max_depth
        );
        if stats.capped_leaves > 0 {
            warn!(
                "{} octree leaves could not be split further (depth limit {}); \
                 using direct summation inside them",
                stats.capped_leaves, max_depth
            );
        }

        Ok(tree)
    }

    /// Recursively subdivide from `node_idx` until every leaf holds at most
    /// one particle, subject to the depth limit and float resolution.
    fn build_tree(&mut self, node_idx: usize, particles: &[Particle]) {
        let node = &self.nodes[node_idx];
        if node.num_particles() <= 1 || node.depth >= self.max_depth || !node.can_split() {
            return;
        }

        let children = self.subdivide(node_idx, particles);
        for child in children {
            self.build_tree(child, particles);
        }
    }

    /// Split a node into its 8 octants.
    ///
    /// Each particle of the parent is placed in exactly one child. Every
    /// child gets its partition (sized exactly by a counting pass) and is
    /// aggregated immediately, before any further subdivision.
    ///
    /// Returns the arena indices of the new children.
    fn subdivide(&mut self, node_idx: usize, particles: &[Particle]) -> [usize; 8] {
        debug_assert!(self.nodes[node_idx].num_particles() > 1);

        let parent = &self.nodes[node_idx];
        let child_side = parent.side * 0.5;
        let child_depth = parent.depth + 1;

        // Counting pass so each child's list is allocated once at its final size
        let mut counts = [0usize; 8];
        for &i in parent.particles() {
            counts[parent.octant_of(&particles[i].pos())] += 1;
        }

        let mut partitions: [Vec<usize>; 8] = std::array::from_fn(|k| Vec::with_capacity(counts[k]));
        for &i in parent.particles() {
            partitions[parent.octant_of(&particles[i].pos())].push(i);
        }

        let centers: [NVec3; 8] = std::array::from_fn(|k| parent.child_center(k));

        let mut children = [0usize; 8];
        for (octant, part) in partitions.into_iter().enumerate() {
            let mut child = Node {
                center: centers[octant],
                side: child_side,
                depth: child_depth,
                moment: None,
                children: None,
                particles: Box::default(),
            };
            child.assign(part);
            child.aggregate(particles);

            children[octant] = self.nodes.len();
            self.nodes.push(child);
        }

        self.nodes[node_idx].children = Some(children);
        children
    }

    /// Free the whole tree. Called once per step after every particle has
    /// been evaluated against it.
    pub fn release(self) {
        trace!("releasing octree with {} nodes", self.nodes.len());
        drop(self);
    }

    pub fn root(&self) -> &Node {
        &self.nodes[self.root]
    }

    pub fn root_index(&self) -> usize {
        self.root
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All nodes without children.
    pub fn leaves(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| !n.has_children())
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            nodes: self.nodes.len(),
            ..TreeStats::default()
        };
        for node in self.leaves() {
            stats.leaves += 1;
            match node.num_particles() {
                0 => stats.empty_leaves += 1,
                1 => {}
                _ => stats.capped_leaves += 1,
            }
        }
        stats.max_depth = self.nodes.iter().map(|n| n.depth).max().unwrap_or(0);
        stats
    }
}

/// Smallest axis-aligned cube that encloses every particle.
///
/// The cube is centered on the bounding box midpoint with side equal to the
/// largest extent. When all particles coincide the extent is zero and a unit
/// cube is used instead, so the root always has a valid side.
fn root_cube(particles: &[Particle]) -> (NVec3, f64) {
    let mut min = NVec3::repeat(f64::INFINITY);
    let mut max = NVec3::repeat(f64::NEG_INFINITY);

    for p in particles {
        let x = p.pos();
        min = min.inf(&x);
        max = max.sup(&x);
    }

    let center = (min + max) * 0.5;
    let extent = max - min;
    let side = extent.x.max(extent.y).max(extent.z);

    if side > 0.0 {
        (center, side)
    } else {
        (center, 1.0)
    }
}
