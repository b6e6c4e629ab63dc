pub mod error;
pub mod simulation;
pub mod configuration;
pub mod benchmark;

pub use error::{Result, SimError};

pub use simulation::states::{Particle, ParticleStore, NVec3};
pub use simulation::params::{Parameters, SofteningLaw};
pub use simulation::octree::{Node, Octree, MassMoment, TreeStats};
pub use simulation::forces::{softened_force, evaluate, ForceTerm, ForceSet, DirectGravity, BarnesHutGravity, InteractionCounts};
pub use simulation::integrator::{stormer_verlet, stormer_verlet_step};
pub use simulation::engine::{advance, advance_with, Engine, StepReport};
pub use simulation::scenario::Scenario;

pub use configuration::config::{EngineConfig, ParametersConfig, BodyConfig, RandomConfig, ScenarioConfig, SofteningConfig};

pub use benchmark::benchmark::{bench_forces, bench_theta};
