use octgrav::simulation::states::{NVec3, Particle, ParticleStore};
use octgrav::simulation::params::{Parameters, SofteningLaw, MAX_TREE_DEPTH};
use octgrav::simulation::octree::Octree;
use octgrav::simulation::forces::{evaluate, softened_force, BarnesHutGravity, DirectGravity, ForceSet, ForceTerm, InteractionCounts};
use octgrav::simulation::integrator::stormer_verlet_step;
use octgrav::simulation::engine::{advance, advance_with};
use octgrav::simulation::scenario::Scenario;
use octgrav::configuration::config::ScenarioConfig;
use octgrav::benchmark::benchmark::make_store;
use octgrav::SimError;

/// Build a simple 2-particle store separated along the x-axis, at rest
pub fn two_body_store(dist: f64, m1: f64, m2: f64) -> ParticleStore {
    ParticleStore::from(vec![
        Particle::new(m1, NVec3::new(-dist / 2.0, 0.0, 0.0)).unwrap(),
        Particle::new(m2, NVec3::new(dist / 2.0, 0.0, 0.0)).unwrap(),
    ])
}

/// Deterministic scattered store with unequal masses
pub fn scattered_store(n: usize) -> ParticleStore {
    (0..n)
        .map(|i| {
            let i_f = i as f64;
            let x = NVec3::new(
                (i_f * 0.91).sin() * 10.0,
                (i_f * 0.57).cos() * 7.0,
                (i_f * 1.33).sin() * 4.0,
            );
            Particle::new(1.0 + (i % 3) as f64, x).unwrap()
        })
        .collect()
}

/// Default physics parameters for tests
pub fn test_params() -> Parameters {
    Parameters {
        g: 1.0,
        eps: 0.0,
        theta: 0.0,
        dt: 0.001,
        ..Parameters::default()
    }
}

/// Forces for every particle under a force set, without integrating
pub fn forces_of(set: &ForceSet, store: &ParticleStore, params: &Parameters) -> (Vec<NVec3>, InteractionCounts) {
    let mut out = vec![NVec3::zeros(); store.len()];
    let counts = set.accumulate_forces(store.as_slice(), params, &mut out).unwrap();
    (out, counts)
}

// ==================================================================================
// Particle store tests
// ==================================================================================

#[test]
fn particle_rejects_non_positive_mass() {
    assert!(matches!(Particle::new(0.0, NVec3::zeros()), Err(SimError::InvalidMass { .. })));
    assert!(matches!(Particle::new(-1.0, NVec3::zeros()), Err(SimError::InvalidMass { .. })));
    assert!(matches!(Particle::new(f64::NAN, NVec3::zeros()), Err(SimError::InvalidMass { .. })));
}

#[test]
fn particle_rejects_non_finite_position() {
    let bad = NVec3::new(f64::INFINITY, 0.0, 0.0);
    assert!(matches!(Particle::new(1.0, bad), Err(SimError::InvalidPosition { .. })));
}

#[test]
fn initial_state_seeds_previous_position() {
    let p = Particle::from_initial_state(1.0, NVec3::new(1.0, 2.0, 3.0), NVec3::new(10.0, 0.0, 0.0), 0.1).unwrap();
    assert_eq!(p.prev_pos(), NVec3::new(1.0, 2.0, 3.0));
    assert!((p.pos() - NVec3::new(2.0, 2.0, 3.0)).norm() < 1e-12);
}

// ==================================================================================
// Octree tests
// ==================================================================================

#[test]
fn empty_particle_set_has_no_tree() {
    assert!(matches!(Octree::build(&[], 48), Err(SimError::EmptyTree)));
}

#[test]
fn root_mass_equals_sum_of_masses() {
    let store = scattered_store(300);
    let tree = Octree::build(store.as_slice(), 48).unwrap();

    let root_mass = tree.root().total_mass().unwrap();
    assert!((root_mass - store.total_mass()).abs() < 1e-9, "root mass {} vs {}", root_mass, store.total_mass());

    let com = tree.root().com().unwrap();
    assert!((com - store.center_of_mass().unwrap()).norm() < 1e-9);
}

#[test]
fn every_particle_lands_in_exactly_one_leaf() {
    let store = scattered_store(500);
    let tree = Octree::build(store.as_slice(), 48).unwrap();

    let mut seen = vec![0usize; store.len()];
    for leaf in tree.leaves() {
        assert!(leaf.num_particles() <= 1);
        for &i in leaf.particles() {
            seen[i] += 1;
        }
    }

    let total: usize = seen.iter().sum();
    assert_eq!(total, store.len());
    assert!(seen.iter().all(|&c| c == 1));
}

#[test]
fn particles_on_partition_planes_are_not_duplicated() {
    // Grid points fall exactly on child boundaries at several levels
    let mut store = ParticleStore::new();
    for x in [-2.0, -1.0, 0.0, 1.0, 2.0] {
        for y in [-2.0, 0.0, 2.0] {
            store.push(Particle::new(1.0, NVec3::new(x, y, 0.0)).unwrap());
        }
    }

    let tree = Octree::build(store.as_slice(), 48).unwrap();
    let leaf_total: usize = tree.leaves().map(|l| l.num_particles()).sum();
    assert_eq!(leaf_total, store.len());
    assert!((tree.root().total_mass().unwrap() - 15.0).abs() < 1e-12);
}

#[test]
fn children_halve_side_and_offset_by_quarter() {
    let store = scattered_store(200);
    let tree = Octree::build(store.as_slice(), 48).unwrap();

    for node in tree.nodes() {
        for &i in node.particles() {
            assert!(node.contains(&store.as_slice()[i].pos()));
        }

        let Some(children) = node.children() else {
            continue;
        };
        assert!(node.num_particles() > 1);

        let mut child_mass = 0.0;
        for &c in children {
            let child = tree.node(c);
            assert_eq!(child.side(), node.side() / 2.0);
            assert_eq!(child.depth(), node.depth() + 1);
            let offset = child.center() - node.center();
            assert!(offset.iter().all(|o| (o.abs() - node.side() / 4.0).abs() < 1e-12));
            child_mass += child.total_mass().unwrap_or(0.0);
        }
        assert!((child_mass - node.total_mass().unwrap()).abs() < 1e-9);
    }
}

#[test]
fn coincident_particles_terminate_at_depth_limit() {
    let store: ParticleStore = (0..6)
        .map(|_| Particle::new(1.0, NVec3::new(3.0, -1.0, 2.0)).unwrap())
        .collect();

    let tree = Octree::build(store.as_slice(), 20).unwrap();
    let stats = tree.stats();
    assert_eq!(stats.capped_leaves, 1);
    assert_eq!(stats.max_depth, 20);

    let group = tree.leaves().find(|l| l.num_particles() > 1).unwrap();
    assert_eq!(group.num_particles(), 6);
    assert!((tree.root().total_mass().unwrap() - 6.0).abs() < 1e-12);

    let params = Parameters { eps: 0.1, max_depth: 20, ..test_params() };
    for i in 0..store.len() {
        let mut counts = InteractionCounts::default();
        let f = evaluate(&tree, i, store.as_slice(), &params, &mut counts);
        assert!(f.iter().all(|c| c.is_finite()));
        assert_eq!(counts.direct, 5);
    }
}

#[test]
fn depth_limit_above_ceiling_is_rejected() {
    let store: ParticleStore = (0..4)
        .map(|_| Particle::new(1.0, NVec3::new(0.0, 0.0, 0.0)).unwrap())
        .collect();

    assert!(Octree::build(store.as_slice(), MAX_TREE_DEPTH).is_ok());
    assert!(matches!(
        Octree::build(store.as_slice(), MAX_TREE_DEPTH + 1),
        Err(SimError::InvalidParameter { name: "max_depth", .. })
    ));
    assert!(Octree::build(store.as_slice(), 200_000).is_err());
}

#[test]
fn coincident_particles_far_from_origin_stop_at_float_resolution() {
    let store: ParticleStore = (0..4)
        .map(|_| Particle::new(1.0, NVec3::new(1e12, -1e12, 1e12)).unwrap())
        .collect();

    let tree = Octree::build(store.as_slice(), MAX_TREE_DEPTH).unwrap();
    let stats = tree.stats();
    assert_eq!(stats.capped_leaves, 1);
    assert!(stats.max_depth < MAX_TREE_DEPTH, "split stopped at depth {}", stats.max_depth);

    let group = tree.leaves().find(|l| l.num_particles() > 1).unwrap();
    assert_eq!(group.num_particles(), 4);
    assert!(!group.can_split());
    let moment = group.moment().unwrap();
    assert!((moment.mass - 4.0).abs() < 1e-12);
}

#[test]
fn coincident_pair_beside_other_particles_steps_cleanly() {
    let mut store = scattered_store(50);
    store.push(Particle::new(1.0, NVec3::new(0.5, 0.5, 0.5)).unwrap());
    store.push(Particle::new(1.0, NVec3::new(0.5, 0.5, 0.5)).unwrap());

    let params = Parameters { eps: 0.1, theta: 0.5, ..test_params() };
    advance(&mut store, &params).unwrap();
    assert!(store.iter().all(|p| p.is_finite()));
}

// ==================================================================================
// Force evaluation tests
// ==================================================================================

#[test]
fn two_body_force_is_quarter_toward_other() {
    let store = two_body_store(2.0, 1.0, 1.0);
    let (f, _) = forces_of(&ForceSet::barnes_hut(), &store, &test_params());

    assert!((f[0].norm() - 0.25).abs() < 1e-12, "got {}", f[0].norm());
    assert!(f[0].x > 0.0, "force on left body should point +x");
    assert!(f[1].x < 0.0, "force on right body should point -x");
    assert_eq!(f[0].y, 0.0);
    assert_eq!(f[0].z, 0.0);
}

#[test]
fn gravity_newton_third_law() {
    let store = two_body_store(1.5, 2.0, 3.0);
    let (f, _) = forces_of(&ForceSet::barnes_hut(), &store, &test_params());

    let net = f[0] + f[1];
    assert!(net.norm() < 1e-12, "Net force not zero: {:?}", net);
    assert!((f[0].norm() - f[1].norm()).abs() < 1e-12);
}

#[test]
fn gravity_inverse_square_law() {
    let (f_r, _) = forces_of(&ForceSet::barnes_hut(), &two_body_store(1.0, 1.0, 1.0), &test_params());
    let (f_2r, _) = forces_of(&ForceSet::barnes_hut(), &two_body_store(2.0, 1.0, 1.0), &test_params());

    let ratio = f_r[0].norm() / f_2r[0].norm();
    assert!((ratio - 4.0).abs() < 1e-9, "Expected 4x, got {}", ratio);
}

#[test]
fn softening_prevents_blowup() {
    let params = Parameters { eps: 0.1, ..test_params() };
    let (f, _) = forces_of(&ForceSet::barnes_hut(), &two_body_store(1e-9, 1.0, 1.0), &params);
    assert!(f[0].norm() < 1e3, "Softening failed; force too large");
}

#[test]
fn legacy_truncated_exponent_drops_one_power() {
    let r = NVec3::new(-2.0, 0.0, 0.0);
    let newton = softened_force(r, 1.0, 1.0, 1.0, 0.0, SofteningLaw::Newtonian);
    let legacy = softened_force(r, 1.0, 1.0, 1.0, 0.0, SofteningLaw::LegacyTruncated);

    assert!((newton.x - 0.25).abs() < 1e-12);
    assert!((legacy.x - 0.5).abs() < 1e-12);
}

#[test]
fn lone_particle_feels_no_force() {
    let store = ParticleStore::from(vec![Particle::new(5.0, NVec3::new(1.0, 1.0, 1.0)).unwrap()]);
    let tree = Octree::build(store.as_slice(), 48).unwrap();

    let mut counts = InteractionCounts::default();
    let f = evaluate(&tree, 0, store.as_slice(), &test_params(), &mut counts);
    assert_eq!(f, NVec3::zeros());
    assert_eq!(counts.total(), 0);
}

#[test]
fn zero_theta_matches_direct_summation() {
    let store = scattered_store(120);
    let params = Parameters { eps: 0.05, ..test_params() };

    let (bh, bh_counts) = forces_of(&ForceSet::barnes_hut(), &store, &params);
    let (direct, _) = forces_of(&ForceSet::direct(), &store, &params);

    let n = store.len() as u64;
    assert_eq!(bh_counts.approximated, 0);
    assert_eq!(bh_counts.direct, n * (n - 1), "self-interaction must never be counted");

    for (a, b) in bh.iter().zip(direct.iter()) {
        assert!((a - b).norm() <= 1e-9 * b.norm().max(1.0), "{:?} vs {:?}", a, b);
    }
}

#[test]
fn moderate_theta_stays_close_to_direct() {
    let store = make_store(600);
    let params = Parameters { eps: 0.01, theta: 0.5, ..test_params() };

    let (bh, counts) = forces_of(&ForceSet::barnes_hut(), &store, &params);
    let (direct, _) = forces_of(&ForceSet::direct(), &store, &params);

    let err: f64 = bh.iter().zip(direct.iter()).map(|(a, b)| (a - b).norm()).sum();
    let scale: f64 = direct.iter().map(|b| b.norm()).sum();
    assert!(err / scale < 0.05, "relative error {}", err / scale);
    assert!(counts.approximated > 0);
}

#[test]
fn smaller_theta_never_reduces_direct_interactions() {
    let store = scattered_store(400);
    let thetas = [1.5, 1.2, 1.0, 0.8, 0.6, 0.4, 0.2, 0.1, 0.0, -1.0];

    let mut last = 0u64;
    for theta in thetas {
        let params = Parameters { eps: 0.01, theta, ..test_params() };
        let (_, counts) = forces_of(&ForceSet::barnes_hut(), &store, &params);
        assert!(counts.direct >= last, "theta {}: {} < {}", theta, counts.direct, last);
        last = counts.direct;
    }
}

#[test]
fn parallel_evaluation_matches_sequential() {
    let store = scattered_store(300);
    let seq = Parameters { eps: 0.01, theta: 0.7, ..test_params() };
    let par = Parameters { parallel: true, ..seq.clone() };

    let mut out_seq = vec![NVec3::zeros(); store.len()];
    let mut out_par = vec![NVec3::zeros(); store.len()];
    let c_seq = BarnesHutGravity.accumulate(store.as_slice(), &seq, &mut out_seq).unwrap();
    let c_par = BarnesHutGravity.accumulate(store.as_slice(), &par, &mut out_par).unwrap();

    assert_eq!(c_seq, c_par);
    for (a, b) in out_seq.iter().zip(out_par.iter()) {
        assert!((a - b).norm() < 1e-12);
    }
}

#[test]
fn force_set_sums_its_terms() {
    let store = two_body_store(2.0, 1.0, 1.0);
    let params = test_params();
    let both = ForceSet::new().with(DirectGravity).with(BarnesHutGravity);

    let (f, counts) = forces_of(&both, &store, &params);
    assert!((f[0].x - 0.5).abs() < 1e-12);
    assert_eq!(counts.direct, 4);
}

// ==================================================================================
// Integrator tests
// ==================================================================================

#[test]
fn stormer_verlet_position_update() {
    let mut p = Particle::from_initial_state(2.0, NVec3::zeros(), NVec3::new(1.0, 0.0, 0.0), 0.1).unwrap();
    p.set_ext_force(NVec3::new(2.0, 0.0, 0.0));

    stormer_verlet_step(&mut p, 0.1, true);

    // 2 * 0.1 - 0 + (2 / 2) * 0.01
    assert!((p.pos().x - 0.21).abs() < 1e-12);
    assert!((p.prev_pos().x - 0.1).abs() < 1e-12);
    assert!((p.vel().x - 1.1).abs() < 1e-9);
}

#[test]
fn velocity_untouched_without_flag() {
    let mut p = Particle::from_initial_state(1.0, NVec3::zeros(), NVec3::new(0.0, 3.0, 0.0), 0.1).unwrap();
    p.set_ext_force(NVec3::new(5.0, 0.0, 0.0));
    stormer_verlet_step(&mut p, 0.1, false);
    assert_eq!(p.vel(), NVec3::new(0.0, 3.0, 0.0));
}

// ==================================================================================
// Engine tests
// ==================================================================================

#[test]
fn two_bodies_move_closer_after_one_step() {
    let mut store = two_body_store(2.0, 1.0, 1.0);
    let params = test_params();

    let report = advance(&mut store, &params).unwrap();
    assert_eq!(report.particles, 2);

    let a = store.as_slice()[0].pos();
    let b = store.as_slice()[1].pos();
    assert!(b.x - a.x < 2.0, "bodies did not approach: {}", b.x - a.x);
    assert!(a.x > -1.0 && b.x < 1.0);
    assert_eq!((a.y, a.z, b.y, b.z), (0.0, 0.0, 0.0, 0.0));
}

#[test]
fn advance_leaves_forces_zeroed() {
    let mut store = scattered_store(64);
    let params = Parameters { eps: 0.1, theta: 0.6, ..test_params() };
    advance(&mut store, &params).unwrap();
    assert!(store.iter().all(|p| p.ext_force() == NVec3::zeros()));
}

#[test]
fn empty_store_step_is_noop() {
    let mut store = ParticleStore::new();
    let report = advance(&mut store, &test_params()).unwrap();
    assert_eq!(report.particles, 0);
    assert_eq!(report.interactions.total(), 0);
}

#[test]
fn failed_step_does_not_mutate_particles() {
    let mut store = scattered_store(32);
    let before = store.clone();

    let bad = Parameters { dt: -1.0, ..test_params() };
    assert!(matches!(advance(&mut store, &bad), Err(SimError::InvalidParameter { name: "dt", .. })));
    assert_eq!(store.as_slice(), before.as_slice());

    let bad_depth = Parameters { max_depth: 0, ..test_params() };
    assert!(advance(&mut store, &bad_depth).is_err());
    assert_eq!(store.as_slice(), before.as_slice());
}

#[test]
fn oversized_depth_limit_fails_before_mutating() {
    let mut store: ParticleStore = (0..3)
        .map(|_| Particle::new(1.0, NVec3::new(1.0, 1.0, 1.0)).unwrap())
        .collect();
    let before = store.clone();

    let params = Parameters { max_depth: 200_000, ..test_params() };
    assert!(params.validate().is_err());
    assert!(matches!(
        advance(&mut store, &params),
        Err(SimError::InvalidParameter { name: "max_depth", .. })
    ));
    assert_eq!(store.as_slice(), before.as_slice());
}

#[test]
fn non_finite_forces_fail_before_mutating() {
    // G at the top of the f64 range over a 1e-3 gap overflows the force
    let mut store = two_body_store(1e-3, 1.0, 1.0);
    let before = store.clone();
    let params = Parameters { g: f64::MAX, ..test_params() };
    assert!(params.validate().is_ok());

    assert!(matches!(advance(&mut store, &params), Err(SimError::NonFiniteForce { .. })));
    assert_eq!(store.as_slice(), before.as_slice());

    assert!(matches!(
        advance_with(&mut store, &params, &ForceSet::direct()),
        Err(SimError::NonFiniteForce { .. })
    ));
    assert_eq!(store.as_slice(), before.as_slice());
}

#[test]
fn direct_and_tree_steps_agree_at_zero_theta() {
    let mut a = scattered_store(80);
    let mut b = a.clone();
    let params = Parameters { eps: 0.1, ..test_params() };

    for _ in 0..5 {
        advance(&mut a, &params).unwrap();
        advance_with(&mut b, &params, &ForceSet::direct()).unwrap();
    }

    for (pa, pb) in a.iter().zip(b.iter()) {
        assert!((pa.pos() - pb.pos()).norm() < 1e-9);
    }
}

// ==================================================================================
// Scenario tests
// ==================================================================================

const TWO_BODY_YAML: &str = r#"
engine:
  barnes_hut: true
  theta: 0.0
parameters:
  G: 1.0
  eps: 0.0
  dt: 0.01
  steps: 10
  update_velocity: true
bodies:
  - x: [ -1.0, 0.0, 0.0 ]
    m: 1.0
  - x: [  1.0, 0.0, 0.0 ]
    v: [  0.0, 0.0, 0.0 ]
    m: 1.0
"#;

#[test]
fn scenario_from_yaml_runs() {
    let cfg: ScenarioConfig = serde_yaml::from_str(TWO_BODY_YAML).unwrap();
    let mut scenario = Scenario::build_scenario(cfg).unwrap();

    assert_eq!(scenario.store.len(), 2);
    assert_eq!(scenario.parameters.softening, SofteningLaw::Newtonian);

    let steps = scenario.steps;
    let reports = scenario.run(steps).unwrap();
    assert_eq!(reports.len(), 10);
    assert_eq!(scenario.step_count, 10);

    let a = &scenario.store.as_slice()[0];
    assert!(a.pos().x > -1.0);
    assert!(a.vel().x > 0.0, "velocity should point toward the other body");
}

#[test]
fn scenario_random_cloud_is_reproducible() {
    let yaml = r#"
engine:
  theta: 0.9
  parallel: true
  softening: "legacy_truncated"
parameters:
  G: 20.0
  eps: 0.1
  dt: 0.1
  steps: 2
random:
  count: 250
  range: 100.0
  random_velocity: true
  seed: 11
"#;
    let a = Scenario::build_scenario(serde_yaml::from_str(yaml).unwrap()).unwrap();
    let b = Scenario::build_scenario(serde_yaml::from_str(yaml).unwrap()).unwrap();

    assert_eq!(a.store.len(), 250);
    assert_eq!(a.store.as_slice(), b.store.as_slice());
    assert_eq!(a.parameters.softening, SofteningLaw::LegacyTruncated);
    assert!(a.store.iter().all(|p| (p.mass() - 2.0).abs() < 1e-12));
    assert!(a.store.iter().all(|p| p.prev_pos().amax() <= 100.0));
}

#[test]
fn scenario_rejects_bad_bodies() {
    let bad_mass = TWO_BODY_YAML.replace("    m: 1.0\n  - x", "    m: -1.0\n  - x");
    let cfg: ScenarioConfig = serde_yaml::from_str(&bad_mass).unwrap();
    assert!(matches!(
        Scenario::build_scenario(cfg),
        Err(SimError::InvalidMass { index: Some(0), .. })
    ));

    let bad_vec = TWO_BODY_YAML.replace("[ -1.0, 0.0, 0.0 ]", "[ -1.0, 0.0 ]");
    let cfg: ScenarioConfig = serde_yaml::from_str(&bad_vec).unwrap();
    assert!(matches!(Scenario::build_scenario(cfg), Err(SimError::InvalidScenario(_))));
}

#[test]
fn random_cloud_errors_carry_store_index() {
    let yaml = format!("{}random:\n  count: 3\n  mass: -1.0\n  seed: 1\n", TWO_BODY_YAML);
    let cfg: ScenarioConfig = serde_yaml::from_str(&yaml).unwrap();
    assert!(matches!(
        Scenario::build_scenario(cfg),
        Err(SimError::InvalidMass { index: Some(2), .. })
    ));
}
