use std::time::Instant;

use log::warn;

use crate::error::Result;
use crate::simulation::forces::{BarnesHutGravity, DirectGravity, ForceTerm, InteractionCounts};
use crate::simulation::params::Parameters;
use crate::simulation::states::{NVec3, Particle, ParticleStore};

/// Time one force evaluation for direct summation and Barnes–Hut over a
/// range of particle counts.
/// Prints CSV, paste directly into a spreadsheet to graph
pub fn bench_forces() {
    let ns = [200, 400, 800, 1600, 3200, 6400];
    let params = make_params(0.7);

    println!("N,direct_ms,bh_ms,direct_interactions,bh_interactions");

    for n in ns {
        let store = make_store(n);
        let mut out = vec![NVec3::zeros(); n];

        // Warm up
        let _ = time_term(&DirectGravity, &store, &params, &mut out);
        let _ = time_term(&BarnesHutGravity, &store, &params, &mut out);

        let (ms_direct, c_direct) = match time_term(&DirectGravity, &store, &params, &mut out) {
            Ok(row) => row,
            Err(e) => {
                warn!("direct summation failed for N={}: {}; skipping row", n, e);
                continue;
            }
        };
        let (ms_bh, c_bh) = match time_term(&BarnesHutGravity, &store, &params, &mut out) {
            Ok(row) => row,
            Err(e) => {
                warn!("Barnes-Hut failed for N={}: {}; skipping row", n, e);
                continue;
            }
        };

        println!("{},{:.6},{:.6},{},{}", n, ms_direct, ms_bh, c_direct.total(), c_bh.total());
    }
}

/// Sweep the opening angle for a fixed particle count.
/// Smaller theta opens more nodes, so direct interactions go up.
pub fn bench_theta(n: usize) {
    let store = make_store(n);
    let mut out = vec![NVec3::zeros(); n];

    println!("theta,bh_ms,direct_interactions,approximated_interactions");

    for step in 0..=12 {
        let theta = step as f64 * 0.1;
        let params = make_params(theta);
        let (ms, counts) = match time_term(&BarnesHutGravity, &store, &params, &mut out) {
            Ok(row) => row,
            Err(e) => {
                warn!("Barnes-Hut failed for theta={:.1}: {}; skipping row", theta, e);
                continue;
            }
        };
        println!("{:.1},{:.6},{},{}", theta, ms, counts.direct, counts.approximated);
    }
}

/// Run a force term once and return (milliseconds, interaction counts)
fn time_term(
    term: &dyn ForceTerm,
    store: &ParticleStore,
    params: &Parameters,
    out: &mut [NVec3],
) -> Result<(f64, InteractionCounts)> {
    for f in out.iter_mut() {
        *f = NVec3::zeros();
    }
    let t0 = Instant::now();
    let counts = term.accumulate(store.as_slice(), params, out)?;
    Ok((t0.elapsed().as_secs_f64() * 1000.0, counts))
}

/// Helper to build a deterministic store of size `n`, no rand needed
pub fn make_store(n: usize) -> ParticleStore {
    (0..n)
        .filter_map(|i| {
            let i_f = i as f64;
            let x = NVec3::new(
                (i_f * 0.37).sin() * 5.0,
                (i_f * 0.13).cos() * 5.0,
                (i_f * 0.07).sin() * 5.0,
            );
            Particle::new(1.0, x).ok()
        })
        .collect()
}

/// Helper to build benchmark parameters
fn make_params(theta: f64) -> Parameters {
    Parameters {
        g: 0.1,
        eps: 0.01,
        theta,
        dt: 0.001,
        ..Parameters::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    #[test]
    fn timing_reports_force_errors_instead_of_zero_counts() {
        let store = make_store(16);
        let mut out = vec![NVec3::zeros(); store.len()];
        let params = Parameters { max_depth: 0, ..make_params(0.7) };

        let result = time_term(&BarnesHutGravity, &store, &params, &mut out);
        assert!(matches!(result, Err(SimError::InvalidParameter { name: "max_depth", .. })));

        let (_, counts) = time_term(&BarnesHutGravity, &store, &make_params(0.7), &mut out).unwrap();
        assert!(counts.total() > 0);
    }
}
