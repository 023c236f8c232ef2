//! Multi-term cost function used to score an assignment (§4.4).

use crate::config::{EngineConfig, PENALTY_LARGE};
use crate::matrix::InteractionMatrix;

/// The four penalty terms and their weighted sum. All components are
/// non-negative; lower `total` is better.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    pub dimer: f64,
    pub tm_var: f64,
    pub balance: f64,
    pub constraint: f64,
    pub total: f64,
}

/// Group primer indices by pool, preserving ascending index order within
/// each pool bucket. Summation order downstream depends on this for
/// cross-worker-count determinism (§5).
fn pools_by_index(assignment: &[usize], k: usize) -> Vec<Vec<usize>> {
    let mut pools = vec![Vec::new(); k];
    for (i, &p) in assignment.iter().enumerate() {
        pools[p].push(i);
    }
    pools
}

fn population_variance(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count();
    if n == 0 {
        return 0.0;
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64
}

/// Evaluate the total cost of `assignment` against `matrix` and the
/// per-primer `avg_tm` vector.
///
/// `assignment.len()` must equal `avg_tm.len()` and every value must be in
/// `[0, config.n_pools)`; this is an internal invariant maintained by
/// callers (decoding and the fast binner), not re-validated here.
pub fn evaluate(assignment: &[usize], matrix: &InteractionMatrix, avg_tm: &[f64], config: &EngineConfig) -> CostBreakdown {
    let k = config.n_pools;
    let pools = pools_by_index(assignment, k);

    // Dimer penalty: sum M[i,j] over unordered pairs i<=j in the same pool,
    // including the self-term i=j.
    let mut dimer = 0.0;
    for pool in &pools {
        for (idx_a, &i) in pool.iter().enumerate() {
            for &j in &pool[idx_a..] {
                dimer += matrix.get(i, j);
            }
        }
    }

    // Tm variance penalty: population variance of avg_tm within each
    // non-empty pool, summed.
    let mut tm_var = 0.0;
    for pool in &pools {
        if pool.is_empty() {
            continue;
        }
        tm_var += population_variance(pool.iter().map(|&i| avg_tm[i]));
    }

    // Balance penalty: population variance of pool sizes, over all K pools.
    let sizes: Vec<f64> = pools.iter().map(|p| p.len() as f64).collect();
    let balance = population_variance(sizes.iter().copied());

    // Capacity penalty: steep soft constraint.
    let mut constraint = 0.0;
    for pool in &pools {
        let overflow = pool.len().saturating_sub(config.cap);
        if overflow > 0 {
            constraint += (overflow * overflow) as f64 * PENALTY_LARGE;
        }
    }

    let total = config.weights.dimer * dimer
        + config.weights.tm_var * tm_var
        + config.weights.balance * balance
        + constraint;

    CostBreakdown {
        dimer,
        tm_var,
        balance,
        constraint,
        total,
    }
}
