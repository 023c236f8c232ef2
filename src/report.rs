//! Result types returned from the engine facade (§3, §6): pool-level reports,
//! aggregate metrics, and the two outcome envelopes (`optimize`, `fast_preview`).

use std::time::Duration;

use crate::cost::CostBreakdown;
use crate::de::RunStatus;
use crate::encoder::EncodedPrimer;
use crate::error::Warning;
use crate::matrix::InteractionMatrix;

/// One primer's record as reported back inside its assigned pool (§6).
#[derive(Debug, Clone, PartialEq)]
pub struct PoolMember {
    pub id: String,
    pub gene: String,
    pub forward: String,
    pub reverse: String,
    pub fwd_tm: f64,
    pub rev_tm: f64,
    pub avg_tm: f64,
    pub gc_content: f64,
    /// Mean of `M[i, j]` over every `j` sharing this primer's pool, including
    /// `j == i` (the self-term), matching the dimer penalty's own treatment
    /// of self-interaction as informative rather than a bookkeeping artifact.
    pub compatibility_score: f64,
}

/// Per-pool summary: membership plus the Tm and dimer statistics used both
/// for reporting and (via the cost evaluator) for scoring (§4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct PoolReport {
    pub pool_index: usize,
    pub members: Vec<PoolMember>,
    pub size: usize,
    pub avg_tm: f64,
    pub tm_range: f64,
    pub max_dimer_score: f64,
}

/// Aggregate, pool-indexed arrays mirroring the per-pool fields of
/// `PoolReport`, plus the overall scalar score (§6).
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub pool_sizes: Vec<usize>,
    pub avg_tm_per_pool: Vec<f64>,
    pub tm_range_per_pool: Vec<f64>,
    pub max_dimer_per_pool: Vec<f64>,
    pub optimization_score: f64,
}

/// Full result of `Engine::optimize` (§3 `OptimizeOutcome`).
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeOutcome {
    pub assignment: Vec<usize>,
    pub pools: Vec<PoolReport>,
    pub metrics: Metrics,
    pub cost_breakdown: CostBreakdown,
    pub duration: Duration,
    pub generations_completed: usize,
    pub status: RunStatus,
    pub warnings: Vec<Warning>,
}

/// Result of `Engine::fast_preview` (§4.5, §4.7): no matrix, no search.
#[derive(Debug, Clone, PartialEq)]
pub struct FastPreview {
    pub assignment: Vec<usize>,
    pub pool_sizes: Vec<usize>,
    pub avg_tm_per_pool: Vec<f64>,
}

/// Build per-pool reports and aggregate metrics from a finished assignment.
/// Iterates members in ascending primer index within each pool, matching the
/// cost evaluator's fixed summation order (§4.4, §5) so the two stay consistent.
pub fn build_pool_reports(
    encoded: &[EncodedPrimer],
    assignment: &[usize],
    matrix: &InteractionMatrix,
    k: usize,
    optimization_score: f64,
) -> (Vec<PoolReport>, Metrics) {
    let mut pool_indices: Vec<Vec<usize>> = vec![Vec::new(); k];
    for (i, &p) in assignment.iter().enumerate() {
        pool_indices[p].push(i);
    }

    let mut pools = Vec::with_capacity(k);
    for (pool_index, indices) in pool_indices.iter().enumerate() {
        let members: Vec<PoolMember> = indices
            .iter()
            .map(|&i| {
                let compatibility_score =
                    indices.iter().map(|&j| matrix.get(i, j)).sum::<f64>() / indices.len() as f64;
                let p = &encoded[i];
                PoolMember {
                    id: p.id.clone(),
                    gene: p.gene.clone(),
                    forward: p.forward_sequence(),
                    reverse: p.reverse_sequence(),
                    fwd_tm: p.fwd_tm,
                    rev_tm: p.rev_tm,
                    avg_tm: p.avg_tm,
                    gc_content: p.gc_content,
                    compatibility_score,
                }
            })
            .collect();

        let avg_tms: Vec<f64> = indices.iter().map(|&i| encoded[i].avg_tm).collect();
        let avg_tm = if avg_tms.is_empty() {
            0.0
        } else {
            avg_tms.iter().sum::<f64>() / avg_tms.len() as f64
        };
        let tm_range = if avg_tms.is_empty() {
            0.0
        } else {
            avg_tms.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
                - avg_tms.iter().cloned().fold(f64::INFINITY, f64::min)
        };
        let max_dimer_score = indices
            .iter()
            .flat_map(|&i| indices.iter().map(move |&j| matrix.get(i, j)))
            .fold(0.0f64, f64::max);

        pools.push(PoolReport {
            pool_index,
            size: indices.len(),
            members,
            avg_tm,
            tm_range,
            max_dimer_score,
        });
    }

    let metrics = Metrics {
        pool_sizes: pools.iter().map(|p| p.size).collect(),
        avg_tm_per_pool: pools.iter().map(|p| p.avg_tm).collect(),
        tm_range_per_pool: pools.iter().map(|p| p.tm_range).collect(),
        max_dimer_per_pool: pools.iter().map(|p| p.max_dimer_score).collect(),
        optimization_score,
    };

    (pools, metrics)
}
