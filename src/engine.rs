//! Engine facade (§4.7): orchestrates encode -> build matrix -> run DE ->
//! report, and exposes the synchronous fast-preview entry point.

use std::time::Instant;

use tracing::info;

use crate::binner::fast_bin;
use crate::config::EngineConfig;
use crate::cost;
use crate::de::{self, CancelSignal, DeOutcome, NeverCancel, RunStatus};
use crate::encoder::{self, EncodedPrimer};
use crate::error::{EngineError, Warning};
use crate::matrix::build_matrix;
use crate::primer::Primer;
use crate::report::{build_pool_reports, FastPreview, OptimizeOutcome};

/// Validate the input contract (§6) shared by both entry points: a non-empty
/// primer list with unique ids.
fn validate_primers(primers: &[Primer]) -> Result<(), EngineError> {
    if primers.is_empty() {
        return Err(EngineError::InvalidInput("primer list is empty".to_string()));
    }
    let mut ids: Vec<&str> = primers.iter().map(|p| p.id.as_str()).collect();
    ids.sort_unstable();
    if ids.windows(2).any(|w| w[0] == w[1]) {
        return Err(EngineError::InvalidInput(
            "primer ids must be unique".to_string(),
        ));
    }
    Ok(())
}

/// Reject jobs that cannot possibly satisfy capacity before any long-running
/// work starts (§4.4 edge case, §7 `InfeasibleCapacity`).
fn check_capacity_feasible(n: usize, k: usize, cap: usize) -> Result<(), EngineError> {
    if cap.saturating_mul(k) < n {
        return Err(EngineError::InfeasibleCapacity { n, k, cap });
    }
    Ok(())
}

/// Encode a validated primer list and reject infeasible capacity before any
/// long-running work (§4.4 edge case, §7 `InfeasibleCapacity`). `k`/`cap`
/// are assumed already range-checked by `EngineConfig::validated`.
fn encode_and_validate(primers: &[Primer], k: usize, cap: usize) -> Result<Vec<EncodedPrimer>, EngineError> {
    validate_primers(primers)?;
    let encoded = encoder::encode_primers(primers)?;
    check_capacity_feasible(encoded.len(), k, cap)?;
    Ok(encoded)
}

/// `fast_preview` (§4.5, §4.7): deterministic O(N log N) binning, no matrix,
/// no search. Intended for sub-50ms interactive feedback.
pub fn fast_preview(primers: &[Primer], k: usize) -> Result<FastPreview, EngineError> {
    validate_primers(primers)?;
    if k < 2 {
        return Err(EngineError::InvalidInput(format!("n_pools must be >= 2, got {k}")));
    }
    let encoded = encoder::encode_primers(primers)?;
    let avg_tm: Vec<f64> = encoded.iter().map(|p| p.avg_tm).collect();
    let assignment = fast_bin(&avg_tm, k);

    let mut pool_sizes = vec![0usize; k];
    let mut sums = vec![0.0f64; k];
    for (&pool, &tm) in assignment.iter().zip(&avg_tm) {
        pool_sizes[pool] += 1;
        sums[pool] += tm;
    }
    let avg_tm_per_pool: Vec<f64> = sums
        .iter()
        .zip(&pool_sizes)
        .map(|(&s, &n)| if n == 0 { 0.0 } else { s / n as f64 })
        .collect();

    info!(n = primers.len(), k, "fast_preview complete");
    Ok(FastPreview {
        assignment,
        pool_sizes,
        avg_tm_per_pool,
    })
}

/// `optimize` (§4.7): builds the interaction matrix, runs the DE search, and
/// materializes the full pool report. `cancel` is polled at generation
/// boundaries and between matrix chunks is not applicable here (matrix
/// construction is a single rayon join, per §5).
pub fn optimize(primers: &[Primer], config: &EngineConfig, cancel: &impl CancelSignal) -> Result<OptimizeOutcome, EngineError> {
    let config = config.clone().validated()?;
    let start = Instant::now();
    let encoded = encode_and_validate(primers, config.n_pools, config.cap)?;
    let n = encoded.len();

    info!(n, k = config.n_pools, cap = config.cap, seed = config.rng_seed, "optimize: starting");

    let matrix = build_matrix(&encoded)?;
    let avg_tm: Vec<f64> = encoded.iter().map(|p| p.avg_tm).collect();

    let baseline_assignment = fast_bin(&avg_tm, config.n_pools);
    let baseline_cost = cost::evaluate(&baseline_assignment, &matrix, &avg_tm, &config);

    let de_outcome = de::optimize(&matrix, &avg_tm, &config, cancel);

    let warnings = collect_warnings(&de_outcome, baseline_cost.total, config.n_pools, config.cap);

    let (pools, metrics) = build_pool_reports(
        &encoded,
        &de_outcome.assignment,
        &matrix,
        config.n_pools,
        de_outcome.cost.total,
    );

    let duration = start.elapsed();
    info!(
        n,
        generations = de_outcome.generations_completed,
        score = de_outcome.cost.total,
        duration_ms = duration.as_millis(),
        "optimize: finished"
    );

    Ok(OptimizeOutcome {
        assignment: de_outcome.assignment,
        pools,
        metrics,
        cost_breakdown: de_outcome.cost,
        duration,
        generations_completed: de_outcome.generations_completed,
        status: de_outcome.status,
        warnings,
    })
}

/// Convenience wrapper for callers with nothing to cancel on.
pub fn optimize_uncancellable(primers: &[Primer], config: &EngineConfig) -> Result<OptimizeOutcome, EngineError> {
    optimize(primers, config, &NeverCancel)
}

/// Derive the non-fatal warnings (§7) attached to a finished DE run: status
/// translation, whether the best-so-far beat the fast-binner seed, and
/// whether it still exceeds capacity despite the soft penalty. Factored out
/// of `optimize` so each warning path is independently testable without
/// depending on how the randomized DE search happens to land.
fn collect_warnings(de_outcome: &DeOutcome, baseline_cost: f64, k: usize, cap: usize) -> Vec<Warning> {
    let mut warnings = Vec::new();
    match de_outcome.status {
        RunStatus::Cancelled => warnings.push(Warning::Cancelled),
        RunStatus::TimeBudgetExhausted => warnings.push(Warning::TimeBudgetExhausted),
        RunStatus::Completed => {}
    }
    if de_outcome.cost.total >= baseline_cost {
        warnings.push(Warning::NoImprovement);
    }
    let mut sizes = vec![0usize; k];
    for &p in &de_outcome.assignment {
        sizes[p] += 1;
    }
    if sizes.iter().any(|&s| s > cap) {
        warnings.push(Warning::CapacityViolated);
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primers(n: usize) -> Vec<Primer> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Primer::new(format!("p{i}"), "geneA", "AAAAAAAAAA", "AAAAAAAAAA")
                } else {
                    Primer::new(format!("p{i}"), "geneB", "GGGGGGGGGG", "GGGGGGGGGG")
                }
            })
            .collect()
    }

    #[test]
    fn rejects_empty_primer_list() {
        let err = fast_preview(&[], 2).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let ps = vec![
            Primer::new("dup", "", "AAAAAAAAAA", "AAAAAAAAAA"),
            Primer::new("dup", "", "GGGGGGGGGG", "GGGGGGGGGG"),
        ];
        let err = fast_preview(&ps, 2).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn s1_trivial_identical_sequences_is_feasible_and_deterministic() {
        let ps: Vec<Primer> = (0..4)
            .map(|i| Primer::new(format!("p{i}"), "g", "AAAAAAAAAA", "AAAAAAAAAA"))
            .collect();
        let mut cfg0 = EngineConfig::new(2, 2).unwrap();
        cfg0.max_generations = 50;
        cfg0.rng_seed = 0;
        let mut cfg1 = cfg0.clone();
        cfg1.rng_seed = 1;

        let out0 = optimize_uncancellable(&ps, &cfg0).unwrap();
        let out1 = optimize_uncancellable(&ps, &cfg1).unwrap();

        assert!(out0.metrics.optimization_score.is_finite());
        assert_eq!(out0.cost_breakdown.constraint, 0.0);
        let mut sizes = out0.metrics.pool_sizes.clone();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![2, 2]);
        // Every identical-sequence assignment satisfying capacity has the same
        // cost by symmetry, so the two seeds land on the same score.
        assert!((out0.metrics.optimization_score - out1.metrics.optimization_score).abs() < 1e-9);
    }

    #[test]
    fn s6_cancellation_returns_valid_best_so_far() {
        let ps = primers(500);
        let mut cfg = EngineConfig::new(4, 200).unwrap();
        cfg.max_generations = 10_000;
        let seen = std::cell::Cell::new(0u32);
        let cancel = || {
            let n = seen.get() + 1;
            seen.set(n);
            n > 1
        };
        let outcome = optimize(&ps, &cfg, &cancel).unwrap();
        assert_eq!(outcome.status, RunStatus::Cancelled);
        assert!(outcome.generations_completed >= 1);
        assert_eq!(outcome.assignment.len(), 500);
        assert!(outcome.assignment.iter().all(|&p| p < 4));
        assert!(outcome.warnings.contains(&Warning::Cancelled));
    }

    #[test]
    fn s3_capacity_infeasibility_rejected_before_de() {
        let ps = primers(10);
        let cfg = EngineConfig::new(2, 4).unwrap();
        let err = optimize_uncancellable(&ps, &cfg).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InfeasibleCapacity { n: 10, k: 2, cap: 4 }
        ));
    }

    #[test]
    fn s4_tm_separation_groups_by_tm() {
        let ps = primers(8); // 4 AT (Tm 20), 4 GC (Tm 40)
        let mut cfg = EngineConfig::new(2, 4).unwrap();
        cfg.max_generations = 200;
        let outcome = optimize_uncancellable(&ps, &cfg).unwrap();
        assert_eq!(outcome.cost_breakdown.tm_var, 0.0);
        assert_eq!(outcome.cost_breakdown.constraint, 0.0);
        let mut sizes = outcome.metrics.pool_sizes.clone();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![4, 4]);
    }

    #[test]
    fn assignment_respects_capacity_on_success() {
        let ps = primers(12);
        let mut cfg = EngineConfig::new(3, 5).unwrap();
        cfg.max_generations = 50;
        let outcome = optimize_uncancellable(&ps, &cfg).unwrap();
        assert!(outcome.metrics.pool_sizes.iter().all(|&s| s <= 5));
    }

    #[test]
    fn s5_determinism_across_calls() {
        let ps = primers(14);
        let mut cfg = EngineConfig::new(3, 10).unwrap();
        cfg.rng_seed = 42;
        cfg.max_generations = 30;
        let a = optimize_uncancellable(&ps, &cfg).unwrap();
        let b = optimize_uncancellable(&ps, &cfg).unwrap();
        assert_eq!(a.assignment, b.assignment);
        assert_eq!(a.cost_breakdown.total, b.cost_breakdown.total);
    }

    #[test]
    fn fast_preview_has_no_search_and_valid_assignment() {
        let ps = primers(9);
        let preview = fast_preview(&ps, 3).unwrap();
        assert_eq!(preview.assignment.len(), 9);
        assert!(preview.assignment.iter().all(|&p| p < 3));
        assert_eq!(preview.pool_sizes.iter().sum::<usize>(), 9);
    }

    #[test]
    fn zero_time_budget_forces_time_budget_exhausted() {
        let ps = primers(40);
        let mut cfg = EngineConfig::new(3, 20).unwrap();
        cfg.max_generations = 10_000;
        cfg.time_budget = Some(std::time::Duration::ZERO);
        let outcome = optimize_uncancellable(&ps, &cfg).unwrap();
        assert_eq!(outcome.status, RunStatus::TimeBudgetExhausted);
        assert!(outcome.warnings.contains(&Warning::TimeBudgetExhausted));
    }

    #[test]
    fn zero_generations_forces_no_improvement() {
        // `EngineConfig::validated` rejects `max_generations < 1` (spec §6:
        // "max_generations: int >= 1"), so the zero-generation path can't be
        // driven through the facade's `optimize`. Exercise `de::optimize`
        // directly instead, the way de.rs's own zero-generation tests do, and
        // feed the result through `collect_warnings` by hand.
        //
        // Every primer is identical (fwd all-A, rev all-T): avg_tm is constant,
        // so tm_var is 0 under any assignment, and every pair (including
        // self-pairs) scores the same constant dimer value. Dimer penalty is
        // then `c * sum(size*(size+1)/2)` over pools, which (like the balance
        // penalty) is minimized uniquely by an exactly balanced partition.
        // The fast-binner seed hits that exact balance for N divisible by K,
        // so it is a genuine global optimum here: no assignment, DE-found or
        // otherwise, can ever score strictly below it.
        let ps: Vec<Primer> = (0..8)
            .map(|i| Primer::new(format!("p{i}"), "g", "AAAAAAAAAA", "TTTTTTTTTT"))
            .collect();
        let encoded = encoder::encode_primers(&ps).unwrap();
        let matrix = build_matrix(&encoded).unwrap();
        let avg_tm: Vec<f64> = encoded.iter().map(|p| p.avg_tm).collect();

        let mut cfg = EngineConfig::default();
        cfg.n_pools = 2;
        cfg.cap = 4;
        cfg.max_generations = 1;
        let cfg = cfg.validated().unwrap();

        let baseline_assignment = fast_bin(&avg_tm, cfg.n_pools);
        let baseline_cost = cost::evaluate(&baseline_assignment, &matrix, &avg_tm, &cfg);

        // Drive DE with a cancel signal that fires immediately, so it never
        // completes a generation beyond its random initial population.
        let de_outcome = de::optimize(&matrix, &avg_tm, &cfg, &|| true);
        assert_eq!(de_outcome.generations_completed, 0);

        let warnings = collect_warnings(&de_outcome, baseline_cost.total, cfg.n_pools, cfg.cap);
        assert!(warnings.contains(&Warning::NoImprovement));
    }

    #[test]
    fn collect_warnings_flags_capacity_violation() {
        let de_outcome = DeOutcome {
            assignment: vec![0, 0, 0, 1],
            cost: cost::CostBreakdown {
                dimer: 0.0,
                tm_var: 0.0,
                balance: 0.0,
                constraint: 1.0e6,
                total: 1.0e6,
            },
            generations_completed: 5,
            status: RunStatus::Completed,
        };
        // k=2, cap=2: pool 0 holds 3 members, which overflows.
        let warnings = collect_warnings(&de_outcome, 0.0, 2, 2);
        assert!(warnings.contains(&Warning::CapacityViolated));
    }

    #[test]
    fn collect_warnings_flags_no_improvement_and_status_warnings() {
        let de_outcome = DeOutcome {
            assignment: vec![0, 1],
            cost: cost::CostBreakdown {
                dimer: 5.0,
                tm_var: 0.0,
                balance: 0.0,
                constraint: 0.0,
                total: 5.0,
            },
            generations_completed: 1,
            status: RunStatus::Cancelled,
        };
        // baseline cost of 1.0 is strictly better than the DE's 5.0 total.
        let warnings = collect_warnings(&de_outcome, 1.0, 2, 10);
        assert!(warnings.contains(&Warning::Cancelled));
        assert!(warnings.contains(&Warning::NoImprovement));
        assert!(!warnings.contains(&Warning::CapacityViolated));
    }

    #[test]
    fn collect_warnings_empty_when_run_is_clean() {
        let de_outcome = DeOutcome {
            assignment: vec![0, 1],
            cost: cost::CostBreakdown {
                dimer: 0.0,
                tm_var: 0.0,
                balance: 0.0,
                constraint: 0.0,
                total: 0.0,
            },
            generations_completed: 10,
            status: RunStatus::Completed,
        };
        // baseline cost of 5.0 is worse than the DE's 0.0 total: genuine improvement.
        let warnings = collect_warnings(&de_outcome, 5.0, 2, 10);
        assert!(warnings.is_empty());
    }
}
