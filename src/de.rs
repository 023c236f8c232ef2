//! Differential-evolution combinatorial optimizer (§4.6).
//!
//! Genomes live in R^(N,K) and are decoded to a discrete assignment by
//! per-row argmax; DE's mutation/crossover stay in their native continuous
//! domain while the cost evaluator only ever sees the decoded assignment.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use crate::config::{EngineConfig, DEFAULT_EPSILON, DEFAULT_STAGNATION_GENERATIONS};
use crate::cost::{self, CostBreakdown};
use crate::matrix::InteractionMatrix;

/// How an `optimize` run concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Ran to completion: max generations reached or early-stopped on stagnation.
    Completed,
    /// Cooperatively cancelled at a generation boundary.
    Cancelled,
    /// Soft wall-clock budget exceeded at a generation boundary.
    TimeBudgetExhausted,
}

/// Best assignment found plus everything needed to build a report.
#[derive(Debug, Clone)]
pub struct DeOutcome {
    pub assignment: Vec<usize>,
    pub cost: CostBreakdown,
    pub generations_completed: usize,
    pub status: RunStatus,
}

/// Cooperative cancellation, checked at generation boundaries (§5). A plain
/// closure rather than a concrete channel type, so callers can back it with
/// whatever signal (atomic flag, oneshot receiver, deadline) fits their host.
pub trait CancelSignal {
    fn is_cancelled(&self) -> bool;
}

impl<F: Fn() -> bool> CancelSignal for F {
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// A `CancelSignal` that never fires, for callers with nothing to cancel on.
pub struct NeverCancel;
impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

#[derive(Clone)]
struct Member {
    genome: Vec<f64>,
    assignment: Vec<usize>,
    cost: CostBreakdown,
}

fn decode(genome: &[f64], n: usize, k: usize) -> Vec<usize> {
    let mut assignment = Vec::with_capacity(n);
    for i in 0..n {
        let row = &genome[i * k..(i + 1) * k];
        let mut best_k = 0usize;
        let mut best_v = row[0];
        for (kk, &v) in row.iter().enumerate().skip(1) {
            if v > best_v {
                best_v = v;
                best_k = kk;
            }
        }
        assignment.push(best_k);
    }
    assignment
}

fn evaluate_genome(
    genome: Vec<f64>,
    n: usize,
    k: usize,
    matrix: &InteractionMatrix,
    avg_tm: &[f64],
    config: &EngineConfig,
) -> Member {
    let assignment = decode(&genome, n, k);
    let cost = cost::evaluate(&assignment, matrix, avg_tm, config);
    Member {
        genome,
        assignment,
        cost,
    }
}

/// Sample three indices in `0..pop_size`, all distinct from each other and
/// from `target`, deterministically from `rng`.
fn sample_distinct_trio(rng: &mut StdRng, target: usize, pop_size: usize) -> (usize, usize, usize) {
    let mut r1 = rng.gen_range(0..pop_size);
    while r1 == target {
        r1 = rng.gen_range(0..pop_size);
    }
    let mut r2 = rng.gen_range(0..pop_size);
    while r2 == target || r2 == r1 {
        r2 = rng.gen_range(0..pop_size);
    }
    let mut r3 = rng.gen_range(0..pop_size);
    while r3 == target || r3 == r1 || r3 == r2 {
        r3 = rng.gen_range(0..pop_size);
    }
    (r1, r2, r3)
}

/// Build one DE/rand/1/bin trial genome for `target`, driven entirely by a
/// per-target `StdRng` so the outcome doesn't depend on evaluation order.
fn make_trial(rng: &mut StdRng, population: &[Member], target: usize, f: f64, cr: f64) -> Vec<f64> {
    let pop_size = population.len();
    let (r1, r2, r3) = sample_distinct_trio(rng, target, pop_size);
    let dim = population[target].genome.len();
    let forced = rng.gen_range(0..dim);

    let mut trial = Vec::with_capacity(dim);
    for j in 0..dim {
        let mutant = population[r1].genome[j] + f * (population[r2].genome[j] - population[r3].genome[j]);
        let from_mutant = j == forced || rng.gen::<f64>() < cr;
        trial.push(if from_mutant {
            mutant
        } else {
            population[target].genome[j]
        });
    }
    trial
}

/// Run the DE search to completion, early stop, cancellation, or time budget.
pub fn optimize(
    matrix: &InteractionMatrix,
    avg_tm: &[f64],
    config: &EngineConfig,
    cancel: &impl CancelSignal,
) -> DeOutcome {
    let n = avg_tm.len();
    let k = config.n_pools;
    let pop_size = config.population_size();
    let start = Instant::now();

    let mut rng = StdRng::seed_from_u64(config.rng_seed);

    debug!(n, k, pop_size, max_generations = config.max_generations, "starting DE search");

    let mut population: Vec<Member> = (0..pop_size)
        .map(|_| {
            let genome: Vec<f64> = (0..n * k).map(|_| rng.gen::<f64>()).collect();
            evaluate_genome(genome, n, k, matrix, avg_tm, config)
        })
        .collect();

    // Opt-in (§9 open question, resolved off-by-default): seed one member
    // from the fast-binner assignment instead of leaving the whole initial
    // population uniformly random.
    if config.seed_from_binner && !population.is_empty() {
        let binner_assignment = crate::binner::fast_bin(avg_tm, k);
        let mut genome = vec![0.0f64; n * k];
        for (i, &pool) in binner_assignment.iter().enumerate() {
            genome[i * k + pool] = 1.0;
        }
        population[0] = evaluate_genome(genome, n, k, matrix, avg_tm, config);
    }

    let mut best_idx = best_member_index(&population);
    let mut best_cost = population[best_idx].cost.total;
    let mut generations_completed = 0usize;
    let mut stagnant_generations = 0usize;
    let mut status = RunStatus::Completed;

    'generations: for _generation in 0..config.max_generations {
        if cancel.is_cancelled() {
            status = RunStatus::Cancelled;
            break 'generations;
        }
        if let Some(budget) = config.time_budget {
            if start.elapsed() >= budget {
                status = RunStatus::TimeBudgetExhausted;
                break 'generations;
            }
        }

        // Per-target seeds are drawn sequentially from the job RNG so trial
        // construction can run in parallel without perturbing determinism.
        let target_seeds: Vec<u64> = (0..pop_size).map(|_| rng.gen::<u64>()).collect();

        let trials: Vec<Member> = (0..pop_size)
            .into_par_iter()
            .map(|t| {
                let mut target_rng = StdRng::seed_from_u64(target_seeds[t]);
                let trial_genome = make_trial(&mut target_rng, &population, t, config.f, config.cr);
                evaluate_genome(trial_genome, n, k, matrix, avg_tm, config)
            })
            .collect();

        // Selection is strictly sequential over `t` so the outcome never
        // depends on how rayon scheduled the trial evaluations above.
        for (t, trial) in trials.into_iter().enumerate() {
            if trial.cost.total <= population[t].cost.total {
                population[t] = trial;
            }
        }

        best_idx = best_member_index(&population);
        let candidate = population[best_idx].cost.total;
        let relative_improvement = if best_cost.abs() > f64::EPSILON {
            (best_cost - candidate) / best_cost.abs()
        } else {
            best_cost - candidate
        };
        if relative_improvement > DEFAULT_EPSILON {
            stagnant_generations = 0;
        } else {
            stagnant_generations += 1;
        }
        best_cost = best_cost.min(candidate);
        generations_completed += 1;

        if stagnant_generations >= DEFAULT_STAGNATION_GENERATIONS {
            debug!(generations_completed, best_cost, "DE early-stopped on stagnation");
            break 'generations;
        }
    }

    let best = &population[best_idx];
    debug!(generations_completed, best_cost = best.cost.total, ?status, "DE search finished");

    DeOutcome {
        assignment: best.assignment.clone(),
        cost: best.cost,
        generations_completed,
        status,
    }
}

fn best_member_index(population: &[Member]) -> usize {
    population
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cost.total.partial_cmp(&b.cost.total).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(idx, _)| idx)
        .expect("population is never empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_primers;
    use crate::matrix::build_matrix;
    use crate::primer::Primer;

    fn sample(n: usize) -> (InteractionMatrix, Vec<f64>) {
        let primers: Vec<Primer> = (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Primer::new(format!("p{i}"), "g", "AAAAAAAAAA", "AAAAAAAAAA")
                } else {
                    Primer::new(format!("p{i}"), "g", "GGGGGGGGGG", "GGGGGGGGGG")
                }
            })
            .collect();
        let encoded = encode_primers(&primers).unwrap();
        let matrix = build_matrix(&encoded).unwrap();
        let avg_tm = encoded.iter().map(|p| p.avg_tm).collect();
        (matrix, avg_tm)
    }

    #[test]
    fn assignment_is_valid() {
        let (matrix, avg_tm) = sample(8);
        let mut cfg = EngineConfig::new(2, 4).unwrap();
        cfg.max_generations = 20;
        let outcome = optimize(&matrix, &avg_tm, &cfg, &NeverCancel);
        assert_eq!(outcome.assignment.len(), 8);
        assert!(outcome.assignment.iter().all(|&p| p < 2));
    }

    #[test]
    fn seed_from_binner_decodes_to_the_binner_assignment_initially() {
        let (matrix, avg_tm) = sample(8);
        let mut cfg = EngineConfig::new(2, 4).unwrap();
        cfg.max_generations = 0;
        cfg.seed_from_binner = true;
        let outcome = optimize(&matrix, &avg_tm, &cfg, &NeverCancel);
        let expected = crate::binner::fast_bin(&avg_tm, 2);
        // With zero generations the population never transitions, so the
        // seeded member (guaranteed to be evaluated) must be at least as
        // good as the binner's own cost.
        let binner_cost = cost::evaluate(&expected, &matrix, &avg_tm, &cfg);
        assert!(outcome.cost.total <= binner_cost.total + 1e-9);
    }

    #[test]
    fn determinism_across_runs() {
        let (matrix, avg_tm) = sample(12);
        let mut cfg = EngineConfig::new(3, 6).unwrap();
        cfg.max_generations = 15;
        let a = optimize(&matrix, &avg_tm, &cfg, &NeverCancel);
        let b = optimize(&matrix, &avg_tm, &cfg, &NeverCancel);
        assert_eq!(a.assignment, b.assignment);
        assert_eq!(a.cost.total, b.cost.total);
    }

    #[test]
    fn cancellation_stops_after_first_generation() {
        let (matrix, avg_tm) = sample(40);
        let mut cfg = EngineConfig::new(3, 20).unwrap();
        cfg.max_generations = 1000;
        let seen = std::cell::Cell::new(0u32);
        let cancel = || {
            let n = seen.get() + 1;
            seen.set(n);
            n > 1
        };
        let outcome = optimize(&matrix, &avg_tm, &cfg, &cancel);
        assert_eq!(outcome.status, RunStatus::Cancelled);
        assert!(outcome.generations_completed >= 1);
    }

    #[test]
    fn cost_never_increases_across_successive_budgets() {
        let (matrix, avg_tm) = sample(10);
        let mut cfg = EngineConfig::new(2, 5).unwrap();
        cfg.max_generations = 5;
        let short = optimize(&matrix, &avg_tm, &cfg, &NeverCancel);
        cfg.max_generations = 40;
        let long = optimize(&matrix, &avg_tm, &cfg, &NeverCancel);
        assert!(long.cost.total <= short.cost.total + 1e-9);
    }
}
