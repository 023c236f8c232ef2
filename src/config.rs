//! Tunable parameters for the engine, bundled into one validated struct.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Weights for the four cost penalty terms (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub dimer: f64,
    pub tm_var: f64,
    pub balance: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            dimer: 1.0,
            tm_var: 1.0,
            balance: 0.5,
        }
    }
}

/// Weight applied to the capacity-overflow term; chosen so it dominates any
/// realistic combination of the other three penalties.
pub const PENALTY_LARGE: f64 = 1.0e6;

/// Relative improvement threshold below which a generation does not count
/// towards resetting the DE optimizer's stagnation counter.
pub const DEFAULT_EPSILON: f64 = 1.0e-6;

/// Number of consecutive non-improving generations before DE stops early.
pub const DEFAULT_STAGNATION_GENERATIONS: usize = 50;

/// Smallest population DE/rand/1/bin can run with: one target plus three
/// distinct donors (`r1`, `r2`, `r3`) sampled from the rest of the population.
/// Below this, `sample_distinct_trio` can loop forever looking for donors
/// that don't exist, and a population of 0 panics `best_member_index`.
pub const MIN_POPULATION_SIZE: usize = 4;

/// Every tunable named by the engine's external interface, in one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of pools K. Must be >= 2.
    pub n_pools: usize,
    /// Maximum primers per pool. Must be >= 1.
    pub cap: usize,
    /// Maximum DE generations.
    pub max_generations: usize,
    /// Cost term weights.
    pub weights: Weights,
    /// Seed for the per-job RNG stream.
    pub rng_seed: u64,
    /// DE mutation factor F, normally in [0.5, 1.0].
    pub f: f64,
    /// DE crossover rate CR, normally in [0.7, 1.0].
    pub cr: f64,
    /// Population size override; `None` uses `max(15, 5*K)` capped at 60.
    pub population_size: Option<usize>,
    /// Soft wall-clock ceiling; checked at generation boundaries.
    pub time_budget: Option<Duration>,
    /// Seed one population member from the fast-binner assignment instead of
    /// drawing it uniformly at random. Off by default (§9 open question).
    pub seed_from_binner: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            n_pools: 2,
            cap: usize::MAX,
            max_generations: 1000,
            weights: Weights::default(),
            rng_seed: 0,
            f: 0.7,
            cr: 0.9,
            population_size: None,
            time_budget: None,
            seed_from_binner: false,
        }
    }
}

impl EngineConfig {
    /// Build a config for the given pool count and capacity, applying all
    /// other defaults, and validate it.
    pub fn new(n_pools: usize, cap: usize) -> Result<Self, EngineError> {
        Self {
            n_pools,
            cap,
            ..Self::default()
        }
        .validated()
    }

    /// Check the invariants the facade relies on (§6, §7) and return `self`
    /// unchanged if they hold.
    pub fn validated(self) -> Result<Self, EngineError> {
        if self.n_pools < 2 {
            return Err(EngineError::InvalidInput(format!(
                "n_pools must be >= 2, got {}",
                self.n_pools
            )));
        }
        if self.cap < 1 {
            return Err(EngineError::InvalidInput(format!(
                "cap must be >= 1, got {}",
                self.cap
            )));
        }
        if self.max_generations < 1 {
            return Err(EngineError::InvalidInput(
                "max_generations must be >= 1".to_string(),
            ));
        }
        if self.weights.dimer < 0.0 || self.weights.tm_var < 0.0 || self.weights.balance < 0.0 {
            return Err(EngineError::InvalidInput(
                "weights must be non-negative".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.f) {
            return Err(EngineError::InvalidInput(format!(
                "mutation factor f should be in [0, 2], got {}",
                self.f
            )));
        }
        if !(0.0..=1.0).contains(&self.cr) {
            return Err(EngineError::InvalidInput(format!(
                "crossover rate cr must be in [0, 1], got {}",
                self.cr
            )));
        }
        if let Some(p) = self.population_size {
            if p < MIN_POPULATION_SIZE {
                return Err(EngineError::InvalidInput(format!(
                    "population_size must be >= {MIN_POPULATION_SIZE} (DE/rand/1/bin needs 3 distinct donors plus the target), got {p}"
                )));
            }
        }
        Ok(self)
    }

    /// DE population size: the explicit override, or `max(15, 5*K)` capped at 60.
    pub fn population_size(&self) -> usize {
        self.population_size
            .unwrap_or_else(|| (5 * self.n_pools).max(15).min(60))
    }
}
