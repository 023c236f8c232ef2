//! Structured error taxonomy for the primer pool engine.
//!
//! Every fallible entry point returns `Result<_, EngineError>`. Nothing in
//! this crate panics on malformed input; `InvalidInput` and friends are the
//! only way a caller-supplied problem surfaces.

use thiserror::Error;

/// A single failed pairwise interaction score, attached to [`EngineError::MatrixBuildFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairIndex {
    pub i: usize,
    pub j: usize,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid sequence for primer {id:?}: {reason}")]
    InvalidSequence { id: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("infeasible capacity: {n} primers cannot fit in {k} pools of capacity {cap} each")]
    InfeasibleCapacity { n: usize, k: usize, cap: usize },

    #[error("matrix build failed at pair ({}, {}): {cause}", .pair.i, .pair.j)]
    MatrixBuildFailed { pair: PairIndex, cause: String },
}

/// A non-fatal condition attached to an otherwise-successful [`crate::report::OptimizeOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// The run was cooperatively cancelled before convergence.
    Cancelled,
    /// The soft wall-clock budget elapsed before convergence.
    TimeBudgetExhausted,
    /// The best assignment found did not improve on the fast-binner seed.
    NoImprovement,
    /// The best assignment found at termination still exceeds capacity in at
    /// least one pool (the soft penalty did not fully eliminate the
    /// violation within the search budget).
    CapacityViolated,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::Cancelled => write!(f, "cancelled before convergence"),
            Warning::TimeBudgetExhausted => write!(f, "time budget exhausted before convergence"),
            Warning::NoImprovement => write!(f, "final best did not improve on fast-binner seed"),
            Warning::CapacityViolated => write!(f, "best assignment still exceeds capacity in at least one pool"),
        }
    }
}
