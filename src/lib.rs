//! Primer-pool optimization engine: partitions a set of DNA primer pairs
//! into K disjoint pools for multiplex PCR, minimizing cross-primer
//! dimerization while balancing per-pool melting temperature and size.
//!
//! The pipeline, leaves first: [`encoder`] turns raw sequences into compact
//! numeric form and per-primer thermodynamic scalars; [`dimer`] scores one
//! pair of sequences at a time; [`matrix`] builds the full pairwise score
//! matrix in parallel; [`cost`] turns an assignment into a scalar; [`binner`]
//! gives a fast approximate assignment for interactive preview; [`de`] runs
//! the differential-evolution search that drives the cost function; and
//! [`engine`] ties all of it together behind two entry points,
//! [`engine::fast_preview`] and [`engine::optimize`].

pub mod binner;
pub mod config;
pub mod cost;
pub mod de;
pub mod dimer;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod primer;
pub mod report;
pub mod thermo;

pub use config::{EngineConfig, Weights};
pub use de::{CancelSignal, NeverCancel, RunStatus};
pub use engine::{fast_preview, optimize, optimize_uncancellable};
pub use error::{EngineError, Warning};
pub use primer::Primer;
pub use report::{FastPreview, Metrics, OptimizeOutcome, PoolMember, PoolReport};
