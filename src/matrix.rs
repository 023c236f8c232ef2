//! Parallel pairwise interaction matrix construction (§4.3, §5).

use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use tracing::debug;

use crate::dimer::pair_score;
use crate::encoder::EncodedPrimer;
use crate::error::{EngineError, PairIndex};

/// A minimum number of cells per dispatched chunk, so scheduling overhead
/// doesn't dominate for small jobs (§4.3: "rule of thumb: >= a few hundred
/// cells per chunk").
const MIN_CHUNK_CELLS: usize = 256;

/// The symmetric N x N matrix of pairwise dimer interaction scores.
///
/// Stored row-major and flat; `M[i,i]` (the self-score) is retained rather
/// than zeroed, matching the scorer's treatment of self-interaction as
/// informative (flags self-dimers and fwd/rev hairpin-ish patterns).
#[derive(Debug, Clone)]
pub struct InteractionMatrix {
    n: usize,
    data: Vec<f64>,
}

impl InteractionMatrix {
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    #[inline]
    fn set_pair(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.n + j] = value;
        self.data[j * self.n + i] = value;
    }
}

/// Build the interaction matrix for an encoded primer set.
///
/// The upper-triangle index set `{(i, j): i <= j < N}` is split into chunks
/// and scored in parallel via rayon; each chunk's results are pure and
/// independent, so they are collected and written back in one pass rather
/// than requiring synchronized shared-memory writes. If scoring any pair
/// panics, the whole build fails with [`EngineError::MatrixBuildFailed`] and
/// no partial matrix is returned.
pub fn build_matrix(encoded: &[EncodedPrimer]) -> Result<InteractionMatrix, EngineError> {
    let n = encoded.len();
    let pairs: Vec<(usize, usize)> = (0..n).flat_map(|i| (i..n).map(move |j| (i, j))).collect();

    debug!(n, pairs = pairs.len(), "building interaction matrix");

    let chunk_size = (pairs.len() / rayon::current_num_threads().max(1))
        .max(MIN_CHUNK_CELLS)
        .max(1);

    let scored: Result<Vec<(usize, usize, f64)>, EngineError> = pairs
        .par_chunks(chunk_size)
        .map(|chunk| -> Result<Vec<(usize, usize, f64)>, EngineError> {
            chunk
                .iter()
                .map(|&(i, j)| {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        pair_score(&encoded[i], &encoded[j]) as f64
                    }));
                    result.map(|score| (i, j, score)).map_err(|payload| {
                        let cause = payload
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| payload.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "panic in dimer scorer".to_string());
                        EngineError::MatrixBuildFailed {
                            pair: PairIndex { i, j },
                            cause,
                        }
                    })
                })
                .collect()
        })
        .collect::<Result<Vec<Vec<_>>, _>>()
        .map(|chunks| chunks.into_iter().flatten().collect());

    let scored = scored?;

    let mut matrix = InteractionMatrix {
        n,
        data: vec![0.0; n * n],
    };
    for (i, j, score) in scored {
        matrix.set_pair(i, j, score);
    }

    debug!(n, "interaction matrix built");
    Ok(matrix)
}
