//! Immutable query-time contexts: `SparseQueryContext` and
//! `TwoPhaseParams`.

use std::collections::HashMap;

use crate::error::{Result, SeismicError};
use crate::quantize::ByteQuantizer;
use crate::sparse_vector::QueryVector;

/// Immutable, per-execution query context for the SEISMIC scorer (C5).
///
/// `tokens` holds up to `top_n` token ids with non-zero query weight,
/// sorted by descending query weight — this is the order C5 visits
/// per-token postings in.
#[derive(Debug, Clone)]
pub struct SparseQueryContext {
    query: QueryVector,
    tokens: Vec<u16>,
    k: usize,
    heap_factor: f32,
}

impl SparseQueryContext {
    /// Builds a context from raw `token_id -> weight` query tokens.
    ///
    /// Defaults: `top_n = 10`, `k = 10`, `heap_factor = 1.0`.
    /// Fails with `InvalidArgument` on non-positive `top_n`/`k` or
    /// non-positive `heap_factor`.
    pub fn new(
        query_tokens: &HashMap<u32, f32>,
        quantizer: &ByteQuantizer,
        top_n: usize,
        k: usize,
        heap_factor: f32,
    ) -> Result<Self> {
        if top_n == 0 {
            return Err(SeismicError::InvalidArgument(
                "top_n must be positive".into(),
            ));
        }
        if k == 0 {
            return Err(SeismicError::InvalidArgument("k must be positive".into()));
        }
        if !(heap_factor.is_finite()) || heap_factor <= 0.0 {
            return Err(SeismicError::InvalidArgument(format!(
                "heap_factor must be positive and finite, got {heap_factor}"
            )));
        }

        let mut by_weight: Vec<(u16, f32)> = query_tokens
            .iter()
            .map(|(&token_id, &weight)| ((token_id & 0xFFFF) as u16, weight))
            .filter(|&(_, weight)| weight != 0.0)
            .collect();
        by_weight.sort_unstable_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        by_weight.truncate(top_n);

        let sparse =
            crate::sparse_vector::SparseVector::from_map(&query_tokens_as_map(&by_weight), quantizer)?;
        let query = QueryVector::new(sparse);

        let tokens = by_weight.into_iter().map(|(token, _)| token).collect();

        Ok(Self {
            query,
            tokens,
            k,
            heap_factor,
        })
    }

    pub fn query(&self) -> &QueryVector {
        &self.query
    }

    pub fn tokens(&self) -> &[u16] {
        &self.tokens
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn heap_factor(&self) -> f32 {
        self.heap_factor
    }
}

fn query_tokens_as_map(by_weight: &[(u16, f32)]) -> HashMap<u32, f32> {
    by_weight
        .iter()
        .map(|&(token, weight)| (token as u32, weight))
        .collect()
}

/// The pruning-ratio type a two-phase request selects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PruneType {
    MaxRatio,
}

/// Immutable two-phase scoring parameters.
#[derive(Debug, Clone, Copy)]
pub struct TwoPhaseParams {
    pub prune_type: PruneType,
    pub prune_ratio: f32,
    pub expansion_ratio: f32,
    pub max_window_size: usize,
}

impl TwoPhaseParams {
    pub fn new(
        prune_type: PruneType,
        prune_ratio: f32,
        expansion_ratio: f32,
        max_window_size: usize,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&prune_ratio) || prune_ratio <= 0.0 {
            return Err(SeismicError::InvalidArgument(format!(
                "prune_ratio must be in (0, 1], got {prune_ratio}"
            )));
        }
        if expansion_ratio < 1.0 {
            return Err(SeismicError::InvalidArgument(format!(
                "expansion_ratio must be >= 1.0, got {expansion_ratio}"
            )));
        }
        if max_window_size < 50 {
            return Err(SeismicError::InvalidArgument(format!(
                "max_window_size must be >= 50, got {max_window_size}"
            )));
        }
        Ok(Self {
            prune_type,
            prune_ratio,
            expansion_ratio,
            max_window_size,
        })
    }

    /// Phase-one result set size: `ceil(k * expansion_ratio)`, capped at
    /// `max_window_size`.
    pub fn window_size(&self, k: usize) -> usize {
        let raw = (k as f32 * self.expansion_ratio).ceil() as usize;
        raw.min(self.max_window_size).max(1)
    }
}
