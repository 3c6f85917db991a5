//! Sparse vector representation and dense materialization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeismicError};
use crate::quantize::{dot_product_sparse_dense, ByteQuantizer};

/// Length of the dense byte buffer a [`SparseVector`] materializes into; the
/// short-type range tokens are folded into.
pub const DENSE_LEN: usize = 1 << 16;

/// An ordered, deduplicated list of `(token_id, byte_weight)` pairs.
///
/// Tokens are strictly increasing; construction rejects duplicates (callers
/// that need max-on-collision semantics should go through
/// [`SparseVector::from_map`], which resolves collisions before the
/// invariant is checked).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseVector {
    items: Vec<(u16, u8)>,
}

impl SparseVector {
    pub fn empty() -> Self {
        Self { items: Vec::new() }
    }

    /// Builds a vector from already-sorted, already-deduplicated items.
    /// Returns `InvalidArgument` if tokens are not strictly increasing.
    pub fn from_sorted_items(items: Vec<(u16, u8)>) -> Result<Self> {
        for pair in items.windows(2) {
            if pair[0].0 >= pair[1].0 {
                return Err(SeismicError::InvalidArgument(format!(
                    "tokens must be strictly increasing, got {} then {}",
                    pair[0].0, pair[1].0
                )));
            }
        }
        Ok(Self { items })
    }

    /// Builds from a `token_id -> weight` map, quantizing with `quantizer`.
    /// Token ids are folded to the short-type range by taking their lowest
    /// 16 bits; colliding tokens aggregate by taking the maximum quantized
    /// weight.
    pub fn from_map(weights: &HashMap<u32, f32>, quantizer: &ByteQuantizer) -> Result<Self> {
        let mut folded: HashMap<u16, u8> = HashMap::with_capacity(weights.len());
        for (&token_id, &weight) in weights {
            let short = (token_id & 0xFFFF) as u16;
            let quantized = quantizer.quantize(weight);
            folded
                .entry(short)
                .and_modify(|existing| *existing = (*existing).max(quantized))
                .or_insert(quantized);
        }
        let mut items: Vec<(u16, u8)> = folded.into_iter().collect();
        items.sort_unstable_by_key(|&(token, _)| token);
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(u16, u8)> {
        self.items.iter()
    }

    pub fn items(&self) -> &[(u16, u8)] {
        &self.items
    }

    pub fn weight_of(&self, token: u16) -> Option<u8> {
        self.items
            .binary_search_by_key(&token, |&(t, _)| t)
            .ok()
            .map(|idx| self.items[idx].1)
    }

    /// Materializes this vector as a dense buffer of length [`DENSE_LEN`].
    pub fn to_dense_vector(&self) -> Vec<u8> {
        let mut dense = vec![0u8; DENSE_LEN];
        for &(token, weight) in &self.items {
            dense[token as usize] = weight;
        }
        dense
    }

    /// `sum(weight * dense_query[token])`, as an integer dot product.
    pub fn dot_product(&self, dense_query: &[u8]) -> u32 {
        dot_product_sparse_dense(self.items.iter(), dense_query)
    }
}

/// Semantically a [`SparseVector`] that additionally exposes its dense
/// materialization directly, for `O(|doc|)` dot products against arbitrary
/// documents.
#[derive(Debug, Clone)]
pub struct QueryVector {
    sparse: SparseVector,
    dense: Vec<u8>,
}

impl QueryVector {
    pub fn new(sparse: SparseVector) -> Self {
        let dense = sparse.to_dense_vector();
        Self { sparse, dense }
    }

    pub fn sparse(&self) -> &SparseVector {
        &self.sparse
    }

    pub fn dense(&self) -> &[u8] {
        &self.dense
    }

    pub fn dot_product_with(&self, doc: &SparseVector) -> u32 {
        doc.dot_product(&self.dense)
    }
}
