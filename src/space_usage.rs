//! Byte-size accounting, kept from the reference crate's `SpaceUsage`
//! trait. The forward-index cache's circuit breaker expresses its limit as
//! a percentage of a memory budget, which requires some notion of how many
//! bytes a structure currently occupies.

use crate::forward_index::ForwardIndex;
use crate::posting_list::{DocumentCluster, PostingClusters};
use crate::sparse_vector::SparseVector;

pub trait SpaceUsage {
    /// Approximate heap footprint in bytes, not counting stack size of the
    /// value itself.
    fn space_usage_byte(&self) -> usize;
}

impl SpaceUsage for SparseVector {
    fn space_usage_byte(&self) -> usize {
        self.items().len() * std::mem::size_of::<(u16, u8)>()
    }
}

impl SpaceUsage for DocumentCluster {
    fn space_usage_byte(&self) -> usize {
        self.summary.space_usage_byte() + self.postings.len() * std::mem::size_of::<(u32, u8)>()
    }
}

impl SpaceUsage for PostingClusters {
    fn space_usage_byte(&self) -> usize {
        self.iter().map(SpaceUsage::space_usage_byte).sum()
    }
}

impl SpaceUsage for ForwardIndex {
    fn space_usage_byte(&self) -> usize {
        self.iter_present()
            .map(|v| v.space_usage_byte() + std::mem::size_of::<Option<SparseVector>>())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward_index::ForwardIndexWriter;

    #[test]
    fn empty_sparse_vector_has_zero_usage() {
        assert_eq!(SparseVector::empty().space_usage_byte(), 0);
    }

    #[test]
    fn forward_index_usage_grows_with_writes() {
        let mut index = ForwardIndex::with_capacity(2);
        let before = index.space_usage_byte();
        index
            .write(0, SparseVector::from_sorted_items(vec![(1, 5), (2, 9)]).unwrap())
            .unwrap();
        assert!(index.space_usage_byte() > before);
    }
}
