//! The ExactMatch scorer (C6): used when a filter pre-selects at most `k`
//! documents on a segment, so approximation gains nothing.

use crate::error::Result;
use crate::filter::DocIdSet;
use crate::forward_index::ForwardIndexReader;
use crate::query::SparseQueryContext;

use super::{OnHit, ScanOutcome};

pub struct ExactMatchScorer<'a, R> {
    pub query: &'a SparseQueryContext,
    pub filter: &'a DocIdSet,
    pub forward_index: &'a R,
    pub rescale: f32,
}

impl<'a, R> ExactMatchScorer<'a, R>
where
    R: ForwardIndexReader,
{
    pub fn new(query: &'a SparseQueryContext, filter: &'a DocIdSet, forward_index: &'a R, rescale: f32) -> Self {
        Self {
            query,
            filter,
            forward_index,
            rescale,
        }
    }

    /// Scores every candidate in the filter bitset via full dot product; 0
    /// if the document has no vector.
    pub fn run(&self, on_hit: &mut OnHit<'_>) -> Result<ScanOutcome> {
        let dense_query = self.query.query().dense();
        for doc_id in self.filter.iter() {
            let score = match self.forward_index.read(doc_id)? {
                Some(vector) => vector.dot_product(dense_query) as f32 * self.rescale,
                None => 0.0,
            };
            if matches!(on_hit(doc_id, score), ScanOutcome::EarlyTerminate) {
                return Ok(ScanOutcome::EarlyTerminate);
            }
        }
        Ok(ScanOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward_index::{ForwardIndex, ForwardIndexWriter};
    use crate::quantize::ByteQuantizer;
    use crate::sparse_vector::SparseVector;
    use std::collections::HashMap;

    #[test]
    fn scenario_four_filter_cardinality_equals_k() {
        // k=3, filter={5,7,9}, dot products yield 3,1,2 respectively.
        let quantizer = ByteQuantizer::new(10.0).unwrap();
        let mut forward = ForwardIndex::with_capacity(10);
        forward
            .write(5, SparseVector::from_sorted_items(vec![(1, quantizer.quantize(3.0))]).unwrap())
            .unwrap();
        forward
            .write(7, SparseVector::from_sorted_items(vec![(1, quantizer.quantize(1.0))]).unwrap())
            .unwrap();
        forward
            .write(9, SparseVector::from_sorted_items(vec![(1, quantizer.quantize(2.0))]).unwrap())
            .unwrap();

        let query_tokens = HashMap::from([(1u32, 1.0)]);
        let ctx = SparseQueryContext::new(&query_tokens, &quantizer, 10, 3, 1.0).unwrap();
        let filter = DocIdSet::from_doc_ids(vec![5, 7, 9]);
        let scorer = ExactMatchScorer::new(&ctx, &filter, &forward, 1.0);

        let mut hits = Vec::new();
        scorer
            .run(&mut |doc, score| {
                hits.push((doc, score));
                ScanOutcome::Completed
            })
            .unwrap();

        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        let ordered: Vec<u32> = hits.iter().map(|&(doc, _)| doc).collect();
        assert_eq!(ordered, vec![5, 9, 7]);
    }

    #[test]
    fn missing_vector_scores_zero() {
        let quantizer = ByteQuantizer::new(10.0).unwrap();
        let forward = ForwardIndex::with_capacity(1);
        let query_tokens = HashMap::from([(1u32, 1.0)]);
        let ctx = SparseQueryContext::new(&query_tokens, &quantizer, 10, 3, 1.0).unwrap();
        let filter = DocIdSet::from_doc_ids(vec![0]);
        let scorer = ExactMatchScorer::new(&ctx, &filter, &forward, 1.0);

        let mut scored = None;
        scorer
            .run(&mut |doc, score| {
                scored = Some((doc, score));
                ScanOutcome::Completed
            })
            .unwrap();
        assert_eq!(scored, Some((0, 0.0)));
    }
}
