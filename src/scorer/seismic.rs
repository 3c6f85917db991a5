//! The SEISMIC scorer: per-token cluster iteration with skip decisions
//! driven by a running top-k heap and a heap-factor threshold.

use std::collections::HashSet;

use crate::error::Result;
use crate::filter::DocIdSet;
use crate::forward_index::ForwardIndexReader;
use crate::heap::{BoundedMinHeap, ScoredDoc};
use crate::posting_list::PostingListStore;
use crate::query::SparseQueryContext;

use super::{OnHit, ScanOutcome};

/// Capacity of the running score heap used for skip decisions, a small
/// constant independent of the query's `k`.
pub const DEFAULT_SKIP_HEAP_CAPACITY: usize = 10;

pub struct SeismicScorer<'a, R> {
    pub query: &'a SparseQueryContext,
    pub posting_store: &'a dyn PostingListStore,
    pub forward_index: &'a R,
    pub accepted_docs: Option<&'a DocIdSet>,
    pub rescale: f32,
    pub skip_heap_capacity: usize,
}

impl<'a, R> SeismicScorer<'a, R>
where
    R: ForwardIndexReader,
{
    pub fn new(
        query: &'a SparseQueryContext,
        posting_store: &'a dyn PostingListStore,
        forward_index: &'a R,
        accepted_docs: Option<&'a DocIdSet>,
        rescale: f32,
    ) -> Self {
        Self {
            query,
            posting_store,
            forward_index,
            accepted_docs,
            rescale,
            skip_heap_capacity: DEFAULT_SKIP_HEAP_CAPACITY,
        }
    }

    /// Runs the per-token, per-cluster scan, emitting `(doc_id, score)` to
    /// `on_hit` for every scored candidate.
    ///
    /// `should_not_skip` bypasses only the summary-score skip decision; the
    /// per-document filter check still applies — a filter always wins over
    /// a cluster's `should_not_skip` flag.
    pub fn run(&self, on_hit: &mut OnHit<'_>) -> Result<ScanOutcome> {
        let mut score_heap: BoundedMinHeap<ScoredDoc> = BoundedMinHeap::new(self.skip_heap_capacity);
        let mut visited: HashSet<u32> = HashSet::new();
        let dense_query = self.query.query().dense();
        let heap_factor = self.query.heap_factor();

        for &token in self.query.tokens() {
            let Some(clusters) = self.posting_store.postings_for(token) else {
                continue;
            };

            for cluster in clusters.iter() {
                let enter = cluster.should_not_skip || {
                    if !score_heap.is_full() {
                        true
                    } else {
                        let s = cluster.summary.dot_product(dense_query) as f32;
                        let min_in_heap = score_heap.peek_min().expect("heap is full").score as f32;
                        s >= min_in_heap / heap_factor
                    }
                };
                if !enter {
                    continue;
                }

                for &(doc_id, _weight) in &cluster.postings {
                    if let Some(accepted) = self.accepted_docs {
                        if !accepted.contains(doc_id) {
                            continue;
                        }
                    }
                    if !visited.insert(doc_id) {
                        continue;
                    }
                    let Some(vector) = self.forward_index.read(doc_id)? else {
                        continue;
                    };
                    let raw_score = vector.dot_product(dense_query);
                    score_heap.try_insert(ScoredDoc {
                        doc_id,
                        score: raw_score,
                    });

                    let scaled = raw_score as f32 * self.rescale;
                    if matches!(on_hit(doc_id, scaled), ScanOutcome::EarlyTerminate) {
                        return Ok(ScanOutcome::EarlyTerminate);
                    }
                }
            }
        }

        Ok(ScanOutcome::Completed)
    }
}
