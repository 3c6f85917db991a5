//! The two-phase scorer: phase-one candidate selection into a bounded
//! min-heap, followed by phase-two refinement whose scores are summed in
//! where phase-two actually covers a candidate.

use crate::error::Result;

use super::{OnHit, ScanOutcome, ScorerVariant};
use crate::heap::BoundedMinHeap;

/// Packs `(score, doc_id)` into a single `i64`: the score's sortable bit
/// pattern in the high 32 bits, `i32::MAX - doc_id` in the low 32 bits.
/// Because every score produced by this crate's scorers is a
/// non-negative dot product, the raw IEEE-754 bit pattern already sorts
/// consistently with the float value (the sign bit is always 0), so no
/// additional bit-flipping is needed.
fn pack(score: f32, doc_id: u32) -> i64 {
    let score_bits = score.to_bits() as i64;
    let doc_key = (i32::MAX as i64) - (doc_id as i64);
    (score_bits << 32) | (doc_key & 0xFFFF_FFFF)
}

fn unpack_doc_id(packed: i64) -> u32 {
    let doc_key = (packed & 0xFFFF_FFFF) as i32;
    (i32::MAX - doc_key) as u32
}

fn unpack_score(packed: i64) -> f32 {
    let score_bits = ((packed >> 32) & 0xFFFF_FFFF) as u32;
    f32::from_bits(score_bits)
}

pub struct TwoPhaseScorer<'a, R> {
    pub phase_one: ScorerVariant<'a, R>,
    pub phase_two: ScorerVariant<'a, R>,
    pub window_size: usize,
}

impl<'a, R> TwoPhaseScorer<'a, R>
where
    R: crate::forward_index::ForwardIndexReader,
{
    pub fn new(phase_one: ScorerVariant<'a, R>, phase_two: ScorerVariant<'a, R>, window_size: usize) -> Self {
        Self {
            phase_one,
            phase_two,
            window_size,
        }
    }

    pub fn run(&mut self, on_hit: &mut OnHit<'_>) -> Result<ScanOutcome> {
        let mut retained: BoundedMinHeap<i64> = BoundedMinHeap::new(self.window_size);
        self.phase_one.run(&mut |doc_id, score| {
            retained.try_insert(pack(score, doc_id));
            ScanOutcome::Completed
        })?;

        let mut phase_one_sorted: Vec<(u32, f32)> = retained
            .into_vec()
            .into_iter()
            .map(|packed| (unpack_doc_id(packed), unpack_score(packed)))
            .collect();
        phase_one_sorted.sort_unstable_by_key(|&(doc, _)| doc);

        let mut phase_two_hits: Vec<(u32, f32)> = Vec::new();
        self.phase_two.run(&mut |doc_id, score| {
            phase_two_hits.push((doc_id, score));
            ScanOutcome::Completed
        })?;
        phase_two_hits.sort_unstable_by_key(|&(doc, _)| doc);

        // The phase-two cursor only advances forward, never seeks backwards.
        let mut p2_cursor = 0usize;
        for &(doc_id, p1_score) in &phase_one_sorted {
            while p2_cursor < phase_two_hits.len() && phase_two_hits[p2_cursor].0 < doc_id {
                p2_cursor += 1;
            }
            let combined = if p2_cursor < phase_two_hits.len() && phase_two_hits[p2_cursor].0 == doc_id {
                p1_score + phase_two_hits[p2_cursor].1
            } else {
                p1_score
            };

            if matches!(on_hit(doc_id, combined), ScanOutcome::EarlyTerminate) {
                return Ok(ScanOutcome::EarlyTerminate);
            }
        }

        Ok(ScanOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DocIdSet;
    use crate::forward_index::{ForwardIndex, ForwardIndexWriter};
    use crate::quantize::ByteQuantizer;
    use crate::query::SparseQueryContext;
    use crate::scorer::ExactMatchScorer;
    use std::collections::HashMap;

    #[test]
    fn pack_unpack_round_trip_and_tie_break() {
        let a = pack(2.5, 10);
        let b = pack(2.5, 3);
        // same score, smaller doc id packs to a larger key (stronger).
        assert!(b > a);
        assert_eq!(unpack_doc_id(a), 10);
        assert!((unpack_score(a) - 2.5).abs() < f32::EPSILON);
    }

    #[test]
    fn scenario_three_two_phase_merge() {
        // phase one: (1,1.0) (2,2.0) (3,3.0) (4,0.5), k=2, expansion=2.0 -> window=4
        // phase two: only doc 2 with score 0.5
        // expected emission ascending doc id: 1->1.0, 2->2.5, 3->3.0, 4->0.5
        // downstream top-2: (3,3.0), (2,2.5)
        let quantizer = ByteQuantizer::new(10.0).unwrap();
        let mut forward = ForwardIndex::with_capacity(5);
        forward
            .write(1, crate::sparse_vector::SparseVector::from_sorted_items(vec![(1, quantizer.quantize(1.0))]).unwrap())
            .unwrap();
        forward
            .write(2, crate::sparse_vector::SparseVector::from_sorted_items(vec![(1, quantizer.quantize(2.0))]).unwrap())
            .unwrap();
        forward
            .write(3, crate::sparse_vector::SparseVector::from_sorted_items(vec![(1, quantizer.quantize(3.0))]).unwrap())
            .unwrap();
        forward
            .write(4, crate::sparse_vector::SparseVector::from_sorted_items(vec![(1, quantizer.quantize(0.5))]).unwrap())
            .unwrap();

        let query_tokens = HashMap::from([(1u32, 1.0)]);
        let ctx = SparseQueryContext::new(&query_tokens, &quantizer, 10, 2, 1.0).unwrap();

        let p1_filter = DocIdSet::from_doc_ids(vec![1, 2, 3, 4]);
        let p1 = ExactMatchScorer::new(&ctx, &p1_filter, &forward, 1.0);
        let p2_filter = DocIdSet::from_doc_ids(vec![2]);
        let p2 = ExactMatchScorer::new(&ctx, &p2_filter, &forward, 1.0);

        let mut two_phase = TwoPhaseScorer::new(
            ScorerVariant::ExactMatch(p1),
            ScorerVariant::ExactMatch(p2),
            4,
        );

        let mut hits = Vec::new();
        two_phase
            .run(&mut |doc, score| {
                hits.push((doc, score));
                ScanOutcome::Completed
            })
            .unwrap();

        // Ascending doc-id emission order.
        assert_eq!(hits.iter().map(|&(d, _)| d).collect::<Vec<_>>(), vec![1, 2, 3, 4]);

        let p1_only = |weight: f32| quantizer.quantize(weight) as f32;
        // doc 2 combines phase-one and phase-two contributions; every other
        // doc keeps only its phase-one score, since phase two only covers doc 2.
        assert!((hits[0].1 - p1_only(1.0)).abs() < f32::EPSILON);
        assert!((hits[1].1 - 2.0 * p1_only(2.0)).abs() < f32::EPSILON);
        assert!((hits[2].1 - p1_only(3.0)).abs() < f32::EPSILON);
        assert!((hits[3].1 - p1_only(0.5)).abs() < f32::EPSILON);

        let mut ranked = hits.clone();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        let top2: Vec<u32> = ranked.into_iter().take(2).map(|(d, _)| d).collect();
        assert_eq!(top2, vec![3, 2]);
    }
}
