//! Hybrid collectors: one bounded priority queue per sub-query, pre-sized
//! once the sub-query count is known at first collect — no per-document
//! lazy reallocation.

use crate::heap::{BoundedMinHeap, ScoredDoc};
use crate::scorer::ScanOutcome;
use crate::top_docs::{ScoreDoc, TopDocs, TotalHitsRelation};

use super::threshold::{HitsThresholdChecker, MinCompetitiveScore, SAMPLE_MASK};

/// A fixed-capacity hit queue for one sub-query: a thin, score-oriented
/// facade over `BoundedMinHeap<ScoredDoc>` that stores scores as packed
/// `u32` bit patterns (the same convention the SEISMIC scorer uses
/// internally) so the heap's integer ordering also orders by float score.
pub struct HitQueue {
    heap: BoundedMinHeap<ScoredDoc>,
    total_hits: u64,
}

impl HitQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BoundedMinHeap::new(capacity.max(1)),
            total_hits: 0,
        }
    }

    pub fn collect(&mut self, doc_id: u32, score: f32) {
        self.total_hits += 1;
        let packed = ScoredDoc {
            doc_id,
            score: score.to_bits(),
        };
        self.heap.try_insert(packed);
    }

    /// Whether a hit of `score` could still improve this queue: trivially
    /// true while it has not reached capacity, otherwise true only if it
    /// beats the current weakest (root) entry.
    pub fn could_improve(&self, score: f32) -> bool {
        if !self.heap.is_full() {
            return true;
        }
        let weakest = self.heap.peek_min().expect("full heap has a root");
        score > f32::from_bits(weakest.score)
    }

    /// Drains into a `TopDocs`, strongest score first. `total_hits`
    /// reflects every document collected, not just those retained.
    pub fn into_top_docs(self) -> TopDocs {
        let docs: Vec<ScoreDoc> = self
            .heap
            .into_sorted_desc()
            .into_iter()
            .map(|sd| ScoreDoc::new(sd.doc_id, f32::from_bits(sd.score)))
            .collect();
        let relation = if self.total_hits as usize <= docs.len() {
            TotalHitsRelation::EqualTo
        } else {
            TotalHitsRelation::GreaterThanOrEqualTo
        };
        TopDocs::new(self.total_hits, relation, docs)
    }
}

/// Collects hits for a fixed number of sub-queries, each into its own
/// `HitQueue`, allocated lazily on first use but always sized to
/// `num_hits` — never grown or reallocated afterwards.
pub struct HybridCollector {
    num_hits: usize,
    queues: Vec<Option<HitQueue>>,
    threshold: HitsThresholdChecker,
    relation: TotalHitsRelation,
    min_competitive_score: MinCompetitiveScore,
}

impl HybridCollector {
    pub fn new(num_sub_queries: usize, num_hits: usize, total_hits_threshold: usize) -> Self {
        let mut queues = Vec::with_capacity(num_sub_queries);
        queues.resize_with(num_sub_queries, || None);
        Self {
            num_hits,
            queues,
            threshold: HitsThresholdChecker::new(total_hits_threshold),
            relation: TotalHitsRelation::EqualTo,
            min_competitive_score: MinCompetitiveScore::new(),
        }
    }

    /// Feeds one hit for sub-query `sub_query_idx`. Queues are built on
    /// first use at `num_hits` capacity and never resized afterward. The
    /// first collect that crosses the threshold flips `relation()` to
    /// `GreaterThanOrEqualTo` for good; it never flips back. Once the
    /// threshold has been reached, every `SAMPLE_MASK + 1`th hit samples
    /// into the min-competitive-score accumulator so scorers can be handed
    /// a rising floor.
    pub fn collect(&mut self, sub_query_idx: usize, doc_id: u32, score: f32) {
        let slot = &mut self.queues[sub_query_idx];
        let queue = slot.get_or_insert_with(|| HitQueue::new(self.num_hits));
        queue.collect(doc_id, score);
        self.threshold.increment_hit_count();
        if self.threshold.is_threshold_reached() {
            self.relation = TotalHitsRelation::GreaterThanOrEqualTo;
            if self.threshold.hit_count() & SAMPLE_MASK == 0 {
                self.min_competitive_score.update(score, doc_id);
            }
        }
    }

    /// As [`Self::collect`], but for use when the search sort is a prefix
    /// of the segment's index sort: once the threshold is reached, a hit
    /// that cannot improve the bottom of *every* allocated sub-query queue
    /// raises `EarlyTerminate`. An unallocated sub-query queue is never
    /// full, so it can always still be improved, which keeps collection
    /// going until every sub-query has a full queue.
    pub fn collect_with_termination(&mut self, sub_query_idx: usize, doc_id: u32, score: f32) -> ScanOutcome {
        self.collect(sub_query_idx, doc_id, score);
        if self.threshold.is_threshold_reached() && !self.any_queue_could_improve(score) {
            ScanOutcome::EarlyTerminate
        } else {
            ScanOutcome::Completed
        }
    }

    fn any_queue_could_improve(&self, score: f32) -> bool {
        self.queues.iter().any(|slot| match slot {
            Some(queue) => queue.could_improve(score),
            None => true,
        })
    }

    pub fn is_threshold_reached(&self) -> bool {
        self.threshold.is_threshold_reached()
    }

    /// The current floor sampled into the shared min-competitive-score
    /// accumulator: `0.0` until the threshold is reached and the first
    /// sample is taken.
    pub fn min_competitive_score(&self) -> f32 {
        self.min_competitive_score.score()
    }

    /// The running `total_hits.relation` for this collector: `EqualTo`
    /// until the threshold is first reached, `GreaterThanOrEqualTo`
    /// afterward regardless of subsequent collects.
    pub fn relation(&self) -> TotalHitsRelation {
        self.relation
    }

    /// Finalizes every sub-query's queue into a `TopDocs`. A sub-query that
    /// never collected anything yields an empty `TopDocs`.
    pub fn finish(self) -> Vec<TopDocs> {
        self.queues
            .into_iter()
            .map(|slot| slot.map(HitQueue::into_top_docs).unwrap_or_else(TopDocs::empty))
            .collect()
    }
}

/// Numeric domain a sort-field value is widened to across shards with
/// mismatched field mappings: `Int` widens to `Long`, `Float` widens to
/// `Double`, `Long`/`Double` pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortValue {
    Long(i64),
    Double(f64),
}

impl SortValue {
    pub fn widen(self, other: SortValue) -> (SortValue, SortValue) {
        match (self, other) {
            (SortValue::Long(_), SortValue::Long(_)) => (self, other),
            (SortValue::Double(_), SortValue::Double(_)) => (self, other),
            (SortValue::Long(a), SortValue::Double(_)) => (SortValue::Double(a as f64), other),
            (SortValue::Double(_), SortValue::Long(b)) => (self, SortValue::Double(b as f64)),
        }
    }
}

/// One entry in a sort-field hit queue: a candidate document plus its
/// sort-field value and the direction (ascending/descending) it was
/// collected under.
#[derive(Debug, Clone)]
pub struct FieldDoc {
    pub doc_id: u32,
    pub value: SortValue,
    pub shard_index: i32,
}

/// Collects hits ordered by a single sort field rather than by score,
/// supporting paging (only documents ranked after `after` are retained)
/// and numeric widening across mismatched shard field types.
pub struct SortFieldCollector {
    capacity: usize,
    reverse: bool,
    after: Option<FieldDoc>,
    entries: Vec<FieldDoc>,
    bottom: Option<SortValue>,
}

impl SortFieldCollector {
    pub fn new(capacity: usize, reverse: bool, after: Option<FieldDoc>) -> Self {
        Self {
            capacity: capacity.max(1),
            reverse,
            after,
            entries: Vec::new(),
            bottom: None,
        }
    }

    fn passes_after(&self, value: SortValue, doc_id: u32) -> bool {
        let Some(after) = &self.after else {
            return true;
        };
        let (v, a) = value.widen(after.value);
        let cmp = Self::compare(v, a);
        if cmp != std::cmp::Ordering::Equal {
            if self.reverse {
                cmp == std::cmp::Ordering::Less
            } else {
                cmp == std::cmp::Ordering::Greater
            }
        } else {
            doc_id > after.doc_id
        }
    }

    fn compare(a: SortValue, b: SortValue) -> std::cmp::Ordering {
        match (a, b) {
            (SortValue::Long(x), SortValue::Long(y)) => x.cmp(&y),
            (SortValue::Double(x), SortValue::Double(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
            _ => unreachable!("widen() always produces matching variants"),
        }
    }

    /// `value`'s type is widened against any already-collected bottom entry
    /// so a `Long` field on one shard still compares correctly against a
    /// `Double` field with the same logical name on another.
    pub fn collect(&mut self, doc_id: u32, value: SortValue) {
        if !self.passes_after(value, doc_id) {
            return;
        }
        self.entries.push(FieldDoc {
            doc_id,
            value,
            shard_index: -1,
        });
        self.entries.sort_by(|a, b| {
            let (x, y) = a.value.widen(b.value);
            let cmp = Self::compare(x, y);
            if self.reverse {
                cmp.reverse()
            } else {
                cmp
            }
        });
        self.entries.truncate(self.capacity);
        self.bottom = self.entries.last().map(|e| e.value);
    }

    pub fn bottom(&self) -> Option<SortValue> {
        self.bottom
    }

    pub fn into_entries(self) -> Vec<FieldDoc> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_queue_keeps_strongest_up_to_capacity() {
        let mut queue = HitQueue::new(2);
        queue.collect(1, 1.0);
        queue.collect(2, 3.0);
        queue.collect(3, 2.0);
        let top = queue.into_top_docs();
        assert_eq!(top.total_hits, 3);
        assert_eq!(top.relation, TotalHitsRelation::GreaterThanOrEqualTo);
        assert_eq!(top.docs.iter().map(|d| d.doc_id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn hit_queue_ties_prefer_smaller_doc_id() {
        let mut queue = HitQueue::new(1);
        queue.collect(5, 1.0);
        queue.collect(2, 1.0);
        let top = queue.into_top_docs();
        assert_eq!(top.docs[0].doc_id, 2);
    }

    #[test]
    fn hybrid_collector_queues_are_pre_sized_and_independent() {
        let mut collector = HybridCollector::new(2, 1, 0);
        collector.collect(0, 1, 5.0);
        collector.collect(0, 2, 9.0);
        collector.collect(1, 10, 1.0);
        let results = collector.finish();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].docs.len(), 1);
        assert_eq!(results[0].docs[0].doc_id, 2);
        assert_eq!(results[1].docs[0].doc_id, 10);
    }

    #[test]
    fn hybrid_collector_empty_sub_query_yields_empty_top_docs() {
        let mut collector = HybridCollector::new(2, 5, 0);
        collector.collect(0, 1, 1.0);
        let results = collector.finish();
        assert_eq!(results[1].docs.len(), 0);
        assert_eq!(results[1].total_hits, 0);
    }

    #[test]
    fn scenario_five_threshold_crossing_is_sticky() {
        // threshold=4, nine docs collected into a single sub-query;
        // relation flips to GreaterThanOrEqualTo on the 5th collect and
        // stays flipped through the remaining four.
        let mut collector = HybridCollector::new(1, 20, 4);
        assert_eq!(collector.relation(), TotalHitsRelation::EqualTo);
        for doc_id in 1..=9u32 {
            collector.collect(0, doc_id, doc_id as f32);
        }
        assert_eq!(collector.relation(), TotalHitsRelation::GreaterThanOrEqualTo);
        assert_eq!(collector.finish()[0].total_hits, 9);
    }

    #[test]
    fn min_competitive_score_samples_every_sample_mask_plus_one_hits() {
        let mut collector = HybridCollector::new(1, 20, 0);
        assert_eq!(collector.min_competitive_score(), 0.0);
        for doc_id in 1..=(SAMPLE_MASK as u32) {
            collector.collect(0, doc_id, doc_id as f32);
            // no sample taken yet: hit_count hasn't hit a SAMPLE_MASK boundary.
            assert_eq!(collector.min_competitive_score(), 0.0);
        }
        // the (SAMPLE_MASK + 1)th hit lands exactly on the sampling boundary.
        let boundary_doc = SAMPLE_MASK as u32 + 1;
        collector.collect(0, boundary_doc, boundary_doc as f32);
        assert_eq!(collector.min_competitive_score(), boundary_doc as f32);
    }

    #[test]
    fn early_termination_only_once_every_queue_is_full_and_unbeatable() {
        let mut collector = HybridCollector::new(1, 1, 0);
        // first hit: queue not yet full, never terminates even past threshold.
        assert_eq!(
            collector.collect_with_termination(0, 1, 5.0),
            ScanOutcome::Completed
        );
        // queue now full at capacity 1 with score 5.0; a weaker hit cannot
        // improve it, so collection may stop here.
        assert_eq!(
            collector.collect_with_termination(0, 2, 1.0),
            ScanOutcome::EarlyTerminate
        );
    }

    #[test]
    fn early_termination_never_fires_while_any_sub_query_queue_is_unallocated() {
        let mut collector = HybridCollector::new(2, 1, 0);
        collector.collect(0, 1, 5.0);
        // sub-query 1 has never collected anything, so it is never full;
        // a hit routed to sub-query 0 must not terminate collection.
        assert_eq!(
            collector.collect_with_termination(0, 2, 0.0),
            ScanOutcome::Completed
        );
    }

    #[test]
    fn sort_field_widens_long_against_double() {
        let mut collector = SortFieldCollector::new(10, false, None);
        collector.collect(1, SortValue::Long(5));
        collector.collect(2, SortValue::Double(3.5));
        let entries = collector.into_entries();
        assert_eq!(entries[0].doc_id, 2);
        assert_eq!(entries[1].doc_id, 1);
    }

    #[test]
    fn sort_field_paging_skips_up_to_after() {
        let after = FieldDoc {
            doc_id: 1,
            value: SortValue::Long(5),
            shard_index: -1,
        };
        let mut collector = SortFieldCollector::new(10, false, Some(after));
        collector.collect(1, SortValue::Long(5));
        collector.collect(2, SortValue::Long(6));
        collector.collect(3, SortValue::Long(4));
        let entries = collector.into_entries();
        let ids: Vec<u32> = entries.iter().map(|e| e.doc_id).collect();
        assert_eq!(ids, vec![2]);
    }
}
