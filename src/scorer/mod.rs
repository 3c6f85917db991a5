//! Scorers: the tagged-variant `ScorerVariant` dispatch, its four
//! implementations, and the selector that builds one per segment.

pub mod exact_match;
pub mod seismic;
pub mod selector;
pub mod two_phase;

pub use exact_match::ExactMatchScorer;
pub use seismic::SeismicScorer;
pub use selector::{select_scorer, SelectorInputs};
pub use two_phase::TwoPhaseScorer;

use crate::error::Result;

/// Early termination is modeled as an ordinary result variant, never as a
/// thrown/propagated error: a bulk-scoring loop checks this after every
/// emitted hit and unwinds cleanly, preserving already collected hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed,
    EarlyTerminate,
}

/// The callback a bulk scorer drives: called once per emitted `(doc_id,
/// score)` pair; its return value tells the scorer whether to keep going.
pub type OnHit<'a> = dyn FnMut(u32, f32) -> ScanOutcome + 'a;

/// A fallback scorer standing in for the host's rank-feature path, used
/// when a segment lacks SEISMIC-indexed data and no two-phase parameters
/// are present. Scores every document in `doc_ids` via full dot product
/// against the forward index, like the exact-match scorer but without
/// requiring a pre-sized filter.
pub struct FallbackScorer<'a, R> {
    pub query: &'a crate::query::SparseQueryContext,
    pub doc_ids: Vec<u32>,
    pub forward_index: &'a R,
    pub rescale: f32,
}

impl<'a, R> FallbackScorer<'a, R>
where
    R: crate::forward_index::ForwardIndexReader,
{
    pub fn run(&self, on_hit: &mut OnHit<'_>) -> Result<ScanOutcome> {
        let dense_query = self.query.query().dense();
        for &doc_id in &self.doc_ids {
            let Some(vector) = self.forward_index.read(doc_id)? else {
                continue;
            };
            let raw = vector.dot_product(dense_query);
            let scaled = raw as f32 * self.rescale;
            if matches!(on_hit(doc_id, scaled), ScanOutcome::EarlyTerminate) {
                return Ok(ScanOutcome::EarlyTerminate);
            }
        }
        Ok(ScanOutcome::Completed)
    }
}

/// Tagged variant over the four scorer shapes this crate builds, rather
/// than a pointer to an abstract base.
pub enum ScorerVariant<'a, R> {
    Seismic(SeismicScorer<'a, R>),
    ExactMatch(ExactMatchScorer<'a, R>),
    TwoPhase(Box<TwoPhaseScorer<'a, R>>),
    Fallback(FallbackScorer<'a, R>),
}

impl<'a, R> ScorerVariant<'a, R>
where
    R: crate::forward_index::ForwardIndexReader,
{
    pub fn run(&mut self, on_hit: &mut OnHit<'_>) -> Result<ScanOutcome> {
        match self {
            ScorerVariant::Seismic(s) => s.run(on_hit),
            ScorerVariant::ExactMatch(s) => s.run(on_hit),
            ScorerVariant::TwoPhase(s) => s.run(on_hit),
            ScorerVariant::Fallback(s) => s.run(on_hit),
        }
    }
}
