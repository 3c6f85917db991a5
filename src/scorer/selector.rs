//! The scorer selector: picks SEISMIC, ExactMatch, two-phase, or
//! fallback rank-feature path per segment.

use crate::filter::DocIdSet;
use crate::forward_index::ForwardIndexReader;
use crate::posting_list::PostingListStore;
use crate::query::{SparseQueryContext, TwoPhaseParams};

use super::{ExactMatchScorer, FallbackScorer, SeismicScorer, ScorerVariant, TwoPhaseScorer};

/// Per-segment facts the selector needs: whether this field has
/// SEISMIC-indexed data on this segment, the document ids a fallback path
/// would need to score, and the boost to incorporate into the rescaling
/// factor.
///
/// `fallback_doc_ids` is the full candidate set the fallback/two-phase
/// paths score over (e.g. every live doc id on the segment); it is owned
/// by the caller for the duration of the query, exactly as `filter` is.
pub struct SelectorInputs<'a, R> {
    pub query: &'a SparseQueryContext,
    pub posting_store: &'a dyn PostingListStore,
    pub forward_index: &'a R,
    pub filter: Option<&'a DocIdSet>,
    pub two_phase_params: Option<TwoPhaseParams>,
    pub has_seismic_data: bool,
    pub fallback_doc_ids: &'a DocIdSet,
    pub boost: f32,
    pub ceiling_ingest: f32,
    pub ceiling_search: f32,
}

/// Builds the scorer variant for one segment. The rescaled boost factor is
/// computed once here and baked into every scorer variant returned.
pub fn select_scorer<'a, R>(inputs: SelectorInputs<'a, R>) -> ScorerVariant<'a, R>
where
    R: ForwardIndexReader,
{
    let rescale = crate::quantize::rescale_factor(inputs.boost, inputs.ceiling_ingest, inputs.ceiling_search);

    if !inputs.has_seismic_data {
        if let Some(params) = inputs.two_phase_params {
            log::debug!("selector: no SEISMIC data, building two-phase fallback scorer");
            let window = params.window_size(inputs.query.k());
            let phase_one = FallbackScorer {
                query: inputs.query,
                doc_ids: inputs.fallback_doc_ids.iter().collect(),
                forward_index: inputs.forward_index,
                rescale,
            };
            let phase_two = ExactMatchScorer::new(inputs.query, inputs.fallback_doc_ids, inputs.forward_index, rescale);
            return ScorerVariant::TwoPhase(Box::new(TwoPhaseScorer::new(
                ScorerVariant::Fallback(phase_one),
                ScorerVariant::ExactMatch(phase_two),
                window,
            )));
        }
        log::debug!("selector: no SEISMIC data and no two-phase params, using fallback rank-feature scorer");
        return ScorerVariant::Fallback(FallbackScorer {
            query: inputs.query,
            doc_ids: inputs.fallback_doc_ids.iter().collect(),
            forward_index: inputs.forward_index,
            rescale,
        });
    }

    if let Some(filter) = inputs.filter {
        if filter.cardinality() <= inputs.query.k() {
            log::debug!(
                "selector: filter cardinality {} <= k {}, using ExactMatch",
                filter.cardinality(),
                inputs.query.k()
            );
            return ScorerVariant::ExactMatch(ExactMatchScorer::new(
                inputs.query,
                filter,
                inputs.forward_index,
                rescale,
            ));
        }
    }

    log::debug!("selector: using SEISMIC scorer");
    ScorerVariant::Seismic(SeismicScorer::new(
        inputs.query,
        inputs.posting_store,
        inputs.forward_index,
        inputs.filter,
        rescale,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward_index::ForwardIndex;
    use crate::posting_list::InMemoryPostingListStore;
    use crate::quantize::ByteQuantizer;
    use crate::query::PruneType;
    use std::collections::HashMap;

    fn ctx_fixture() -> (SparseQueryContext, ByteQuantizer) {
        let quantizer = ByteQuantizer::new(10.0).unwrap();
        let tokens = HashMap::from([(1u32, 1.0)]);
        let ctx = SparseQueryContext::new(&tokens, &quantizer, 10, 3, 1.0).unwrap();
        (ctx, quantizer)
    }

    #[test]
    fn filter_cardinality_equal_to_k_selects_exact_match() {
        let (ctx, _q) = ctx_fixture();
        let store = InMemoryPostingListStore::new();
        let forward = ForwardIndex::with_capacity(10);
        let filter = DocIdSet::from_doc_ids(vec![1, 2, 3]);
        let empty = DocIdSet::default();
        let inputs = SelectorInputs {
            query: &ctx,
            posting_store: &store,
            forward_index: &forward,
            filter: Some(&filter),
            two_phase_params: None,
            has_seismic_data: true,
            fallback_doc_ids: &empty,
            boost: 1.0,
            ceiling_ingest: 10.0,
            ceiling_search: 10.0,
        };
        assert!(matches!(select_scorer(inputs), ScorerVariant::ExactMatch(_)));
    }

    #[test]
    fn filter_cardinality_k_plus_one_selects_seismic() {
        let (ctx, _q) = ctx_fixture();
        let store = InMemoryPostingListStore::new();
        let forward = ForwardIndex::with_capacity(10);
        let filter = DocIdSet::from_doc_ids(vec![1, 2, 3, 4]);
        let empty = DocIdSet::default();
        let inputs = SelectorInputs {
            query: &ctx,
            posting_store: &store,
            forward_index: &forward,
            filter: Some(&filter),
            two_phase_params: None,
            has_seismic_data: true,
            fallback_doc_ids: &empty,
            boost: 1.0,
            ceiling_ingest: 10.0,
            ceiling_search: 10.0,
        };
        assert!(matches!(select_scorer(inputs), ScorerVariant::Seismic(_)));
    }

    #[test]
    fn no_seismic_data_and_two_phase_params_builds_two_phase() {
        let (ctx, _q) = ctx_fixture();
        let store = InMemoryPostingListStore::new();
        let forward = ForwardIndex::with_capacity(10);
        let params = TwoPhaseParams::new(PruneType::MaxRatio, 0.5, 1.0, 50).unwrap();
        let fallback_docs = DocIdSet::from_doc_ids(vec![1, 2, 3]);
        let inputs = SelectorInputs {
            query: &ctx,
            posting_store: &store,
            forward_index: &forward,
            filter: None,
            two_phase_params: Some(params),
            has_seismic_data: false,
            fallback_doc_ids: &fallback_docs,
            boost: 1.0,
            ceiling_ingest: 10.0,
            ceiling_search: 10.0,
        };
        assert!(matches!(select_scorer(inputs), ScorerVariant::TwoPhase(_)));
    }

    #[test]
    fn no_seismic_data_and_no_two_phase_params_builds_fallback() {
        let (ctx, _q) = ctx_fixture();
        let store = InMemoryPostingListStore::new();
        let forward = ForwardIndex::with_capacity(10);
        let fallback_docs = DocIdSet::from_doc_ids(vec![1, 2, 3]);
        let inputs = SelectorInputs {
            query: &ctx,
            posting_store: &store,
            forward_index: &forward,
            filter: None,
            two_phase_params: None,
            has_seismic_data: false,
            fallback_doc_ids: &fallback_docs,
            boost: 1.0,
            ceiling_ingest: 10.0,
            ceiling_search: 10.0,
        };
        assert!(matches!(select_scorer(inputs), ScorerVariant::Fallback(_)));
    }
}
