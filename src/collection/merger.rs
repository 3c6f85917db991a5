//! Cross-shard top-docs merging: combines one `TopDocs` per shard into a
//! single ranked result, following the relation-combination law and
//! `CompoundTopDocs`'s deep-copy-never-alias canonical array.

use crate::top_docs::{CompoundTopDocs, ScoreDoc, TopDocs, TopDocsAndMaxScore, TotalHitsRelation};

/// Merges per-shard `TopDocs` for a single (non-hybrid) query into one
/// globally ranked `TopDocs` of at most `size` documents.
///
/// `total_hits` sums every shard's count; `relation` is `EQUAL_TO` only if
/// every shard's relation was `EQUAL_TO`.
pub fn merge_top_docs(shards: &[TopDocsAndMaxScore], size: usize) -> TopDocs {
    let mut total_hits: u64 = 0;
    let mut relation = TotalHitsRelation::EqualTo;
    let mut all_docs: Vec<ScoreDoc> = Vec::new();

    for (shard_index, shard) in shards.iter().enumerate() {
        total_hits += shard.top_docs.total_hits;
        relation = relation.combine(shard.top_docs.relation);
        all_docs.extend(
            shard
                .top_docs
                .docs
                .iter()
                .map(|d| ScoreDoc::with_shard(d.doc_id, d.score, shard_index as i32)),
        );
    }

    all_docs.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    all_docs.truncate(size);

    TopDocs::new(total_hits, relation, all_docs)
}

/// Merges per-shard `CompoundTopDocs` for a hybrid query: each sub-query's
/// `TopDocs` is merged independently, and the merged compound's canonical
/// array is rebuilt as a fresh deep copy — it never aliases any shard's
/// array.
pub fn merge_compound_top_docs(shards: &[CompoundTopDocs], per_sub_query_size: usize) -> CompoundTopDocs {
    let num_sub_queries = shards.first().map(|c| c.per_sub_query.len()).unwrap_or(0);
    let mut merged_per_sub_query = Vec::with_capacity(num_sub_queries);

    for sub_idx in 0..num_sub_queries {
        let sub_shards: Vec<TopDocsAndMaxScore> = shards
            .iter()
            .map(|c| {
                let top_docs = c.per_sub_query[sub_idx].clone();
                let max_score = top_docs.max_score();
                TopDocsAndMaxScore { top_docs, max_score }
            })
            .collect();
        merged_per_sub_query.push(merge_top_docs(&sub_shards, per_sub_query_size));
    }

    CompoundTopDocs::new(merged_per_sub_query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tdms(total_hits: u64, relation: TotalHitsRelation, docs: Vec<ScoreDoc>) -> TopDocsAndMaxScore {
        let top_docs = TopDocs::new(total_hits, relation, docs);
        let max_score = top_docs.max_score();
        TopDocsAndMaxScore { top_docs, max_score }
    }

    #[test]
    fn scenario_two_hybrid_merge_across_shards() {
        let shard_a = tdms(
            3,
            TotalHitsRelation::EqualTo,
            vec![ScoreDoc::new(1, 5.0), ScoreDoc::new(2, 3.0)],
        );
        let shard_b = tdms(
            2,
            TotalHitsRelation::EqualTo,
            vec![ScoreDoc::new(10, 4.0), ScoreDoc::new(11, 1.0)],
        );
        let merged = merge_top_docs(&[shard_a, shard_b], 3);
        assert_eq!(merged.total_hits, 5);
        assert_eq!(merged.relation, TotalHitsRelation::EqualTo);
        let ids: Vec<u32> = merged.docs.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![1, 10, 2]);
        assert_eq!(merged.docs[0].shard_index, 0);
        assert_eq!(merged.docs[1].shard_index, 1);
    }

    #[test]
    fn relation_propagates_greater_than_or_equal() {
        let shard_a = tdms(3, TotalHitsRelation::EqualTo, vec![ScoreDoc::new(1, 5.0)]);
        let shard_b = tdms(
            10,
            TotalHitsRelation::GreaterThanOrEqualTo,
            vec![ScoreDoc::new(2, 4.0)],
        );
        let merged = merge_top_docs(&[shard_a, shard_b], 10);
        assert_eq!(merged.relation, TotalHitsRelation::GreaterThanOrEqualTo);
        assert_eq!(merged.total_hits, 13);
    }

    #[test]
    fn ties_break_on_smaller_doc_id() {
        let shard_a = tdms(1, TotalHitsRelation::EqualTo, vec![ScoreDoc::new(9, 2.0)]);
        let shard_b = tdms(1, TotalHitsRelation::EqualTo, vec![ScoreDoc::new(3, 2.0)]);
        let merged = merge_top_docs(&[shard_a, shard_b], 2);
        assert_eq!(merged.docs[0].doc_id, 3);
        assert_eq!(merged.docs[1].doc_id, 9);
    }

    #[test]
    fn compound_merge_rebuilds_canonical_without_aliasing() {
        let a = CompoundTopDocs::new(vec![TopDocs::new(
            2,
            TotalHitsRelation::EqualTo,
            vec![ScoreDoc::new(1, 5.0)],
        )]);
        let b = CompoundTopDocs::new(vec![TopDocs::new(
            1,
            TotalHitsRelation::EqualTo,
            vec![ScoreDoc::new(2, 4.0)],
        )]);
        let merged = merge_compound_top_docs(&[a, b], 5);
        assert_eq!(merged.canonical.docs.len(), 2);
        assert_eq!(merged.per_sub_query.len(), 1);
    }
}
