//! Shared result types: `ScoreDoc`, `TopDocs`, `CompoundTopDocs`.

/// One scored hit. `shard_index` is `-1` until a cross-shard merge assigns
/// it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreDoc {
    pub doc_id: u32,
    pub score: f32,
    pub shard_index: i32,
}

impl ScoreDoc {
    pub fn new(doc_id: u32, score: f32) -> Self {
        Self {
            doc_id,
            score,
            shard_index: -1,
        }
    }

    pub fn with_shard(doc_id: u32, score: f32, shard_index: i32) -> Self {
        Self {
            doc_id,
            score,
            shard_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalHitsRelation {
    EqualTo,
    GreaterThanOrEqualTo,
}

impl TotalHitsRelation {
    /// `EQUAL_TO` only if both sides are `EQUAL_TO`; any
    /// `GREATER_THAN_OR_EQUAL_TO` propagates.
    pub fn combine(self, other: Self) -> Self {
        if self == TotalHitsRelation::EqualTo && other == TotalHitsRelation::EqualTo {
            TotalHitsRelation::EqualTo
        } else {
            TotalHitsRelation::GreaterThanOrEqualTo
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopDocs {
    pub total_hits: u64,
    pub relation: TotalHitsRelation,
    pub docs: Vec<ScoreDoc>,
}

impl TopDocs {
    pub fn new(total_hits: u64, relation: TotalHitsRelation, docs: Vec<ScoreDoc>) -> Self {
        Self {
            total_hits,
            relation,
            docs,
        }
    }

    pub fn empty() -> Self {
        Self {
            total_hits: 0,
            relation: TotalHitsRelation::EqualTo,
            docs: Vec::new(),
        }
    }

    pub fn max_score(&self) -> f32 {
        self.docs
            .iter()
            .map(|d| d.score)
            .fold(f32::NEG_INFINITY, f32::max)
    }
}

/// Per-shard `TopDocs` plus its max score, the unit the merger (C11) works
/// over.
#[derive(Debug, Clone)]
pub struct TopDocsAndMaxScore {
    pub top_docs: TopDocs,
    pub max_score: f32,
}

/// One sub-query's `TopDocs`, plus the canonical `TopDocs` derived from the
/// largest sub-query result — always a deep copy, never an alias.
#[derive(Debug, Clone)]
pub struct CompoundTopDocs {
    pub per_sub_query: Vec<TopDocs>,
    pub canonical: TopDocs,
}

impl CompoundTopDocs {
    /// Builds the canonical `TopDocs`: `total_hits` sums every sub-query's
    /// count, `relation` combines every sub-query's relation, and `docs` is
    /// a deep copy of the sub-query with the most collected documents —
    /// never an alias of it.
    pub fn new(per_sub_query: Vec<TopDocs>) -> Self {
        let total_hits = per_sub_query.iter().map(|td| td.total_hits).sum();
        let relation = per_sub_query
            .iter()
            .map(|td| td.relation)
            .reduce(TotalHitsRelation::combine)
            .unwrap_or(TotalHitsRelation::EqualTo);

        let largest_idx = per_sub_query
            .iter()
            .enumerate()
            .max_by_key(|(_, td)| td.docs.len())
            .map(|(idx, _)| idx);

        let docs = largest_idx
            .map(|idx| per_sub_query[idx].docs.clone())
            .unwrap_or_default();

        let canonical = TopDocs {
            total_hits,
            relation,
            docs,
        };

        Self {
            per_sub_query,
            canonical,
        }
    }
}
