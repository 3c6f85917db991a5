//! Collection and merge machinery (C9-C11): per-segment hit thresholds and
//! the min-competitive-score accumulator, hybrid per-sub-query collectors,
//! and cross-shard top-docs merging.

pub mod hybrid;
pub mod merger;
pub mod threshold;

pub use hybrid::{FieldDoc, HitQueue, HybridCollector, SortFieldCollector, SortValue};
pub use merger::{merge_compound_top_docs, merge_top_docs};
pub use threshold::{HitsThresholdChecker, MinCompetitiveScore, ScoreMode};
