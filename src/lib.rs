//! Core of a SEISMIC-style sparse-vector approximate nearest-neighbor
//! engine: byte-quantized sparse vectors, clustered posting lists with
//! summary-vector skip decisions, the SEISMIC/ExactMatch/two-phase/fallback
//! scorer variants, and the hybrid-query collection and merge machinery.
#![doc = include_str!("../README.md")]

pub mod collection;
pub mod error;
pub mod filter;
pub mod forward_index;
pub mod heap;
pub mod posting_list;
pub mod quantize;
pub mod query;
pub mod request_filter;
pub mod scorer;
pub mod space_usage;
pub mod sparse_vector;
pub mod top_docs;
pub mod wire;

pub use error::{Result, SeismicError};
pub use posting_list::{ClusterBuildConfig, DocumentCluster, PostingClusters};
pub use query::{SparseQueryContext, TwoPhaseParams};
pub use sparse_vector::SparseVector;
pub use top_docs::{CompoundTopDocs, ScoreDoc, TopDocs, TotalHitsRelation};
