//! External wire formats: the ingest-time sparse-vector JSON shape,
//! index-time field method parameters, index settings, the neural_sparse
//! query DSL, the persisted binary segment layout, and the circuit-breaker
//! setting.

use std::collections::HashMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeismicError};
use crate::posting_list::{DocumentCluster, PostingClusters};
use crate::quantize::ByteQuantizer;
use crate::query::{PruneType, SparseQueryContext, TwoPhaseParams};
use crate::sparse_vector::SparseVector;

/// Parses the ingest-time sparse-vector wire representation: a JSON object
/// mapping decimal token-id strings to positive float weights. Token ids
/// are folded to the short-type range and colliding tokens
/// aggregate by max, via [`SparseVector::from_map`].
pub fn parse_sparse_vector_json(raw: &str, quantizer: &ByteQuantizer) -> Result<SparseVector> {
    let object: HashMap<String, f64> = serde_json::from_str(raw)?;
    let mut weights: HashMap<u32, f32> = HashMap::with_capacity(object.len());
    for (token_str, weight) in object {
        let token_id: u32 = token_str.parse().map_err(|_| {
            SeismicError::InvalidArgument(format!("token id must be a non-negative integer, got {token_str}"))
        })?;
        if !weight.is_finite() || weight <= 0.0 {
            return Err(SeismicError::InvalidArgument(format!(
                "token {token_id} weight must be a positive float, got {weight}"
            )));
        }
        weights.insert(token_id, weight as f32);
    }
    SparseVector::from_map(&weights, quantizer)
}

/// Field method parameters (index-time, per field). Deserialization rejects
/// unknown keys outright: unknown parameters fail index creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldMethodParameters {
    pub n_postings: u32,
    pub summary_prune_ratio: f32,
    pub cluster_ratio: f32,
    pub approximate_threshold: u32,
}

impl FieldMethodParameters {
    pub fn validate(&self) -> Result<()> {
        if self.n_postings == 0 {
            return Err(SeismicError::InvalidArgument("n_postings must be > 0".into()));
        }
        if !(self.summary_prune_ratio > 0.0 && self.summary_prune_ratio <= 1.0) {
            return Err(SeismicError::InvalidArgument(format!(
                "summary_prune_ratio must be in (0, 1], got {}",
                self.summary_prune_ratio
            )));
        }
        if !(self.cluster_ratio > 0.0 && self.cluster_ratio <= 1.0) {
            return Err(SeismicError::InvalidArgument(format!(
                "cluster_ratio must be in (0, 1], got {}",
                self.cluster_ratio
            )));
        }
        if self.approximate_threshold == 0 {
            return Err(SeismicError::InvalidArgument(
                "approximate_threshold must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// "index.sparse": final at creation time. `update` always fails, modeling
/// the host's immutability rule without pretending a real settings store
/// lives here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    pub sparse: bool,
}

impl IndexSettings {
    pub fn new(sparse: bool) -> Self {
        Self { sparse }
    }

    pub fn update(&self, _new_sparse: bool) -> Result<Self> {
        Err(SeismicError::InvalidState(
            "index.sparse is final at index creation and cannot be updated".into(),
        ))
    }
}

/// Process-wide circuit breaker: the forward-index cache limit expressed as
/// a percentage of a memory budget. At `0` the cache is disabled and
/// results must stay identical to the enabled case, only latency differs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    pub cache_limit_percent: f32,
}

impl CircuitBreakerSettings {
    pub fn new(cache_limit_percent: f32) -> Result<Self> {
        if !(0.0..=100.0).contains(&cache_limit_percent) {
            return Err(SeismicError::InvalidArgument(format!(
                "cache_limit_percent must be in [0, 100], got {cache_limit_percent}"
            )));
        }
        Ok(Self { cache_limit_percent })
    }

    pub fn cache_disabled(&self) -> bool {
        self.cache_limit_percent <= 0.0
    }
}

/// "neural_sparse" query DSL (core subset). `method_parameters` and
/// `two_phase_parameter` apply their own defaults/validation on parse.
#[derive(Debug, Clone, Deserialize)]
pub struct NeuralSparseQuery {
    pub field: String,
    pub query_tokens: HashMap<String, f32>,
    #[serde(default)]
    pub method_parameters: MethodParametersWire,
    pub two_phase_parameter: Option<TwoPhaseParameterWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MethodParametersWire {
    #[serde(default = "default_top_n")]
    pub top_n: i64,
    #[serde(default = "default_k")]
    pub k: i64,
    #[serde(default = "default_heap_factor")]
    pub heap_factor: f32,
}

fn default_top_n() -> i64 {
    10
}
fn default_k() -> i64 {
    10
}
fn default_heap_factor() -> f32 {
    1.0
}

impl Default for MethodParametersWire {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            k: default_k(),
            heap_factor: default_heap_factor(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwoPhaseParameterWire {
    pub prune_type: String,
    pub prune_ratio: f32,
    pub expansion_rate: f32,
    pub max_window_size: usize,
}

impl NeuralSparseQuery {
    /// Parses and validates the query DSL subset, producing the immutable
    /// contexts the scorer selector (C8) consumes. Fails on non-positive
    /// `top_n`/`k`, non-positive `heap_factor`, an unknown `prune_type`, or
    /// an out-of-range `expansion_rate`/`max_window_size`.
    pub fn to_contexts(&self, quantizer: &ByteQuantizer) -> Result<(SparseQueryContext, Option<TwoPhaseParams>)> {
        if self.method_parameters.top_n <= 0 {
            return Err(SeismicError::InvalidArgument("top_n must be positive".into()));
        }
        if self.method_parameters.k <= 0 {
            return Err(SeismicError::InvalidArgument("k must be positive".into()));
        }

        let mut tokens: HashMap<u32, f32> = HashMap::with_capacity(self.query_tokens.len());
        for (token_str, weight) in &self.query_tokens {
            let token_id: u32 = token_str
                .parse()
                .map_err(|_| SeismicError::InvalidArgument(format!("invalid query token id {token_str}")))?;
            tokens.insert(token_id, *weight);
        }

        let ctx = SparseQueryContext::new(
            &tokens,
            quantizer,
            self.method_parameters.top_n as usize,
            self.method_parameters.k as usize,
            self.method_parameters.heap_factor,
        )?;

        let two_phase = match &self.two_phase_parameter {
            None => None,
            Some(wire) => {
                let prune_type = match wire.prune_type.as_str() {
                    "max_ratio" => PruneType::MaxRatio,
                    other => {
                        return Err(SeismicError::InvalidArgument(format!(
                            "unknown prune_type {other}"
                        )))
                    }
                };
                Some(TwoPhaseParams::new(
                    prune_type,
                    wire.prune_ratio,
                    wire.expansion_rate,
                    wire.max_window_size,
                )?)
            }
        };

        Ok((ctx, two_phase))
    }
}

/// Binary layout header for one token's persisted posting-cluster list:
/// little-endian cluster count followed by each cluster's summary and
/// `(doc_id, byte_weight)` entries.
pub fn write_posting_clusters<W: Write>(writer: &mut W, clusters: &PostingClusters) -> Result<()> {
    let cluster_list: Vec<&DocumentCluster> = clusters.iter().collect();
    writer.write_all(&(cluster_list.len() as u32).to_le_bytes())?;
    for cluster in cluster_list {
        write_cluster(writer, cluster)?;
    }
    Ok(())
}

fn write_cluster<W: Write>(writer: &mut W, cluster: &DocumentCluster) -> Result<()> {
    let summary_items = cluster.summary.items();
    writer.write_all(&(summary_items.len() as u32).to_le_bytes())?;
    for &(token, weight) in summary_items {
        writer.write_all(&token.to_le_bytes())?;
        writer.write_all(&[weight])?;
    }
    writer.write_all(&(cluster.postings.len() as u32).to_le_bytes())?;
    for &(doc_id, weight) in &cluster.postings {
        writer.write_all(&doc_id.to_le_bytes())?;
        writer.write_all(&[weight])?;
    }
    Ok(())
}

pub fn read_posting_clusters<R: Read>(reader: &mut R) -> Result<PostingClusters> {
    let cluster_count = read_u32(reader)?;
    let mut clusters = Vec::with_capacity(cluster_count as usize);
    for _ in 0..cluster_count {
        clusters.push(read_cluster(reader)?);
    }
    Ok(PostingClusters::new(clusters))
}

fn read_cluster<R: Read>(reader: &mut R) -> Result<DocumentCluster> {
    let summary_len = read_u32(reader)?;
    let mut summary_items = Vec::with_capacity(summary_len as usize);
    for _ in 0..summary_len {
        let token = read_u16(reader)?;
        let weight = read_u8(reader)?;
        summary_items.push((token, weight));
    }
    let summary = SparseVector::from_sorted_items(summary_items)?;

    let doc_count = read_u32(reader)?;
    let mut postings = Vec::with_capacity(doc_count as usize);
    for _ in 0..doc_count {
        let doc_id = read_u32(reader)?;
        let weight = read_u8(reader)?;
        postings.push((doc_id, weight));
    }
    Ok(DocumentCluster {
        summary,
        postings,
        should_not_skip: false,
    })
}

fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16<R: Read>(reader: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
