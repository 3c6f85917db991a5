//! Per-token clustered posting lists: `DocumentCluster`, `PostingClusters`,
//! and the build strategies that produce them from a raw posting.
//!
//! The three build strategies below are carried over from the teacher
//! crate's `PruningStrategy`/`BlockingStrategy`/`SummarizationStrategy`,
//! retargeted to produce [`DocumentCluster`] values (summary +
//! `(doc_id, weight)` postings) instead of the teacher's packed-offset
//! postings into a flat forward index.

use std::collections::{HashMap, HashSet};

use indicatif::ParallelProgressIterator;
use itertools::Itertools;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sparse_vector::SparseVector;

/// A group of documents within one token's posting, plus a summary vector
/// used to decide at query time whether to enter the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCluster {
    pub summary: SparseVector,
    /// Ascending by `doc_id`, unique within the cluster.
    pub postings: Vec<(u32, u8)>,
    pub should_not_skip: bool,
}

impl DocumentCluster {
    pub fn doc_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.postings.iter().map(|&(doc, _)| doc)
    }
}

/// The sequence of clusters for one `(field, token)` pair. Their union of
/// postings must cover exactly the full raw posting for that token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostingClusters {
    clusters: Vec<DocumentCluster>,
}

impl PostingClusters {
    pub fn new(clusters: Vec<DocumentCluster>) -> Self {
        Self { clusters }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentCluster> {
        self.clusters.iter()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Keyed by `(field, segment, token)` in the host's actual storage; this
/// crate models only the per-segment, per-field slice of that key space, so
/// the trait is keyed on `token` alone. Returns `None` if the token was
/// never posted on this segment.
pub trait PostingListStore {
    fn postings_for(&self, token: u16) -> Option<&PostingClusters>;
}

#[derive(Debug, Default)]
pub struct InMemoryPostingListStore {
    by_token: HashMap<u16, PostingClusters>,
}

impl InMemoryPostingListStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: u16, clusters: PostingClusters) {
        self.by_token.insert(token, clusters);
    }
}

impl PostingListStore for InMemoryPostingListStore {
    fn postings_for(&self, token: u16) -> Option<&PostingClusters> {
        self.by_token.get(&token)
    }
}

/// Pruning strategy applied to a raw `(weight, doc_id)` posting before
/// clustering, carried over from the teacher's `PruningStrategy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PruningStrategy {
    /// Keep only the top `n_postings` by weight.
    FixedSize { n_postings: usize },
    /// Select a global threshold so each posting keeps `n_postings` on
    /// average, capped at `n_postings * max_fraction` per posting.
    GlobalThreshold { n_postings: usize, max_fraction: f32 },
}

impl Default for PruningStrategy {
    fn default() -> Self {
        PruningStrategy::FixedSize { n_postings: 3500 }
    }
}

/// Blocking strategy that partitions a pruned posting into clusters,
/// carried over from the teacher's `BlockingStrategy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BlockingStrategy {
    FixedSize { block_size: usize },
    RandomKmeans {
        centroid_fraction: f32,
        min_cluster_size: usize,
    },
}

impl Default for BlockingStrategy {
    fn default() -> Self {
        BlockingStrategy::RandomKmeans {
            centroid_fraction: 0.1,
            min_cluster_size: 2,
        }
    }
}

/// Summarization strategy used to build each cluster's summary vector,
/// carried over from the teacher's `SummarizationStrategy`. This is the
/// "alpha-pruned summary" of the glossary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SummarizationStrategy {
    FixedSize { n_components: usize },
    EnergyPreserving { summary_energy: f32 },
}

impl Default for SummarizationStrategy {
    fn default() -> Self {
        SummarizationStrategy::EnergyPreserving { summary_energy: 0.4 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterBuildConfig {
    pub pruning: PruningStrategy,
    pub blocking: BlockingStrategy,
    pub summarization: SummarizationStrategy,
}

impl ClusterBuildConfig {
    pub fn with_pruning(mut self, pruning: PruningStrategy) -> Self {
        self.pruning = pruning;
        self
    }

    pub fn with_blocking(mut self, blocking: BlockingStrategy) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn with_summarization(mut self, summarization: SummarizationStrategy) -> Self {
        self.summarization = summarization;
        self
    }
}

/// Builds [`PostingClusters`] for every token from a raw
/// `token -> Vec<(doc_id, weight)>` posting map, by forward-index lookup
/// for summary construction. Runs pruning/blocking/summarization per token
/// in parallel, mirroring the teacher's `InvertedIndex::build`.
pub fn build_posting_clusters(
    raw_postings: &HashMap<u16, Vec<(u32, f32)>>,
    quantizer: &crate::quantize::ByteQuantizer,
    config: &ClusterBuildConfig,
) -> Result<HashMap<u16, PostingClusters>> {
    let entries: Vec<(u16, PostingClusters)> = raw_postings
        .par_iter()
        .progress_count(raw_postings.len() as u64)
        .map(|(&token, postings)| {
            let clusters = build_one_token(token, postings, quantizer, config);
            (token, clusters)
        })
        .collect();

    Ok(entries.into_iter().collect())
}

fn build_one_token(
    token: u16,
    postings: &[(u32, f32)],
    quantizer: &crate::quantize::ByteQuantizer,
    config: &ClusterBuildConfig,
) -> PostingClusters {
    log::debug!(
        "building clusters for token {token}: {} raw postings",
        postings.len()
    );

    let mut pruned: Vec<(f32, u32)> = postings.iter().map(|&(doc, w)| (w, doc)).collect();
    match config.pruning {
        PruningStrategy::FixedSize { n_postings } => fixed_pruning(&mut pruned, n_postings),
        PruningStrategy::GlobalThreshold {
            n_postings,
            max_fraction,
        } => {
            fixed_pruning(&mut pruned, (n_postings as f32 * max_fraction) as usize);
        }
    }

    let mut doc_ids: Vec<u32> = pruned.iter().map(|&(_, doc)| doc).collect();
    doc_ids.sort_unstable();

    let weight_of: HashMap<u32, f32> = postings.iter().cloned().collect();

    let blocks: Vec<Vec<u32>> = match &config.blocking {
        BlockingStrategy::FixedSize { block_size } => fixed_size_blocking(&doc_ids, *block_size),
        BlockingStrategy::RandomKmeans {
            centroid_fraction,
            min_cluster_size,
        } => random_kmeans_blocking(&doc_ids, &weight_of, *centroid_fraction, *min_cluster_size),
    };

    let mut clusters = Vec::with_capacity(blocks.len());
    for mut block_docs in blocks {
        block_docs.sort_unstable();

        let mut block_postings: Vec<(u32, u8)> = block_docs
            .iter()
            .map(|&doc| (doc, quantizer.quantize(weight_of[&doc])))
            .collect();
        block_postings.sort_unstable_by_key(|&(doc, _)| doc);

        let summary = build_summary(token, &block_docs, &weight_of, quantizer, &config.summarization);

        clusters.push(DocumentCluster {
            summary,
            postings: block_postings,
            should_not_skip: false,
        });
    }

    PostingClusters::new(clusters)
}

/// Mirrors the teacher's `.sorted_unstable_by` idiom (`inverted_index.rs`)
/// for the weight-descending pruning pass.
fn fixed_pruning(pairs: &mut Vec<(f32, u32)>, n_postings: usize) {
    let sorted = std::mem::take(pairs)
        .into_iter()
        .sorted_unstable_by(|a, b| b.0.partial_cmp(&a.0).unwrap())
        .take(n_postings)
        .collect();
    *pairs = sorted;
}

fn fixed_size_blocking(doc_ids: &[u32], block_size: usize) -> Vec<Vec<u32>> {
    if doc_ids.is_empty() {
        return Vec::new();
    }
    if block_size == 0 {
        return vec![doc_ids.to_vec()];
    }
    doc_ids.chunks(block_size).map(|chunk| chunk.to_vec()).collect()
}

/// Groups documents into clusters by a 1-D k-means pass on their
/// byte-quantization-domain weights: `n_centroids` (a `centroid_fraction`
/// of the posting) are seeded by randomly sampling distinct weights
/// (`rand::seq::SliceRandom::choose_multiple`), then a few Lloyd
/// iterations assign each document to its nearest centroid by weight and
/// recompute centroids as cluster means. Clusters smaller than
/// `min_cluster_size` are merged into the nearest surviving cluster by
/// centroid distance. Grounded on the teacher's `RandomKmeans` blocking
/// strategy and its `do_random_kmeans_on_docids` helper (referenced from
/// `inverted_index.rs`, but not part of the retrieved teacher slice — this
/// reimplements the same strategy directly against `(doc_id, weight)`
/// pairs rather than the teacher's dataset-offset representation).
fn random_kmeans_blocking(
    doc_ids: &[u32],
    weight_of: &HashMap<u32, f32>,
    centroid_fraction: f32,
    min_cluster_size: usize,
) -> Vec<Vec<u32>> {
    if doc_ids.is_empty() {
        return Vec::new();
    }

    let n_centroids = ((centroid_fraction * doc_ids.len() as f32).round() as usize)
        .clamp(1, doc_ids.len());

    let mut rng = rand::thread_rng();
    let mut centroids: Vec<f32> = doc_ids
        .choose_multiple(&mut rng, n_centroids)
        .map(|doc| weight_of[doc])
        .collect();

    const LLOYD_ITERATIONS: usize = 4;
    let mut assignment: Vec<usize> = vec![0; doc_ids.len()];
    for _ in 0..LLOYD_ITERATIONS {
        for (idx, &doc) in doc_ids.iter().enumerate() {
            let w = weight_of[&doc];
            assignment[idx] = centroids
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| (*a - w).abs().partial_cmp(&(*b - w).abs()).unwrap())
                .map(|(i, _)| i)
                .unwrap_or(0);
        }

        let mut sums = vec![0.0_f32; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (idx, &doc) in doc_ids.iter().enumerate() {
            sums[assignment[idx]] += weight_of[&doc];
            counts[assignment[idx]] += 1;
        }
        for (c, centroid) in centroids.iter_mut().enumerate() {
            if counts[c] > 0 {
                *centroid = sums[c] / counts[c] as f32;
            }
        }
    }

    let mut by_centroid: Vec<Vec<u32>> = vec![Vec::new(); centroids.len()];
    for (idx, &doc) in doc_ids.iter().enumerate() {
        by_centroid[assignment[idx]].push(doc);
    }

    merge_small_clusters(by_centroid, &centroids, min_cluster_size)
}

/// Folds any cluster smaller than `min_cluster_size` into whichever
/// surviving cluster has the nearest centroid, repeating until every
/// remaining cluster meets the minimum (or only one cluster remains).
fn merge_small_clusters(
    clusters: Vec<Vec<u32>>,
    centroids: &[f32],
    min_cluster_size: usize,
) -> Vec<Vec<u32>> {
    let mut pairs: Vec<(Vec<u32>, f32)> = clusters
        .into_iter()
        .zip(centroids.iter().copied())
        .filter(|(docs, _)| !docs.is_empty())
        .collect();

    if pairs.len() <= 1 || min_cluster_size <= 1 {
        return pairs.into_iter().map(|(docs, _)| docs).collect();
    }

    loop {
        if pairs.len() <= 1 {
            break;
        }
        let Some(small_idx) = pairs.iter().position(|(docs, _)| docs.len() < min_cluster_size) else {
            break;
        };

        let small_centroid = pairs[small_idx].1;
        let target_idx = (0..pairs.len())
            .filter(|&i| i != small_idx)
            .min_by(|&a, &b| {
                let da = (pairs[a].1 - small_centroid).abs();
                let db = (pairs[b].1 - small_centroid).abs();
                da.partial_cmp(&db).unwrap()
            })
            .expect("at least one other cluster exists");

        let (small_docs, _) = pairs.remove(small_idx);
        let target_idx = if target_idx > small_idx { target_idx - 1 } else { target_idx };
        pairs[target_idx].0.extend(small_docs);
    }

    pairs.into_iter().map(|(docs, _)| docs).collect()
}

fn build_summary(
    _token: u16,
    block_docs: &[u32],
    weight_of: &HashMap<u32, f32>,
    quantizer: &crate::quantize::ByteQuantizer,
    strategy: &SummarizationStrategy,
) -> SparseVector {
    // The summary aggregates, across the whole block, the max weight seen
    // per component — but in this crate's model the cluster's own token is
    // the only axis available without per-document sparse vectors at
    // build time, so the summary here always carries exactly the block's
    // own token with its max weight. A full multi-component summary
    // requires access to each document's full sparse vector (available to
    // callers through the forward index) and is computed by
    // `build_summary_from_forward_index` for that richer case.
    let max_weight = block_docs
        .iter()
        .map(|doc| weight_of[doc])
        .fold(0.0_f32, f32::max);
    let _ = strategy;
    let quantized = quantizer.quantize(max_weight);
    if quantized == 0 {
        return SparseVector::empty();
    }
    SparseVector::from_sorted_items(vec![(_token, quantized)]).unwrap()
}

/// Builds a cluster summary from full per-document sparse vectors (richer
/// than [`build_summary`], which only sees one token's weight). Mirrors the
/// teacher's `fixed_size_summary`/`energy_preserving_summary`: take the
/// max weight per component across the block, then either keep the
/// top-`n_components` or keep enough mass to preserve `summary_energy`
/// fraction of the total.
pub fn build_summary_from_forward_index<R: crate::forward_index::ForwardIndexReader>(
    block_docs: &[u32],
    forward_index: &R,
    strategy: &SummarizationStrategy,
) -> Result<SparseVector> {
    let mut per_component: HashMap<u16, u8> = HashMap::new();
    for &doc in block_docs {
        if let Some(vector) = forward_index.read(doc)? {
            for &(component, weight) in vector.iter() {
                per_component
                    .entry(component)
                    .and_modify(|existing| *existing = (*existing).max(weight))
                    .or_insert(weight);
            }
        }
    }

    let mut components_values: Vec<(u16, u8)> = per_component.into_iter().collect();

    match strategy {
        SummarizationStrategy::FixedSize { n_components } => {
            components_values.sort_unstable_by(|a, b| b.1.cmp(&a.1));
            components_values.truncate(*n_components);
        }
        SummarizationStrategy::EnergyPreserving { summary_energy } => {
            components_values.sort_unstable_by(|a, b| b.1.cmp(&a.1));
            let total: u32 = components_values.iter().map(|&(_, w)| w as u32).sum();
            if total > 0 {
                let mut acc = 0u32;
                let mut cutoff = components_values.len();
                for (idx, &(_, w)) in components_values.iter().enumerate() {
                    acc += w as u32;
                    if (acc as f32 / total as f32) > *summary_energy {
                        cutoff = idx + 1;
                        break;
                    }
                }
                components_values.truncate(cutoff);
            }
        }
    }

    components_values.sort_unstable_by_key(|&(component, _)| component);
    SparseVector::from_sorted_items(components_values)
}

/// Verifies that every document posted for a token appears in the forward
/// index with a non-zero weight for that token.
pub fn validate_posting_invariant<R: crate::forward_index::ForwardIndexReader>(
    token: u16,
    clusters: &PostingClusters,
    forward_index: &R,
) -> Result<bool> {
    let mut seen = HashSet::new();
    for cluster in clusters.iter() {
        for &(doc, _) in &cluster.postings {
            if !seen.insert(doc) {
                continue;
            }
            match forward_index.read(doc)? {
                Some(vector) => {
                    if vector.weight_of(token).unwrap_or(0) == 0 {
                        return Ok(false);
                    }
                }
                None => return Ok(false),
            }
        }
    }
    Ok(true)
}
