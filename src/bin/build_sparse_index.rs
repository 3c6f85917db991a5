//! Offline tool that builds a persisted sparse segment (forward index +
//! clustered postings) from a newline-delimited JSON input file, one
//! sparse-vector object per line in the ingest wire format.
//!
//! Generalized from the teacher's `build_inverted_index` binary: the CLI
//! shape (n_postings/block_size/centroid_fraction/summary_energy flags) is
//! kept, but it now drives [`build_posting_clusters`] and
//! [`ForwardIndex`]/[`write_posting_clusters`] instead of the teacher's
//! `InvertedIndex::build`.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};

use clap::Parser;

use seismic_core::forward_index::{ForwardIndex, ForwardIndexWriter};
use seismic_core::posting_list::{
    build_posting_clusters, BlockingStrategy, ClusterBuildConfig, PruningStrategy,
    SummarizationStrategy,
};
use seismic_core::quantize::ByteQuantizer;
use seismic_core::wire::{parse_sparse_vector_json, write_posting_clusters};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to a newline-delimited JSON file, one ingest-time sparse vector
    /// object per line (doc_id is the 0-based line number).
    #[clap(short, long, value_parser)]
    input_file: String,

    /// Output path; the forward index and postings are written as
    /// `<output_file>.fwd` and `<output_file>.postings`.
    #[clap(short, long, value_parser)]
    output_file: String,

    /// Ingest-time quantization ceiling.
    #[clap(long, value_parser)]
    #[arg(default_value_t = 5.0)]
    ceiling: f32,

    /// The number of postings to be selected in each posting list.
    #[clap(short, long, value_parser)]
    #[arg(default_value_t = 3500)]
    n_postings: usize,

    /// Block size used by the fixed-size blocking strategy.
    #[clap(short, long, value_parser)]
    #[arg(default_value_t = 0)]
    block_size: usize,

    /// Fraction of a pruned posting's length used as the centroid count
    /// for the random-kmeans blocking strategy (ignored if block_size > 0).
    #[clap(long, value_parser)]
    #[arg(default_value_t = 0.1)]
    centroid_fraction: f32,

    #[clap(long, value_parser)]
    #[arg(default_value_t = 2)]
    min_cluster_size: usize,

    /// Fraction of summary mass kept per cluster (alpha-pruned summary).
    #[clap(long, value_parser)]
    #[arg(default_value_t = 0.4)]
    summary_energy: f32,
}

fn main() -> seismic_core::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let quantizer = ByteQuantizer::new(args.ceiling)?;

    let file = File::open(&args.input_file)?;
    let reader = BufReader::new(file);

    let mut forward_index = ForwardIndex::with_capacity(0);
    let mut raw_postings: HashMap<u16, Vec<(u32, f32)>> = HashMap::new();

    for (doc_id, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc_id = doc_id as u32;
        let vector = parse_sparse_vector_json(&line, &quantizer)?;
        for &(token, weight) in vector.items() {
            raw_postings
                .entry(token)
                .or_default()
                .push((doc_id, quantizer.dequantize(weight)));
        }
        forward_index.write(doc_id, vector)?;
    }

    log::info!(
        "read {} documents, {} distinct tokens",
        forward_index.len(),
        raw_postings.len()
    );

    let blocking = if args.block_size > 0 {
        BlockingStrategy::FixedSize {
            block_size: args.block_size,
        }
    } else {
        BlockingStrategy::RandomKmeans {
            centroid_fraction: args.centroid_fraction,
            min_cluster_size: args.min_cluster_size,
        }
    };

    let config = ClusterBuildConfig::default()
        .with_pruning(PruningStrategy::FixedSize {
            n_postings: args.n_postings,
        })
        .with_blocking(blocking)
        .with_summarization(SummarizationStrategy::EnergyPreserving {
            summary_energy: args.summary_energy,
        });

    log::debug!("cluster build config: {config:?}");

    let clusters_by_token = build_posting_clusters(&raw_postings, &quantizer, &config)?;

    let postings_path = format!("{}.postings", args.output_file);
    let mut postings_writer = BufWriter::new(File::create(&postings_path)?);
    postings_writer.write_all(&(clusters_by_token.len() as u32).to_le_bytes())?;

    let mut tokens: Vec<u16> = clusters_by_token.keys().copied().collect();
    tokens.sort_unstable();
    for token in tokens {
        postings_writer.write_all(&token.to_le_bytes())?;
        write_posting_clusters(&mut postings_writer, &clusters_by_token[&token])?;
    }
    postings_writer.flush()?;

    let fwd_path = format!("{}.fwd", args.output_file);
    let serialized = bincode::serialize(&forward_index_snapshot(&forward_index))?;
    fs::write(&fwd_path, serialized)?;

    log::info!("wrote {postings_path} and {fwd_path}");
    Ok(())
}

/// `ForwardIndex` does not derive `Serialize` (it is a query-time, in-memory
/// structure); the offline tool snapshots its per-doc vectors directly.
fn forward_index_snapshot(
    index: &ForwardIndex,
) -> Vec<Option<seismic_core::SparseVector>> {
    use seismic_core::forward_index::ForwardIndexReader;
    (0..index.len() as u32)
        .map(|doc_id| index.read(doc_id).unwrap_or(None))
        .collect()
}
