use anyhow::{bail, Context};
use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow_graph_sampling::prelude::*;
use clap::Parser;
use serde::Serialize;
use std::fs::File;
use std::io::Seek;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "arrow-graph-sampler")]
#[command(about = "Sample GNN message-flow blocks from an edge list")]
#[command(version)]
struct Cli {
    /// CSV edge list with a header: source,target[,weight]
    #[arg(short, long)]
    edges: PathBuf,

    /// JSON sampler configuration; overrides --fanouts
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma separated per-layer fanouts, input layer first (-1 takes all)
    #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true, default_value = "10,10")]
    fanouts: Vec<i64>,

    /// Comma separated seed node IDs
    #[arg(short, long, value_delimiter = ',', required = true)]
    seeds: Vec<u64>,

    /// Number of batches to sample from the same seeds
    #[arg(short, long, default_value_t = 1)]
    batches: usize,

    /// Master seed for the correlation state
    #[arg(long)]
    random_seed: Option<u64>,

    /// Print the full blocks instead of a summary
    #[arg(long)]
    full: bool,
}

#[derive(Serialize)]
struct LayerSummary {
    num_src: usize,
    num_dst: usize,
    num_edges: usize,
}

#[derive(Serialize)]
struct BatchSummary {
    batch: usize,
    num_input_nodes: usize,
    num_output_nodes: usize,
    layers: Vec<LayerSummary>,
}

impl BatchSummary {
    fn new(batch: usize, sampled: &SampledBatch) -> Self {
        Self {
            batch,
            num_input_nodes: sampled.input_nodes.len(),
            num_output_nodes: sampled.output_nodes.len(),
            layers: sampled
                .blocks
                .iter()
                .map(|b| LayerSummary {
                    num_src: b.num_src(),
                    num_dst: b.num_dst(),
                    num_edges: b.num_edges(),
                })
                .collect(),
        }
    }
}

fn load_edges(path: &Path) -> anyhow::Result<ArrowGraph> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, Some(1000))
        .context("inferring edge list schema")?;
    file.rewind()?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(Arc::clone(&schema)).with_header(true).build(file)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let edges = concat_batches(&schema, &batches)?;

    let graph = ArrowGraph::from_edges(edges).context("building graph from edge list")?;
    log::info!(
        "loaded {} nodes and {} edges from {}",
        graph.num_nodes(),
        graph.num_edges(),
        path.display()
    );
    Ok(graph)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SamplerConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SamplerConfig::from_fanouts(&cli.fanouts)?,
    };
    if let Some(seed) = cli.random_seed {
        config = config.with_seed(seed);
    }
    if cli.batches == 0 {
        bail!("--batches must be at least 1");
    }

    let graph = load_edges(&cli.edges)?;
    let seeds: Vec<GlobalNodeId> = cli.seeds.iter().copied().map(GlobalNodeId).collect();
    if seeds.is_empty() {
        log::warn!("empty seed set, every batch will be empty");
    }

    let sampler = LayerSampler::new(config)?;
    let correlation = SharedCorrelation::new(sampler.correlation_state()?);
    let batches = vec![seeds; cli.batches];
    let sampled = sampler.sample_batches(&graph, &batches, &correlation)?;

    for (i, batch) in sampled.iter().enumerate() {
        if batch.num_edges() == 0 {
            log::warn!("batch {} sampled no edges", i);
        }
        let line = if cli.full {
            serde_json::to_string(batch)?
        } else {
            serde_json::to_string(&BatchSummary::new(i, batch))?
        };
        println!("{}", line);
    }

    Ok(())
}
