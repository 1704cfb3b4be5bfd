//! Multi-layer sampling: one block per GNN layer, outermost layer first.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{Fanout, SamplerConfig, SamplingScheme};
use crate::error::Result;
use crate::graph::{CandidateSubgraph, GlobalNodeId, GraphQuery};
use crate::sampling::block::{build_block, Block};
use crate::sampling::correlation::{BatchSeeds, CorrelationState, SharedCorrelation};
use crate::sampling::labor::sample_labor;
use crate::sampling::probability::{cap_probabilities, node_probabilities};
use crate::sampling::selector::{select_all, select_multinomial, select_poisson, Selection};

/// Everything a GNN forward pass needs for one mini-batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledBatch {
    /// Sources of the first block: the nodes whose input features are read.
    pub input_nodes: Vec<GlobalNodeId>,
    /// The batch's seed nodes, in caller order.
    pub output_nodes: Vec<GlobalNodeId>,
    /// `blocks[i]` feeds GNN layer `i`; the last block's destinations are
    /// `output_nodes`.
    pub blocks: Vec<Block>,
}

impl SampledBatch {
    pub fn num_layers(&self) -> usize {
        self.blocks.len()
    }

    pub fn num_edges(&self) -> usize {
        self.blocks.iter().map(Block::num_edges).sum()
    }
}

/// Something that turns seed nodes into a stack of blocks.
pub trait BlockSampler {
    fn sample_blocks<G: GraphQuery + ?Sized>(
        &self,
        graph: &G,
        seeds: &[GlobalNodeId],
        batch: BatchSeeds,
    ) -> Result<SampledBatch>;
}

/// Layer-wise sampler driven by a [`SamplerConfig`].
#[derive(Debug, Clone)]
pub struct LayerSampler {
    config: SamplerConfig,
}

impl LayerSampler {
    pub fn new(config: SamplerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// A fresh correlation state for this configuration.
    pub fn correlation_state(&self) -> Result<CorrelationState> {
        match self.config.seed {
            Some(seed) => CorrelationState::with_seed(self.config.batch_dependency, seed),
            None => CorrelationState::new(self.config.batch_dependency),
        }
    }

    /// Sample one batch, advancing `state` by one step.
    pub fn sample<G: GraphQuery + ?Sized>(
        &self,
        graph: &G,
        seeds: &[GlobalNodeId],
        state: &mut CorrelationState,
    ) -> Result<SampledBatch> {
        self.sample_with_seeds(graph, seeds, state.begin_batch())
    }

    /// Sample one batch with explicit seeds; repeatable for equal inputs.
    pub fn sample_with_seeds<G: GraphQuery + ?Sized>(
        &self,
        graph: &G,
        seeds: &[GlobalNodeId],
        batch: BatchSeeds,
    ) -> Result<SampledBatch> {
        let num_layers = self.config.num_layers();
        let mut current = seeds.to_vec();
        let mut blocks = Vec::with_capacity(num_layers);

        for (iteration, layer) in (0..num_layers).rev().enumerate() {
            let fanout = self.config.fanouts[layer];
            let candidate = graph.induced_subgraph(&current)?;

            let isolated = candidate.isolated_seeds();
            if !isolated.is_empty() {
                log::debug!(
                    "layer {}: {} of {} seeds have no in-edges",
                    layer,
                    isolated.len(),
                    candidate.num_seeds
                );
            }

            let weights = candidate.gather_edge_weights(graph.edge_weights())?;
            let selection = self.select(&candidate, &weights, fanout, iteration, batch)?;
            let block = build_block(&candidate, &selection, &weights)?;

            log::debug!(
                "layer {} ({}, fanout {}): {} seeds, {} candidates, {} sampled, {} edges",
                layer,
                self.config.scheme.name(),
                fanout,
                candidate.num_seeds,
                candidate.num_nodes(),
                block.num_src(),
                block.num_edges()
            );

            current = block.src_nodes().to_vec();
            blocks.push(block);
        }
        blocks.reverse();

        Ok(SampledBatch {
            input_nodes: current,
            output_nodes: seeds.to_vec(),
            blocks,
        })
    }

    /// Sample many batches in parallel.
    ///
    /// Seeds are reserved from `correlation` in batch order before any work
    /// starts, so the result depends only on the state, not on scheduling.
    pub fn sample_batches<G: GraphQuery + ?Sized>(
        &self,
        graph: &G,
        batches: &[Vec<GlobalNodeId>],
        correlation: &SharedCorrelation,
    ) -> Result<Vec<SampledBatch>> {
        let reserved = correlation.begin_batches(batches.len());
        batches
            .par_iter()
            .zip(reserved)
            .map(|(seeds, batch)| self.sample_with_seeds(graph, seeds, batch))
            .collect()
    }

    fn select(
        &self,
        candidate: &CandidateSubgraph,
        weights: &[f64],
        fanout: Fanout,
        iteration: usize,
        batch: BatchSeeds,
    ) -> Result<Selection> {
        match &self.config.scheme {
            SamplingScheme::Multinomial { policy, replace } => {
                let probs = node_probabilities(candidate, weights, *policy)?;
                match fanout {
                    Fanout::All => select_all(&probs, candidate.num_seeds),
                    Fanout::Limit(k) => {
                        select_multinomial(&probs, k, *replace, candidate.num_seeds, &mut batch.node_rng(iteration))
                    }
                }
            }
            SamplingScheme::Poisson { policy } => {
                let probs = node_probabilities(candidate, weights, *policy)?;
                match fanout {
                    Fanout::All => select_all(&probs, candidate.num_seeds),
                    Fanout::Limit(k) => {
                        let capped = cap_probabilities(&probs, k);
                        if !capped.converged {
                            log::debug!(
                                "capping stopped after {} iterations at expected size {:.2} (target {})",
                                capped.iterations,
                                capped.expected_count(),
                                k
                            );
                        }
                        select_poisson(&capped.probabilities, candidate.num_seeds, &mut batch.node_rng(iteration))
                    }
                }
            }
            SamplingScheme::Labor {
                importance_iterations,
                layer_dependency,
                weighted,
            } => {
                let bias = if *weighted { Some(weights) } else { None };
                sample_labor(
                    candidate,
                    fanout,
                    bias,
                    *importance_iterations,
                    batch.layer_seed(iteration, *layer_dependency),
                )
            }
        }
    }
}

impl BlockSampler for LayerSampler {
    fn sample_blocks<G: GraphQuery + ?Sized>(
        &self,
        graph: &G,
        seeds: &[GlobalNodeId],
        batch: BatchSeeds,
    ) -> Result<SampledBatch> {
        self.sample_with_seeds(graph, seeds, batch)
    }
}
