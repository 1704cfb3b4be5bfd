//! Neighbor selection over subgraph-local candidates.
//!
//! Whatever the scheme, seeds are unioned back into the drawn set so the
//! block's destination nodes can always be found among its sources.

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::index::sample_weighted;
use rand::Rng;

use crate::error::{Result, SamplingError};
use crate::graph::{LocalId, SampleNodeId, SubgraphEdgeId, SubgraphNodeId};
use crate::sampling::probability::scale_to_unit;

/// Inclusion probabilities used for the Horvitz-Thompson correction.
#[derive(Debug, Clone, PartialEq)]
pub enum InclusionProbabilities {
    /// Indexed by subgraph node; applies to every edge leaving that node.
    PerNode(Vec<f64>),
    /// Indexed by subgraph edge.
    PerEdge(Vec<f64>),
}

/// Output of a selector, consumed by the block builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Sorted, unique, and always containing every seed.
    pub nodes: Vec<SubgraphNodeId>,
    /// Seed `i` sits at `nodes[seed_positions[i]]`.
    pub seed_positions: Vec<SampleNodeId>,
    /// Explicit edge set for edge-level schemes; `None` keeps every candidate
    /// edge between selected nodes.
    pub edges: Option<Vec<SubgraphEdgeId>>,
    pub probabilities: InclusionProbabilities,
}

impl Selection {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Union drawn candidates with the seeds (subgraph positions `0..num_seeds`)
/// and locate each seed inside the union.
pub fn union_with_seeds(
    mut drawn: Vec<SubgraphNodeId>,
    num_seeds: usize,
) -> Result<(Vec<SubgraphNodeId>, Vec<SampleNodeId>)> {
    drawn.extend((0..num_seeds).map(SubgraphNodeId));
    drawn.sort_unstable();
    drawn.dedup();

    let positions = (0..num_seeds)
        .map(|s| {
            drawn
                .binary_search(&SubgraphNodeId(s))
                .map(SampleNodeId)
                .map_err(|_| SamplingError::id_space_mismatch(SubgraphNodeId::SPACE, s, drawn.len()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((drawn, positions))
}

/// Draw `num` candidates proportional to `probs`.
///
/// The request is truncated to the number of candidates with positive
/// probability, so zero-probability nodes are never drawn. Draws run on
/// `probs` scaled to a maximum of 1; weighted sampling keys underflow for
/// tiny weights. The unscaled values are kept as inclusion probabilities.
pub fn select_multinomial<R: Rng + ?Sized>(
    probs: &[f64],
    num: usize,
    replace: bool,
    num_seeds: usize,
    rng: &mut R,
) -> Result<Selection> {
    if let Some((i, p)) = probs.iter().enumerate().find(|(_, p)| !p.is_finite() || **p < 0.0) {
        return Err(SamplingError::invalid_parameter(format!(
            "sampling probability of candidate {} is {}; must be finite and non-negative",
            i, p
        )));
    }
    let positive = probs.iter().filter(|&&p| p > 0.0).count();
    let request = num.min(positive);
    let scaled = scale_to_unit(probs);

    let drawn: Vec<SubgraphNodeId> = if request == 0 {
        Vec::new()
    } else if replace {
        let dist = WeightedIndex::new(&scaled)
            .map_err(|e| SamplingError::invalid_parameter(format!("bad sampling probabilities: {}", e)))?;
        (0..request).map(|_| SubgraphNodeId(dist.sample(rng))).collect()
    } else {
        sample_weighted(rng, scaled.len(), |i| scaled[i], request)
            .map_err(|e| SamplingError::invalid_parameter(format!("bad sampling probabilities: {}", e)))?
            .into_iter()
            .map(SubgraphNodeId)
            .collect()
    };

    let (nodes, seed_positions) = union_with_seeds(drawn, num_seeds)?;
    Ok(Selection {
        nodes,
        seed_positions,
        edges: None,
        probabilities: InclusionProbabilities::PerNode(probs.to_vec()),
    })
}

/// Include each candidate independently with probability `probs[i]`.
///
/// `probs` should already be capped into `[0, 1]`.
pub fn select_poisson<R: Rng + ?Sized>(probs: &[f64], num_seeds: usize, rng: &mut R) -> Result<Selection> {
    let drawn: Vec<SubgraphNodeId> = probs
        .iter()
        .enumerate()
        .filter(|&(_, &p)| rng.gen::<f64>() < p)
        .map(|(i, _)| SubgraphNodeId(i))
        .collect();

    let (nodes, seed_positions) = union_with_seeds(drawn, num_seeds)?;
    Ok(Selection {
        nodes,
        seed_positions,
        edges: None,
        probabilities: InclusionProbabilities::PerNode(probs.to_vec()),
    })
}

/// Take every candidate with positive probability; each is included with
/// certainty.
pub fn select_all(probs: &[f64], num_seeds: usize) -> Result<Selection> {
    let drawn: Vec<SubgraphNodeId> = probs
        .iter()
        .enumerate()
        .filter(|&(_, &p)| p > 0.0)
        .map(|(i, _)| SubgraphNodeId(i))
        .collect();
    let certain = probs.iter().map(|&p| if p > 0.0 { 1.0 } else { 0.0 }).collect();

    let (nodes, seed_positions) = union_with_seeds(drawn, num_seeds)?;
    Ok(Selection {
        nodes,
        seed_positions,
        edges: None,
        probabilities: InclusionProbabilities::PerNode(certain),
    })
}
