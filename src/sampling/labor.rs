//! Layer-neighbor (LABOR) sampling.
//!
//! Each seed keeps an in-edge `(s -> t)` when a uniform variate tied to the
//! *source* `s` falls below the edge's inclusion probability. Because the
//! variate depends only on the source and the layer seed, seeds sharing a
//! neighbor make correlated decisions and far fewer distinct sources are
//! pulled in than with independent per-seed sampling, while each seed still
//! keeps `fanout` edges in expectation.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::config::Fanout;
use crate::error::{Result, SamplingError};
use crate::graph::{CandidateSubgraph, GlobalNodeId, LocalId, SubgraphEdgeId, SubgraphNodeId};
use crate::sampling::probability::{cap_probabilities, scale_to_unit};
use crate::sampling::selector::{union_with_seeds, InclusionProbabilities, Selection};

/// Uniform variate in `[0, 1)` shared by every edge leaving `source` under
/// `layer_seed`.
pub fn source_variate(layer_seed: u64, source: GlobalNodeId) -> f64 {
    let mixed = layer_seed ^ source.0.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    Pcg32::seed_from_u64(mixed).gen::<f64>()
}

/// Sample the candidate subgraph edge by edge.
///
/// `edge_bias` (indexed by subgraph edge) skews inclusion towards heavier
/// edges; `None` is uniform. Each importance iteration raises a source's
/// multiplier to the largest scale any of its seeds gives it, then re-solves
/// every seed's scale.
pub fn sample_labor(
    candidate: &CandidateSubgraph,
    fanout: Fanout,
    edge_bias: Option<&[f64]>,
    importance_iterations: usize,
    layer_seed: u64,
) -> Result<Selection> {
    let num_edges = candidate.num_edges();
    if let Some(bias) = edge_bias {
        if bias.len() != num_edges {
            return Err(SamplingError::id_space_mismatch(
                SubgraphEdgeId::SPACE,
                bias.len(),
                num_edges,
            ));
        }
    }
    let edge_bias = edge_bias.map(scale_to_unit);
    let bias = |e: SubgraphEdgeId| edge_bias.as_ref().map_or(1.0, |b| b[e.index()]);

    let mut seed_edges: Vec<Vec<(SubgraphEdgeId, SubgraphNodeId)>> = vec![Vec::new(); candidate.num_seeds];
    for (e, s, t) in candidate.graph.edges() {
        seed_edges
            .get_mut(t.index())
            .ok_or_else(|| SamplingError::id_space_mismatch(SubgraphNodeId::SPACE, t.index(), candidate.num_seeds))?
            .push((e, s));
    }

    let mut multiplier = vec![1.0f64; candidate.num_nodes()];
    let mut scales = vec![1.0f64; candidate.num_seeds];
    let mut probabilities = vec![0.0f64; num_edges];

    for round in 0..=importance_iterations {
        if round > 0 {
            let mut next = vec![0.0f64; candidate.num_nodes()];
            for (edges, &c) in seed_edges.iter().zip(&scales) {
                for &(_, s) in edges {
                    let raised = (c * multiplier[s.index()]).min(1.0);
                    next[s.index()] = next[s.index()].max(raised);
                }
            }
            multiplier = next;
        }

        let mut unconverged = 0;
        for (t, edges) in seed_edges.iter().enumerate() {
            let raw: Vec<f64> = edges
                .iter()
                .map(|&(e, s)| bias(e) * multiplier[s.index()])
                .collect();
            let capped = cap_probabilities(&raw, fanout.target(edges.len()));
            if !capped.converged {
                unconverged += 1;
            }
            // Everything included: any scale works, saturate it
            scales[t] = if edges.len() <= fanout.target(edges.len()) {
                f64::INFINITY
            } else {
                capped.scale
            };
            for (&(e, _), p) in edges.iter().zip(capped.probabilities) {
                probabilities[e.index()] = p;
            }
        }
        if unconverged > 0 {
            log::debug!(
                "LABOR round {}: capping did not converge for {} of {} seeds",
                round,
                unconverged,
                candidate.num_seeds
            );
        }
    }

    let mut variates = vec![None; candidate.num_nodes()];
    let mut kept = Vec::new();
    let mut drawn = Vec::new();
    for (e, s, _) in candidate.graph.edges() {
        let p = probabilities[e.index()];
        if p <= 0.0 {
            continue;
        }
        let r = match variates[s.index()] {
            Some(r) => r,
            None => {
                let r = source_variate(layer_seed, candidate.node_map.get(s)?);
                variates[s.index()] = Some(r);
                r
            }
        };
        if r < p {
            kept.push(e);
            drawn.push(s);
        }
    }

    let (nodes, seed_positions) = union_with_seeds(drawn, candidate.num_seeds)?;
    Ok(Selection {
        nodes,
        seed_positions,
        edges: Some(kept),
        probabilities: InclusionProbabilities::PerEdge(probabilities),
    })
}
