use serde::{Deserialize, Serialize};

use crate::error::{Result, SamplingError};
use crate::graph::{
    BlockNodeId, CandidateSubgraph, Direction, GlobalEdgeId, GlobalNodeId, IdMap, InducedGraph, LocalGraph,
    LocalId, SampleEdgeId, SampleNodeId, SubgraphEdgeId, SubgraphNodeId,
};
use crate::sampling::probability::scale_to_unit;
use crate::sampling::selector::{InclusionProbabilities, Selection};

/// One GNN layer's message-flow graph.
///
/// Source nodes are the sampled ancestors; the first `num_dst` of them are the
/// destination nodes (the layer's seeds), so every destination can read its
/// own previous-layer representation. Edges run source -> destination and
/// carry the corrected importance weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    src_nodes: Vec<GlobalNodeId>,
    num_dst: usize,
    edge_src: Vec<BlockNodeId>,
    edge_dst: Vec<BlockNodeId>,
    edge_ids: Vec<GlobalEdgeId>,
    edge_weights: Vec<f64>,
}

/// A block edge expressed in global IDs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockEdge {
    pub src: GlobalNodeId,
    pub dst: GlobalNodeId,
    pub edge_id: GlobalEdgeId,
    pub weight: f64,
}

impl Block {
    pub fn src_nodes(&self) -> &[GlobalNodeId] {
        &self.src_nodes
    }

    pub fn dst_nodes(&self) -> &[GlobalNodeId] {
        &self.src_nodes[..self.num_dst]
    }

    pub fn num_src(&self) -> usize {
        self.src_nodes.len()
    }

    pub fn num_dst(&self) -> usize {
        self.num_dst
    }

    pub fn num_edges(&self) -> usize {
        self.edge_ids.len()
    }

    /// Original graph edge ID of each block edge.
    pub fn edge_ids(&self) -> &[GlobalEdgeId] {
        &self.edge_ids
    }

    pub fn edge_weights(&self) -> &[f64] {
        &self.edge_weights
    }

    /// Edges in block-local indices, for message passing.
    pub fn local_edges(&self) -> impl Iterator<Item = (BlockNodeId, BlockNodeId)> + '_ {
        self.edge_src.iter().copied().zip(self.edge_dst.iter().copied())
    }

    pub fn edges(&self) -> impl Iterator<Item = BlockEdge> + '_ {
        self.local_edges()
            .zip(self.edge_ids.iter().zip(&self.edge_weights))
            .map(|((s, d), (&edge_id, &weight))| BlockEdge {
                src: self.src_nodes[s.index()],
                dst: self.src_nodes[d.index()],
                edge_id,
                weight,
            })
    }

    /// In-degree of every destination node.
    pub fn in_degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.num_dst];
        for d in &self.edge_dst {
            degrees[d.index()] += 1;
        }
        degrees
    }

    /// Sum of incoming edge weights of every destination node.
    pub fn weight_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.num_dst];
        for (d, w) in self.edge_dst.iter().zip(&self.edge_weights) {
            sums[d.index()] += w;
        }
        sums
    }
}

/// Bipartite compaction of a local graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Compacted<N: LocalId, E: LocalId> {
    /// Block node -> graph node; destinations first, in the order given.
    pub node_map: IdMap<BlockNodeId, N>,
    pub num_dst: usize,
    /// Kept graph edges with their block-local endpoints.
    pub edges: Vec<E>,
    pub src: Vec<BlockNodeId>,
    pub dst: Vec<BlockNodeId>,
}

/// Keep the edges that end in `dst` and renumber their endpoints.
///
/// Destination nodes take block positions `0..dst.len()`; sources that are not
/// destinations follow in order of first appearance.
pub fn compact<N: LocalId, E: LocalId>(graph: &LocalGraph<N, E>, dst: &[N]) -> Result<Compacted<N, E>> {
    let mut position: Vec<Option<BlockNodeId>> = vec![None; graph.num_nodes()];
    let mut nodes = Vec::with_capacity(dst.len());
    for (i, &d) in dst.iter().enumerate() {
        let slot = position
            .get_mut(d.index())
            .ok_or_else(|| SamplingError::id_space_mismatch(N::SPACE, d.index(), graph.num_nodes()))?;
        if slot.is_some() {
            return Err(SamplingError::invalid_parameter(format!(
                "duplicate destination {} {}",
                N::SPACE,
                d.index()
            )));
        }
        *slot = Some(BlockNodeId(i));
        nodes.push(d);
    }
    let num_dst = dst.len();

    let mut edges = Vec::new();
    let mut src_local = Vec::new();
    let mut dst_local = Vec::new();
    for (e, s, d) in graph.edges() {
        let d_block = match position[d.index()] {
            Some(b) if b.index() < num_dst => b,
            _ => continue,
        };
        let s_block = match position[s.index()] {
            Some(b) => b,
            None => {
                let b = BlockNodeId(nodes.len());
                position[s.index()] = Some(b);
                nodes.push(s);
                b
            }
        };
        edges.push(e);
        src_local.push(s_block);
        dst_local.push(d_block);
    }

    Ok(Compacted {
        node_map: IdMap::new(nodes),
        num_dst,
        edges,
        src: src_local,
        dst: dst_local,
    })
}

fn probability_at(probabilities: &[f64], index: usize, space: &'static str) -> Result<f64> {
    probabilities
        .get(index)
        .copied()
        .ok_or_else(|| SamplingError::id_space_mismatch(space, index, probabilities.len()))
}

/// Turn a layer's selection into a block.
///
/// `weights` holds the original weight of every candidate subgraph edge.
/// Each kept edge is divided by its inclusion probability (that of its
/// sampled source for node-level schemes, its own for edge-level ones), then
/// every destination's in-edges are rescaled to sum to its in-degree.
/// Destinations whose corrected weights are all zero get weight 1 per edge.
pub fn build_block(candidate: &CandidateSubgraph, selection: &Selection, weights: &[f64]) -> Result<Block> {
    if weights.len() != candidate.num_edges() {
        return Err(SamplingError::id_space_mismatch(
            SubgraphEdgeId::SPACE,
            weights.len(),
            candidate.num_edges(),
        ));
    }

    let sub: InducedGraph<SampleNodeId, SampleEdgeId, SubgraphNodeId, SubgraphEdgeId> = match &selection.edges {
        None => candidate.graph.induce(&selection.nodes)?,
        Some(edges) => candidate.graph.edge_subgraph(&selection.nodes, edges)?,
    };

    // Relative weights keep the corrected values finite
    let weights = scale_to_unit(weights);
    let mut corrected = Vec::with_capacity(sub.graph.num_edges());
    for (e, s, _) in sub.graph.edges() {
        let parent_edge = sub.edge_map.get(e)?;
        let p = match &selection.probabilities {
            InclusionProbabilities::PerNode(p) => {
                probability_at(p, sub.node_map.get(s)?.index(), SubgraphNodeId::SPACE)?
            }
            InclusionProbabilities::PerEdge(p) => probability_at(p, parent_edge.index(), SubgraphEdgeId::SPACE)?,
        };
        let w = weights[parent_edge.index()];
        corrected.push(if p > 0.0 { w / p } else { 0.0 });
    }

    let sums = sub.graph.sum_into_dst(&corrected)?;
    let in_degrees = sub.graph.degrees(Direction::In);
    for ((_, _, d), w) in sub.graph.edges().zip(corrected.iter_mut()) {
        let sum = sums[d.index()];
        *w = if sum > 0.0 {
            *w * in_degrees[d.index()] as f64 / sum
        } else {
            1.0
        };
    }

    let compacted = compact(&sub.graph, &selection.seed_positions)?;

    let src_nodes = compacted
        .node_map
        .compose(&sub.node_map)?
        .compose(&candidate.node_map)?
        .into_values();
    let edge_ids = compacted
        .edges
        .iter()
        .map(|&e| candidate.edge_map.get(sub.edge_map.get(e)?))
        .collect::<Result<Vec<_>>>()?;
    let edge_weights = compacted.edges.iter().map(|e| corrected[e.index()]).collect();

    Ok(Block {
        src_nodes,
        num_dst: compacted.num_dst,
        edge_src: compacted.src,
        edge_dst: compacted.dst,
        edge_ids,
        edge_weights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ArrowGraph, GraphQuery};
    use pretty_assertions::assert_eq;

    // Seed 0 <- 2 (w 1), 3 (w 2); seed 1 <- 3 (w 4), 4 (w 1)
    fn candidate() -> (ArrowGraph, CandidateSubgraph, Vec<f64>) {
        let graph = ArrowGraph::from_edge_list(
            5,
            &[(2, 0), (3, 0), (3, 1), (4, 1)],
            Some(vec![1.0, 2.0, 4.0, 1.0]),
        )
        .unwrap();
        let candidate = graph.induced_subgraph(&[GlobalNodeId(0), GlobalNodeId(1)]).unwrap();
        let weights = candidate.gather_edge_weights(graph.edge_weights()).unwrap();
        (graph, candidate, weights)
    }

    fn nodes(v: &[usize]) -> Vec<SubgraphNodeId> {
        v.iter().copied().map(SubgraphNodeId).collect()
    }

    #[test]
    fn test_compact_puts_destinations_first() {
        let graph: LocalGraph<SampleNodeId, SampleEdgeId> = LocalGraph::new(
            4,
            vec![SampleNodeId(3), SampleNodeId(0), SampleNodeId(2)],
            vec![SampleNodeId(1), SampleNodeId(1), SampleNodeId(0)],
        )
        .unwrap();

        let compacted = compact(&graph, &[SampleNodeId(1)]).unwrap();
        assert_eq!(compacted.num_dst, 1);
        assert_eq!(
            compacted.node_map.values(),
            &[SampleNodeId(1), SampleNodeId(3), SampleNodeId(0)]
        );
        // Edge into node 0 is dropped since 0 is not a destination
        assert_eq!(compacted.edges, vec![SampleEdgeId(0), SampleEdgeId(1)]);
        assert_eq!(compacted.src, vec![BlockNodeId(1), BlockNodeId(2)]);
        assert_eq!(compacted.dst, vec![BlockNodeId(0), BlockNodeId(0)]);
    }

    #[test]
    fn test_compact_rejects_foreign_destination() {
        let graph: LocalGraph<SampleNodeId, SampleEdgeId> = LocalGraph::new(2, vec![], vec![]).unwrap();
        assert!(matches!(
            compact(&graph, &[SampleNodeId(5)]),
            Err(SamplingError::IdSpaceMismatch { .. })
        ));
    }

    #[test]
    fn test_block_translates_to_global_ids() {
        let (_, candidate, weights) = candidate();
        // Candidate nodes: [0, 1, 2, 3, 4] -> keep seeds and node 3
        let selection = Selection {
            nodes: nodes(&[0, 1, 3]),
            seed_positions: vec![SampleNodeId(0), SampleNodeId(1)],
            edges: None,
            probabilities: InclusionProbabilities::PerNode(vec![0.0, 0.0, 1.0, 2.0, 1.0]),
        };

        let block = build_block(&candidate, &selection, &weights).unwrap();
        assert_eq!(block.dst_nodes(), &[GlobalNodeId(0), GlobalNodeId(1)]);
        assert_eq!(block.src_nodes(), &[GlobalNodeId(0), GlobalNodeId(1), GlobalNodeId(3)]);
        assert_eq!(block.edge_ids(), &[GlobalEdgeId(1), GlobalEdgeId(2)]);

        let edges: Vec<BlockEdge> = block.edges().collect();
        assert_eq!(edges[0].src, GlobalNodeId(3));
        assert_eq!(edges[0].dst, GlobalNodeId(0));
        // Single in-edge per destination renormalizes to exactly 1
        assert_eq!(block.edge_weights(), &[1.0, 1.0]);
    }

    #[test]
    fn test_reweighting_divides_by_source_probability() {
        let (_, candidate, weights) = candidate();
        let selection = Selection {
            nodes: nodes(&[0, 1, 2, 3, 4]),
            seed_positions: vec![SampleNodeId(0), SampleNodeId(1)],
            edges: None,
            probabilities: InclusionProbabilities::PerNode(vec![0.0, 0.0, 1.0, 4.0, 1.0]),
        };

        let block = build_block(&candidate, &selection, &weights).unwrap();
        // Seed 0: 1/1 and 2/4 -> scaled to sum 2: [4/3, 2/3]
        // Seed 1: 4/4 and 1/1 -> [1, 1]
        let expected = [4.0 / 3.0, 2.0 / 3.0, 1.0, 1.0];
        for (w, e) in block.edge_weights().iter().zip(expected) {
            assert!((w - e).abs() < 1e-9, "{} vs {}", w, e);
        }
        for (sum, deg) in block.weight_sums().iter().zip(block.in_degrees()) {
            assert!((sum - deg as f64).abs() < 1e-5);
        }
    }

    #[test]
    fn test_per_edge_probabilities() {
        let (_, candidate, weights) = candidate();
        let selection = Selection {
            nodes: nodes(&[0, 1, 3, 4]),
            seed_positions: vec![SampleNodeId(0), SampleNodeId(1)],
            edges: Some(vec![SubgraphEdgeId(1), SubgraphEdgeId(2), SubgraphEdgeId(3)]),
            probabilities: InclusionProbabilities::PerEdge(vec![1.0, 0.5, 1.0, 0.25]),
        };

        let block = build_block(&candidate, &selection, &weights).unwrap();
        assert_eq!(block.num_edges(), 3);
        assert_eq!(block.in_degrees(), vec![1, 2]);
        // Seed 1: 4/1 and 1/0.25 are equal -> [1, 1]
        assert_eq!(&block.edge_weights()[1..], &[1.0, 1.0]);
    }

    #[test]
    fn test_zero_probability_sources_fall_back_to_unit_weight() {
        let (_, candidate, weights) = candidate();
        let selection = Selection {
            nodes: nodes(&[0, 1, 2, 3]),
            seed_positions: vec![SampleNodeId(0), SampleNodeId(1)],
            edges: None,
            probabilities: InclusionProbabilities::PerNode(vec![0.0; 5]),
        };

        let block = build_block(&candidate, &selection, &weights).unwrap();
        assert!(block.edge_weights().iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_huge_weights_over_tiny_probabilities_stay_finite() {
        let graph = ArrowGraph::from_edge_list(3, &[(1, 0), (2, 0)], Some(vec![1e308, 1e308])).unwrap();
        let candidate = graph.induced_subgraph(&[GlobalNodeId(0)]).unwrap();
        let weights = candidate.gather_edge_weights(graph.edge_weights()).unwrap();
        let selection = Selection {
            nodes: nodes(&[0, 1, 2]),
            seed_positions: vec![SampleNodeId(0)],
            edges: None,
            probabilities: InclusionProbabilities::PerNode(vec![0.0, 1e-10, 1e-10]),
        };

        let block = build_block(&candidate, &selection, &weights).unwrap();
        assert_eq!(block.edge_weights(), &[1.0, 1.0]);
    }

    #[test]
    fn test_isolated_seed_block() {
        let graph = ArrowGraph::from_edge_list(3, &[(1, 0)], None).unwrap();
        let candidate = graph.induced_subgraph(&[GlobalNodeId(2)]).unwrap();
        let selection = Selection {
            nodes: nodes(&[0]),
            seed_positions: vec![SampleNodeId(0)],
            edges: None,
            probabilities: InclusionProbabilities::PerNode(vec![0.0]),
        };

        let block = build_block(&candidate, &selection, &[]).unwrap();
        assert_eq!(block.src_nodes(), &[GlobalNodeId(2)]);
        assert_eq!(block.dst_nodes(), &[GlobalNodeId(2)]);
        assert_eq!(block.num_edges(), 0);
    }

    #[test]
    fn test_wrong_space_probabilities_are_fatal() {
        let (_, candidate, weights) = candidate();
        let selection = Selection {
            nodes: nodes(&[0, 1, 3]),
            seed_positions: vec![SampleNodeId(0), SampleNodeId(1)],
            edges: None,
            // Too short to cover node 3
            probabilities: InclusionProbabilities::PerNode(vec![1.0, 1.0]),
        };

        assert!(matches!(
            build_block(&candidate, &selection, &weights),
            Err(SamplingError::IdSpaceMismatch { .. })
        ));
    }
}
