use hashbrown::HashMap;

use crate::error::{Result, SamplingError};
use crate::graph::ids::{GlobalEdgeId, GlobalNodeId, IdMap, LocalId, SubgraphEdgeId, SubgraphNodeId};
use crate::graph::local::{Direction, LocalGraph};

/// Read-only graph storage the samplers run against.
///
/// Implementations must be safe to share between batch workers; nothing in
/// the sampling path mutates the graph or its edge weights.
pub trait GraphQuery: Sync {
    fn num_nodes(&self) -> usize;

    fn num_edges(&self) -> usize;

    /// In-neighbors of `node` and the IDs of the connecting edges, aligned.
    fn in_neighbors(&self, node: GlobalNodeId) -> Result<(&[GlobalNodeId], &[GlobalEdgeId])>;

    /// One weight per global edge, indexed by `GlobalEdgeId`.
    fn edge_weights(&self) -> &[f64];

    /// All in-edges of `seeds`, compacted into a fresh local ID space.
    ///
    /// Seeds occupy subgraph positions `0..seeds.len()` in the given order even
    /// when they have no in-edges; newly reached neighbors follow in order of
    /// first appearance.
    fn induced_subgraph(&self, seeds: &[GlobalNodeId]) -> Result<CandidateSubgraph> {
        let mut local: HashMap<GlobalNodeId, SubgraphNodeId> = HashMap::with_capacity(seeds.len() * 4);
        let mut nodes = Vec::with_capacity(seeds.len() * 4);

        for &seed in seeds {
            if seed.index() >= self.num_nodes() {
                return Err(SamplingError::node_not_found(seed.0));
            }
            if local.insert(seed, SubgraphNodeId(nodes.len())).is_some() {
                return Err(SamplingError::invalid_parameter(format!("duplicate seed node {}", seed)));
            }
            nodes.push(seed);
        }

        let mut src = Vec::new();
        let mut dst = Vec::new();
        let mut edge_ids = Vec::new();
        for (i, &seed) in seeds.iter().enumerate() {
            let (neighbors, eids) = self.in_neighbors(seed)?;
            for (&u, &eid) in neighbors.iter().zip(eids) {
                let u_local = *local.entry(u).or_insert_with(|| {
                    nodes.push(u);
                    SubgraphNodeId(nodes.len() - 1)
                });
                src.push(u_local);
                dst.push(SubgraphNodeId(i));
                edge_ids.push(eid);
            }
        }

        Ok(CandidateSubgraph {
            graph: LocalGraph::new(nodes.len(), src, dst)?,
            node_map: IdMap::new(nodes),
            edge_map: IdMap::new(edge_ids),
            num_seeds: seeds.len(),
        })
    }
}

/// Every edge incident on a layer's seeds, with tables back to the full graph.
#[derive(Debug, Clone)]
pub struct CandidateSubgraph {
    pub graph: LocalGraph<SubgraphNodeId, SubgraphEdgeId>,
    pub node_map: IdMap<SubgraphNodeId, GlobalNodeId>,
    pub edge_map: IdMap<SubgraphEdgeId, GlobalEdgeId>,
    pub num_seeds: usize,
}

impl CandidateSubgraph {
    pub fn num_nodes(&self) -> usize {
        self.graph.num_nodes()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.num_edges()
    }

    /// Subgraph-local positions of the seeds, in seed order.
    pub fn seeds(&self) -> impl Iterator<Item = SubgraphNodeId> {
        (0..self.num_seeds).map(SubgraphNodeId)
    }

    /// Seeds with no incoming edge in this layer.
    pub fn isolated_seeds(&self) -> Vec<SubgraphNodeId> {
        let in_degrees = self.graph.degrees(Direction::In);
        self.seeds().filter(|s| in_degrees[s.index()] == 0).collect()
    }

    /// Gather the weight of every subgraph edge from a global weight vector.
    pub fn gather_edge_weights(&self, global_weights: &[f64]) -> Result<Vec<f64>> {
        self.edge_map
            .values()
            .iter()
            .map(|eid| {
                global_weights
                    .get(eid.index())
                    .copied()
                    .ok_or_else(|| SamplingError::id_space_mismatch(GlobalEdgeId::SPACE, eid.index(), global_weights.len()))
            })
            .collect()
    }
}
