use std::marker::PhantomData;

use crate::error::{Result, SamplingError};
use crate::graph::ids::{IdMap, LocalId};

/// Edge direction used for degree queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// Small COO graph whose nodes live in space `N` and edges in space `E`.
///
/// Edge `E(i)` is the i-th `(src, dst)` pair. Used for the per-layer candidate
/// subgraph and the sampled sub-subgraph, both of which are built fresh for
/// every layer and dropped afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalGraph<N: LocalId, E: LocalId> {
    num_nodes: usize,
    src: Vec<N>,
    dst: Vec<N>,
    _edge: PhantomData<E>,
}

/// A sub-subgraph together with the tables that lead back to its parent.
#[derive(Debug, Clone)]
pub struct InducedGraph<N: LocalId, E: LocalId, PN: LocalId, PE: LocalId> {
    pub graph: LocalGraph<N, E>,
    pub node_map: IdMap<N, PN>,
    pub edge_map: IdMap<E, PE>,
}

impl<N: LocalId, E: LocalId> LocalGraph<N, E> {
    pub fn new(num_nodes: usize, src: Vec<N>, dst: Vec<N>) -> Result<Self> {
        if src.len() != dst.len() {
            return Err(SamplingError::graph_construction(format!(
                "source and destination lengths differ: {} vs {}",
                src.len(),
                dst.len()
            )));
        }
        if let Some(bad) = src.iter().chain(dst.iter()).find(|n| n.index() >= num_nodes) {
            return Err(SamplingError::id_space_mismatch(N::SPACE, bad.index(), num_nodes));
        }

        Ok(Self {
            num_nodes,
            src,
            dst,
            _edge: PhantomData,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_edges(&self) -> usize {
        self.src.len()
    }

    pub fn edge(&self, edge: E) -> Result<(N, N)> {
        let i = edge.index();
        match (self.src.get(i), self.dst.get(i)) {
            (Some(&s), Some(&d)) => Ok((s, d)),
            _ => Err(SamplingError::id_space_mismatch(E::SPACE, i, self.src.len())),
        }
    }

    pub fn edges(&self) -> impl Iterator<Item = (E, N, N)> + '_ {
        self.src
            .iter()
            .zip(self.dst.iter())
            .enumerate()
            .map(|(i, (&s, &d))| (E::from_index(i), s, d))
    }

    /// Flip every edge. Edge `i` stays edge `i`.
    pub fn reverse(&self) -> Self {
        Self {
            num_nodes: self.num_nodes,
            src: self.dst.clone(),
            dst: self.src.clone(),
            _edge: PhantomData,
        }
    }

    pub fn degrees(&self, direction: Direction) -> Vec<usize> {
        let endpoints = match direction {
            Direction::In => &self.dst,
            Direction::Out => &self.src,
        };
        let mut degrees = vec![0usize; self.num_nodes];
        for node in endpoints {
            degrees[node.index()] += 1;
        }
        degrees
    }

    /// Sum a per-edge value onto each edge's destination node.
    pub fn sum_into_dst(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() != self.num_edges() {
            return Err(SamplingError::id_space_mismatch(E::SPACE, values.len(), self.num_edges()));
        }
        let mut sums = vec![0.0; self.num_nodes];
        for (d, v) in self.dst.iter().zip(values) {
            sums[d.index()] += v;
        }
        Ok(sums)
    }

    /// Subgraph over `nodes` keeping every edge with both endpoints inside.
    ///
    /// Node `M(i)` of the result is `nodes[i]`; edges keep their parent order.
    pub fn induce<M: LocalId, F: LocalId>(&self, nodes: &[N]) -> Result<InducedGraph<M, F, N, E>> {
        let position = self.positions(nodes)?;
        let edges: Vec<E> = self
            .edges()
            .filter(|(_, s, d)| position[s.index()].is_some() && position[d.index()].is_some())
            .map(|(e, _, _)| e)
            .collect();
        self.build_sub(nodes, &edges, &position)
    }

    /// Subgraph over `nodes` keeping exactly `edges`. Every endpoint of a kept
    /// edge must be in `nodes`.
    pub fn edge_subgraph<M: LocalId, F: LocalId>(
        &self,
        nodes: &[N],
        edges: &[E],
    ) -> Result<InducedGraph<M, F, N, E>> {
        let position = self.positions(nodes)?;
        self.build_sub(nodes, edges, &position)
    }

    fn positions(&self, nodes: &[N]) -> Result<Vec<Option<usize>>> {
        let mut position = vec![None; self.num_nodes];
        for (i, n) in nodes.iter().enumerate() {
            let slot = position
                .get_mut(n.index())
                .ok_or_else(|| SamplingError::id_space_mismatch(N::SPACE, n.index(), self.num_nodes))?;
            if slot.is_some() {
                return Err(SamplingError::invalid_parameter(format!(
                    "duplicate {} {} in node set",
                    N::SPACE,
                    n.index()
                )));
            }
            *slot = Some(i);
        }
        Ok(position)
    }

    fn build_sub<M: LocalId, F: LocalId>(
        &self,
        nodes: &[N],
        edges: &[E],
        position: &[Option<usize>],
    ) -> Result<InducedGraph<M, F, N, E>> {
        let mut src = Vec::with_capacity(edges.len());
        let mut dst = Vec::with_capacity(edges.len());
        for &e in edges {
            let (s, d) = self.edge(e)?;
            let local = |n: N| {
                position[n.index()]
                    .map(M::from_index)
                    .ok_or_else(|| SamplingError::id_space_mismatch(M::SPACE, n.index(), nodes.len()))
            };
            src.push(local(s)?);
            dst.push(local(d)?);
        }

        Ok(InducedGraph {
            graph: LocalGraph::new(nodes.len(), src, dst)?,
            node_map: IdMap::new(nodes.to_vec()),
            edge_map: IdMap::new(edges.to_vec()),
        })
    }
}
