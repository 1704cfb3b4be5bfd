pub mod arrow_graph;
pub mod ids;
pub mod local;
pub mod query;

pub use arrow_graph::ArrowGraph;
pub use ids::{
    BlockNodeId, GlobalEdgeId, GlobalNodeId, IdMap, LocalId, SampleEdgeId, SampleNodeId, SubgraphEdgeId,
    SubgraphNodeId,
};
pub use local::{Direction, InducedGraph, LocalGraph};
pub use query::{CandidateSubgraph, GraphQuery};
