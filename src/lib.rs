pub mod config;
pub mod error;
pub mod graph;
pub mod sampling;

pub use config::{Fanout, SamplerConfig, SamplingScheme};
pub use error::{Result, SamplingError};
pub use graph::{ArrowGraph, CandidateSubgraph, GlobalEdgeId, GlobalNodeId, GraphQuery};
pub use sampling::{
    BatchSeeds, Block, BlockEdge, BlockSampler, CorrelationState, LayerSampler, ProbabilityPolicy, SampledBatch,
    SharedCorrelation,
};

pub mod prelude {
    pub use crate::config::{Fanout, SamplerConfig, SamplingScheme};
    pub use crate::error::{Result, SamplingError};
    pub use crate::graph::{ArrowGraph, GlobalEdgeId, GlobalNodeId, GraphQuery};
    pub use crate::sampling::{
        BatchSeeds, Block, BlockEdge, BlockSampler, CorrelationState, LayerSampler, ProbabilityPolicy,
        SampledBatch, SharedCorrelation,
    };
}
