pub mod block;
pub mod correlation;
pub mod driver;
pub mod labor;
pub mod probability;
pub mod selector;

pub use block::{build_block, compact, Block, BlockEdge, Compacted};
pub use correlation::{BatchSeeds, CorrelationState, SharedCorrelation};
pub use driver::{BlockSampler, LayerSampler, SampledBatch};
pub use labor::{sample_labor, source_variate};
pub use probability::{cap_probabilities, node_probabilities, CappedProbabilities, ProbabilityPolicy};
pub use selector::{select_all, select_multinomial, select_poisson, InclusionProbabilities, Selection};
