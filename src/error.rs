pub type Result<T> = std::result::Result<T, SamplingError>;

#[derive(Debug, thiserror::Error)]
pub enum SamplingError {
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("Graph construction error: {0}")]
    GraphConstruction(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid fanout {0}: must be positive or -1 (take all edges)")]
    InvalidFanout(i64),

    #[error("Node not found: {0}")]
    NodeNotFound(u64),

    /// An index reached a translation table it does not belong to.
    /// Always an implementation defect, never a data problem.
    #[error("ID space mismatch: index {index} is out of range for {space} space of size {len}")]
    IdSpaceMismatch {
        space: &'static str,
        index: usize,
        len: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SamplingError {
    pub fn graph_construction<S: Into<String>>(msg: S) -> Self {
        SamplingError::GraphConstruction(msg.into())
    }

    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        SamplingError::InvalidParameter(msg.into())
    }

    pub fn node_not_found(node_id: u64) -> Self {
        SamplingError::NodeNotFound(node_id)
    }

    pub fn id_space_mismatch(space: &'static str, index: usize, len: usize) -> Self {
        SamplingError::IdSpaceMismatch { space, index, len }
    }
}
