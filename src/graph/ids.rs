//! Typed node and edge identifiers.
//!
//! A sampling layer juggles several nested index spaces: the original graph
//! (global), the candidate subgraph induced around the seeds, the sampled
//! subset of that subgraph, and finally the compacted block. Each space gets
//! its own newtype so an index can only be used where it belongs, and the only
//! way to move between spaces is an [`IdMap`] lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

use crate::error::{Result, SamplingError};

/// An index into a dense, zero-based ID space.
pub trait LocalId: Copy + Eq + Ord + fmt::Debug {
    /// Human readable name of the space, used in error messages.
    const SPACE: &'static str;

    fn from_index(index: usize) -> Self;

    fn index(self) -> usize;
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($repr:ty), $space:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $repr);

        impl LocalId for $name {
            const SPACE: &'static str = $space;

            fn from_index(index: usize) -> Self {
                $name(index as $repr)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Node ID in the original graph.
    GlobalNodeId(u64),
    "global node"
);
id_type!(
    /// Edge ID in the original graph (row of the edge table).
    GlobalEdgeId(u64),
    "global edge"
);
id_type!(
    /// Node index inside a layer's candidate subgraph.
    SubgraphNodeId(usize),
    "subgraph node"
);
id_type!(
    /// Edge index inside a layer's candidate subgraph.
    SubgraphEdgeId(usize),
    "subgraph edge"
);
id_type!(
    /// Node index inside the sampled sub-subgraph.
    SampleNodeId(usize),
    "sample node"
);
id_type!(
    /// Edge index inside the sampled sub-subgraph.
    SampleEdgeId(usize),
    "sample edge"
);
id_type!(
    /// Node index inside a compacted block. Destination nodes come first.
    BlockNodeId(usize),
    "block node"
);

/// Translation table from one ID space to another.
///
/// Entry `k` holds the value that key `k` maps to. Lookups outside the table
/// are reported as [`SamplingError::IdSpaceMismatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMap<K: LocalId, V: Copy> {
    values: Vec<V>,
    _key: PhantomData<K>,
}

impl<K: LocalId, V: Copy> IdMap<K, V> {
    pub fn new(values: Vec<V>) -> Self {
        Self {
            values,
            _key: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: K) -> Result<V> {
        self.values
            .get(key.index())
            .copied()
            .ok_or_else(|| SamplingError::id_space_mismatch(K::SPACE, key.index(), self.values.len()))
    }

    /// Translate many keys at once, failing on the first bad one.
    pub fn get_all(&self, keys: &[K]) -> Result<Vec<V>> {
        keys.iter().map(|&k| self.get(k)).collect()
    }

    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn into_values(self) -> Vec<V> {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, V)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, &v)| (K::from_index(i), v))
    }
}

impl<K: LocalId, V: LocalId> IdMap<K, V> {
    /// Chain two tables: `K -> V` followed by `V -> W`.
    pub fn compose<W: Copy>(&self, next: &IdMap<V, W>) -> Result<IdMap<K, W>> {
        let values = self
            .values
            .iter()
            .map(|&v| next.get(v))
            .collect::<Result<Vec<_>>>()?;
        Ok(IdMap::new(values))
    }
}
