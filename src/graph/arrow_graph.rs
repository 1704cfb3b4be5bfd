use std::sync::Arc;

use arrow::compute::cast;
use arrow_array::{Array, ArrayRef, Float64Array, RecordBatch, UInt64Array};
use arrow_schema::{DataType, Field, Schema};

use crate::error::{Result, SamplingError};
use crate::graph::ids::{GlobalEdgeId, GlobalNodeId, LocalId};
use crate::graph::query::GraphQuery;

/// Graph backed by an Arrow edge table.
///
/// Expected schema: `source` (integer), `target` (integer), optional `weight`
/// (float). Node IDs are dense `0..num_nodes`; the edge ID of a row is its row
/// number. In-edges are indexed CSC-style since sampling walks from a seed to
/// its in-neighbors.
#[derive(Debug, Clone)]
pub struct ArrowGraph {
    num_nodes: usize,
    indptr: Vec<usize>,
    in_sources: Vec<GlobalNodeId>,
    in_edge_ids: Vec<GlobalEdgeId>,
    weights: Vec<f64>,
}

impl ArrowGraph {
    /// Build from an edge table, inferring the node count from the largest ID.
    pub fn from_edges(edges: RecordBatch) -> Result<Self> {
        Self::build(&edges, None)
    }

    /// Build from an edge table with an explicit node count, which allows
    /// trailing isolated nodes.
    pub fn with_num_nodes(edges: RecordBatch, num_nodes: usize) -> Result<Self> {
        Self::build(&edges, Some(num_nodes))
    }

    /// Convenience constructor from `(source, target)` pairs.
    pub fn from_edge_list(
        num_nodes: usize,
        edges: &[(u64, u64)],
        weights: Option<Vec<f64>>,
    ) -> Result<Self> {
        let mut fields = vec![
            Field::new("source", DataType::UInt64, false),
            Field::new("target", DataType::UInt64, false),
        ];
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(UInt64Array::from_iter_values(edges.iter().map(|e| e.0))),
            Arc::new(UInt64Array::from_iter_values(edges.iter().map(|e| e.1))),
        ];
        if let Some(weights) = weights {
            fields.push(Field::new("weight", DataType::Float64, false));
            columns.push(Arc::new(Float64Array::from(weights)));
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
        Self::with_num_nodes(batch, num_nodes)
    }

    fn build(edges: &RecordBatch, num_nodes: Option<usize>) -> Result<Self> {
        if edges.num_columns() < 2 {
            return Err(SamplingError::graph_construction(
                "Edge table needs at least source and target columns",
            ));
        }

        let sources = id_column(edges.column(0), "source")?;
        let targets = id_column(edges.column(1), "target")?;

        let weights: Vec<f64> = if edges.num_columns() >= 3 {
            let column = cast(edges.column(2), &DataType::Float64)?;
            let column = column
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| SamplingError::graph_construction("Weight column must be numeric"))?;
            // Missing weights default to 1.0
            (0..column.len())
                .map(|i| if column.is_null(i) { 1.0 } else { column.value(i) })
                .collect()
        } else {
            vec![1.0; edges.num_rows()]
        };

        if let Some((row, w)) = weights.iter().enumerate().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(SamplingError::graph_construction(format!(
                "Edge {} has invalid weight {}; weights must be finite and non-negative",
                row, w
            )));
        }

        let max_id = sources.iter().chain(targets.iter()).copied().max();
        let inferred = max_id.map(|m| m as usize + 1).unwrap_or(0);
        let num_nodes = match num_nodes {
            Some(n) if n < inferred => {
                return Err(SamplingError::graph_construction(format!(
                    "Edge table references node {} but graph has only {} nodes",
                    inferred - 1,
                    n
                )));
            }
            Some(n) => n,
            None => inferred,
        };

        // Counting sort by target
        let mut indptr = vec![0usize; num_nodes + 1];
        for &t in &targets {
            indptr[t as usize + 1] += 1;
        }
        for i in 0..num_nodes {
            indptr[i + 1] += indptr[i];
        }
        let mut cursor = indptr.clone();
        let mut in_sources = vec![GlobalNodeId(0); sources.len()];
        let mut in_edge_ids = vec![GlobalEdgeId(0); sources.len()];
        for (row, (&s, &t)) in sources.iter().zip(targets.iter()).enumerate() {
            let slot = cursor[t as usize];
            in_sources[slot] = GlobalNodeId(s);
            in_edge_ids[slot] = GlobalEdgeId(row as u64);
            cursor[t as usize] += 1;
        }

        log::debug!(
            "Built arrow graph with {} nodes and {} edges",
            num_nodes,
            sources.len()
        );

        Ok(ArrowGraph {
            num_nodes,
            indptr,
            in_sources,
            in_edge_ids,
            weights,
        })
    }

    pub fn in_degree(&self, node: GlobalNodeId) -> usize {
        let i = node.index();
        if i >= self.num_nodes {
            return 0;
        }
        self.indptr[i + 1] - self.indptr[i]
    }
}

fn id_column(column: &ArrayRef, name: &str) -> Result<Vec<u64>> {
    let column = cast(column, &DataType::UInt64).map_err(|e| {
        SamplingError::graph_construction(format!("Column {} must hold non-negative integers: {}", name, e))
    })?;
    let column = column
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| SamplingError::graph_construction(format!("Column {} must be UInt64", name)))?;
    // Nulls here are either missing IDs or negative values the cast rejected
    if column.null_count() > 0 {
        return Err(SamplingError::graph_construction(format!(
            "Column {} must hold non-negative integers without nulls",
            name
        )));
    }
    Ok(column.values().to_vec())
}

impl GraphQuery for ArrowGraph {
    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn num_edges(&self) -> usize {
        self.in_sources.len()
    }

    fn in_neighbors(&self, node: GlobalNodeId) -> Result<(&[GlobalNodeId], &[GlobalEdgeId])> {
        let i = node.index();
        if i >= self.num_nodes {
            return Err(SamplingError::node_not_found(node.0));
        }
        let range = self.indptr[i]..self.indptr[i + 1];
        Ok((&self.in_sources[range.clone()], &self.in_edge_ids[range]))
    }

    fn edge_weights(&self) -> &[f64] {
        &self.weights
    }
}
