use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::tensor::{DType, TensorData};

/// Unique identifier generated for each [node](Node).
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct NodeId {
    pub(crate) value: u64,
}

impl NodeId {
    /// Create a unique [node id](NodeId).
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        Self {
            value: COUNTER.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Function in the autodiff graph.
///
/// A node receives one gradient per input and forwards gradients along its
/// [next edges](Node::next_edges).
pub trait Node: Send + Sync + core::fmt::Debug {
    /// The id of the node.
    fn id(&self) -> NodeId;
    /// Human readable name, mostly used for debugging.
    fn name(&self) -> &'static str;
    /// Edges to the functions that produced the inputs of this node.
    fn next_edges(&self) -> &[Edge];
    /// Shape and data type of every gradient this node expects.
    fn input_metadata(&self) -> &[InputMetadata];

    /// The number of gradients this node expects.
    fn num_inputs(&self) -> usize {
        self.input_metadata().len()
    }
}

/// Shared reference to a [node](Node), cheap to clone.
///
/// A node stays alive as long as a tensor, another node or a distributed context holds it.
pub type NodeRef = Arc<dyn Node>;

/// Link from a node to the function that produced one of its inputs.
///
/// An edge without a function stands for an input that doesn't require gradients.
#[derive(new, Clone, Debug)]
pub struct Edge {
    /// The producing function, if any.
    pub function: Option<NodeRef>,
    /// Which input of the producing function receives the gradient.
    pub input_nr: usize,
}

impl Edge {
    /// Placeholder edge for inputs that don't require gradients.
    pub fn none() -> Self {
        Self::new(None, 0)
    }

    /// Whether the edge points to a function.
    pub fn is_valid(&self) -> bool {
        self.function.is_some()
    }

    /// The id of the function the edge points to.
    pub fn node_id(&self) -> Option<NodeId> {
        self.function.as_ref().map(|function| function.id())
    }
}

/// Metadata of a gradient expected by a node.
///
/// Kept so that a zero gradient can be synthesized when nothing flows back for an input.
#[derive(new, Clone, Debug, PartialEq, Eq)]
pub struct InputMetadata {
    /// The shape of the gradient.
    pub shape: Vec<usize>,
    /// The data type of the gradient.
    pub dtype: DType,
}

impl InputMetadata {
    /// Creates the zero gradient matching this input.
    pub fn zeros(&self) -> TensorData {
        TensorData::zeros(self.shape.clone(), self.dtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let ids: std::collections::HashSet<NodeId> = (0..1000).map(|_| NodeId::new()).collect();

        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn edge_none_is_not_valid() {
        let edge = Edge::none();

        assert!(!edge.is_valid());
        assert_eq!(edge.node_id(), None);
    }

    #[test]
    fn input_metadata_synthesizes_zeros() {
        let metadata = InputMetadata::new(vec![2, 3], DType::F32);
        let zeros = metadata.zeros();

        assert_eq!(zeros.shape, vec![2, 3]);
        assert_eq!(zeros.dtype, DType::F32);
        assert_eq!(zeros.bytes.len(), 6 * 4);
        assert!(zeros.bytes.iter().all(|byte| *byte == 0));
    }
}
