use super::{Edge, InputMetadata, Node, NodeId};

/// Sink of the gradient of a leaf tensor.
///
/// Leaves have no producing function, so the edge of a leaf that requires gradients points here.
#[derive(Debug)]
pub struct AccumulateGrad {
    id: NodeId,
    input_metadata: [InputMetadata; 1],
}

impl AccumulateGrad {
    /// Create the accumulator of a leaf with the given metadata.
    pub fn new(metadata: InputMetadata) -> Self {
        Self {
            id: NodeId::new(),
            input_metadata: [metadata],
        }
    }
}

impl Node for AccumulateGrad {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &'static str {
        "AccumulateGrad"
    }

    fn next_edges(&self) -> &[Edge] {
        &[]
    }

    fn input_metadata(&self) -> &[InputMetadata] {
        &self.input_metadata
    }
}
