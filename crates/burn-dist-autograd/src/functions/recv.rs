use crate::{
    AutogradMetadata, ContextId,
    graph::{Edge, InputMetadata, Node, NodeId},
    rpc::WorkerId,
};

/// Function installed as the producer of tensors received from another worker.
///
/// It has no local next edge: during the backward pass, the gradients it receives are sent back
/// to `from_worker_id`, using the [metadata](AutogradMetadata) to find the matching
/// [send function](crate::functions::SendRpcBackward). The owning context is referenced by id
/// and resolved through the [container](crate::DistAutogradContainer).
#[derive(Debug)]
pub struct RecvRpcBackward {
    id: NodeId,
    autograd_metadata: AutogradMetadata,
    from_worker_id: WorkerId,
    input_metadata: Vec<InputMetadata>,
}

impl RecvRpcBackward {
    /// Create the function, with one input per tensor it will be installed on.
    pub fn new(
        autograd_metadata: AutogradMetadata,
        from_worker_id: WorkerId,
        input_metadata: Vec<InputMetadata>,
    ) -> Self {
        Self {
            id: NodeId::new(),
            autograd_metadata,
            from_worker_id,
            input_metadata,
        }
    }

    /// The metadata of the boundary crossing.
    pub fn autograd_metadata(&self) -> AutogradMetadata {
        self.autograd_metadata
    }

    /// The worker that sent the tensors.
    pub fn from_worker_id(&self) -> WorkerId {
        self.from_worker_id
    }

    /// The context owning this function.
    pub fn context_id(&self) -> ContextId {
        self.autograd_metadata.context_id
    }
}

impl Node for RecvRpcBackward {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &'static str {
        "RecvRpcBackward"
    }

    fn next_edges(&self) -> &[Edge] {
        &[]
    }

    fn input_metadata(&self) -> &[InputMetadata] {
        &self.input_metadata
    }
}
