use crate::{
    graph::{Edge, InputMetadata, Node, NodeId},
    tensor::{Tensor, TensorData, collect_next_edges},
};

/// Function recorded when tensors are sent to another worker.
///
/// Its next edges point to the local functions that produced the sent tensors, so the
/// gradients received from the remote worker during the backward pass can flow into the local
/// graph. The function is shared between the local graph and the
/// [context](crate::DistAutogradContext) that indexes it.
#[derive(Debug)]
pub struct SendRpcBackward {
    id: NodeId,
    next_edges: Vec<Edge>,
    input_metadata: Vec<InputMetadata>,
}

impl SendRpcBackward {
    /// Create the function for the given outgoing tensors.
    ///
    /// There is one edge per tensor; tensors that don't require gradients get a placeholder.
    pub fn new(tensors: &[Tensor]) -> Self {
        Self {
            id: NodeId::new(),
            next_edges: collect_next_edges(tensors),
            input_metadata: tensors.iter().map(Tensor::input_metadata).collect(),
        }
    }

    /// Zero gradients for every input, used when nothing is received for an input.
    pub fn zero_grads(&self) -> Vec<TensorData> {
        self.input_metadata.iter().map(InputMetadata::zeros).collect()
    }
}

impl Node for SendRpcBackward {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &'static str {
        "SendRpcBackward"
    }

    fn next_edges(&self) -> &[Edge] {
        &self.next_edges
    }

    fn input_metadata(&self) -> &[InputMetadata] {
        &self.input_metadata
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{AutogradMetadata, functions::RecvRpcBackward, graph::NodeRef, tensor::DType};

    #[test]
    fn edges_follow_tensor_order() {
        let t1 = Tensor::from_data(TensorData::new(vec![1.0f32, 2.0], [2])).require_grad();
        let t2 = Tensor::from_data(TensorData::new(vec![3i64], [1]));

        let send = SendRpcBackward::new(&[t1.clone(), t2]);

        assert_eq!(send.next_edges().len(), 2);
        assert_eq!(send.next_edges()[0].node_id(), t1.gradient_edge().node_id());
        assert!(!send.next_edges()[1].is_valid());
        assert_eq!(send.num_inputs(), 2);
    }

    #[test]
    fn zero_grads_match_inputs() {
        let t1 = Tensor::from_data(TensorData::new(vec![1.0f64; 6], [2, 3])).require_grad();
        let t2 = Tensor::from_data(TensorData::new(vec![1i32], [1]));

        let grads = SendRpcBackward::new(&[t1, t2]).zero_grads();

        assert_eq!(grads[0], TensorData::zeros([2, 3], DType::F64));
        assert_eq!(grads[1], TensorData::zeros([1], DType::I32));
    }

    #[test]
    fn edge_of_produced_tensor_points_to_its_function() {
        let data = TensorData::new(vec![1.0f32, 2.0], [2]);
        let producer: NodeRef = Arc::new(RecvRpcBackward::new(
            AutogradMetadata::new(1.into(), 2.into()),
            1,
            vec![InputMetadata::new(vec![2], DType::F32); 4],
        ));
        let tensor = Tensor::from_function(data, producer.clone(), 3);

        let send = SendRpcBackward::new(&[tensor]);
        let edge = &send.next_edges()[0];

        assert_eq!(edge.node_id(), Some(producer.id()));
        assert_eq!(edge.input_nr, 3);
    }
}
