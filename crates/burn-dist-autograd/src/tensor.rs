use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::graph::{AccumulateGrad, Edge, InputMetadata, NodeRef};

/// Data type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// 64-bit float.
    F64,
    /// 32-bit float.
    F32,
    /// 64-bit signed integer.
    I64,
    /// 32-bit signed integer.
    I32,
    /// 8-bit unsigned integer.
    U8,
    /// Boolean stored on one byte.
    Bool,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            DType::F64 | DType::I64 => 8,
            DType::F32 | DType::I32 => 4,
            DType::U8 | DType::Bool => 1,
        }
    }
}

/// Element that can be stored in [tensor data](TensorData).
pub trait Element: Copy {
    /// The data type of the element.
    const DTYPE: DType;

    /// Append the little endian bytes of the element.
    fn write_le(self, bytes: &mut Vec<u8>);
}

macro_rules! element {
    ($ty:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            fn write_le(self, bytes: &mut Vec<u8>) {
                bytes.extend_from_slice(&self.to_le_bytes());
            }
        }
    };
}

element!(f64, DType::F64);
element!(f32, DType::F32);
element!(i64, DType::I64);
element!(i32, DType::I32);
element!(u8, DType::U8);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn write_le(self, bytes: &mut Vec<u8>) {
        bytes.push(self as u8);
    }
}

/// Raw content of a tensor, in little endian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorData {
    /// The bytes of all elements.
    pub bytes: Vec<u8>,
    /// The shape of the tensor.
    pub shape: Vec<usize>,
    /// The data type of the elements.
    pub dtype: DType,
}

impl TensorData {
    /// Create tensor data from values.
    ///
    /// # Panics
    ///
    /// If the number of values doesn't match the shape.
    pub fn new<E: Element, S: Into<Vec<usize>>>(values: Vec<E>, shape: S) -> Self {
        let shape = shape.into();
        let num_elements: usize = shape.iter().product();
        assert_eq!(
            values.len(),
            num_elements,
            "Shape {shape:?} is invalid for {} values",
            values.len()
        );

        let mut bytes = Vec::with_capacity(num_elements * E::DTYPE.size());
        for value in values {
            value.write_le(&mut bytes);
        }

        Self {
            bytes,
            shape,
            dtype: E::DTYPE,
        }
    }

    /// Create tensor data filled with zeros.
    pub fn zeros<S: Into<Vec<usize>>>(shape: S, dtype: DType) -> Self {
        let shape = shape.into();
        let num_elements: usize = shape.iter().product();

        Self {
            bytes: vec![0; num_elements * dtype.size()],
            shape,
            dtype,
        }
    }
}

/// A tensor as seen by distributed autograd.
///
/// Only the data and the `requires_grad` flag go on the wire; the autodiff history is local to
/// the process and is rebuilt on the receiving side with a receive function.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tensor {
    data: TensorData,
    requires_grad: bool,
    #[serde(skip)]
    grad_fn: Option<NodeRef>,
    #[serde(skip)]
    output_nr: usize,
    #[serde(skip)]
    grad_accumulator: Option<NodeRef>,
}

impl Tensor {
    /// Create a leaf tensor that doesn't require gradients.
    pub fn from_data(data: TensorData) -> Self {
        Self {
            data,
            requires_grad: false,
            grad_fn: None,
            output_nr: 0,
            grad_accumulator: None,
        }
    }

    /// Create the tensor produced by the given function, at the given output position.
    pub fn from_function(data: TensorData, grad_fn: NodeRef, output_nr: usize) -> Self {
        Self {
            data,
            requires_grad: true,
            grad_fn: Some(grad_fn),
            output_nr,
            grad_accumulator: None,
        }
    }

    /// Mark a leaf tensor as requiring gradients.
    pub fn require_grad(mut self) -> Self {
        self.requires_grad = true;
        if self.is_leaf() && self.grad_accumulator.is_none() {
            self.grad_accumulator = Some(Arc::new(AccumulateGrad::new(self.input_metadata())));
        }
        self
    }

    /// Whether gradients flow to this tensor.
    pub fn requires_grad(&self) -> bool {
        self.requires_grad || self.grad_fn.is_some()
    }

    /// The function that produced this tensor, if any.
    pub fn grad_fn(&self) -> Option<&NodeRef> {
        self.grad_fn.as_ref()
    }

    /// Which output of the producing function this tensor is.
    pub fn output_nr(&self) -> usize {
        self.output_nr
    }

    /// Whether the tensor was created by the user rather than by a function.
    pub fn is_leaf(&self) -> bool {
        self.grad_fn.is_none()
    }

    /// The data of the tensor.
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// The metadata a function needs to synthesize a gradient for this tensor.
    pub fn input_metadata(&self) -> InputMetadata {
        InputMetadata::new(self.data.shape.clone(), self.data.dtype)
    }

    /// The edge along which the gradient of this tensor flows.
    pub fn gradient_edge(&self) -> Edge {
        if let Some(grad_fn) = &self.grad_fn {
            return Edge::new(Some(grad_fn.clone()), self.output_nr);
        }

        match (&self.grad_accumulator, self.requires_grad) {
            (Some(accumulator), true) => Edge::new(Some(accumulator.clone()), 0),
            _ => Edge::none(),
        }
    }

    /// Install `grad_fn` as the function producing this tensor.
    pub fn set_history(&mut self, grad_fn: NodeRef, output_nr: usize) {
        self.requires_grad = true;
        self.grad_fn = Some(grad_fn);
        self.output_nr = output_nr;
        self.grad_accumulator = None;
    }
}

/// Whether any of the tensors requires gradients.
pub fn compute_requires_grad(tensors: &[Tensor]) -> bool {
    tensors.iter().any(Tensor::requires_grad)
}

/// Collect one edge per tensor, in order.
pub fn collect_next_edges(tensors: &[Tensor]) -> Vec<Edge> {
    tensors.iter().map(Tensor::gradient_edge).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_data_new_encodes_little_endian() {
        let data = TensorData::new(vec![1.0f32, 2.0], [2]);

        assert_eq!(data.dtype, DType::F32);
        assert_eq!(data.bytes[0..4], 1.0f32.to_le_bytes());
        assert_eq!(data.bytes[4..8], 2.0f32.to_le_bytes());
    }

    #[test]
    #[should_panic(expected = "is invalid")]
    fn tensor_data_new_checks_shape() {
        TensorData::new(vec![1i32, 2, 3], [2, 2]);
    }

    #[test]
    fn leaf_without_grad_has_no_edge() {
        let tensor = Tensor::from_data(TensorData::new(vec![1.0f32], [1]));

        assert!(!tensor.requires_grad());
        assert!(!tensor.gradient_edge().is_valid());
        assert!(!compute_requires_grad(&[tensor]));
    }

    #[test]
    fn leaf_requiring_grad_points_to_accumulator() {
        let tensor = Tensor::from_data(TensorData::new(vec![1.0f32], [1])).require_grad();
        let edge = tensor.gradient_edge();

        assert!(tensor.requires_grad());
        assert_eq!(edge.function.as_ref().map(|f| f.name()), Some("AccumulateGrad"));

        // Clones share the same accumulator.
        assert_eq!(tensor.clone().gradient_edge().node_id(), edge.node_id());
    }

    #[test]
    fn autograd_history_is_not_serialized() {
        let tensor = Tensor::from_data(TensorData::new(vec![3i64, 4], [2])).require_grad();

        let bytes = rmp_serde::to_vec(&tensor).unwrap();
        let received: Tensor = rmp_serde::from_slice(&bytes).unwrap();

        assert!(received.requires_grad());
        assert!(received.is_leaf());
        assert!(!received.gradient_edge().is_valid());
        assert_eq!(received.data(), tensor.data());
    }
}
