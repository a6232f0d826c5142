//! Boundary crossings between workers connected by the in-process transport.


use std::sync::Arc;

use bytes::Bytes;

use crate::{
    DistAutogradConfig, DistAutogradContainer,
    request_callback::AutogradRequestCallback,
    rpc::{
        Message, MessageType, RequestHandler, RpcError, WorkerId, WorkerInfo,
        local::{LocalAgent, LocalNetwork},
    },
    tensor::{Tensor, TensorData},
};

pub(crate) struct TestWorker {
    pub container: Arc<DistAutogradContainer>,
    pub agent: Arc<LocalAgent>,
}

impl TestWorker {
    pub fn start<H: RequestHandler>(
        network: &Arc<LocalNetwork>,
        id: WorkerId,
        build_handler: impl FnOnce(Arc<DistAutogradContainer>) -> H,
    ) -> Self {
        let name = format!("worker{id}");
        let config = DistAutogradConfig::new()
            .with_worker_id(id)
            .with_worker_name(name.clone());
        let container = Arc::new(DistAutogradContainer::new(config).unwrap());

        let handler = build_handler(container.clone());
        let handler = AutogradRequestCallback::new(container.clone(), handler);
        let agent = LocalAgent::start(network, WorkerInfo::new(name, id), handler);

        Self { container, agent }
    }
}

/// Replies with the received tensors.
pub(crate) fn echo(request: Message, _from: WorkerId) -> Result<Message, RpcError> {
    Ok(Message::new(
        Bytes::from_static(b"echo"),
        request.tensors,
        MessageType::ScriptRet,
    ))
}

pub(crate) fn tracked() -> Tensor {
    Tensor::from_data(TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0], [2, 2])).require_grad()
}

pub(crate) fn untracked() -> Tensor {
    Tensor::from_data(TensorData::new(vec![7i64], [1]))
}

pub(crate) fn call(tensors: Vec<Tensor>) -> Message {
    Message::new(Bytes::from_static(b"call"), tensors, MessageType::ScriptCall)
}
