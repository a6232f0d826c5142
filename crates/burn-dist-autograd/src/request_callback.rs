use std::sync::Arc;

use crate::{
    DistAutogradContainer, DistAutogradError, unwrap_autograd_message, wrap_if_needed,
    rpc::{Message, MessageType, RequestHandler, RpcError, WorkerId},
};

const RESPONSE_TYPES: [MessageType; 4] = [
    MessageType::ScriptRet,
    MessageType::PythonRet,
    MessageType::RemoteRet,
    MessageType::ForwardAutogradResp,
];

/// Request handler recording the boundary crossings of the requests it processes.
///
/// Wrapped requests are unwrapped before reaching the inner handler, which runs with the
/// received context active on its thread, so any tensor it sends back or forwards is recorded
/// in the same distributed iteration.
#[derive(new)]
pub struct AutogradRequestCallback<H> {
    container: Arc<DistAutogradContainer>,
    handler: H,
}

impl<H: RequestHandler> RequestHandler for AutogradRequestCallback<H> {
    fn handle(&self, request: Message, from: WorkerId) -> Result<Message, RpcError> {
        process_request(&self.container, request, from, &self.handler)
    }
}

/// Dispatch a request received from worker `from`.
pub fn process_request<H: RequestHandler + ?Sized>(
    container: &DistAutogradContainer,
    request: Message,
    from: WorkerId,
    handler: &H,
) -> Result<Message, RpcError> {
    match request.message_type {
        MessageType::ForwardAutogradReq => {
            let (request, context) = unwrap_autograd_message(container, request)?;

            let _guard = container.set_current_context(context.context_id());
            let response = handler.handle(request, from)?;

            wrap_if_needed(container, from, response, MessageType::ForwardAutogradResp)
                .map_err(RpcError::from)
        }
        MessageType::ScriptCall
        | MessageType::PythonCall
        | MessageType::ScriptRemoteCall
        | MessageType::PythonRemoteCall => handler.handle(request, from),
        MessageType::ScriptRet
        | MessageType::PythonRet
        | MessageType::RemoteRet
        | MessageType::ForwardAutogradResp => Err(RpcError::Handler(format!(
            "Unexpected response of type {:?} received as a request from worker {from}",
            request.message_type
        ))),
    }
}

/// Process the reply to a request sent with [send_message](crate::send_message).
///
/// Wrapped replies get a receive function installed on their tensors and are returned
/// unwrapped; other replies are returned as is. Requests are rejected.
pub fn process_response(
    container: &DistAutogradContainer,
    response: Message,
) -> Result<Message, DistAutogradError> {
    if !response.message_type.is_response() {
        return Err(DistAutogradError::InvalidMessageType {
            expected: RESPONSE_TYPES.to_vec(),
            found: response.message_type,
        });
    }

    match response.message_type {
        MessageType::ForwardAutogradResp => {
            let (response, _context) = unwrap_autograd_message(container, response)?;
            Ok(response)
        }
        _ => Ok(response),
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::{
        DistAutogradConfig, RpcWithAutograd,
        tensor::{Tensor, TensorData},
    };

    fn container(worker_id: WorkerId) -> Arc<DistAutogradContainer> {
        let config = DistAutogradConfig::new().with_worker_id(worker_id);
        Arc::new(DistAutogradContainer::new(config).unwrap())
    }

    fn tracked() -> Tensor {
        Tensor::from_data(TensorData::new(vec![1.0f32, 2.0], [2])).require_grad()
    }

    #[test]
    fn plain_requests_reach_the_handler_as_is() {
        let handler = |request: Message, _from: WorkerId| -> Result<Message, RpcError> {
            assert_eq!(request.message_type, MessageType::ScriptCall);
            Ok(Message::new(request.payload, vec![], MessageType::ScriptRet))
        };
        let callback = AutogradRequestCallback::new(container(1), handler);

        let request = Message::new(Bytes::from_static(b"call"), vec![], MessageType::ScriptCall);
        let response = callback.handle(request, 0).unwrap();

        assert_eq!(response.message_type, MessageType::ScriptRet);
        assert_eq!(response.payload, Bytes::from_static(b"call"));
    }

    #[test]
    fn responses_are_rejected_as_requests() {
        let handler = |request: Message, _from: WorkerId| -> Result<Message, RpcError> {
            Ok(request)
        };
        let callback = AutogradRequestCallback::new(container(1), handler);

        let request = Message::new(Bytes::new(), vec![], MessageType::RemoteRet);

        assert!(matches!(
            callback.handle(request, 0),
            Err(RpcError::Handler(_))
        ));
    }

    #[test]
    fn wrapped_request_runs_under_the_received_context() {
        let sender = container(0);
        let receiver = container(1);
        let scope = sender.scope().unwrap();
        let context_id = scope.context_id();

        let request = Message::new(Bytes::new(), vec![tracked()], MessageType::ScriptCall);
        let request =
            wrap_if_needed(&sender, 1, request, MessageType::ForwardAutogradReq).unwrap();

        let inner = receiver.clone();
        let handler = move |request: Message, _from: WorkerId| -> Result<Message, RpcError> {
            assert_eq!(inner.current_context_id(), Some(context_id));
            Ok(Message::new(
                Bytes::from_static(b"ret"),
                request.tensors,
                MessageType::ScriptRet,
            ))
        };
        let callback = AutogradRequestCallback::new(receiver.clone(), handler);

        let response = callback.handle(request, 0).unwrap();

        // The handler thread leaves the context once the request is processed.
        assert!(!receiver.has_valid_context());
        assert_eq!(response.message_type, MessageType::ForwardAutogradResp);

        let context = receiver.retrieve_context(context_id).unwrap();
        assert_eq!(context.recv_functions().len(), 1);
        assert_eq!(context.send_functions().len(), 1);
        assert!(context.known_worker_ids().contains(&0));

        let response = RpcWithAutograd::from_message(response).unwrap();
        assert_eq!(response.from_worker_id(), 1);
        assert_eq!(response.autograd_metadata().context_id, context_id);
    }

    #[test]
    fn wrapped_response_is_unwrapped() {
        let caller = container(0);
        let callee = container(1);
        let scope = caller.scope().unwrap();

        let response = {
            let context = callee.get_or_create_context(scope.context_id());
            let _guard = callee.set_current_context(context.context_id());
            let response =
                Message::new(Bytes::from_static(b"ret"), vec![tracked()], MessageType::ScriptRet);
            wrap_if_needed(&callee, 0, response, MessageType::ForwardAutogradResp).unwrap()
        };

        let response = process_response(&caller, response).unwrap();

        assert_eq!(response.message_type, MessageType::ScriptRet);
        assert_eq!(response.payload, Bytes::from_static(b"ret"));
        assert!(response.tensors[0].grad_fn().is_some());
        assert_eq!(scope.context().recv_functions().len(), 1);
    }

    #[test]
    fn plain_response_is_returned_as_is() {
        let caller = container(0);
        let response = Message::new(Bytes::from_static(b"ret"), vec![], MessageType::ScriptRet);

        let response = process_response(&caller, response).unwrap();

        assert_eq!(response.payload, Bytes::from_static(b"ret"));
        assert_eq!(caller.num_contexts(), 0);
    }

    #[test]
    fn request_is_rejected_as_response() {
        let caller = container(0);
        let request = Message::new(Bytes::new(), vec![tracked()], MessageType::ScriptCall);

        match process_response(&caller, request) {
            Err(DistAutogradError::InvalidMessageType { expected, found }) => {
                assert_eq!(found, MessageType::ScriptCall);
                assert!(expected.iter().all(MessageType::is_response));
            }
            other => panic!("Unexpected result {other:?}"),
        }
    }
}
