use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    AutogradMetadata, DistAutogradError,
    rpc::{Message, MessageType, WorkerId},
    tensor::Tensor,
};

/// Message wrapped with the autograd information of a boundary crossing.
///
/// On the wire, the outer payload is the rmp encoding of the wrapped message type, the sender,
/// the [metadata](AutogradMetadata) and the wrapped payload. The tensors of the wrapped message
/// are carried by the outer message as is.
#[derive(Debug, Clone)]
pub struct RpcWithAutograd {
    from_worker_id: WorkerId,
    message_type: MessageType,
    autograd_metadata: AutogradMetadata,
    wrapped_message: Message,
}

#[derive(Serialize, Deserialize)]
struct RpcWithAutogradHeader {
    from_worker_id: WorkerId,
    wrapped_message_type: MessageType,
    autograd_metadata: AutogradMetadata,
    wrapped_payload: Bytes,
}

const FORWARD_AUTOGRAD_TYPES: [MessageType; 2] = [
    MessageType::ForwardAutogradReq,
    MessageType::ForwardAutogradResp,
];

impl RpcWithAutograd {
    /// Wrap a message.
    ///
    /// # Panics
    ///
    /// If `message_type` isn't [ForwardAutogradReq](MessageType::ForwardAutogradReq) or
    /// [ForwardAutogradResp](MessageType::ForwardAutogradResp).
    pub fn new(
        from_worker_id: WorkerId,
        message_type: MessageType,
        autograd_metadata: AutogradMetadata,
        wrapped_message: Message,
    ) -> Self {
        assert!(
            message_type.is_forward_autograd(),
            "Autograd messages must be wrapped as {FORWARD_AUTOGRAD_TYPES:?}, got {message_type:?}"
        );

        Self {
            from_worker_id,
            message_type,
            autograd_metadata,
            wrapped_message,
        }
    }

    /// The worker that wrapped the message.
    pub fn from_worker_id(&self) -> WorkerId {
        self.from_worker_id
    }

    /// The type of the outer message.
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// The autograd metadata of the boundary crossing.
    pub fn autograd_metadata(&self) -> AutogradMetadata {
        self.autograd_metadata
    }

    /// The wrapped message.
    pub fn wrapped_message(&self) -> &Message {
        &self.wrapped_message
    }

    /// The tensors of the wrapped message.
    pub fn tensors(&self) -> &[Tensor] {
        &self.wrapped_message.tensors
    }

    /// Take the wrapped message.
    pub fn into_wrapped_message(self) -> Message {
        self.wrapped_message
    }

    /// Encode into a message ready to be sent.
    pub fn into_message(self) -> Result<Message, DistAutogradError> {
        let header = RpcWithAutogradHeader {
            from_worker_id: self.from_worker_id,
            wrapped_message_type: self.wrapped_message.message_type,
            autograd_metadata: self.autograd_metadata,
            wrapped_payload: self.wrapped_message.payload,
        };
        let payload = rmp_serde::to_vec(&header)?;

        Ok(Message::new(
            payload.into(),
            self.wrapped_message.tensors,
            self.message_type,
        ))
    }

    /// Decode a message produced by [into_message](Self::into_message).
    pub fn from_message(message: Message) -> Result<Self, DistAutogradError> {
        if !message.message_type.is_forward_autograd() {
            return Err(DistAutogradError::InvalidMessageType {
                expected: FORWARD_AUTOGRAD_TYPES.to_vec(),
                found: message.message_type,
            });
        }

        let header: RpcWithAutogradHeader = rmp_serde::from_slice(&message.payload)?;
        let wrapped_message = Message::new(
            header.wrapped_payload,
            message.tensors,
            header.wrapped_message_type,
        );

        Ok(Self {
            from_worker_id: header.from_worker_id,
            message_type: message.message_type,
            autograd_metadata: header.autograd_metadata,
            wrapped_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorData;

    fn metadata() -> AutogradMetadata {
        AutogradMetadata::new(3.into(), 11.into())
    }

    #[test]
    fn decode_restores_header_and_tensors() {
        let tensor = Tensor::from_data(TensorData::new(vec![1.0f32, 2.0], [2])).require_grad();
        let inner = Message::new(
            Bytes::from_static(b"\x00\x01payload"),
            vec![tensor],
            MessageType::ScriptCall,
        );

        let message = RpcWithAutograd::new(4, MessageType::ForwardAutogradReq, metadata(), inner)
            .into_message()
            .unwrap();
        assert_eq!(message.message_type, MessageType::ForwardAutogradReq);

        let decoded = RpcWithAutograd::from_message(message).unwrap();
        assert_eq!(decoded.from_worker_id(), 4);
        assert_eq!(decoded.autograd_metadata(), metadata());
        assert_eq!(decoded.tensors().len(), 1);

        let wrapped = decoded.into_wrapped_message();
        assert_eq!(wrapped.message_type, MessageType::ScriptCall);
        assert_eq!(wrapped.payload, Bytes::from_static(b"\x00\x01payload"));
    }

    #[test]
    fn decode_rejects_plain_messages() {
        let message = Message::new(Bytes::new(), vec![], MessageType::ScriptRet);

        match RpcWithAutograd::from_message(message) {
            Err(DistAutogradError::InvalidMessageType { found, .. }) => {
                assert_eq!(found, MessageType::ScriptRet)
            }
            other => panic!("Unexpected result {other:?}"),
        }
    }

    #[test]
    fn decode_reports_corrupted_payload() {
        let message = Message::new(
            Bytes::from_static(b"\xc1"),
            vec![],
            MessageType::ForwardAutogradResp,
        );

        assert!(matches!(
            RpcWithAutograd::from_message(message),
            Err(DistAutogradError::Codec(_))
        ));
    }

    #[test]
    #[should_panic(expected = "Autograd messages must be wrapped")]
    fn wrapping_with_plain_type_panics() {
        let inner = Message::new(Bytes::new(), vec![], MessageType::ScriptCall);
        RpcWithAutograd::new(0, MessageType::ScriptCall, metadata(), inner);
    }
}
