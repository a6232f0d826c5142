use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

/// Kind of a message exchanged between workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Call of a builtin or script function.
    ScriptCall,
    /// Return value of a [script call](MessageType::ScriptCall).
    ScriptRet,
    /// Call of a user function.
    PythonCall,
    /// Return value of a [user call](MessageType::PythonCall).
    PythonRet,
    /// Call of a script function creating a remote value.
    ScriptRemoteCall,
    /// Call of a user function creating a remote value.
    PythonRemoteCall,
    /// Acknowledgement of a remote call.
    RemoteRet,
    /// Request wrapped with autograd metadata.
    ForwardAutogradReq,
    /// Response wrapped with autograd metadata.
    ForwardAutogradResp,
}

impl MessageType {
    /// Whether the message is sent by a caller.
    pub fn is_request(&self) -> bool {
        match self {
            MessageType::ScriptCall
            | MessageType::PythonCall
            | MessageType::ScriptRemoteCall
            | MessageType::PythonRemoteCall
            | MessageType::ForwardAutogradReq => true,
            MessageType::ScriptRet
            | MessageType::PythonRet
            | MessageType::RemoteRet
            | MessageType::ForwardAutogradResp => false,
        }
    }

    /// Whether the message is sent back to a caller.
    pub fn is_response(&self) -> bool {
        !self.is_request()
    }

    /// Whether the message wraps another one with autograd metadata.
    pub fn is_forward_autograd(&self) -> bool {
        matches!(
            self,
            MessageType::ForwardAutogradReq | MessageType::ForwardAutogradResp
        )
    }
}

/// Message sent on the wire.
///
/// The payload is opaque to distributed autograd; tensors are carried on the side so their
/// autodiff history can be inspected and rebuilt.
#[derive(new, Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// The encoded content.
    pub payload: Bytes,
    /// The tensors carried by the message.
    pub tensors: Vec<Tensor>,
    /// The kind of message.
    pub message_type: MessageType,
}

impl Message {
    /// The tensors carried by the message.
    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }
}
