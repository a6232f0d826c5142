use thiserror::Error;

use crate::{ContextId, rpc::MessageType, rpc::RpcError, rpc::WorkerId};

/// Recoverable errors raised by distributed autograd.
///
/// Violated invariants (duplicate registration, missing active context, etc.) are programming
/// errors and panic instead.
#[derive(Error, Debug)]
pub enum DistAutogradError {
    /// No context is registered under the given id.
    #[error("Could not find autograd context with id: {0}")]
    UnknownContext(ContextId),
    /// The counter used to mint context ids overflowed its 48 bits.
    #[error("Context ids exhausted for worker {worker_id}")]
    ContextIdsExhausted {
        /// The worker owning the id space.
        worker_id: WorkerId,
    },
    /// A message of an unexpected type was decoded.
    #[error("Expected message of type {expected:?}, found {found:?}")]
    InvalidMessageType {
        /// The accepted message types.
        expected: Vec<MessageType>,
        /// The message type found.
        found: MessageType,
    },
    /// The payload of a message could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(String),
    /// The transport failed.
    #[error(transparent)]
    Rpc(#[from] RpcError),
    /// The configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<rmp_serde::encode::Error> for DistAutogradError {
    fn from(error: rmp_serde::encode::Error) -> Self {
        DistAutogradError::Codec(error.to_string())
    }
}

impl From<rmp_serde::decode::Error> for DistAutogradError {
    fn from(error: rmp_serde::decode::Error) -> Self {
        DistAutogradError::Codec(error.to_string())
    }
}

impl From<DistAutogradError> for RpcError {
    fn from(error: DistAutogradError) -> Self {
        match error {
            DistAutogradError::Rpc(error) => error,
            error => RpcError::Handler(error.to_string()),
        }
    }
}
