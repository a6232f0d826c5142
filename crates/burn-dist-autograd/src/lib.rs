#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Burn Distributed Autograd
//!
//! This library stitches a single autodiff graph across multiple workers communicating with
//! remote procedure calls. Every time tensors that require gradients cross a process boundary,
//! a [send function](functions::SendRpcBackward) is recorded on the sending side and a
//! [receive function](functions::RecvRpcBackward) is installed on the receiving side. Both are
//! indexed in a per-iteration [context](DistAutogradContext) under the same
//! [message id](MessageId), so a later distributed backward pass can walk the graph across
//! workers.
//!
//! ```rust, ignore
//! let container = DistAutogradContainer::new(DistAutogradConfig::new().with_worker_id(0))?;
//! let scope = container.scope()?;
//!
//! // Any send made while the scope is alive is wrapped with autograd metadata.
//! let reply = send_message(&container, &agent, &dst, message, MessageType::ForwardAutogradReq)?;
//! let reply = request_callback::process_response(&container, reply.await?)?;
//! ```

#[macro_use]
extern crate derive_new;

/// Configuration module.
pub mod config;
/// Context module.
pub mod context;
/// Error module.
pub mod error;
/// Boundary functions module.
pub mod functions;
/// Graph module.
pub mod graph;
/// Wrapped message module.
pub mod messages;
/// Metadata module.
pub mod metadata;
/// Receive-side dispatch.
pub mod request_callback;
/// Transport module.
pub mod rpc;
/// Tensor module.
pub mod tensor;
/// Wrapping and send orchestration.
pub mod utils;

pub use config::*;
pub use context::*;
pub use error::*;
pub use messages::RpcWithAutograd;
pub use metadata::*;
pub use utils::*;

#[cfg(test)]
mod tests;
