//! The transport seam used by distributed autograd.
//!
//! The protocol only needs to send a [message](Message) to a [worker](WorkerInfo) and get a
//! future for the reply; [local] provides an in-process implementation.

mod agent;
mod message;

/// In-process transport.
pub mod local;

pub use agent::*;
pub use message::*;
