use core::future::Future;
use core::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Message;

/// Identifier of a worker.
pub type WorkerId = u16;

/// Boxed future that can be sent between threads.
pub type DynFut<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Future resolved with the reply of a message.
pub type FutureMessage = DynFut<Result<Message, RpcError>>;

/// Addressable process taking part in the computation.
#[derive(new, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerInfo {
    /// The name of the worker, unique in the group.
    pub name: String,
    /// The id of the worker, unique in the group.
    pub id: WorkerId,
}

/// Error reported by the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcError {
    /// No worker is known under the given id.
    #[error("Unknown worker {0}")]
    UnknownWorker(WorkerId),
    /// The worker stopped before replying.
    #[error("Worker {0} disconnected")]
    Disconnected(WorkerId),
    /// The remote handler failed.
    #[error("Remote handler failed: {0}")]
    Handler(String),
}

/// Sends messages to other workers.
pub trait RpcAgent: Send + Sync {
    /// The current worker.
    fn worker_info(&self) -> &WorkerInfo;

    /// Resolve a worker of the group by name.
    fn worker_info_by_name(&self, name: &str) -> Option<WorkerInfo>;

    /// Resolve a worker of the group by id.
    fn worker_info_by_id(&self, id: WorkerId) -> Option<WorkerInfo>;

    /// Send a message to the given worker.
    ///
    /// Returns immediately; failures are reported through the future.
    fn send(&self, to: &WorkerInfo, message: Message) -> FutureMessage;
}

/// Produces the reply of a request received from another worker.
pub trait RequestHandler: Send + Sync + 'static {
    /// Handle the request sent by worker `from`.
    fn handle(&self, request: Message, from: WorkerId) -> Result<Message, RpcError>;
}

impl<F> RequestHandler for F
where
    F: Fn(Message, WorkerId) -> Result<Message, RpcError> + Send + Sync + 'static,
{
    fn handle(&self, request: Message, from: WorkerId) -> Result<Message, RpcError> {
        self(request, from)
    }
}
