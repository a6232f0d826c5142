use std::{
    any::Any,
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex},
    thread::JoinHandle,
};

use async_channel::Sender;

use super::{FutureMessage, Message, RequestHandler, RpcAgent, RpcError, WorkerId, WorkerInfo};

type Callback = Sender<Result<Message, RpcError>>;

struct Envelope {
    from: WorkerId,
    message: Message,
    callback: Callback,
}

/// Directory of the workers living in the current process.
#[derive(Default)]
pub struct LocalNetwork {
    workers: Mutex<HashMap<WorkerId, (WorkerInfo, Sender<Envelope>)>>,
}

impl LocalNetwork {
    /// Create an empty network.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn register(&self, info: WorkerInfo, sender: Sender<Envelope>) {
        let mut workers = self.workers.lock().unwrap();
        if workers.contains_key(&info.id) {
            panic!("Worker {} is already registered", info.id);
        }
        workers.insert(info.id, (info, sender));
    }

    fn unregister(&self, id: WorkerId) -> Option<Sender<Envelope>> {
        let mut workers = self.workers.lock().unwrap();
        workers.remove(&id).map(|(_, sender)| sender)
    }

    fn sender(&self, id: WorkerId) -> Option<Sender<Envelope>> {
        let workers = self.workers.lock().unwrap();
        workers.get(&id).map(|(_, sender)| sender.clone())
    }

    fn find<P: Fn(&WorkerInfo) -> bool>(&self, predicate: P) -> Option<WorkerInfo> {
        let workers = self.workers.lock().unwrap();
        workers
            .values()
            .map(|(info, _)| info)
            .find(|info| predicate(info))
            .cloned()
    }
}

/// Agent of a worker living in the current process.
///
/// Each agent owns a thread processing its incoming requests in order with its
/// [handler](RequestHandler).
pub struct LocalAgent {
    info: WorkerInfo,
    network: Arc<LocalNetwork>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl LocalAgent {
    /// Register a worker on the network and start processing its requests.
    ///
    /// # Panics
    ///
    /// If a worker with the same id is already registered.
    pub fn start<H: RequestHandler>(
        network: &Arc<LocalNetwork>,
        info: WorkerInfo,
        handler: H,
    ) -> Arc<Self> {
        let (sender, receiver) = async_channel::unbounded::<Envelope>();
        network.register(info.clone(), sender);

        let name = info.name.clone();
        let handle = std::thread::spawn(move || {
            while let Ok(envelope) = receiver.recv_blocking() {
                let from = envelope.from;
                let message = envelope.message;
                let response = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    handler.handle(message, from)
                }))
                .unwrap_or_else(|payload| {
                    let reason = panic_message(payload.as_ref());
                    log::error!("[{name}] Request from worker {from} panicked: {reason}");
                    Err(RpcError::Handler(reason))
                });

                if envelope.callback.send_blocking(response).is_err() {
                    log::debug!("[{name}] Reply dropped by worker {}", envelope.from);
                }
            }
            log::info!("[{name}] Request handler stopped");
        });

        log::info!("Started local worker {} (id: {})", info.name, info.id);

        Arc::new(Self {
            info,
            network: network.clone(),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Unregister the worker and wait for its pending requests to be processed.
    pub fn shutdown(&self) {
        if let Some(sender) = self.network.unregister(self.info.id) {
            let pending = sender.len();
            if pending > 0 {
                log::warn!(
                    "[{}] Shutting down with {pending} pending requests",
                    self.info.name
                );
            }
            sender.close();
        }

        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            // A handler shutting down its own worker can't wait for itself.
            if handle.thread().id() != std::thread::current().id() && handle.join().is_err() {
                log::error!("[{}] Request handler panicked", self.info.name);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return message.to_string();
    }

    match payload.downcast_ref::<String>() {
        Some(message) => message.clone(),
        None => String::from("Request handler panicked"),
    }
}

impl Drop for LocalAgent {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl RpcAgent for LocalAgent {
    fn worker_info(&self) -> &WorkerInfo {
        &self.info
    }

    fn worker_info_by_name(&self, name: &str) -> Option<WorkerInfo> {
        self.network.find(|info| info.name == name)
    }

    fn worker_info_by_id(&self, id: WorkerId) -> Option<WorkerInfo> {
        self.network.find(|info| info.id == id)
    }

    fn send(&self, to: &WorkerInfo, message: Message) -> FutureMessage {
        let dst = to.id;
        let (callback, reply) = async_channel::bounded(1);
        let envelope = Envelope {
            from: self.info.id,
            message,
            callback,
        };

        let sent = match self.network.sender(dst) {
            Some(sender) => sender
                .try_send(envelope)
                .map_err(|_| RpcError::Disconnected(dst)),
            None => Err(RpcError::UnknownWorker(dst)),
        };

        Box::pin(async move {
            sent?;
            reply.recv().await.map_err(|_| RpcError::Disconnected(dst))?
        })
    }
}
