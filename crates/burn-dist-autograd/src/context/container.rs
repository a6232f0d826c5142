use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    thread::ThreadId,
};

use crate::{ContextId, DistAutogradConfig, DistAutogradError, MessageId, rpc::WorkerId};

use super::{ContextGuard, ContextScope, DistAutogradContext};

/// Number of low bits of an id filled by the local counter; the high bits hold the worker id.
const AUTOGRAD_ID_BITS: u32 = 48;
const AUTOGRAD_ID_SPACE: u64 = 1 << AUTOGRAD_ID_BITS;

/// Registry of the distributed autograd contexts of the current worker.
///
/// The container is an explicit service: create one per worker at startup and share it (usually
/// in an [Arc]) with every component sending or receiving tensors. It owns the live contexts,
/// mints [message ids](MessageId) and tracks which context is active on each thread.
///
/// Context and message ids carry the worker id in their 16 high bits, so ids minted by
/// different workers never collide.
#[derive(Debug)]
pub struct DistAutogradContainer {
    worker_id: WorkerId,
    contexts: Mutex<HashMap<ContextId, Arc<DistAutogradContext>>>,
    current: Mutex<HashMap<ThreadId, ContextId>>,
    next_context_id: AtomicU64,
    next_message_id: AtomicU64,
}

impl DistAutogradContainer {
    /// Create the container of the configured worker.
    pub fn new(config: DistAutogradConfig) -> Result<Self, DistAutogradError> {
        if !config.is_valid() {
            return Err(DistAutogradError::InvalidConfig(format!(
                "worker name can't be empty{config}"
            )));
        }

        log::info!(
            "Distributed autograd container initialized for worker {} (id: {})",
            config.worker_name,
            config.worker_id
        );

        Ok(Self {
            worker_id: config.worker_id,
            contexts: Mutex::new(HashMap::new()),
            current: Mutex::new(HashMap::new()),
            next_context_id: AtomicU64::new(0),
            // Message ids start at 1, 0 is never issued.
            next_message_id: AtomicU64::new(1),
        })
    }

    /// The id of the current worker.
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Create and register a context with a fresh id.
    pub fn new_context(&self) -> Result<Arc<DistAutogradContext>, DistAutogradError> {
        let context_id = self
            .next_id(&self.next_context_id)
            .map(ContextId::from)
            .ok_or(DistAutogradError::ContextIdsExhausted {
                worker_id: self.worker_id,
            })?;

        Ok(self.get_or_create_context(context_id))
    }

    /// Returns the context registered under `context_id`, creating it if needed.
    ///
    /// Concurrent calls with the same id all get the same instance.
    pub fn get_or_create_context(&self, context_id: ContextId) -> Arc<DistAutogradContext> {
        let mut contexts = self.contexts.lock().unwrap();

        contexts
            .entry(context_id)
            .or_insert_with(|| {
                log::debug!("Worker {}: created context {context_id}", self.worker_id);
                Arc::new(DistAutogradContext::new(context_id))
            })
            .clone()
    }

    /// Returns the context registered under `context_id`.
    pub fn retrieve_context(
        &self,
        context_id: ContextId,
    ) -> Result<Arc<DistAutogradContext>, DistAutogradError> {
        let contexts = self.contexts.lock().unwrap();
        contexts
            .get(&context_id)
            .cloned()
            .ok_or(DistAutogradError::UnknownContext(context_id))
    }

    /// Whether a context is registered under `context_id`.
    pub fn is_valid_context(&self, context_id: ContextId) -> bool {
        self.contexts.lock().unwrap().contains_key(&context_id)
    }

    /// The number of registered contexts.
    pub fn num_contexts(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    /// Unregister the context, which can't record boundary crossings anymore.
    ///
    /// Functions already recorded stay alive as long as something references them.
    pub fn release_context(&self, context_id: ContextId) -> Result<(), DistAutogradError> {
        let context = self.contexts.lock().unwrap().remove(&context_id);
        let context = context.ok_or(DistAutogradError::UnknownContext(context_id))?;

        self.retire(&context);
        Ok(())
    }

    /// Same as [release_context](Self::release_context), ignoring unknown ids.
    pub fn release_context_if_present(&self, context_id: ContextId) {
        if self.release_context(context_id).is_err() {
            log::warn!(
                "Worker {}: context {context_id} already released",
                self.worker_id
            );
        }
    }

    /// Whether a context is active on the calling thread.
    pub fn has_valid_context(&self) -> bool {
        self.current_context_id().is_some()
    }

    /// The id of the context active on the calling thread.
    pub fn current_context_id(&self) -> Option<ContextId> {
        let current = self.current.lock().unwrap();
        current.get(&std::thread::current().id()).copied()
    }

    /// The context active on the calling thread.
    ///
    /// # Panics
    ///
    /// If no context is active, or if the active context was released.
    pub fn current_context(&self) -> Arc<DistAutogradContext> {
        let context_id = match self.current_context_id() {
            Some(id) => id,
            None => panic!("Current thread doesn't have a valid autograd context"),
        };

        match self.retrieve_context(context_id) {
            Ok(context) => context,
            Err(_) => panic!("Context {context_id} was released while still active"),
        }
    }

    /// The context active on the calling thread, if it is still registered.
    pub fn try_current_context(&self) -> Option<Arc<DistAutogradContext>> {
        self.current_context_id()
            .and_then(|id| self.retrieve_context(id).ok())
    }

    /// Make `context_id` the active context of the calling thread until the guard is dropped.
    pub fn set_current_context(&self, context_id: ContextId) -> ContextGuard<'_> {
        let previous = self.swap_current(Some(context_id));
        ContextGuard::new(self, previous)
    }

    /// Create a context and make it active on the calling thread.
    ///
    /// When the scope is dropped, the previous active context is restored and the context is
    /// released.
    pub fn scope(&self) -> Result<ContextScope<'_>, DistAutogradError> {
        let context = self.new_context()?;
        let guard = self.set_current_context(context.context_id());

        Ok(ContextScope::new(self, context, guard))
    }

    /// Mint a message id, unique for the lifetime of the container.
    ///
    /// # Panics
    ///
    /// If the 48 bits id space of the worker is exhausted.
    pub fn new_autograd_message_id(&self) -> MessageId {
        match self.next_id(&self.next_message_id) {
            Some(id) => MessageId::from(id),
            None => panic!("Autograd message ids exhausted for worker {}", self.worker_id),
        }
    }

    pub(crate) fn swap_current(&self, context_id: Option<ContextId>) -> Option<ContextId> {
        let thread = std::thread::current().id();
        let mut current = self.current.lock().unwrap();

        match context_id {
            Some(id) => current.insert(thread, id),
            None => current.remove(&thread),
        }
    }

    fn retire(&self, context: &DistAutogradContext) {
        context.retire();

        let context_id = context.context_id();
        let thread = std::thread::current().id();
        let mut current = self.current.lock().unwrap();
        if current.get(&thread) == Some(&context_id) {
            current.remove(&thread);
        }

        log::info!("Worker {}: released context {context_id}", self.worker_id);
    }

    fn next_id(&self, counter: &AtomicU64) -> Option<u64> {
        let local = counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| {
                (id < AUTOGRAD_ID_SPACE).then_some(id + 1)
            })
            .ok()?;

        Some(((self.worker_id as u64) << AUTOGRAD_ID_BITS) | local)
    }
}
