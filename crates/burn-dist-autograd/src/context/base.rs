use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use crate::{
    ContextId, MessageId,
    functions::{RecvRpcBackward, SendRpcBackward},
    rpc::WorkerId,
};

/// Boundary crossings of one distributed iteration on the current worker.
///
/// Every worker taking part in the iteration holds its own instance, all sharing the same
/// [context id](ContextId). Send and receive functions are indexed by [message id](MessageId),
/// and the workers exchanged with are tracked to know who to contact during the backward pass.
#[derive(Debug)]
pub struct DistAutogradContext {
    context_id: ContextId,
    state: Mutex<ContextState>,
}

#[derive(Default, Debug)]
struct ContextState {
    known_worker_ids: HashSet<WorkerId>,
    send_functions: HashMap<MessageId, Arc<SendRpcBackward>>,
    recv_functions: HashMap<MessageId, Arc<RecvRpcBackward>>,
    retired: bool,
}

impl DistAutogradContext {
    pub(crate) fn new(context_id: ContextId) -> Self {
        Self {
            context_id,
            state: Mutex::new(ContextState::default()),
        }
    }

    /// The id of the context.
    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    /// Record a worker this context exchanged tensors with.
    pub fn add_known_worker_id(&self, worker_id: WorkerId) {
        let mut state = self.state.lock().unwrap();
        state.known_worker_ids.insert(worker_id);
    }

    /// The workers this context exchanged tensors with.
    pub fn known_worker_ids(&self) -> HashSet<WorkerId> {
        let state = self.state.lock().unwrap();
        state.known_worker_ids.clone()
    }

    /// Index a send function under the given message id.
    ///
    /// # Panics
    ///
    /// If a send function is already registered under the same id, or if the context was
    /// released.
    pub fn add_send_function(&self, function: Arc<SendRpcBackward>, message_id: MessageId) {
        let mut state = self.state.lock().unwrap();
        let duplicate = state.send_functions.contains_key(&message_id);
        if let Some(violation) = self.violation(&state, duplicate, "Send", message_id) {
            // Don't poison the state.
            core::mem::drop(state);
            panic!("{violation}");
        }

        log::debug!(
            "Context {}: send function registered for message {message_id}",
            self.context_id
        );
        state.send_functions.insert(message_id, function);
    }

    /// Index a receive function under the given message id.
    ///
    /// # Panics
    ///
    /// If a receive function is already registered under the same id, or if the context was
    /// released.
    pub fn add_recv_function(&self, function: Arc<RecvRpcBackward>, message_id: MessageId) {
        let mut state = self.state.lock().unwrap();
        let duplicate = state.recv_functions.contains_key(&message_id);
        if let Some(violation) = self.violation(&state, duplicate, "Recv", message_id) {
            // Don't poison the state.
            core::mem::drop(state);
            panic!("{violation}");
        }

        log::debug!(
            "Context {}: recv function registered for message {message_id}",
            self.context_id
        );
        state.recv_functions.insert(message_id, function);
    }

    /// All send functions indexed by message id.
    pub fn send_functions(&self) -> HashMap<MessageId, Arc<SendRpcBackward>> {
        let state = self.state.lock().unwrap();
        state.send_functions.clone()
    }

    /// All receive functions indexed by message id.
    pub fn recv_functions(&self) -> HashMap<MessageId, Arc<RecvRpcBackward>> {
        let state = self.state.lock().unwrap();
        state.recv_functions.clone()
    }

    /// The send function registered under the given message id.
    pub fn retrieve_send_function(&self, message_id: MessageId) -> Option<Arc<SendRpcBackward>> {
        let state = self.state.lock().unwrap();
        state.send_functions.get(&message_id).cloned()
    }

    /// The receive function registered under the given message id.
    pub fn retrieve_recv_function(&self, message_id: MessageId) -> Option<Arc<RecvRpcBackward>> {
        let state = self.state.lock().unwrap();
        state.recv_functions.get(&message_id).cloned()
    }

    /// Whether the context was released from its container.
    pub fn is_retired(&self) -> bool {
        self.state.lock().unwrap().retired
    }

    pub(crate) fn retire(&self) {
        let mut state = self.state.lock().unwrap();
        state.retired = true;
    }

    fn violation(
        &self,
        state: &ContextState,
        duplicate: bool,
        kind: &str,
        message_id: MessageId,
    ) -> Option<String> {
        if state.retired {
            return Some(format!(
                "Context {} was released, no new boundary crossing can be recorded",
                self.context_id
            ));
        }

        if duplicate {
            return Some(format!(
                "{kind} function already registered for message {message_id} in context {}",
                self.context_id
            ));
        }

        None
    }
}
