use std::{marker::PhantomData, sync::Arc};

use crate::ContextId;

use super::{DistAutogradContainer, DistAutogradContext};

/// Keeps a context active on the current thread.
///
/// Dropping the guard restores the context that was active before, also when unwinding.
#[must_use = "the context is only active while the guard is alive"]
pub struct ContextGuard<'a> {
    container: &'a DistAutogradContainer,
    previous: Option<ContextId>,
    // The active context is tracked per thread.
    _not_send: PhantomData<*const ()>,
}

impl<'a> ContextGuard<'a> {
    pub(crate) fn new(container: &'a DistAutogradContainer, previous: Option<ContextId>) -> Self {
        Self {
            container,
            previous,
            _not_send: PhantomData,
        }
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.container.swap_current(self.previous);
    }
}

/// A context active for the duration of a distributed iteration.
///
/// Created by [scope](DistAutogradContainer::scope). Dropping the scope restores the previously
/// active context and releases its own.
#[must_use = "the context is released when the scope is dropped"]
pub struct ContextScope<'a> {
    container: &'a DistAutogradContainer,
    context: Arc<DistAutogradContext>,
    guard: Option<ContextGuard<'a>>,
}

impl<'a> ContextScope<'a> {
    pub(crate) fn new(
        container: &'a DistAutogradContainer,
        context: Arc<DistAutogradContext>,
        guard: ContextGuard<'a>,
    ) -> Self {
        Self {
            container,
            context,
            guard: Some(guard),
        }
    }

    /// The id of the scoped context.
    pub fn context_id(&self) -> ContextId {
        self.context.context_id()
    }

    /// The scoped context.
    pub fn context(&self) -> &Arc<DistAutogradContext> {
        &self.context
    }
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        core::mem::drop(self.guard.take());
        self.container
            .release_context_if_present(self.context.context_id());
    }
}
