use std::sync::Arc;

use crate::{
    AutogradMetadata, DistAutogradContainer, DistAutogradContext, DistAutogradError,
    RpcWithAutograd,
    functions::{RecvRpcBackward, SendRpcBackward},
    graph::NodeRef,
    rpc::{FutureMessage, Message, MessageType, RpcAgent, WorkerId, WorkerInfo},
    tensor::{Tensor, compute_requires_grad},
};

/// Record a send function for `tensors` sent to `dst` in the given context.
///
/// # Panics
///
/// If a send function is already registered under the message id of `autograd_metadata`.
pub fn add_send_rpc_backward(
    context: &DistAutogradContext,
    autograd_metadata: AutogradMetadata,
    tensors: &[Tensor],
    dst: WorkerId,
) -> Arc<SendRpcBackward> {
    let function = Arc::new(SendRpcBackward::new(tensors));

    context.add_send_function(function.clone(), autograd_metadata.message_id);
    context.add_known_worker_id(dst);

    function
}

/// Install a receive function as the producer of the received tensors requiring gradients.
///
/// The context is created if this is the first boundary crossing of the iteration seen by the
/// current worker.
///
/// # Panics
///
/// If none of the tensors requires gradients, or if a receive function is already registered
/// under the message id of `autograd_metadata`.
pub fn add_recv_rpc_backward(
    container: &DistAutogradContainer,
    autograd_metadata: AutogradMetadata,
    tensors: &mut [Tensor],
    from_worker_id: WorkerId,
) -> Arc<DistAutogradContext> {
    assert!(
        compute_requires_grad(tensors),
        "Received tensors do not require grad, no receive function should be installed"
    );

    let context = container.get_or_create_context(autograd_metadata.context_id);

    let input_metadata = tensors
        .iter()
        .filter(|tensor| tensor.requires_grad())
        .map(Tensor::input_metadata)
        .collect();
    let function = Arc::new(RecvRpcBackward::new(
        autograd_metadata,
        from_worker_id,
        input_metadata,
    ));

    let grad_fn: NodeRef = function.clone();
    for (output_nr, tensor) in tensors
        .iter_mut()
        .filter(|tensor| tensor.requires_grad())
        .enumerate()
    {
        tensor.set_history(grad_fn.clone(), output_nr);
    }

    context.add_recv_function(function, autograd_metadata.message_id);
    context
}

/// Wrap the message with autograd information when a boundary crossing must be recorded.
///
/// Nothing is recorded and the message is returned as is when no context is active on the
/// calling thread, or when none of its tensors requires gradients. Otherwise a fresh
/// [message id](crate::MessageId) is minted in the active context, a send function is recorded
/// for the tensors and `dst` becomes a known worker of the context.
///
/// # Panics
///
/// If `message_type` isn't a forward autograd type, or if the active context was released.
pub fn wrap_if_needed(
    container: &DistAutogradContainer,
    dst: WorkerId,
    message: Message,
    message_type: MessageType,
) -> Result<Message, DistAutogradError> {
    if !container.has_valid_context() || !compute_requires_grad(message.tensors()) {
        return Ok(message);
    }

    let context = container.current_context();
    let autograd_metadata =
        AutogradMetadata::new(context.context_id(), container.new_autograd_message_id());

    let inner_type = message.message_type;
    let message = RpcWithAutograd::new(
        container.worker_id(),
        message_type,
        autograd_metadata,
        message,
    )
    .into_message()?;

    // Recorded once the message is encoded, before it is handed to the transport.
    add_send_rpc_backward(&context, autograd_metadata, message.tensors(), dst);

    log::debug!(
        "Worker {}: wrapped {inner_type:?} to worker {dst} with {autograd_metadata}",
        container.worker_id(),
    );

    Ok(message)
}

/// Decode a wrapped message and install a receive function on its tensors.
///
/// Returns the inner message, whose tensors now have the receive function as producer, and the
/// context the boundary crossing was recorded in.
///
/// # Panics
///
/// If none of the carried tensors requires gradients.
pub fn unwrap_autograd_message(
    container: &DistAutogradContainer,
    message: Message,
) -> Result<(Message, Arc<DistAutogradContext>), DistAutogradError> {
    let wrapped = RpcWithAutograd::from_message(message)?;
    let from_worker_id = wrapped.from_worker_id();
    let autograd_metadata = wrapped.autograd_metadata();

    let mut message = wrapped.into_wrapped_message();
    let context = add_recv_rpc_backward(
        container,
        autograd_metadata,
        &mut message.tensors,
        from_worker_id,
    );

    log::debug!(
        "Worker {}: unwrapped {:?} from worker {from_worker_id} with {autograd_metadata}",
        container.worker_id(),
        message.message_type,
    );

    Ok((message, context))
}

/// Send a message to `dst`, wrapping it with autograd information if needed.
///
/// Returns as soon as the message is handed to the agent; transport failures are reported
/// through the returned future. The agent must be the one of the container's worker, since the
/// container's worker id is written as the sender of wrapped messages.
pub fn send_message<A: RpcAgent + ?Sized>(
    container: &DistAutogradContainer,
    agent: &A,
    dst: &WorkerInfo,
    message: Message,
    message_type: MessageType,
) -> Result<FutureMessage, DistAutogradError> {
    debug_assert_eq!(
        agent.worker_info().id,
        container.worker_id(),
        "Container of worker {} must send with the agent of worker {}",
        container.worker_id(),
        container.worker_id(),
    );

    let message = wrap_if_needed(container, dst.id, message, message_type)?;

    Ok(agent.send(dst, message))
}
