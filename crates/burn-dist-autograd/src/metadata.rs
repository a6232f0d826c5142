use core::fmt::Display;

use serde::{Deserialize, Serialize};

/// Identifier of a distributed autograd [context](crate::DistAutogradContext).
///
/// The same id is shared by every worker taking part in a distributed iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(u64);

/// Identifier of a boundary crossing inside a [context](crate::DistAutogradContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(u64);

impl ContextId {
    /// The raw value of the id.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl MessageId {
    /// The raw value of the id.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ContextId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<u64> for MessageId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Addressing information embedded in every autograd-aware message.
///
/// The pair is minted once on the sending side and travels verbatim; the receiving side uses it
/// to find (or create) the matching context and to index the receive function.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AutogradMetadata {
    /// The context of the distributed iteration.
    pub context_id: ContextId,
    /// The boundary crossing inside the context.
    pub message_id: MessageId,
}

impl Display for AutogradMetadata {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{{{}, {}}}", self.context_id, self.message_id)
    }
}
