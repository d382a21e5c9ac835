use crate::{
    backend::rows::RawConversationRow,
    domain::conversation::{ConversationId, Profile},
};

/// Transport-level failure taxonomy shared by all backend collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCallError {
    Unauthorized,
    Unavailable,
    InvalidData,
    Unknown,
}

/// Full conversation-list pull for one user.
pub trait SnapshotSource {
    fn fetch_snapshot(&self, user_id: i64) -> Result<Vec<RawConversationRow>, BackendCallError>;
}

/// On-demand profile lookup, used on first contact with an unknown peer.
pub trait ProfileSource {
    fn lookup_profile(&self, user_id: i64) -> Result<Option<Profile>, BackendCallError>;
}

/// Server-side read reset. The local ledger is zeroed optimistically
/// before this call resolves; the ack never gates local state.
pub trait ReadMarker {
    fn mark_read(&self, user_id: i64, conversation: ConversationId) -> Result<(), BackendCallError>;
}

/// Handle to one live presence subscription. Dropping the handle tears the
/// subscription down; no other operation exists on purpose, so the tracker
/// can never leave an orphan behind.
pub trait PresenceSubscription {}

/// Ephemeral typing-signal channel.
pub trait PresenceChannel {
    fn subscribe(
        &self,
        conversation: ConversationId,
    ) -> Result<Box<dyn PresenceSubscription>, BackendCallError>;
}
