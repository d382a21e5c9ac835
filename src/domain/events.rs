use chrono::{DateTime, Utc};

use super::conversation::{ConversationId, LatestMessage};

/// Kind of realtime delivery: a new message row or an in-place update of
/// an existing row's read flag (delivery receipt).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageEventKind {
    Insert,
    ReadUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTarget {
    User(i64),
    Group(i64),
}

/// One realtime message event. The push channel delivers rows for all
/// messages system-wide; filtering to "mine" happens in the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub id: i64,
    pub sender_id: i64,
    pub target: MessageTarget,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

impl MessageEvent {
    /// Resolves which conversation this event belongs to from the current
    /// user's point of view. Returns `None` when the event names the
    /// current user neither as sender nor as receiver; group membership
    /// cannot be decided here and is left to the caller.
    pub fn conversation_for(&self, current_user: i64) -> Option<ConversationId> {
        match self.target {
            MessageTarget::Group(group_id) => Some(ConversationId::Group(group_id)),
            MessageTarget::User(receiver_id) if receiver_id == current_user => {
                Some(ConversationId::Peer(self.sender_id))
            }
            MessageTarget::User(receiver_id) if self.sender_id == current_user => {
                Some(ConversationId::Peer(receiver_id))
            }
            MessageTarget::User(_) => None,
        }
    }

    pub fn to_latest(&self) -> LatestMessage {
        LatestMessage {
            id: self.id,
            sender_id: self.sender_id,
            content: self.content.clone(),
            created_at: self.created_at,
            is_read: self.is_read,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(sender_id: i64, target: MessageTarget) -> MessageEvent {
        MessageEvent {
            id: 1,
            sender_id,
            target,
            content: "hello".to_owned(),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            is_read: false,
        }
    }

    #[test]
    fn incoming_direct_message_resolves_to_the_sender() {
        let event = event(42, MessageTarget::User(7));

        assert_eq!(event.conversation_for(7), Some(ConversationId::Peer(42)));
    }

    #[test]
    fn outgoing_direct_message_resolves_to_the_receiver() {
        let event = event(7, MessageTarget::User(42));

        assert_eq!(event.conversation_for(7), Some(ConversationId::Peer(42)));
    }

    #[test]
    fn foreign_direct_message_resolves_to_nothing() {
        let event = event(42, MessageTarget::User(43));

        assert_eq!(event.conversation_for(7), None);
    }

    #[test]
    fn group_message_always_resolves_to_the_group() {
        let event = event(42, MessageTarget::Group(9));

        assert_eq!(event.conversation_for(7), Some(ConversationId::Group(9)));
    }

    #[test]
    fn to_latest_carries_the_event_fields() {
        let event = event(42, MessageTarget::User(7));
        let latest = event.to_latest();

        assert_eq!(latest.id, event.id);
        assert_eq!(latest.sender_id, 42);
        assert_eq!(latest.content, "hello");
        assert!(!latest.is_read);
    }
}
