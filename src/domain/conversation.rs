use chrono::{DateTime, Utc};

/// Stable key of a conversation: the other party's user id for a direct
/// chat, the circle id for a group chat. Ids are never reused within a
/// session, so the two spaces may overlap numerically without colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationId {
    Peer(i64),
    Group(i64),
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Peer(id) => write!(f, "peer:{id}"),
            Self::Group(id) => write!(f, "circle:{id}"),
        }
    }
}

/// Minimal public profile of a user, resolved on first contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub user_id: i64,
    pub display_name: String,
}

/// The most recent message of a conversation, as shown in the chat list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestMessage {
    pub id: i64,
    pub sender_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub latest_message: Option<LatestMessage>,
    pub unread_count: u32,
    /// Sourced from the per-user settings collaborator, not from snapshots.
    pub pinned: bool,
}

impl Conversation {
    pub fn latest_at(&self) -> Option<DateTime<Utc>> {
        self.latest_message.as_ref().map(|message| message.created_at)
    }
}
