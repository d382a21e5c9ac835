use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::{
    conversation::{Conversation, ConversationId, LatestMessage, Profile},
    events::{MessageEvent, MessageTarget},
};

/// A user row as the backend serializes it, including joined selects.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawProfile {
    pub id: i64,
    #[serde(default)]
    pub nickname: Option<String>,
}

impl RawProfile {
    pub fn into_profile(self) -> Profile {
        let display_name = self
            .nickname
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("user-{}", self.id));
        Profile {
            user_id: self.id,
            display_name,
        }
    }
}

/// A joined profile field. Depending on the relationship the backend
/// infers for the join, the same column arrives as a single object or as a
/// one-element array; both shapes collapse to one profile here, once, so
/// no consumer ever re-checks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum JoinedProfile {
    One(RawProfile),
    Many(Vec<RawProfile>),
}

impl JoinedProfile {
    pub fn normalize(self) -> Option<RawProfile> {
        match self {
            Self::One(profile) => Some(profile),
            Self::Many(profiles) => profiles.into_iter().next(),
        }
    }
}

/// A message row as delivered by the realtime channel or embedded in a
/// snapshot. Exactly one of `receiver_id` / `group_id` is expected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawMessageRow {
    pub id: i64,
    pub sender_id: i64,
    #[serde(default)]
    pub receiver_id: Option<i64>,
    #[serde(default)]
    pub group_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

impl RawMessageRow {
    /// Maps the row into a domain event. Returns `None` for rows that name
    /// neither a receiver nor a group; the caller logs those as contract
    /// violations. Rows carrying both are treated as group messages, which
    /// is what the backend means when it fans a circle post out.
    pub fn into_event(self) -> Option<MessageEvent> {
        let target = match (self.group_id, self.receiver_id) {
            (Some(group_id), _) => MessageTarget::Group(group_id),
            (None, Some(receiver_id)) => MessageTarget::User(receiver_id),
            (None, None) => return None,
        };

        Some(MessageEvent {
            id: self.id,
            sender_id: self.sender_id,
            target,
            content: self.content,
            created_at: self.created_at,
            is_read: self.is_read,
        })
    }
}

/// One entry of the snapshot fetch: either a direct conversation with a
/// joined peer profile, or a circle with its own id and name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawConversationRow {
    #[serde(default)]
    pub peer: Option<JoinedProfile>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub latest_message: Option<RawMessageRow>,
    #[serde(default)]
    pub unread_count: u32,
}

impl RawConversationRow {
    /// Normalizes the row into a domain conversation. `None` means the row
    /// identifies neither a peer nor a circle and must be skipped.
    pub fn into_conversation(self) -> Option<Conversation> {
        let (id, title) = if let Some(group_id) = self.group_id {
            let title = self
                .group_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("circle-{group_id}"));
            (ConversationId::Group(group_id), title)
        } else {
            let profile = self.peer?.normalize()?.into_profile();
            (ConversationId::Peer(profile.user_id), profile.display_name)
        };

        let latest_message = self.latest_message.map(|row| LatestMessage {
            id: row.id,
            sender_id: row.sender_id,
            content: row.content,
            created_at: row.created_at,
            is_read: row.is_read,
        });

        Some(Conversation {
            id,
            title,
            latest_message,
            unread_count: self.unread_count,
            pinned: false,
        })
    }
}
