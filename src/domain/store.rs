use super::conversation::{Conversation, ConversationId};

/// The authoritative in-memory conversation list. Holds at most one record
/// per id and keeps itself sorted by latest-message recency. Records are
/// never deleted during a session; a snapshot merge replaces the whole
/// list, everything else updates in place.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
}

impl ConversationStore {
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn contains(&self, id: ConversationId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    /// Inserts or replaces the record with the same id. Never produces a
    /// duplicate entry. The caller re-sorts afterwards.
    pub fn upsert(&mut self, conversation: Conversation) {
        match self.get_mut(conversation.id) {
            Some(existing) => *existing = conversation,
            None => self.conversations.push(conversation),
        }
    }

    /// Replaces the whole list with a fresh snapshot, keeping each
    /// surviving conversation's `pinned` flag (pinned is sourced from the
    /// settings collaborator, which snapshots know nothing about). A
    /// paginated fetch can repeat a record at a page boundary; the first
    /// occurrence wins so the one-record-per-id invariant holds.
    pub fn replace_all(&mut self, conversations: Vec<Conversation>) {
        let mut fresh: Vec<Conversation> = Vec::with_capacity(conversations.len());
        for mut incoming in conversations {
            if fresh.iter().any(|c| c.id == incoming.id) {
                continue;
            }
            if let Some(existing) = self.get(incoming.id) {
                incoming.pinned = existing.pinned;
            }
            fresh.push(incoming);
        }
        self.conversations = fresh;
        self.sort_by_recency();
    }

    /// Stable sort by latest-message timestamp, newest first. Conversations
    /// without a latest message sort last; ties keep their relative order.
    pub fn sort_by_recency(&mut self) {
        self.conversations
            .sort_by(|a, b| b.latest_at().cmp(&a.latest_at()));
    }

    pub fn set_pinned(&mut self, id: ConversationId, pinned: bool) -> bool {
        match self.get_mut(id) {
            Some(conversation) => {
                conversation.pinned = pinned;
                true
            }
            None => false,
        }
    }

    /// Ids of the most recent conversations, in list order.
    pub fn recent_ids(&self, limit: usize) -> Vec<ConversationId> {
        self.conversations.iter().take(limit).map(|c| c.id).collect()
    }
}
