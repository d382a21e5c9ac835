use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use super::conversation::ConversationId;

/// Entries older than this are irrelevant to race arbitration and are
/// purged lazily on every snapshot merge.
const STALE_AFTER_SECS: i64 = 10;

/// Per-conversation timestamp of the last realtime-driven unread mutation.
/// A snapshot whose fetch started before such a stamp cannot have seen the
/// mutation, so the ledger wins for that conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RealtimeClock {
    stamps: HashMap<ConversationId, DateTime<Utc>>,
}

impl RealtimeClock {
    pub fn stamp(&mut self, id: ConversationId, now: DateTime<Utc>) {
        self.stamps.insert(id, now);
    }

    /// Whether the conversation saw a realtime mutation strictly after the
    /// given fetch epoch.
    pub fn stamped_after(&self, id: ConversationId, epoch: DateTime<Utc>) -> bool {
        self.stamps.get(&id).is_some_and(|stamp| *stamp > epoch)
    }

    pub fn purge_stale(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(STALE_AFTER_SECS);
        self.stamps.retain(|_, stamp| *stamp >= cutoff);
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn len(&self) -> usize {
        self.stamps.len()
    }
}
