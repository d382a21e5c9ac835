use std::collections::HashMap;

use super::conversation::ConversationId;

/// Per-conversation unread counters, updated synchronously and independent
/// of any derived view. This is the arbitration source the snapshot
/// reconciler prefers over a stale fetch. Counts cannot go negative; they
/// reach zero only through an explicit reset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnreadLedger {
    counts: HashMap<ConversationId, u32>,
}

impl UnreadLedger {
    pub fn get(&self, id: ConversationId) -> u32 {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, id: ConversationId) -> u32 {
        let count = self.counts.entry(id).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Reconciles the counter with a trusted snapshot value.
    pub fn set(&mut self, id: ConversationId, count: u32) {
        self.counts.insert(id, count);
    }

    pub fn reset(&mut self, id: ConversationId) {
        self.counts.insert(id, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_conversation_reads_as_zero() {
        let ledger = UnreadLedger::default();

        assert_eq!(ledger.get(ConversationId::Peer(1)), 0);
    }

    #[test]
    fn increment_returns_the_new_count() {
        let mut ledger = UnreadLedger::default();

        assert_eq!(ledger.increment(ConversationId::Peer(1)), 1);
        assert_eq!(ledger.increment(ConversationId::Peer(1)), 2);
        assert_eq!(ledger.get(ConversationId::Peer(1)), 2);
    }

    #[test]
    fn reset_zeroes_exactly_one_conversation() {
        let mut ledger = UnreadLedger::default();
        ledger.increment(ConversationId::Peer(1));
        ledger.increment(ConversationId::Group(2));

        ledger.reset(ConversationId::Peer(1));

        assert_eq!(ledger.get(ConversationId::Peer(1)), 0);
        assert_eq!(ledger.get(ConversationId::Group(2)), 1);
    }

    #[test]
    fn set_overwrites_with_the_snapshot_value() {
        let mut ledger = UnreadLedger::default();
        ledger.increment(ConversationId::Peer(1));

        ledger.set(ConversationId::Peer(1), 7);

        assert_eq!(ledger.get(ConversationId::Peer(1)), 7);
    }
}
