use std::collections::{HashSet, VecDeque};

/// High-water mark: crossing it triggers a trim.
const DEDUP_CAPACITY: usize = 100;
/// Size the ledger is trimmed back to, forgetting the oldest ids.
const DEDUP_TRIM_TO: usize = 50;

/// Bounded set of already-processed message ids. A forgotten id can in
/// theory be replayed by the transport; the event reconciler tolerates
/// that because applying the same insert twice converges anyway.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DedupLedger {
    order: VecDeque<i64>,
    seen: HashSet<i64>,
}

impl DedupLedger {
    /// Records a message id. Returns `false` when the id was already
    /// present, in which case the event must be discarded.
    pub fn insert(&mut self, message_id: i64) -> bool {
        if !self.seen.insert(message_id) {
            return false;
        }

        self.order.push_back(message_id);
        if self.order.len() > DEDUP_CAPACITY {
            while self.order.len() > DEDUP_TRIM_TO {
                if let Some(oldest) = self.order.pop_front() {
                    self.seen.remove(&oldest);
                }
            }
        }

        true
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn contains(&self, message_id: i64) -> bool {
        self.seen.contains(&message_id)
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn len(&self) -> usize {
        self.order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_accepts_and_second_rejects() {
        let mut ledger = DedupLedger::default();

        assert!(ledger.insert(42));
        assert!(!ledger.insert(42));
        assert!(ledger.contains(42));
    }

    #[test]
    fn ledger_never_grows_past_its_capacity() {
        let mut ledger = DedupLedger::default();

        for id in 0..1_000 {
            ledger.insert(id);
            assert!(ledger.len() <= DEDUP_CAPACITY);
        }
    }

    #[test]
    fn trim_keeps_the_most_recent_ids_and_forgets_the_oldest() {
        let mut ledger = DedupLedger::default();

        for id in 0..=DEDUP_CAPACITY as i64 {
            ledger.insert(id);
        }

        assert_eq!(ledger.len(), DEDUP_TRIM_TO);
        assert!(ledger.contains(DEDUP_CAPACITY as i64));
        assert!(!ledger.contains(0));
        // A forgotten id is accepted again; idempotent application covers it.
        assert!(ledger.insert(0));
    }
}
