use chrono::{DateTime, Utc};

use crate::domain::{
    clock::RealtimeClock, conversation::Conversation, store::ConversationStore,
    unread::UnreadLedger,
};

const SNAPSHOT_UNREAD_OVERRIDDEN: &str = "SNAPSHOT_UNREAD_OVERRIDDEN";

/// Merges a freshly fetched snapshot into the store.
///
/// `fetch_epoch` is the wall-clock time the fetch *started*. A realtime
/// mutation stamped after that instant reflects state the backend query
/// cannot have captured, so the unread ledger wins for that conversation;
/// otherwise the snapshot value reconciles the ledger. Comparing against
/// the start rather than the completion time deliberately over-prefers the
/// ledger: a just-arrived unread increment is never regressed, at the cost
/// of occasionally keeping a ledger value the snapshot already knew.
///
/// Everything else is a full replace (pinned flags survive, they come from
/// the settings collaborator), followed by a recency re-sort and a lazy
/// purge of stale clock entries.
pub fn merge_snapshot(
    store: &mut ConversationStore,
    unread: &mut UnreadLedger,
    clock: &mut RealtimeClock,
    mut snapshot: Vec<Conversation>,
    fetch_epoch: DateTime<Utc>,
    now: DateTime<Utc>,
) {
    for conversation in &mut snapshot {
        if clock.stamped_after(conversation.id, fetch_epoch) {
            let ledger_count = unread.get(conversation.id);
            tracing::debug!(
                code = SNAPSHOT_UNREAD_OVERRIDDEN,
                conversation = %conversation.id,
                snapshot_count = conversation.unread_count,
                ledger_count,
                "realtime channel outran the fetch; keeping the ledger count"
            );
            conversation.unread_count = ledger_count;
        } else {
            unread.set(conversation.id, conversation.unread_count);
        }
    }

    clock.purge_stale(now);
    store.replace_all(snapshot);
}
