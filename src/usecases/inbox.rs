use chrono::{DateTime, Utc};

use crate::{
    domain::{
        clock::RealtimeClock,
        conversation::{Conversation, ConversationId},
        dedup::DedupLedger,
        events::{MessageEvent, MessageEventKind},
        navlock::NavigationLock,
        store::ConversationStore,
        unread::UnreadLedger,
    },
    usecases::{
        apply_event::{apply_event, EventOutcome},
        contracts::{BackendCallError, ProfileSource, ReadMarker, SnapshotSource},
        merge_snapshot::merge_snapshot,
    },
};

const SNAPSHOT_FETCH_FAILED: &str = "SNAPSHOT_FETCH_FAILED";
const SNAPSHOT_ROW_SKIPPED: &str = "SNAPSHOT_ROW_SKIPPED";
const MARK_READ_RPC_FAILED: &str = "MARK_READ_RPC_FAILED";
const OPEN_NAVIGATION_LOCKED: &str = "OPEN_NAVIGATION_LOCKED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Merged { conversations: usize },
    /// The fetch failed but the previous list is still valid; never blank
    /// a populated list over one failed refresh.
    KeptLastKnown,
}

/// Surfaced only when the fetch fails while the store is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    Unauthorized,
    TemporarilyUnavailable,
    DataContractViolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened,
    /// A recent activation of the same target is still in flight.
    AlreadyInFlight,
}

/// UI-facing facade over the conversation store, the ledgers, and the two
/// reconcilers. All mutation happens through the event-loop-serialized
/// calls below; there is no locking and no interior mutability.
#[derive(Debug, Default)]
pub struct Inbox {
    current_user: i64,
    store: ConversationStore,
    dedup: DedupLedger,
    unread: UnreadLedger,
    clock: RealtimeClock,
    nav_lock: NavigationLock,
}

impl Inbox {
    pub fn new(current_user: i64) -> Self {
        Self {
            current_user,
            ..Self::default()
        }
    }

    /// Read-only, always-current, recency-sorted list.
    pub fn conversations(&self) -> &[Conversation] {
        self.store.conversations()
    }

    pub fn recent_ids(&self, limit: usize) -> Vec<ConversationId> {
        self.store.recent_ids(limit)
    }

    pub fn unread_count(&self, id: ConversationId) -> u32 {
        self.unread.get(id)
    }

    pub fn set_pinned(&mut self, id: ConversationId, pinned: bool) -> bool {
        let changed = self.store.set_pinned(id, pinned);
        if changed {
            self.store.sort_by_recency();
        }
        changed
    }

    /// Runs a snapshot fetch and merges the result. The injected `now`
    /// doubles as the fetch epoch (the collaborator call starts here, so
    /// any realtime mutation stamped later must not be regressed) and as
    /// the merge time; wall-clock reads stay with the caller.
    pub fn refresh(
        &mut self,
        source: &dyn SnapshotSource,
        now: DateTime<Utc>,
    ) -> Result<RefreshOutcome, RefreshError> {
        let fetch_epoch = now;
        match source.fetch_snapshot(self.current_user) {
            Ok(rows) => {
                let snapshot = self.normalize_rows(rows);
                Ok(self.apply_snapshot(snapshot, fetch_epoch, now))
            }
            Err(error) => {
                tracing::warn!(
                    code = SNAPSHOT_FETCH_FAILED,
                    error = ?error,
                    store_len = self.store.len(),
                    "snapshot fetch failed"
                );
                if self.store.is_empty() {
                    Err(map_backend_error(error))
                } else {
                    Ok(RefreshOutcome::KeptLastKnown)
                }
            }
        }
    }

    /// Merges an already-fetched snapshot. Split out of `refresh` so a
    /// caller that awaited the fetch elsewhere can hand in the epoch the
    /// request actually started at.
    pub fn apply_snapshot(
        &mut self,
        snapshot: Vec<Conversation>,
        fetch_epoch: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RefreshOutcome {
        let conversations = snapshot.len();
        merge_snapshot(
            &mut self.store,
            &mut self.unread,
            &mut self.clock,
            snapshot,
            fetch_epoch,
            now,
        );
        RefreshOutcome::Merged { conversations }
    }

    /// Applies one realtime message event.
    pub fn handle_event(
        &mut self,
        profiles: &dyn ProfileSource,
        kind: MessageEventKind,
        event: &MessageEvent,
        now: DateTime<Utc>,
    ) -> EventOutcome {
        apply_event(
            &mut self.store,
            &mut self.dedup,
            &mut self.unread,
            &mut self.clock,
            profiles,
            self.current_user,
            kind,
            event,
            now,
        )
    }

    /// Zeroes the unread count optimistically, then issues the server-side
    /// reset. The clock stamp keeps an in-flight snapshot from
    /// resurrecting the old count; a failed RPC is logged and left for the
    /// next successful snapshot to reconcile.
    pub fn mark_read(&mut self, marker: &dyn ReadMarker, id: ConversationId, now: DateTime<Utc>) {
        self.unread.reset(id);
        self.clock.stamp(id, now);
        if let Some(conversation) = self.store.get_mut(id) {
            conversation.unread_count = 0;
        }

        if let Err(error) = marker.mark_read(self.current_user, id) {
            tracing::warn!(
                code = MARK_READ_RPC_FAILED,
                conversation = %id,
                error = ?error,
                "mark-read RPC failed; local zero stands"
            );
        }
    }

    /// Entry into a conversation from the list: double-tap guarded, with
    /// the optimistic read applied before any network round trip.
    pub fn open(
        &mut self,
        marker: &dyn ReadMarker,
        id: ConversationId,
        now: DateTime<Utc>,
    ) -> OpenOutcome {
        if !self.nav_lock.try_acquire(id, now) {
            tracing::debug!(
                code = OPEN_NAVIGATION_LOCKED,
                conversation = %id,
                "repeat activation inside the lock window"
            );
            return OpenOutcome::AlreadyInFlight;
        }

        self.mark_read(marker, id, now);
        OpenOutcome::Opened
    }

    fn normalize_rows(
        &self,
        rows: Vec<crate::backend::rows::RawConversationRow>,
    ) -> Vec<Conversation> {
        rows.into_iter()
            .filter_map(|row| {
                let conversation = row.into_conversation();
                if conversation.is_none() {
                    tracing::warn!(
                        code = SNAPSHOT_ROW_SKIPPED,
                        "snapshot row names neither a peer nor a circle"
                    );
                }
                conversation
            })
            .collect()
    }
}

fn map_backend_error(error: BackendCallError) -> RefreshError {
    match error {
        BackendCallError::Unauthorized => RefreshError::Unauthorized,
        BackendCallError::Unavailable | BackendCallError::Unknown => {
            RefreshError::TemporarilyUnavailable
        }
        BackendCallError::InvalidData => RefreshError::DataContractViolation,
    }
}
