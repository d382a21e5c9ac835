use chrono::{DateTime, Utc};

use crate::{
    domain::{
        clock::RealtimeClock,
        conversation::{Conversation, ConversationId},
        dedup::DedupLedger,
        events::{MessageEvent, MessageEventKind},
        store::ConversationStore,
        unread::UnreadLedger,
    },
    usecases::contracts::ProfileSource,
};

const EVENT_DUPLICATE_DISCARDED: &str = "EVENT_DUPLICATE_DISCARDED";
const EVENT_IRRELEVANT_DISCARDED: &str = "EVENT_IRRELEVANT_DISCARDED";
const EVENT_PEER_LOOKUP_FAILED: &str = "EVENT_PEER_LOOKUP_FAILED";
const EVENT_PEER_UNKNOWN: &str = "EVENT_PEER_UNKNOWN";
const EVENT_STALE_READ_UPDATE: &str = "EVENT_STALE_READ_UPDATE";

/// What the reconciler did with one delivered event. Every branch is a
/// valid end state; nothing here is an error worth surfacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    Duplicate,
    Irrelevant,
    StaleReadUpdate,
    PeerUnresolved,
}

/// Applies a single realtime message event to the store and ledgers.
///
/// Insert events are deduplicated by message id; read-updates are natural
/// in-place writes and need no dedup entry (keying them by the same id
/// would shadow receipts for already-inserted messages). The unread ledger
/// and the realtime clock are mutated before the store view, so a counter
/// is never observable behind the event that produced it.
#[allow(clippy::too_many_arguments)]
pub fn apply_event(
    store: &mut ConversationStore,
    dedup: &mut DedupLedger,
    unread: &mut UnreadLedger,
    clock: &mut RealtimeClock,
    profiles: &dyn ProfileSource,
    current_user: i64,
    kind: MessageEventKind,
    event: &MessageEvent,
    now: DateTime<Utc>,
) -> EventOutcome {
    match kind {
        MessageEventKind::Insert => {
            apply_insert(store, dedup, unread, clock, profiles, current_user, event, now)
        }
        MessageEventKind::ReadUpdate => apply_read_update(store, current_user, event),
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_insert(
    store: &mut ConversationStore,
    dedup: &mut DedupLedger,
    unread: &mut UnreadLedger,
    clock: &mut RealtimeClock,
    profiles: &dyn ProfileSource,
    current_user: i64,
    event: &MessageEvent,
    now: DateTime<Utc>,
) -> EventOutcome {
    if !dedup.insert(event.id) {
        tracing::debug!(
            code = EVENT_DUPLICATE_DISCARDED,
            message_id = event.id,
            "insert event already processed"
        );
        return EventOutcome::Duplicate;
    }

    let Some(conversation_id) = event.conversation_for(current_user) else {
        tracing::debug!(
            code = EVENT_IRRELEVANT_DISCARDED,
            message_id = event.id,
            "insert event names neither side of the current user"
        );
        return EventOutcome::Irrelevant;
    };

    // Circle membership is not derivable from the event itself: a circle
    // message is ours when we sent it or already track the circle. Circles
    // enter the store through snapshots, never through first contact.
    if matches!(conversation_id, ConversationId::Group(_))
        && event.sender_id != current_user
        && !store.contains(conversation_id)
    {
        tracing::debug!(
            code = EVENT_IRRELEVANT_DISCARDED,
            conversation = %conversation_id,
            message_id = event.id,
            "circle event for an untracked circle"
        );
        return EventOutcome::Irrelevant;
    }

    let counts_as_unread = event.sender_id != current_user && !event.is_read;

    if store.contains(conversation_id) {
        // A trimmed dedup entry lets the transport replay an old row past
        // the ledger. An insert that does not advance the latest message
        // is such a replay and must not count or overwrite anything.
        let is_replay = store
            .get(conversation_id)
            .and_then(|c| c.latest_message.as_ref())
            .is_some_and(|latest| latest.id == event.id || latest.created_at >= event.created_at);
        if is_replay {
            tracing::debug!(
                code = EVENT_DUPLICATE_DISCARDED,
                conversation = %conversation_id,
                message_id = event.id,
                "insert does not advance the latest message; discarded as replay"
            );
            return EventOutcome::Duplicate;
        }

        if counts_as_unread {
            let count = unread.increment(conversation_id);
            clock.stamp(conversation_id, now);
            if let Some(conversation) = store.get_mut(conversation_id) {
                conversation.unread_count = count;
            }
        }
        if let Some(conversation) = store.get_mut(conversation_id) {
            conversation.latest_message = Some(event.to_latest());
        }
    } else {
        let ConversationId::Peer(peer_id) = conversation_id else {
            return EventOutcome::Irrelevant;
        };

        let profile = match profiles.lookup_profile(peer_id) {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                tracing::warn!(
                    code = EVENT_PEER_UNKNOWN,
                    peer_id,
                    message_id = event.id,
                    "no profile for first-contact peer; dropping event until next snapshot"
                );
                return EventOutcome::PeerUnresolved;
            }
            Err(error) => {
                tracing::warn!(
                    code = EVENT_PEER_LOOKUP_FAILED,
                    peer_id,
                    message_id = event.id,
                    error = ?error,
                    "profile lookup failed; dropping event until next snapshot"
                );
                return EventOutcome::PeerUnresolved;
            }
        };

        let mut unread_count = 0;
        if counts_as_unread {
            unread_count = unread.increment(conversation_id);
            clock.stamp(conversation_id, now);
        }

        store.upsert(Conversation {
            id: conversation_id,
            title: profile.display_name,
            latest_message: Some(event.to_latest()),
            unread_count,
            pinned: false,
        });
    }

    store.sort_by_recency();
    EventOutcome::Applied
}

fn apply_read_update(
    store: &mut ConversationStore,
    current_user: i64,
    event: &MessageEvent,
) -> EventOutcome {
    let Some(conversation_id) = event.conversation_for(current_user) else {
        return EventOutcome::Irrelevant;
    };

    let Some(conversation) = store.get_mut(conversation_id) else {
        tracing::debug!(
            code = EVENT_STALE_READ_UPDATE,
            conversation = %conversation_id,
            message_id = event.id,
            "read update for an untracked conversation"
        );
        return EventOutcome::StaleReadUpdate;
    };

    // A receipt for anything but the currently shown message would
    // resurrect superseded state; only the latest message is touched. The
    // unread ledger tracks the current user's unread count, not the
    // peer's, so it stays untouched here.
    match conversation.latest_message.as_mut() {
        Some(latest) if latest.id == event.id => {
            latest.is_read = event.is_read;
            EventOutcome::Applied
        }
        _ => {
            tracing::debug!(
                code = EVENT_STALE_READ_UPDATE,
                conversation = %conversation_id,
                message_id = event.id,
                "read update no longer matches the latest message"
            );
            EventOutcome::StaleReadUpdate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::{
        domain::events::MessageTarget,
        usecases::contracts::BackendCallError,
    };

    const ME: i64 = 7;
    const ADA: i64 = 42;

    struct StubProfiles {
        result: Result<Option<crate::domain::conversation::Profile>, BackendCallError>,
    }

    impl StubProfiles {
        fn known(user_id: i64, name: &str) -> Self {
            Self {
                result: Ok(Some(crate::domain::conversation::Profile {
                    user_id,
                    display_name: name.to_owned(),
                })),
            }
        }

        fn missing() -> Self {
            Self { result: Ok(None) }
        }

        fn failing() -> Self {
            Self {
                result: Err(BackendCallError::Unavailable),
            }
        }
    }

    impl ProfileSource for StubProfiles {
        fn lookup_profile(
            &self,
            _user_id: i64,
        ) -> Result<Option<crate::domain::conversation::Profile>, BackendCallError> {
            self.result.clone()
        }
    }

    struct Fixture {
        store: ConversationStore,
        dedup: DedupLedger,
        unread: UnreadLedger,
        clock: RealtimeClock,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: ConversationStore::default(),
                dedup: DedupLedger::default(),
                unread: UnreadLedger::default(),
                clock: RealtimeClock::default(),
            }
        }

        fn apply(
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
                ME,
                kind,
                event,
                now,
            )
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn incoming(id: i64, created_secs: i64) -> MessageEvent {
        MessageEvent {
            id,
            sender_id: ADA,
            target: MessageTarget::User(ME),
            content: "hi".to_owned(),
            created_at: at(created_secs),
            is_read: false,
        }
    }

    #[test]
    fn first_contact_resolves_profile_and_creates_the_conversation() {
        let mut fixture = Fixture::new();
        let profiles = StubProfiles::known(ADA, "Ada");

        let outcome = fixture.apply(&profiles, MessageEventKind::Insert, &incoming(1, 100), at(100));

        assert_eq!(outcome, EventOutcome::Applied);
        let conversation = fixture
            .store
            .get(ConversationId::Peer(ADA))
            .expect("conversation created");
        assert_eq!(conversation.title, "Ada");
        assert_eq!(conversation.unread_count, 1);
        assert_eq!(fixture.unread.get(ConversationId::Peer(ADA)), 1);
        assert!(fixture.clock.stamped_after(ConversationId::Peer(ADA), at(99)));
    }

    #[test]
    fn duplicate_insert_is_discarded_and_counts_once() {
        let mut fixture = Fixture::new();
        let profiles = StubProfiles::known(ADA, "Ada");
        let event = incoming(1, 100);

        fixture.apply(&profiles, MessageEventKind::Insert, &event, at(100));
        let after_first = fixture.store.clone();
        let outcome = fixture.apply(&profiles, MessageEventKind::Insert, &event, at(101));

        assert_eq!(outcome, EventOutcome::Duplicate);
        assert_eq!(fixture.store, after_first);
        assert_eq!(fixture.unread.get(ConversationId::Peer(ADA)), 1);
    }

    #[test]
    fn replayed_insert_after_ledger_trim_does_not_double_count() {
        let mut fixture = Fixture::new();
        let profiles = StubProfiles::known(ADA, "Ada");
        fixture.apply(&profiles, MessageEventKind::Insert, &incoming(1, 100), at(100));
        fixture.apply(&profiles, MessageEventKind::Insert, &incoming(2, 200), at(200));

        // Enough churn to trim the first id out of the dedup ledger.
        for id in 1_000..1_200 {
            fixture.dedup.insert(id);
        }
        assert!(!fixture.dedup.contains(1));

        let outcome = fixture.apply(&profiles, MessageEventKind::Insert, &incoming(1, 100), at(300));

        assert_eq!(outcome, EventOutcome::Duplicate);
        let conversation = fixture.store.get(ConversationId::Peer(ADA)).expect("exists");
        assert_eq!(conversation.unread_count, 2);
        assert_eq!(conversation.latest_message.as_ref().map(|m| m.id), Some(2));
        assert_eq!(fixture.unread.get(ConversationId::Peer(ADA)), 2);
    }

    #[test]
    fn outgoing_message_updates_latest_without_touching_unread() {
        let mut fixture = Fixture::new();
        let profiles = StubProfiles::known(ADA, "Ada");
        fixture.apply(&profiles, MessageEventKind::Insert, &incoming(1, 100), at(100));

        let reply = MessageEvent {
            id: 2,
            sender_id: ME,
            target: MessageTarget::User(ADA),
            content: "hello back".to_owned(),
            created_at: at(200),
            is_read: false,
        };
        let outcome = fixture.apply(&profiles, MessageEventKind::Insert, &reply, at(200));

        assert_eq!(outcome, EventOutcome::Applied);
        let conversation = fixture.store.get(ConversationId::Peer(ADA)).expect("exists");
        assert_eq!(conversation.unread_count, 1);
        assert_eq!(
            conversation.latest_message.as_ref().map(|m| m.id),
            Some(2)
        );
    }

    #[test]
    fn foreign_message_is_irrelevant() {
        let mut fixture = Fixture::new();
        let profiles = StubProfiles::known(ADA, "Ada");
        let foreign = MessageEvent {
            id: 1,
            sender_id: 100,
            target: MessageTarget::User(101),
            content: "not ours".to_owned(),
            created_at: at(100),
            is_read: false,
        };

        let outcome = fixture.apply(&profiles, MessageEventKind::Insert, &foreign, at(100));

        assert_eq!(outcome, EventOutcome::Irrelevant);
        assert!(fixture.store.is_empty());
    }

    #[test]
    fn profile_lookup_failure_drops_the_event() {
        let mut fixture = Fixture::new();
        let profiles = StubProfiles::failing();

        let outcome = fixture.apply(&profiles, MessageEventKind::Insert, &incoming(1, 100), at(100));

        assert_eq!(outcome, EventOutcome::PeerUnresolved);
        assert!(fixture.store.is_empty());
        assert_eq!(fixture.unread.get(ConversationId::Peer(ADA)), 0);
    }

    #[test]
    fn unknown_profile_drops_the_event() {
        let mut fixture = Fixture::new();
        let profiles = StubProfiles::missing();

        let outcome = fixture.apply(&profiles, MessageEventKind::Insert, &incoming(1, 100), at(100));

        assert_eq!(outcome, EventOutcome::PeerUnresolved);
        assert!(fixture.store.is_empty());
    }

    #[test]
    fn circle_event_for_untracked_circle_is_irrelevant() {
        let mut fixture = Fixture::new();
        let profiles = StubProfiles::known(ADA, "Ada");
        let event = MessageEvent {
            id: 1,
            sender_id: ADA,
            target: MessageTarget::Group(9),
            content: "circle talk".to_owned(),
            created_at: at(100),
            is_read: false,
        };

        let outcome = fixture.apply(&profiles, MessageEventKind::Insert, &event, at(100));

        assert_eq!(outcome, EventOutcome::Irrelevant);
    }

    #[test]
    fn circle_event_for_tracked_circle_increments_unread() {
        let mut fixture = Fixture::new();
        fixture.store.upsert(Conversation {
            id: ConversationId::Group(9),
            title: "Hiking".to_owned(),
            latest_message: None,
            unread_count: 0,
            pinned: false,
        });
        let profiles = StubProfiles::known(ADA, "Ada");
        let event = MessageEvent {
            id: 1,
            sender_id: ADA,
            target: MessageTarget::Group(9),
            content: "trail?".to_owned(),
            created_at: at(100),
            is_read: false,
        };

        let outcome = fixture.apply(&profiles, MessageEventKind::Insert, &event, at(100));

        assert_eq!(outcome, EventOutcome::Applied);
        let circle = fixture.store.get(ConversationId::Group(9)).expect("tracked");
        assert_eq!(circle.unread_count, 1);
        assert_eq!(circle.latest_message.as_ref().map(|m| m.id), Some(1));
    }

    #[test]
    fn store_stays_sorted_after_each_insert() {
        let mut fixture = Fixture::new();
        let ada = StubProfiles::known(ADA, "Ada");
        let grace = StubProfiles::known(43, "Grace");

        fixture.apply(&ada, MessageEventKind::Insert, &incoming(1, 200), at(200));
        let older = MessageEvent {
            id: 2,
            sender_id: 43,
            target: MessageTarget::User(ME),
            content: "earlier".to_owned(),
            created_at: at(100),
            is_read: false,
        };
        fixture.apply(&grace, MessageEventKind::Insert, &older, at(201));

        let order: Vec<_> = fixture.store.conversations().iter().map(|c| c.id).collect();
        assert_eq!(
            order,
            vec![ConversationId::Peer(ADA), ConversationId::Peer(43)]
        );
    }

    #[test]
    fn read_update_for_the_latest_message_flips_the_flag_in_place() {
        let mut fixture = Fixture::new();
        let profiles = StubProfiles::known(ADA, "Ada");
        fixture.apply(&profiles, MessageEventKind::Insert, &incoming(1, 100), at(100));

        let mut receipt = incoming(1, 100);
        receipt.is_read = true;
        let outcome = fixture.apply(&profiles, MessageEventKind::ReadUpdate, &receipt, at(105));

        assert_eq!(outcome, EventOutcome::Applied);
        let conversation = fixture.store.get(ConversationId::Peer(ADA)).expect("exists");
        assert!(conversation.latest_message.as_ref().expect("latest").is_read);
        // My unread count is not the peer's read state.
        assert_eq!(conversation.unread_count, 1);
        assert_eq!(fixture.unread.get(ConversationId::Peer(ADA)), 1);
    }

    #[test]
    fn read_update_for_a_superseded_message_is_ignored() {
        let mut fixture = Fixture::new();
        let profiles = StubProfiles::known(ADA, "Ada");
        fixture.apply(&profiles, MessageEventKind::Insert, &incoming(1, 100), at(100));
        fixture.apply(&profiles, MessageEventKind::Insert, &incoming(2, 200), at(200));
        let before = fixture.store.clone();

        let mut stale_receipt = incoming(1, 100);
        stale_receipt.is_read = true;
        let outcome = fixture.apply(&profiles, MessageEventKind::ReadUpdate, &stale_receipt, at(201));

        assert_eq!(outcome, EventOutcome::StaleReadUpdate);
        assert_eq!(fixture.store, before);
    }

    #[test]
    fn read_update_after_insert_of_the_same_id_is_not_treated_as_duplicate() {
        let mut fixture = Fixture::new();
        let profiles = StubProfiles::known(ADA, "Ada");
        fixture.apply(&profiles, MessageEventKind::Insert, &incoming(1, 100), at(100));

        let mut receipt = incoming(1, 100);
        receipt.is_read = true;
        let outcome = fixture.apply(&profiles, MessageEventKind::ReadUpdate, &receipt, at(101));

        assert_eq!(outcome, EventOutcome::Applied);
    }
}
