use std::sync::{Arc, Mutex};

use crate::{
    backend::rows::{JoinedProfile, RawConversationRow},
    domain::conversation::{ConversationId, Profile},
    usecases::contracts::{
        BackendCallError, PresenceChannel, PresenceSubscription, ProfileSource, ReadMarker,
        SnapshotSource,
    },
};

/// Scripted in-memory stand-in for the hosted backend. Implements every
/// collaborator contract behind one mutex so the demo runner and the
/// usecase tests can share it. Failure toggles simulate outages; calls are
/// recorded for assertions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    snapshot_rows: Vec<RawConversationRow>,
    profiles: Vec<Profile>,
    fail_snapshot: bool,
    fail_profile_lookup: bool,
    mark_read_calls: Vec<(i64, ConversationId)>,
    active_presence: usize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixture set used by `ripple-sync run`: two direct conversations
    /// and one circle for the given user.
    pub fn with_demo_fixtures(user_id: i64) -> Self {
        let backend = Self::new();
        backend.put_profile(Profile {
            user_id: user_id + 1,
            display_name: "Ada".to_owned(),
        });
        backend.put_profile(Profile {
            user_id: user_id + 2,
            display_name: "Grace".to_owned(),
        });
        // Lin is not in the snapshot yet; the first realtime message from
        // them exercises the first-contact lookup path.
        backend.put_profile(Profile {
            user_id: user_id + 3,
            display_name: "Lin".to_owned(),
        });
        backend.set_snapshot_json(&format!(
            r#"[
                {{"peer": {{"id": {ada}, "nickname": "Ada"}},
                  "latest_message": {{"id": 11, "sender_id": {ada}, "receiver_id": {user_id},
                                      "content": "lunch tomorrow?",
                                      "created_at": "2024-05-01T09:00:00Z"}},
                  "unread_count": 2}},
                {{"peer": [{{"id": {grace}, "nickname": "Grace"}}],
                  "latest_message": {{"id": 12, "sender_id": {user_id}, "receiver_id": {grace},
                                      "content": "sent you the notes",
                                      "created_at": "2024-05-01T08:30:00Z", "is_read": true}},
                  "unread_count": 0}},
                {{"group_id": 900, "group_name": "Morning Hikers",
                  "latest_message": {{"id": 13, "sender_id": {ada}, "group_id": 900,
                                      "content": "trailhead at 7",
                                      "created_at": "2024-05-01T07:45:00Z"}},
                  "unread_count": 1}}
            ]"#,
            ada = user_id + 1,
            grace = user_id + 2,
        ));
        backend
    }

    pub fn put_profile(&self, profile: Profile) {
        let mut inner = self.lock();
        inner.profiles.retain(|p| p.user_id != profile.user_id);
        inner.profiles.push(profile);
    }

    pub fn set_snapshot_rows(&self, rows: Vec<RawConversationRow>) {
        self.lock().snapshot_rows = rows;
    }

    /// Convenience for scripting snapshots the way the backend would
    /// serialize them.
    pub fn set_snapshot_json(&self, json: &str) {
        let rows: Vec<RawConversationRow> =
            serde_json::from_str(json).unwrap_or_else(|error| {
                panic!("stub snapshot fixture must decode: {error}");
            });
        self.set_snapshot_rows(rows);
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn set_fail_snapshot(&self, fail: bool) {
        self.lock().fail_snapshot = fail;
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn set_fail_profile_lookup(&self, fail: bool) {
        self.lock().fail_profile_lookup = fail;
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn mark_read_calls(&self) -> Vec<(i64, ConversationId)> {
        self.lock().mark_read_calls.clone()
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn active_presence(&self) -> usize {
        self.lock().active_presence
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotSource for InMemoryBackend {
    fn fetch_snapshot(&self, _user_id: i64) -> Result<Vec<RawConversationRow>, BackendCallError> {
        let inner = self.lock();
        if inner.fail_snapshot {
            return Err(BackendCallError::Unavailable);
        }
        Ok(inner.snapshot_rows.clone())
    }
}

impl ProfileSource for InMemoryBackend {
    fn lookup_profile(&self, user_id: i64) -> Result<Option<Profile>, BackendCallError> {
        let inner = self.lock();
        if inner.fail_profile_lookup {
            return Err(BackendCallError::Unavailable);
        }
        Ok(inner.profiles.iter().find(|p| p.user_id == user_id).cloned())
    }
}

impl ReadMarker for InMemoryBackend {
    fn mark_read(
        &self,
        user_id: i64,
        conversation: ConversationId,
    ) -> Result<(), BackendCallError> {
        let mut inner = self.lock();
        inner.mark_read_calls.push((user_id, conversation));
        // Mirror the server-side reset so later snapshots agree.
        for row in &mut inner.snapshot_rows {
            if row_conversation_id(row) == Some(conversation) {
                row.unread_count = 0;
            }
        }
        Ok(())
    }
}

fn row_conversation_id(row: &RawConversationRow) -> Option<ConversationId> {
    if let Some(group_id) = row.group_id {
        return Some(ConversationId::Group(group_id));
    }
    row.peer
        .clone()
        .and_then(JoinedProfile::normalize)
        .map(|profile| ConversationId::Peer(profile.id))
}

struct StubPresenceSubscription {
    inner: Arc<Mutex<Inner>>,
}

impl PresenceSubscription for StubPresenceSubscription {}

impl Drop for StubPresenceSubscription {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.active_presence = inner.active_presence.saturating_sub(1);
        }
    }
}

impl PresenceChannel for InMemoryBackend {
    fn subscribe(
        &self,
        _conversation: ConversationId,
    ) -> Result<Box<dyn PresenceSubscription>, BackendCallError> {
        self.lock().active_presence += 1;
        Ok(Box::new(StubPresenceSubscription {
            inner: Arc::clone(&self.inner),
        }))
    }
}
