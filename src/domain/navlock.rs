use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use super::conversation::ConversationId;

/// How long a target stays locked after an activation.
const LOCK_WINDOW_MS: i64 = 500;

/// Id-keyed guard against double navigation: a second tap on the same
/// conversation inside the window is rejected. Expired entries are purged
/// lazily on every acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NavigationLock {
    in_flight: HashMap<ConversationId, DateTime<Utc>>,
}

impl NavigationLock {
    /// Returns `true` when the caller may proceed; `false` when the target
    /// is still locked by a recent activation.
    pub fn try_acquire(&mut self, id: ConversationId, now: DateTime<Utc>) -> bool {
        let window = Duration::milliseconds(LOCK_WINDOW_MS);
        self.in_flight.retain(|_, locked_at| now - *locked_at < window);

        if self.in_flight.contains_key(&id) {
            return false;
        }

        self.in_flight.insert(id, now);
        true
    }
}
