use std::collections::HashMap;

use crate::{
    domain::conversation::ConversationId,
    usecases::contracts::{PresenceChannel, PresenceSubscription},
};

/// How many of the most recent conversations carry a live typing
/// subscription at any time.
pub const TYPING_WATCH_LIMIT: usize = 5;

const PRESENCE_SUBSCRIBE_FAILED: &str = "PRESENCE_SUBSCRIBE_FAILED";

/// Maintains exactly one presence subscription per conversation in the
/// current top-N by recency. The tracker owns and indexes its handles
/// itself; it never asks the channel what is subscribed. Dropping a handle
/// is the teardown, so recomputation and shutdown can never leave an
/// orphan behind.
#[derive(Default)]
pub struct TypingTracker {
    subscriptions: HashMap<ConversationId, Box<dyn PresenceSubscription>>,
    typing: HashMap<ConversationId, bool>,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the subscription set against the current recency order.
    /// Conversations that fell out of the top-N are unsubscribed and their
    /// typing flag forgotten; newcomers are subscribed. A failed subscribe
    /// degrades to no indicator for that conversation.
    pub fn sync_subscriptions(&mut self, channel: &dyn PresenceChannel, recent: &[ConversationId]) {
        let watched: Vec<ConversationId> =
            recent.iter().copied().take(TYPING_WATCH_LIMIT).collect();

        self.subscriptions.retain(|id, _| watched.contains(id));
        self.typing.retain(|id, _| watched.contains(id));

        for id in watched {
            if self.subscriptions.contains_key(&id) {
                continue;
            }
            match channel.subscribe(id) {
                Ok(subscription) => {
                    self.subscriptions.insert(id, subscription);
                }
                Err(error) => {
                    tracing::warn!(
                        code = PRESENCE_SUBSCRIBE_FAILED,
                        conversation = %id,
                        error = ?error,
                        "presence subscribe failed; no typing indicator for this conversation"
                    );
                }
            }
        }
    }

    /// Records an ephemeral typing signal. Signals for conversations the
    /// tracker is not currently watching are dropped.
    pub fn on_presence_sync(&mut self, id: ConversationId, is_typing: bool) {
        if self.subscriptions.contains_key(&id) {
            self.typing.insert(id, is_typing);
        }
    }

    pub fn is_typing(&self, id: ConversationId) -> bool {
        self.typing.get(&id).copied().unwrap_or(false)
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn watched_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Tears down every subscription, e.g. when the owning screen goes
    /// away or the device user changes.
    pub fn shutdown(&mut self) {
        self.subscriptions.clear();
        self.typing.clear();
    }
}
