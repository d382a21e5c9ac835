use std::{sync::mpsc::RecvTimeoutError, time::Duration};

use anyhow::Result;
use chrono::Utc;

use crate::{
    backend::{
        self,
        stream::{MessageStreamMonitor, RealtimeEnvelope},
        stubs::InMemoryBackend,
    },
    cli::{Cli, Command},
    domain::{self, conversation::ConversationId, events::MessageEventKind},
    infra,
    usecases::{
        self, bootstrap,
        context::AppContext,
        inbox::Inbox,
        typing::{TypingTracker, TYPING_WATCH_LIMIT},
    },
};

const SESSION_INITIAL_REFRESH_FAILED: &str = "SESSION_INITIAL_REFRESH_FAILED";
const SESSION_IDLE_REFRESH_FAILED: &str = "SESSION_IDLE_REFRESH_FAILED";
const SESSION_MALFORMED_ROW: &str = "SESSION_MALFORMED_ROW";

pub fn run(cli: Cli) -> Result<()> {
    let context = bootstrap::bootstrap(cli.config.as_deref())?;

    tracing::debug!(
        domain = domain::module_name(),
        backend = backend::module_name(),
        usecases = usecases::module_name(),
        infra = infra::module_name(),
        "module boundaries loaded"
    );

    match cli.command_or_default() {
        Command::Run => run_session(&context),
    }
}

/// Drives one full reconciliation session against the scripted backend:
/// initial snapshot, a replayed realtime feed (including a duplicate
/// delivery and a stale receipt, so the logs show the reconciler's
/// decisions), idle refreshes, and a final snapshot before shutdown.
fn run_session(context: &AppContext) -> Result<()> {
    let user_id = context.config.session.user_id;
    let backend = InMemoryBackend::with_demo_fixtures(user_id);
    let mut inbox = Inbox::new(user_id);
    let mut typing = TypingTracker::new();

    match inbox.refresh(&backend, Utc::now()) {
        Ok(outcome) => tracing::info!(outcome = ?outcome, "initial snapshot merged"),
        Err(error) => tracing::error!(
            code = SESSION_INITIAL_REFRESH_FAILED,
            error = ?error,
            "initial snapshot fetch failed with an empty list"
        ),
    }
    // The pinned flag comes from the user's settings, not from snapshots.
    inbox.set_pinned(ConversationId::Group(900), true);
    typing.sync_subscriptions(&backend, &inbox.recent_ids(TYPING_WATCH_LIMIT));
    if let Some(id) = inbox.recent_ids(1).first().copied() {
        typing.on_presence_sync(id, true);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let (feed_tx, feed_rx) = tokio::sync::mpsc::channel(16);
    let (update_tx, update_rx) = std::sync::mpsc::channel();
    let _monitor = MessageStreamMonitor::start(&runtime, feed_rx, update_tx);
    runtime.spawn(feed_demo_script(feed_tx, user_id));

    let idle_refresh = Duration::from_millis(context.config.sync.refresh_interval_ms);
    loop {
        match update_rx.recv_timeout(idle_refresh) {
            Ok(envelope) => {
                let kind = envelope.kind;
                let message_id = envelope.row.id;
                match envelope.row.into_event() {
                    Some(event) => {
                        let outcome = inbox.handle_event(&backend, kind, &event, Utc::now());
                        tracing::info!(
                            message_id,
                            kind = ?kind,
                            outcome = ?outcome,
                            "realtime event reconciled"
                        );
                        typing.sync_subscriptions(&backend, &inbox.recent_ids(TYPING_WATCH_LIMIT));
                    }
                    None => tracing::warn!(
                        code = SESSION_MALFORMED_ROW,
                        message_id,
                        "realtime row names neither a receiver nor a group"
                    ),
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Err(error) = inbox.refresh(&backend, Utc::now()) {
                    tracing::warn!(
                        code = SESSION_IDLE_REFRESH_FAILED,
                        error = ?error,
                        "idle refresh failed"
                    );
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // The user taps the most recent conversation, with the accidental
    // second tap a touchscreen likes to deliver.
    if let Some(id) = inbox.recent_ids(1).first().copied() {
        let tapped_at = Utc::now();
        let first = inbox.open(&backend, id, tapped_at);
        let second = inbox.open(&backend, id, tapped_at);
        tracing::info!(
            conversation = %id,
            first = ?first,
            second = ?second,
            "opened conversation"
        );
    }

    if let Ok(outcome) = inbox.refresh(&backend, Utc::now()) {
        tracing::info!(outcome = ?outcome, "final snapshot merged");
    }

    for conversation in inbox.conversations() {
        tracing::info!(
            conversation = %conversation.id,
            title = %conversation.title,
            unread = conversation.unread_count,
            ledger_unread = inbox.unread_count(conversation.id),
            pinned = conversation.pinned,
            typing = typing.is_typing(conversation.id),
            "conversation"
        );
    }

    typing.shutdown();
    Ok(())
}

async fn feed_demo_script(
    feed_tx: tokio::sync::mpsc::Sender<RealtimeEnvelope>,
    user_id: i64,
) {
    for envelope in demo_envelopes(user_id) {
        if feed_tx.send(envelope).await.is_err() {
            return;
        }
    }
}

/// A replayed slice of realtime traffic: a direct insert delivered twice,
/// a first-contact insert, a receipt for a superseded message, a receipt
/// for the current latest, and a circle post.
fn demo_envelopes(user_id: i64) -> Vec<RealtimeEnvelope> {
    let ada = user_id + 1;
    let lin = user_id + 3;

    let scripted = [
        (
            MessageEventKind::Insert,
            format!(
                r#"{{"id": 21, "sender_id": {ada}, "receiver_id": {user_id},
                     "content": "see you at noon", "created_at": "2024-05-01T09:05:00Z"}}"#
            ),
        ),
        (
            MessageEventKind::Insert,
            format!(
                r#"{{"id": 21, "sender_id": {ada}, "receiver_id": {user_id},
                     "content": "see you at noon", "created_at": "2024-05-01T09:05:00Z"}}"#
            ),
        ),
        (
            MessageEventKind::Insert,
            format!(
                r#"{{"id": 22, "sender_id": {lin}, "receiver_id": {user_id},
                     "content": "hey, joined the hiking circle", "created_at": "2024-05-01T09:06:00Z"}}"#
            ),
        ),
        (
            MessageEventKind::ReadUpdate,
            format!(
                r#"{{"id": 11, "sender_id": {ada}, "receiver_id": {user_id},
                     "content": "lunch tomorrow?", "created_at": "2024-05-01T09:00:00Z",
                     "is_read": true}}"#
            ),
        ),
        (
            MessageEventKind::ReadUpdate,
            format!(
                r#"{{"id": 21, "sender_id": {ada}, "receiver_id": {user_id},
                     "content": "see you at noon", "created_at": "2024-05-01T09:05:00Z",
                     "is_read": true}}"#
            ),
        ),
        (
            MessageEventKind::Insert,
            format!(
                r#"{{"id": 23, "sender_id": {ada}, "group_id": 900,
                     "content": "who is in for saturday?", "created_at": "2024-05-01T09:07:00Z"}}"#
            ),
        ),
    ];

    scripted
        .into_iter()
        .filter_map(|(kind, json)| {
            serde_json::from_str(&json)
                .ok()
                .map(|row| RealtimeEnvelope { kind, row })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_script_covers_duplicate_and_stale_deliveries() {
        let envelopes = demo_envelopes(1);

        assert_eq!(envelopes.len(), 6);
        assert_eq!(envelopes[0].row.id, envelopes[1].row.id, "duplicate delivery");
        assert!(matches!(envelopes[3].kind, MessageEventKind::ReadUpdate));
    }

    #[test]
    fn session_runs_to_completion_on_default_config() {
        let context = AppContext::new(crate::infra::config::AppConfig::default());

        run_session(&context).expect("demo session should complete");
    }
}
