use std::sync::mpsc::Sender;

use tokio::{
    runtime::Runtime,
    sync::{mpsc, watch},
};

use crate::{backend::rows::RawMessageRow, domain::events::MessageEventKind};

const MESSAGE_STREAM_STARTED: &str = "MESSAGE_STREAM_STARTED";
const MESSAGE_STREAM_STOPPED: &str = "MESSAGE_STREAM_STOPPED";
const MESSAGE_STREAM_FEED_CLOSED: &str = "MESSAGE_STREAM_FEED_CLOSED";
const MESSAGE_STREAM_FORWARD_FAILED: &str = "MESSAGE_STREAM_FORWARD_FAILED";

/// One delivery from the realtime transport: the raw row plus whether it
/// was an insert or an in-place update.
#[derive(Debug, Clone)]
pub struct RealtimeEnvelope {
    pub kind: MessageEventKind,
    pub row: RawMessageRow,
}

/// Bridges the transport's async event feed into the app's serialized
/// event loop. Dropping the monitor signals the task to stop, so the
/// subscription is torn down deterministically with its owner; reconnect
/// and backoff stay the transport's problem.
#[derive(Debug)]
pub struct MessageStreamMonitor {
    stop_tx: Option<watch::Sender<bool>>,
}

impl MessageStreamMonitor {
    pub fn start(
        runtime: &Runtime,
        feed: mpsc::Receiver<RealtimeEnvelope>,
        update_tx: Sender<RealtimeEnvelope>,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        runtime.spawn(run_monitor(feed, update_tx, stop_rx));

        tracing::info!(code = MESSAGE_STREAM_STARTED, "message stream monitor started");

        Self {
            stop_tx: Some(stop_tx),
        }
    }

    #[cfg(test)]
    pub fn inert() -> Self {
        Self { stop_tx: None }
    }
}

impl Drop for MessageStreamMonitor {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
    }
}

async fn run_monitor(
    mut feed: mpsc::Receiver<RealtimeEnvelope>,
    update_tx: Sender<RealtimeEnvelope>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    tracing::info!(code = MESSAGE_STREAM_STOPPED, "message stream monitor stopped");
                    return;
                }
            }
            delivery = feed.recv() => {
                match delivery {
                    Some(envelope) => {
                        tracing::debug!(
                            message_id = envelope.row.id,
                            "realtime delivery observed by stream monitor"
                        );

                        if let Err(error) = update_tx.send(envelope) {
                            tracing::warn!(
                                code = MESSAGE_STREAM_FORWARD_FAILED,
                                error = %error,
                                "stream monitor failed to forward delivery; receiver gone"
                            );
                            return;
                        }
                    }
                    None => {
                        tracing::info!(
                            code = MESSAGE_STREAM_FEED_CLOSED,
                            "realtime feed closed by the transport"
                        );
                        return;
                    }
                }
            }
        }
    }
}
