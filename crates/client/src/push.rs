//! Push-notification channel.
//!
//! [`PushChannel`] opens at most one WebSocket per session and feeds the
//! [`ProgressTracker`] from its messages. The channel is advisory only:
//! if the connection fails it logs a warning and the panel keeps working
//! from polling alone. It never decides that a job is complete.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use atelier_core::types::SessionId;

use crate::messages::{parse_message, PushMessage};
use crate::progress::ProgressTracker;

/// One-shot push connection for a session.
#[derive(Debug)]
pub struct PushChannel {
    url: String,
    started: AtomicBool,
    cancel: CancellationToken,
}

impl PushChannel {
    /// * `ws_base` - WebSocket base URL, e.g. `ws://host:8188`.
    pub fn new(ws_base: &str, session: &SessionId) -> Self {
        Self {
            url: format!("{}/ws?clientId={session}", ws_base.trim_end_matches('/')),
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Full handshake URL including the `clientId` query parameter.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect and spawn the message loop.
    ///
    /// Only the first call attempts a connection; later calls return
    /// `false` without touching the network. Connection failures are
    /// logged, never returned.
    pub async fn connect(&self, tracker: Arc<ProgressTracker>) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!(url = %self.url, "Push channel already attempted");
            return false;
        }

        let mut ws_stream = match connect_async(&self.url).await {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                tracing::warn!(
                    url = %self.url,
                    error = %e,
                    "Push channel unavailable, falling back to polling",
                );
                return false;
            }
        };

        tracing::info!(url = %self.url, "Push channel connected");

        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = process_messages(&mut ws_stream, &tracker) => {}
            }
            tracing::info!("Push channel disconnected");
        });
        true
    }

    /// Stop the message loop, if one is running.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Read frames until the stream closes or errors.
///
/// Binary frames (preview images) and control frames are ignored.
pub async fn process_messages<S>(stream: &mut S, tracker: &ProgressTracker)
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => handle_text_message(&text, tracker),
            Ok(Message::Binary(_)) => {
                tracing::trace!("Ignoring binary push frame");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Handled automatically by tungstenite.
            }
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "Push channel closed by server");
                break;
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Push channel receive error");
                break;
            }
        }
    }
}

/// Apply one text frame to the progress tracker.
///
/// Unknown types and malformed payloads are dropped silently.
pub fn handle_text_message(text: &str, tracker: &ProgressTracker) {
    let msg = match parse_message(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring push message");
            return;
        }
    };

    match msg {
        PushMessage::Progress(data) => {
            tracker.report(data.fraction(), data.desc.as_deref().unwrap_or_default());
        }
        PushMessage::Executing(data) => {
            if let Some(node) = data.node {
                if tracker.execution_started() {
                    tracing::debug!(node = %node, "Execution started");
                }
            }
        }
        PushMessage::Executed(_) => {
            tracker.execution_finished();
        }
    }
}
