//! Websocket session gateway
//!
//! One session per connection. The read loop accepts run requests and starts
//! each run on its own task; a single writer task pushes the session's
//! events to the client in emission order. Closing the connection cancels
//! every run the session started.

use crate::{
    core::{RunEvent, RunRequest, Severity},
    execution::{ChannelSink, EventSink},
    repo::RepositoryOps,
    server::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// A message received from the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Start a run
    Run(RunRequest),
    /// Cancel every run of this session (`{"type": "stop"}`)
    Stop,
}

/// Parse a text frame from the client
pub fn parse_client_message(text: &str) -> Result<ClientMessage, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    if value.get("type").and_then(Value::as_str) == Some("stop") {
        return Ok(ClientMessage::Stop);
    }
    serde_json::from_value(value).map(ClientMessage::Run)
}

/// `GET /ws`
pub async fn ws_handler<R>(
    State(state): State<Arc<AppState<R>>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse
where
    R: RepositoryOps + 'static,
{
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket<R>(socket: WebSocket, state: Arc<AppState<R>>)
where
    R: RepositoryOps + 'static,
{
    let session_id = Uuid::new_v4();
    let span = info_span!("session", %session_id);

    async move {
        info!("WebSocket client connected");

        let (sender, mut receiver) = socket.split();
        let (sink, events) = ChannelSink::channel();
        let sink: Arc<dyn EventSink> = Arc::new(sink);

        let write_timeout = Duration::from_secs(state.orchestrator.config().server.write_timeout);
        tokio::spawn(write_events(sender, events, write_timeout).in_current_span());

        sink.log("WebSocket connection established", Severity::Info);

        let session_cancel = CancellationToken::new();
        let mut runs_cancel = session_cancel.child_token();

        while let Some(frame) = receiver.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    warn!("WebSocket read error: {}", e);
                    break;
                }
            };

            match parse_client_message(&text) {
                Ok(ClientMessage::Run(request)) => {
                    info!(repo = %request.git_config, branch = %request.branch, "Run requested");
                    state
                        .orchestrator
                        .spawn(request, sink.clone(), runs_cancel.child_token());
                }
                Ok(ClientMessage::Stop) => {
                    info!("Stop requested");
                    runs_cancel.cancel();
                    runs_cancel = session_cancel.child_token();
                }
                Err(e) => {
                    warn!("Invalid client message: {}", e);
                    sink.log(&format!("Invalid request: {}", e), Severity::Error);
                }
            }
        }

        info!("WebSocket client disconnected");
        session_cancel.cancel();
    }
    .instrument(span)
    .await
}

/// Push events to the client until every sink for this session is gone
async fn write_events<S>(
    mut sender: S,
    mut events: mpsc::UnboundedReceiver<RunEvent>,
    write_timeout: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(event) = events.recv().await {
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode event: {}", e);
                continue;
            }
        };

        match tokio::time::timeout(write_timeout, sender.send(Message::Text(payload))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("WebSocket write error: {}", e),
            Err(_) => warn!("WebSocket write timed out after {:?}", write_timeout),
        }
    }

    debug!("Event stream closed");
    let _ = sender.close().await;
}
