//! WebSocket handler for the relay endpoint.
//!
//! The `/ws/chat` endpoint upgrades an HTTP connection to a WebSocket. Both
//! visitors and operators connect here; the role is declared in-band with an
//! `identify` command. Once connected, the handler:
//!
//! - **Forwards events:** Drains the connection's outbound queue (filled by
//!   the relay) and pushes every [`RelayEvent`] to the client as a JSON text
//!   frame.
//! - **Receives commands:** Parses incoming text frames as [`ClientCommand`]
//!   and dispatches them to the relay.
//!
//! Every dispatch result is logged and swallowed: a failing event is
//! abandoned without tearing down this loop or touching other connections.
//! The relay learns about a disconnect only when this loop ends.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use relaydesk_core::relay::ConnectionHandle;
use relaydesk_types::event::{ClientCommand, RelayEvent};
use relaydesk_types::identity::ConnectionId;

use crate::state::AppState;

/// Upgrade an HTTP request to a WebSocket connection for relay traffic.
///
/// This is mounted at `/ws/chat` in the router.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Core WebSocket connection handler.
///
/// Uses `tokio::select!` to multiplex between the relay's outbound queue and
/// incoming WebSocket messages. Keeping both directions in one task means the
/// task's end is the single, unambiguous disconnect signal.
async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let conn_id = ConnectionId::new();
    let (tx, mut event_rx) = mpsc::channel::<RelayEvent>(state.config.queue_capacity());
    let handle = ConnectionHandle::new(conn_id, tx);

    state.relay.connect(&handle).await;

    loop {
        tokio::select! {
            // --- Branch 1: Forward queued relay events to the client ---
            event = event_rx.recv() => {
                match event {
                    Some(event) => {
                        match serde_json::to_string(&event) {
                            Ok(json) => {
                                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                                    // Client disconnected
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::warn!("Failed to serialize RelayEvent: {err}");
                            }
                        }
                    }
                    None => break,
                }
            }

            // --- Branch 2: Process commands from the client ---
            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        process_command(&text, &handle, &state).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        // Client disconnected
                        break;
                    }
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    // Ignore binary, ping, pong protocol frames (handled by axum/tungstenite)
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Passive disconnect detection: the loop ending is the close callback.
    state.relay.disconnect(conn_id).await;
    tracing::debug!(connection = %conn_id, "WebSocket connection closed");
}

/// Parse and dispatch a single command from the WebSocket client.
///
/// This is the per-event error boundary: malformed frames are ignored with a
/// warning, and a relay error is logged and dropped.
async fn process_command(text: &str, handle: &ConnectionHandle, state: &AppState) {
    let cmd: ClientCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(err) => {
            tracing::warn!(
                raw = %text,
                error = %err,
                "Ignoring malformed WebSocket command"
            );
            return;
        }
    };

    let result = match cmd {
        ClientCommand::Identify { role, name } => {
            state.relay.identify(handle.clone(), role, name).await
        }
        ClientCommand::VisitorMessage { text, email } => {
            state.relay.visitor_message(handle.id(), text, email).await
        }
        ClientCommand::OperatorReply { identity, text } => {
            state.relay.operator_reply(&identity, text).await
        }
        ClientCommand::OperatorFile {
            identity,
            file_name,
            file_base64,
        } => {
            state
                .relay
                .operator_file(handle, &identity, file_name, file_base64)
                .await
        }
        ClientCommand::OperatorClose { identity } => state.relay.close_session(&identity).await,
        ClientCommand::Ping => {
            handle.send(RelayEvent::Pong);
            Ok(())
        }
    };

    if let Err(err) = result {
        tracing::warn!(
            connection = %handle.id(),
            error = %err,
            "Abandoning failed relay event"
        );
    }
}
