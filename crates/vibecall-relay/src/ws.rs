//! WebSocket endpoint speaking the signaling protocol.
//!
//! Each connection gets two halves: a pump task forwarding hub events out
//! to the socket, and the receive loop below dispatching client events
//! into the hub. Handler errors never close the connection; malformed
//! frames are logged and ignored.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::hub::events::{ClientEvent, ServerEvent};
use crate::server::AppState;

/// `GET /ws` — upgrade to the signaling protocol.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let connection_id = uuid::Uuid::new_v4().to_string();
    let (tx, mut rx) = crate::hub::SignalingHub::outbound_channel();

    // Pump hub events out to the socket until either side goes away.
    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize outbound event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut joined_user: Option<String> = None;

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let event: ClientEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(
                            connection_id = %connection_id,
                            error = %e,
                            "Ignoring malformed signaling event"
                        );
                        continue;
                    }
                };
                dispatch(&state, &connection_id, &tx, &mut joined_user, event).await;
            }
            Message::Close(_) => break,
            _ => {} // Binary and ping/pong are handled by the protocol layer
        }
    }

    if let Some(user_id) = &joined_user {
        state.hub.disconnect(user_id, &connection_id).await;
    }
    sender_task.abort();
}

async fn dispatch(
    state: &AppState,
    connection_id: &str,
    tx: &mpsc::Sender<ServerEvent>,
    joined_user: &mut Option<String>,
    event: ClientEvent,
) {
    match event {
        ClientEvent::Join { user_id } => {
            state.hub.join(&user_id, connection_id, tx.clone()).await;
            *joined_user = Some(user_id);
        }
        ClientEvent::Signal(message) => {
            state.hub.signal(message).await;
        }
        ClientEvent::RecordingConsent {
            call_id,
            user_id,
            consented,
        } => {
            state.hub.recording_consent(&call_id, &user_id, consented).await;
        }
        ClientEvent::RecordingStatus {
            call_id,
            user_id,
            is_recording,
        } => {
            state.hub.recording_status(&call_id, &user_id, is_recording).await;
        }
        ClientEvent::LeaveCall { call_id } => {
            if let Some(user_id) = joined_user.as_deref() {
                state.hub.leave_call(&call_id, user_id).await;
            } else {
                debug!(connection_id = %connection_id, "leave-call before join ignored");
            }
        }
    }
}
