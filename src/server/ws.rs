//! WebSocket session boundary
//!
//! One socket per viewer: outbound events (acks, audio chunks, errors) are
//! forwarded from the session's event channel; inbound messages are parsed as
//! control commands and dispatched to the broadcast hub. Registration is
//! dropped when the socket closes, whichever side closes it.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::hub::SessionId;
use crate::protocol::{ClientCommand, ServerEvent};
use crate::server::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

async fn handle_session(socket: WebSocket, state: Arc<AppState>) {
    let session_id = SessionId::new();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    state.hub.register_session(session_id, event_tx);
    tracing::info!("client connected: {}", session_id);

    state.hub.send_to(session_id, ServerEvent::connection_ack());

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let Ok(text) = serde_json::to_string(&event) else { continue };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_command(&state, session_id, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.unregister_session(session_id);
    tracing::info!("client disconnected: {}", session_id);
}

async fn dispatch_command(state: &Arc<AppState>, session_id: SessionId, text: &str) {
    let command = match serde_json::from_str::<ClientCommand>(text) {
        Ok(command) => command,
        Err(_) => {
            tracing::debug!("ignoring unrecognized message from {}", session_id);
            return;
        }
    };

    // Starting may wait briefly for a draining worker, so keep it off the
    // async worker threads.
    let hub = state.hub.clone();
    let _ = tokio::task::spawn_blocking(move || match command {
        ClientCommand::StartAudio => hub.start_audio(session_id),
        ClientCommand::StopAudio => hub.stop_audio(session_id),
    })
    .await;
}
