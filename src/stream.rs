use std::sync::Arc;

use axum::{
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use tracing::{debug, warn};

use crate::{
    echo::{EchoSocket, MemorySubscriberRegistry},
    http::{AppState, ConversationPath},
};

/// Upgrades the request into the conversation's live echo stream. The
/// socket only ever receives pushes; inbound frames other than close are
/// ignored.
pub async fn conversation_stream(
    State(state): State<AppState>,
    Path(path): Path<ConversationPath>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_stream(socket, state.subscribers, path.id))
}

async fn run_stream(
    mut socket: WebSocket,
    registry: Arc<MemorySubscriberRegistry>,
    conversation_id: String,
) {
    let (sender, mut payloads) = EchoSocket::channel();
    registry.register(conversation_id.clone(), sender.clone()).await;
    debug!(conversation_id, "echo subscriber attached");

    loop {
        tokio::select! {
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        warn!(conversation_id, error = %err, "websocket recv error");
                        break;
                    }
                }
            }
            payload = payloads.recv() => {
                match payload {
                    Some(payload) => {
                        if let Err(err) = socket.send(Message::Text(payload.into())).await {
                            warn!(conversation_id, error = %err, "websocket send error");
                            break;
                        }
                    }
                    // Sender dropped: a newer subscriber replaced this one.
                    None => break,
                }
            }
        }
    }

    registry.unregister_if(&conversation_id, &sender).await;
    debug!(conversation_id, "echo subscriber detached");
}
