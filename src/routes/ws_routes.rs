use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::models::{ClientEvent, ServerEvent, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    token: String,
}

/// GET `/ws` — authenticated WebSocket upgrade. The bearer credential rides
/// the query string; a connection that fails verification is rejected here,
/// before the upgrade completes.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsAuthQuery>,
    State(state): State<AppState>,
) -> Response {
    let user = match authenticate(&state, &query.token).await {
        Ok(user) => user,
        Err(err) => {
            warn!("Rejected socket handshake: {err}");
            return err.into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

async fn authenticate(state: &AppState, token: &str) -> Result<User, AppError> {
    let user_id = state.auth.verify(token)?;
    state
        .users
        .find_by_id(&user_id)
        .await?
        .ok_or(AppError::Unauthenticated)
}

/// One connection's event loop.
///
/// Incoming frames are `type`-tagged JSON (`join_chat`, `send_message`,
/// `typing`); outgoing events arrive through the session's registry channel
/// and are forwarded by a dedicated writer task. Errors on individual events
/// are logged and the loop continues; only disconnection ends it.
async fn handle_socket(socket: WebSocket, state: AppState, user: User) {
    info!("User connected: {}", user.id);
    let (session_id, mut events) = state.registry.connect(&user.id);

    let (mut sink, mut stream) = socket.split();

    // Writer half: registry channel → socket.
    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Ok(json) = serde_json::to_string(&event) else { continue };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(f) => f,
            Err(e) => {
                warn!("Socket receive error for {}: {e}", user.id);
                break;
            }
        };

        let text = match &frame {
            Message::Text(t) => t.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };

        let event: ClientEvent = match serde_json::from_str(&text) {
            Ok(ev) => ev,
            Err(e) => {
                warn!("Unparseable frame from {}: {e}", user.id);
                continue;
            }
        };

        dispatch(&state, &session_id, &user, event).await;
    }

    state.registry.disconnect(&session_id);
    writer.abort();
    if !state.registry.is_online(&user.id) {
        info!("User disconnected: {}", user.id);
    }
}

async fn dispatch(state: &AppState, session_id: &str, user: &User, event: ClientEvent) {
    match event {
        ClientEvent::JoinChat { chat_id } => {
            state.registry.join(session_id, &chat_id);
            // Catch the joiner up on a typing notice that is still fresh.
            if let Some(typist) = state.registry.typing_user(&chat_id) {
                if typist != user.id {
                    state.registry.send_to(
                        session_id,
                        ServerEvent::UserTyping { chat_id: chat_id.clone(), user_id: typist },
                    );
                }
            }
        }
        ClientEvent::SendMessage { chat_id, content } => {
            // The lock spans persist + fan-out so every room member observes
            // messages in store append order.
            let lock = state.registry.conversation_lock(&chat_id);
            let _guard = lock.lock().await;
            match state.chat.append_message(&chat_id, &user.id, &content).await {
                Ok(message) => {
                    state.registry.broadcast(
                        &chat_id,
                        ServerEvent::NewMessage { chat_id: chat_id.clone(), message },
                    );
                }
                Err(e) => {
                    // There is no acknowledgment channel; nothing is broadcast
                    // and the failure stays in the logs.
                    error!("send_message failed for {} in {chat_id}: {e}", user.id);
                }
            }
        }
        ClientEvent::Typing { chat_id } => {
            state.registry.note_typing(&chat_id, &user.id);
            state.registry.broadcast_except(
                &chat_id,
                session_id,
                ServerEvent::UserTyping { chat_id: chat_id.clone(), user_id: user.id.clone() },
            );
        }
    }
}
