//! WebSocket layer: one connection per client, one [`Session`] per
//! connection. Each incoming message is a "turn"; after every turn the
//! session runs its staleness check and pushes a fresh table view if the
//! shared document moved underneath it.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::protocol::{ClientMessage, ServerMessage, TableView};
use crate::session::{Session, SessionError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub role: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request: role={:?}", params.role);

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Only connections on the admin route may ever present a password
    let admin_route = params.role.as_deref() == Some("admin");
    let mut session = Session::connect(state.store.clone(), admin_route).await;

    let welcome = ServerMessage::Welcome {
        protocol: "1.0".to_string(),
        admin_route,
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if let Ok(msg) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            tracing::error!("Failed to send welcome message");
            return;
        }
    }

    let mut refresh_rx = state.refresh.subscribe();

    loop {
        tokio::select! {
            // Store watcher noticed (or forced) a change
            notification = refresh_rx.recv() => {
                if notification.is_err() {
                    continue;
                }
                if !session.is_joined() {
                    continue;
                }
                if session.check_stale().await || state.config.force_refresh {
                    let view = TableView::from_document(&session.refresh_view().await);
                    if send_message(&mut sender, &ServerMessage::Table(view)).await.is_err() {
                        break;
                    }
                }
            }

            // Client turn
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handle_message(client_msg, &mut session, &state).await
                                {
                                    if send_message(&mut sender, &response).await.is_err() {
                                        tracing::error!("Failed to send response");
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                let _ = send_message(&mut sender, &error).await;
                            }
                        }

                        // End-of-turn staleness check
                        if session.is_joined() && session.check_stale().await {
                            let view = TableView::from_document(&session.refresh_view().await);
                            if send_message(&mut sender, &ServerMessage::Table(view)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!(
        "WebSocket connection closed for participant: {:?}",
        session.participant()
    );
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    session: &mut Session,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Join { name } => match session.join(&name) {
            Ok(()) => Some(ServerMessage::Joined {
                name: session.participant().unwrap_or_default().to_string(),
            }),
            Err(SessionError::EmptyName) => Some(ServerMessage::Error {
                code: "EMPTY_NAME".to_string(),
                msg: "Please enter a name to join the table".to_string(),
            }),
            Err(SessionError::AlreadyJoined(existing)) => Some(ServerMessage::Error {
                code: "ALREADY_JOINED".to_string(),
                msg: format!("Already joined as '{}'", existing),
            }),
            Err(e) => Some(store_error(e)),
        },

        ClientMessage::Authenticate { password } => {
            if !session.is_joined() {
                return Some(ServerMessage::Error {
                    code: "NOT_JOINED".to_string(),
                    msg: "Enter a name before authenticating".to_string(),
                });
            }
            let is_admin = session.authenticate(&password, |p| state.config.verify_admin(p));
            Some(ServerMessage::AdminStatus { is_admin })
        }

        ClientMessage::CastVote { card } => match session.cast_vote(card).await {
            Ok(()) => Some(ServerMessage::VoteAck { card }),
            Err(SessionError::NotJoined) => Some(ServerMessage::Error {
                code: "NOT_JOINED".to_string(),
                msg: "Enter a name before voting".to_string(),
            }),
            Err(e) => Some(store_error(e)),
        },

        // Unauthorized reveal/reset are silent no-ops inside the session
        ClientMessage::Reveal => match session.reveal().await {
            Ok(()) => None,
            Err(e) => Some(store_error(e)),
        },

        ClientMessage::Reset => match session.reset().await {
            Ok(()) => None,
            Err(e) => Some(store_error(e)),
        },

        ClientMessage::Sync => {
            if !session.is_joined() {
                return Some(ServerMessage::Error {
                    code: "NOT_JOINED".to_string(),
                    msg: "Enter a name to view the table".to_string(),
                });
            }
            let view = TableView::from_document(&session.refresh_view().await);
            Some(ServerMessage::Table(view))
        }
    }
}

fn store_error(e: SessionError) -> ServerMessage {
    tracing::error!("session turn failed: {}", e);
    ServerMessage::Error {
        code: "STORE_WRITE_FAILED".to_string(),
        msg: e.to_string(),
    }
}
