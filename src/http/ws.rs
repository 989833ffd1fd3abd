//! The bidirectional attach channel.
//!
//! One WebSocket per participant device. Inbound frames are JSON text
//! messages; outbound messages fan out through the session's socket
//! handle, which a reconnect replaces without touching the rest of the
//! session state.

use super::state::AppState;
use crate::session::{ClientMessage, ServerMessage, SocketSender};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Forward task: session emissions -> this connection.
    let forward = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break; // client disconnected
            }
        }
    });

    // The session this connection has joined, if any.
    let mut joined: Option<String> = None;

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // The channel is JSON-framed; anything else is ignored.
            _ => continue,
        };

        let parsed: ClientMessage = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Ignoring unparseable client message: {}", e);
                continue;
            }
        };

        match parsed {
            ClientMessage::JoinSession { session_id } => {
                match state.orchestrator.attach(&session_id, tx.clone()).await {
                    Ok(()) => {
                        joined = Some(session_id);
                    }
                    Err(e) => {
                        // Session-specific codes pass through; anything
                        // else surfaces as a join failure.
                        let code = match e.code() {
                            "SESSION_NOT_FOUND" | "SESSION_INACTIVE" | "PROVIDER_KEY_MISSING" => {
                                e.code()
                            }
                            _ => "JOIN_ERROR",
                        };
                        let _ = tx.send(ServerMessage::Error {
                            message: e.to_string(),
                            code: code.to_string(),
                        });
                    }
                }
            }
            ClientMessage::AudioChunk {
                session_id,
                audio_data,
            } => {
                if let Err(e) = state
                    .orchestrator
                    .handle_audio(&session_id, audio_data)
                    .await
                {
                    let _ = tx.send(ServerMessage::Error {
                        message: e.to_string(),
                        code: e.code().to_string(),
                    });
                }
            }
            ClientMessage::Ping => {
                let _ = tx.send(ServerMessage::Pong {
                    timestamp: Utc::now(),
                });
            }
        }
    }

    // Detach only clears the socket handle; the session entry, its PCM,
    // and the watchdog all survive for a reconnect.
    if let Some(session_id) = joined {
        detach(&state, &session_id, &tx).await;
    }

    drop(tx);
    let _ = forward.await;
    info!("WebSocket connection closed");
}

async fn detach(state: &AppState, session_id: &str, tx: &SocketSender) {
    state.orchestrator.detach(session_id, tx).await;
}
