//! `/ws` live sync endpoint
//!
//! One [`SyncSession`] per socket. A writer task drains the session's
//! bounded outbound queue into the socket; replies, broadcasts and
//! finished syncs all go through that queue so frames never interleave.
//!
//! The credential comes from `Authorization: Bearer`, `?token=`, or the
//! first message (`{"type":"auth","token":..}`), which must arrive within
//! the handshake timeout.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::Response,
};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tagsync_common::api::auth::parse_bearer;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::sync::{ClientMessage, Outbound, ServerMessage, SessionState, SyncHub, SyncSession};
use crate::AppState;

/// Time the writer gets to flush queued frames after the reader stops
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default, Deserialize)]
pub struct SocketParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// GET /ws
pub async fn sync_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<SocketParams>,
    headers: HeaderMap,
) -> Response {
    let credential = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer)
        .map(str::to_string)
        .or(params.token);

    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| run_socket(socket, hub, credential))
}

async fn run_socket(socket: WebSocket, hub: Arc<SyncHub>, credential: Option<String>) {
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut queue) = mpsc::channel::<Arc<ServerMessage>>(hub.config.outbound_queue);

    let writer = tokio::spawn(async move {
        while let Some(message) = queue.recv().await {
            let text = match serde_json::to_string(message.as_ref()) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to serialize outbound message: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut session = SyncSession::new(hub.clone(), outbound.clone());
    debug!("Socket opened for session {}", session.id());

    if handshake(&mut session, &mut stream, &outbound, &hub, credential).await {
        while let Some(inbound) = next_message(&mut stream).await {
            let reply = match inbound {
                Ok(message) => session.handle(message).await,
                Err(message) => Some(ServerMessage::error(message)),
            };
            if let Some(reply) = reply {
                if !send(&outbound, reply).await {
                    break;
                }
            }
        }
    }

    session.close();
    drop(session);
    drop(outbound);

    let abort = writer.abort_handle();
    if tokio::time::timeout(FLUSH_TIMEOUT, writer).await.is_err() {
        abort.abort();
    }
    info!("Socket closed");
}

/// Authenticate the session; `false` means the socket should close
async fn handshake(
    session: &mut SyncSession,
    stream: &mut SplitStream<WebSocket>,
    outbound: &Outbound,
    hub: &SyncHub,
    credential: Option<String>,
) -> bool {
    let reply = if credential.is_some() || hub.authenticator.is_disabled() {
        session.authenticate(credential.as_deref()).await
    } else {
        match tokio::time::timeout(hub.config.handshake_timeout(), next_message(stream)).await {
            Ok(Some(Ok(ClientMessage::Auth { token }))) => {
                session.authenticate(Some(token.as_str())).await
            }
            Ok(Some(Ok(_))) => ServerMessage::error("first message must be auth"),
            Ok(Some(Err(message))) => ServerMessage::error(message),
            Ok(None) => return false,
            Err(_) => {
                warn!("Session {} did not authenticate in time", session.id());
                ServerMessage::error("authentication timed out")
            }
        }
    };

    send(outbound, reply).await && session.state() != SessionState::Unauthenticated
}

/// Next client message; `Err` carries a client-facing parse problem and
/// `None` means the socket is done
async fn next_message(
    stream: &mut SplitStream<WebSocket>,
) -> Option<Result<ClientMessage, String>> {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                return Some(
                    serde_json::from_str(&text).map_err(|e| format!("invalid message: {}", e)),
                );
            }
            Ok(Message::Binary(_)) => {
                return Some(Err("binary frames are not supported".to_string()));
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => return None,
            Err(e) => {
                debug!("Socket read failed: {}", e);
                return None;
            }
        }
    }
    None
}

async fn send(outbound: &Outbound, message: ServerMessage) -> bool {
    outbound.send(Arc::new(message)).await.is_ok()
}
