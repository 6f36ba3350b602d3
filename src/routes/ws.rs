//! WebSocket session lifecycle — connect, join, relay, disconnect.
//!
//! DESIGN
//! ======
//! On upgrade the optional `token` query credential is resolved to an
//! identity (downgrading to anonymous, never rejecting) and the connection
//! enters a `select!` loop: inbound client events are dispatched, broadcast
//! events from board peers are forwarded out. Membership and cursor state
//! are cleaned up on every exit path, including abrupt disconnects.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → authenticate → connected, no board
//! 2. `join-board` → id resolve + access check → registry join + presence
//! 3. Mutation events → relay (fire-and-forget persist + broadcast)
//! 4. `leave-board` / re-join elsewhere → leave side effects
//! 5. Close or disconnect → leave side effects + cursor removal

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::event::{ClientEvent, Participant, ServerEvent, now_ms};
use crate::services::auth::Identity;
use crate::services::board::{self, BoardError, BoardRef};
use crate::services::{self, presence, relay};
use crate::state::AppState;

/// Outbound channel depth per connection. A client that falls this far
/// behind starts losing broadcast copies rather than stalling the relay.
const CLIENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = params.get("token").map(String::as_str);
    let identity = services::auth::authenticate(&state.pool, token).await;
    ws.on_upgrade(move |socket| run_ws(socket, state, identity))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, identity: Identity) {
    let session_id = Uuid::new_v4();

    // Per-connection channel for receiving broadcast events from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerEvent>(CLIENT_CHANNEL_CAPACITY);

    // Board this session has joined, if any. At most one at a time.
    let mut current_board: Option<String> = None;

    info!(%session_id, user = identity.name(), "ws: client connected");

    'conn: loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies =
                            process_inbound_text(&state, &mut current_board, session_id, &identity, &client_tx, &text)
                                .await;
                        for event in replies {
                            if send_event(&mut socket, &event).await.is_err() {
                                break 'conn;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = client_rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    // Leave side effects run before teardown so peers see the departure.
    if let Some(board_id) = current_board {
        state.registry.leave(&board_id, session_id).await;
        presence::announce_leave(&state, &board_id, &identity).await;
    }
    state.cursors.remove(session_id).await;

    info!(%session_id, "ws: client disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Parse and process one inbound text message, returning events for the
/// sender. Broadcasts to peers happen inside. Split from the socket loop so
/// tests can exercise dispatch without a network.
async fn process_inbound_text(
    state: &AppState,
    current_board: &mut Option<String>,
    session_id: Uuid,
    identity: &Identity,
    client_tx: &mpsc::Sender<ServerEvent>,
    text: &str,
) -> Vec<ServerEvent> {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(%session_id, error = %e, "ws: invalid inbound event");
            return vec![ServerEvent::Error { message: format!("invalid event: {e}") }];
        }
    };

    match event {
        ClientEvent::JoinBoard(raw_id) => {
            handle_join(state, current_board, session_id, identity, client_tx, &raw_id).await
        }
        ClientEvent::LeaveBoard => {
            if let Some(board_id) = current_board.take() {
                state.registry.leave(&board_id, session_id).await;
                presence::announce_leave(state, &board_id, identity).await;
                info!(%session_id, %board_id, "ws: client left board");
            }
            vec![]
        }
        other => {
            // Mutation events are valid only after a join; silently ignored
            // otherwise.
            if let Some(board_id) = current_board.as_deref() {
                relay::handle(state, board_id, session_id, identity, other).await;
            }
            vec![]
        }
    }
}

// =============================================================================
// JOIN
// =============================================================================

async fn handle_join(
    state: &AppState,
    current_board: &mut Option<String>,
    session_id: Uuid,
    identity: &Identity,
    client_tx: &mpsc::Sender<ServerEvent>,
    raw_id: &str,
) -> Vec<ServerEvent> {
    let board_ref = match BoardRef::parse(raw_id) {
        Ok(board_ref) => board_ref,
        Err(e) => return vec![ServerEvent::Error { message: e.to_string() }],
    };

    let board = match board::find_board(&state.pool, &board_ref).await {
        Ok(Some(board)) => board,
        Ok(None) => return vec![ServerEvent::Error { message: BoardError::NotFound.to_string() }],
        Err(e) => {
            warn!(%session_id, error = %e, "ws: board lookup failed");
            return vec![ServerEvent::Error { message: "Failed to join board".into() }];
        }
    };

    if !board.grants_access(identity) {
        info!(%session_id, board_id = %board.id, user = identity.name(), "ws: board access denied");
        return vec![ServerEvent::Error { message: BoardError::AccessDenied.to_string() }];
    }

    let participant = Participant {
        id: identity.user_id(),
        name: identity.name().to_string(),
        email: identity.email().to_string(),
        joined_at: now_ms(),
    };

    let left = state.registry.join(&board.id, session_id, participant, client_tx.clone()).await;
    if let Some(old_board) = left {
        presence::announce_leave(state, &old_board, identity).await;
    }
    *current_board = Some(board.id.clone());

    presence::announce_join(state, &board.id, session_id, identity, board.data).await;

    info!(%session_id, board_id = %board.id, user = identity.name(), "ws: client joined board");
    vec![]
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize event");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
