//! Presence notifier — join/leave announcements and roster refresh.
//!
//! DESIGN
//! ======
//! The joiner gets a full snapshot (`board-state`), peers get a lightweight
//! announcement, and then everyone — joiner included — gets the refreshed
//! roster so no client's member list drifts. On leave the registry entry is
//! already gone, so a board that emptied simply has no broadcast targets.

use uuid::Uuid;

use crate::event::{JoinedUser, LeftUser, ServerEvent};
use crate::services::auth::Identity;
use crate::services::board::BoardData;
use crate::state::AppState;

/// Announce a successful join. Call after the registry join so the roster
/// snapshot includes the joiner.
pub async fn announce_join(
    state: &AppState,
    board_id: &str,
    session_id: Uuid,
    identity: &Identity,
    board_data: BoardData,
) {
    let users = state.registry.list_members(board_id).await;

    let snapshot = ServerEvent::BoardState { board: board_data, users: users.clone() };
    state.registry.send_to(board_id, session_id, &snapshot).await;

    let joined = ServerEvent::UserJoined {
        user: JoinedUser {
            id: identity.user_id(),
            name: identity.name().to_string(),
            email: identity.email().to_string(),
        },
    };
    state.registry.broadcast(board_id, &joined, Some(session_id)).await;

    state.registry.broadcast(board_id, &ServerEvent::UsersUpdate(users), None).await;
}

/// Announce a departure to whoever remains. Call after the registry leave.
pub async fn announce_leave(state: &AppState, board_id: &str, identity: &Identity) {
    let left = ServerEvent::UserLeft {
        user: LeftUser { id: identity.user_id(), name: identity.name().to_string() },
    };
    state.registry.broadcast(board_id, &left, None).await;

    let users = state.registry.list_members(board_id).await;
    state.registry.broadcast(board_id, &ServerEvent::UsersUpdate(users), None).await;
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
