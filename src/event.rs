//! Event vocabulary — the wire messages of the realtime channel.
//!
//! DESIGN
//! ======
//! Every message is a JSON envelope `{"event": <name>, "data": <payload>}`;
//! `data` is omitted for payload-less events. Drawing payloads are opaque
//! `serde_json::Value` objects supplied by the client — the server enriches
//! them with sender identity but never interprets the geometry.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::board::BoardData;

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// ROSTER TYPES
// =============================================================================

/// The identity fields a board member shows to everyone else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Milliseconds since Unix epoch.
    pub joined_at: i64,
}

/// Identity carried by a `user-joined` announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedUser {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Identity carried by a `user-left` announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeftUser {
    pub id: String,
    pub name: String,
}

// =============================================================================
// CLIENT → SERVER
// =============================================================================

/// Everything a client may send after the upgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Board identifier: 24-hex internal id or UUID invite id.
    JoinBoard(String),
    LeaveBoard,
    /// Ephemeral in-progress stroke. Relayed, never persisted.
    Drawing(Value),
    LineDraw(Value),
    RectDraw(Value),
    CircleDraw(Value),
    ArrowDraw(Value),
    TextAdd(Value),
    CursorMove {
        x: f64,
        y: f64,
    },
    #[serde(rename_all = "camelCase")]
    ElementDelete {
        element_id: String,
        element_type: String,
    },
    BoardClear,
    Undo,
    Redo,
    ChatMessage {
        message: String,
    },
}

// =============================================================================
// SERVER → CLIENT
// =============================================================================

/// Everything the server may push. Mutation echoes carry the original
/// payload enriched with `userId` and `userName`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Full snapshot, sent once immediately after a successful join.
    BoardState {
        board: BoardData,
        users: Vec<Participant>,
    },
    /// Refreshed roster, sent on every membership change.
    UsersUpdate(Vec<Participant>),
    UserJoined {
        user: JoinedUser,
    },
    UserLeft {
        user: LeftUser,
    },
    Drawing(Value),
    LineDraw(Value),
    RectDraw(Value),
    CircleDraw(Value),
    ArrowDraw(Value),
    TextAdd(Value),
    CursorMove(Value),
    ElementDelete(Value),
    BoardClear(Value),
    Undo(Value),
    Redo(Value),
    ChatMessage(Value),
    Error {
        message: String,
    },
}

// =============================================================================
// TESTS
// =============================================================================
