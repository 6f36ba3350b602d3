//! Board store — dual-id resolution, document load/save, data mutations.
//!
//! DESIGN
//! ======
//! Boards are addressed two ways: the 24-hex internal id, or the UUID
//! invite id printed in share links. [`BoardRef::parse`] is the single
//! place that sniffs the format; every caller gets a normalized reference
//! and malformed ids are rejected before any store lookup.
//!
//! TRADE-OFFS
//! ==========
//! The `data` aggregate is read-modify-written per mutation without
//! versioning. Concurrent writers to the same board can lose updates; the
//! live broadcast path is authoritative for responsiveness and the last
//! save wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::services::auth::Identity;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("Invalid board ID format")]
    InvalidIdFormat,
    #[error("Board not found")]
    NotFound,
    #[error("Access denied to this board")]
    AccessDenied,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// =============================================================================
// BOARD REFERENCE
// =============================================================================

/// A normalized board address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardRef {
    /// 24-character hexadecimal internal id.
    Internal(String),
    /// UUID-format public invite id.
    Invite(Uuid),
}

impl BoardRef {
    /// Sniff the identifier format. Internal ids are lowercased; invite ids
    /// must be hyphenated UUIDs so the two namespaces stay disjoint from
    /// 32-hex strings.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::InvalidIdFormat`] for anything else.
    pub fn parse(raw: &str) -> Result<Self, BoardError> {
        if raw.len() == 24 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(Self::Internal(raw.to_ascii_lowercase()));
        }
        if raw.contains('-') {
            if let Ok(uuid) = Uuid::parse_str(raw) {
                return Ok(Self::Invite(uuid));
            }
        }
        Err(BoardError::InvalidIdFormat)
    }
}

// =============================================================================
// DATA AGGREGATE
// =============================================================================

/// A collaborator role. Access here is binary (member or not); the role
/// ladder is enforced by the surrounding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Editor,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub user: Uuid,
    #[serde(default = "Collaborator::default_role")]
    pub role: Role,
}

impl Collaborator {
    fn default_role() -> Role {
        Role::Editor
    }
}

/// The drawing-object aggregate. Records are opaque to the server; each
/// carries an `id` used only for later lookup and deletion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardData {
    #[serde(default)]
    pub lines: Vec<Value>,
    #[serde(default)]
    pub rectangles: Vec<Value>,
    #[serde(default)]
    pub circles: Vec<Value>,
    #[serde(default)]
    pub arrows: Vec<Value>,
    #[serde(default, rename = "textNodes")]
    pub text_nodes: Vec<Value>,
}

/// The element kinds that map onto the aggregate's arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Line,
    Rectangle,
    Circle,
    Arrow,
    Text,
}

impl ElementKind {
    /// Prefix used for synthesized element ids.
    #[must_use]
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Rectangle => "rect",
            Self::Circle => "circle",
            Self::Arrow => "arrow",
            Self::Text => "text",
        }
    }

    /// Map an `element-delete` type tag to a kind. Unknown tags are `None`
    /// and end up as persistence no-ops.
    #[must_use]
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "line" => Some(Self::Line),
            "rectangle" => Some(Self::Rectangle),
            "circle" => Some(Self::Circle),
            "arrow" => Some(Self::Arrow),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

impl BoardData {
    fn array_mut(&mut self, kind: ElementKind) -> &mut Vec<Value> {
        match kind {
            ElementKind::Line => &mut self.lines,
            ElementKind::Rectangle => &mut self.rectangles,
            ElementKind::Circle => &mut self.circles,
            ElementKind::Arrow => &mut self.arrows,
            ElementKind::Text => &mut self.text_nodes,
        }
    }

    /// Append a record to the kind's array.
    pub fn append(&mut self, kind: ElementKind, record: Value) {
        self.array_mut(kind).push(record);
    }

    /// Remove every record whose `id` matches. Missing ids are a no-op.
    pub fn delete(&mut self, kind: ElementKind, element_id: &str) {
        self.array_mut(kind)
            .retain(|record| record.get("id").and_then(Value::as_str) != Some(element_id));
    }

    /// Reset all drawing arrays to empty. Irreversible at this layer — no
    /// snapshot of the prior state is taken.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// =============================================================================
// BOARD DOCUMENT
// =============================================================================

/// A board document as loaded from the store.
#[derive(Debug, Clone)]
pub struct Board {
    pub id: String,
    pub public_id: Uuid,
    pub title: String,
    pub owner: Uuid,
    pub collaborators: Vec<Collaborator>,
    pub is_public: bool,
    pub allow_anonymous: bool,
    pub data: BoardData,
}

impl Board {
    /// Owner, listed collaborator, or a board flag that permits access.
    /// Anonymous identities can only satisfy the flag clauses.
    #[must_use]
    pub fn grants_access(&self, identity: &Identity) -> bool {
        if let Some(user_id) = identity.uuid() {
            if self.owner == user_id || self.collaborators.iter().any(|c| c.user == user_id) {
                return true;
            }
        }
        self.is_public || self.allow_anonymous
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Load a board by either address.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_board(pool: &PgPool, board_ref: &BoardRef) -> Result<Option<Board>, BoardError> {
    let row = match board_ref {
        BoardRef::Internal(id) => {
            sqlx::query(
                "SELECT id, public_id, title, owner, collaborators, is_public, allow_anonymous, data
                 FROM boards WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(pool)
            .await?
        }
        BoardRef::Invite(public_id) => {
            sqlx::query(
                "SELECT id, public_id, title, owner, collaborators, is_public, allow_anonymous, data
                 FROM boards WHERE public_id = $1",
            )
            .bind(public_id)
            .fetch_optional(pool)
            .await?
        }
    };

    Ok(row.map(board_from_row))
}

fn board_from_row(row: PgRow) -> Board {
    let collaborators: Value = row.get("collaborators");
    let data: Value = row.get("data");
    Board {
        id: row.get("id"),
        public_id: row.get("public_id"),
        title: row.get("title"),
        owner: row.get("owner"),
        collaborators: serde_json::from_value(collaborators).unwrap_or_default(),
        is_public: row.get("is_public"),
        allow_anonymous: row.get("allow_anonymous"),
        data: serde_json::from_value(data).unwrap_or_default(),
    }
}

/// Write the data aggregate back.
///
/// # Errors
///
/// Returns a database error if the update fails.
pub async fn save_data(pool: &PgPool, board_id: &str, data: &BoardData) -> Result<(), BoardError> {
    sqlx::query("UPDATE boards SET data = $2, updated_at = now() WHERE id = $1")
        .bind(board_id)
        .bind(serde_json::to_value(data).unwrap_or_default())
        .execute(pool)
        .await?;
    Ok(())
}

// =============================================================================
// MUTATIONS
// =============================================================================

/// A persisted board mutation, applied read-modify-write.
#[derive(Debug, Clone)]
pub enum Mutation {
    Append { kind: ElementKind, record: Value },
    Delete { kind: ElementKind, element_id: String },
    Clear,
}

/// Load the board, apply the mutation to its data aggregate, save it back.
/// A board that vanished since join time is a no-op — the session just
/// stops persisting.
///
/// # Errors
///
/// Returns a database error if the load or save fails.
pub async fn apply_mutation(pool: &PgPool, board_id: &str, mutation: Mutation) -> Result<(), BoardError> {
    let Some(mut board) = find_board(pool, &BoardRef::Internal(board_id.to_string())).await? else {
        return Ok(());
    };

    match mutation {
        Mutation::Append { kind, record } => board.data.append(kind, record),
        Mutation::Delete { kind, element_id } => board.data.delete(kind, &element_id),
        Mutation::Clear => board.data.clear(),
    }

    save_data(pool, board_id, &board.data).await
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;
