//! Event relay — persist board mutations and fan them out to peers.
//!
//! DESIGN
//! ======
//! Broadcast is never causally dependent on persistence: a slow or
//! unreachable store must not stall live propagation. Persisted kinds spawn
//! a fire-and-forget save that is awaited only far enough to log failure,
//! and the enriched event goes out immediately either way. Last write wins,
//! at most once durable.
//!
//! Every mutation broadcast excludes the sender — they already applied the
//! action locally — except `board-clear`, which is destructive and echoes
//! to all members as an explicit confirmation.

use rand::Rng;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::event::{self, ClientEvent, ServerEvent};
use crate::services::auth::Identity;
use crate::services::board::{self, ElementKind, Mutation};
use crate::state::AppState;

/// Relay one inbound event from a session that has joined `board_id`.
/// Join/leave events are the lifecycle layer's business and ignored here.
pub async fn handle(state: &AppState, board_id: &str, session_id: Uuid, identity: &Identity, event: ClientEvent) {
    match event {
        ClientEvent::Drawing(payload) => {
            let mut out = enrich(payload, identity);
            insert(&mut out, "timestamp", event::now_ms());
            state.registry.broadcast(board_id, &ServerEvent::Drawing(out), Some(session_id)).await;
        }
        ClientEvent::LineDraw(payload) => {
            append(state, board_id, session_id, identity, ElementKind::Line, payload, ServerEvent::LineDraw).await;
        }
        ClientEvent::RectDraw(payload) => {
            append(state, board_id, session_id, identity, ElementKind::Rectangle, payload, ServerEvent::RectDraw)
                .await;
        }
        ClientEvent::CircleDraw(payload) => {
            append(state, board_id, session_id, identity, ElementKind::Circle, payload, ServerEvent::CircleDraw)
                .await;
        }
        ClientEvent::ArrowDraw(payload) => {
            append(state, board_id, session_id, identity, ElementKind::Arrow, payload, ServerEvent::ArrowDraw).await;
        }
        ClientEvent::TextAdd(payload) => {
            append(state, board_id, session_id, identity, ElementKind::Text, payload, ServerEvent::TextAdd).await;
        }
        ClientEvent::CursorMove { x, y } => {
            state.cursors.update(session_id, &identity.user_id(), identity.name(), x, y).await;
            let payload = serde_json::json!({
                "userId": identity.user_id(),
                "userName": identity.name(),
                "x": x,
                "y": y,
            });
            state.registry.broadcast(board_id, &ServerEvent::CursorMove(payload), Some(session_id)).await;
        }
        ClientEvent::ElementDelete { element_id, element_type } => {
            if let Some(kind) = ElementKind::from_type_tag(&element_type) {
                persist(state, board_id, Mutation::Delete { kind, element_id: element_id.clone() });
            }
            let payload = enrich(
                serde_json::json!({ "elementId": element_id, "elementType": element_type }),
                identity,
            );
            state.registry.broadcast(board_id, &ServerEvent::ElementDelete(payload), Some(session_id)).await;
        }
        ClientEvent::BoardClear => {
            persist(state, board_id, Mutation::Clear);
            let payload = enrich(Value::Object(serde_json::Map::new()), identity);
            // Sender included: every client gets the explicit confirmation.
            state.registry.broadcast(board_id, &ServerEvent::BoardClear(payload), None).await;
        }
        ClientEvent::Undo => {
            let payload = enrich(Value::Object(serde_json::Map::new()), identity);
            state.registry.broadcast(board_id, &ServerEvent::Undo(payload), Some(session_id)).await;
        }
        ClientEvent::Redo => {
            let payload = enrich(Value::Object(serde_json::Map::new()), identity);
            state.registry.broadcast(board_id, &ServerEvent::Redo(payload), Some(session_id)).await;
        }
        ClientEvent::ChatMessage { message } => {
            let trimmed = message.trim();
            if trimmed.is_empty() {
                return;
            }
            let payload = serde_json::json!({
                "id": synth_id("msg"),
                "message": trimmed,
                "userId": identity.user_id(),
                "userName": identity.name(),
                "timestamp": event::now_ms(),
            });
            state.registry.broadcast(board_id, &ServerEvent::ChatMessage(payload), Some(session_id)).await;
        }
        ClientEvent::JoinBoard(_) | ClientEvent::LeaveBoard => {}
    }
}

// =============================================================================
// APPEND KINDS
// =============================================================================

/// Persist an append-kind payload fire-and-forget and broadcast the
/// original payload — enriched with sender identity — to peers.
async fn append(
    state: &AppState,
    board_id: &str,
    session_id: Uuid,
    identity: &Identity,
    kind: ElementKind,
    payload: Value,
    wrap: fn(Value) -> ServerEvent,
) {
    let mut record = payload.clone();
    ensure_id(&mut record, kind);
    insert(&mut record, "timestamp", event::now_ms());
    persist(state, board_id, Mutation::Append { kind, record });

    let out = enrich(payload, identity);
    state.registry.broadcast(board_id, &wrap(out), Some(session_id)).await;
}

/// Spawn a fire-and-forget save. The broadcast path never waits on this.
fn persist(state: &AppState, board_id: &str, mutation: Mutation) {
    let pool = state.pool.clone();
    let board_id = board_id.to_string();
    tokio::spawn(async move {
        if let Err(e) = board::apply_mutation(&pool, &board_id, mutation).await {
            warn!(error = %e, %board_id, "board mutation persist failed");
        }
    });
}

// =============================================================================
// PAYLOAD HELPERS
// =============================================================================

/// Merge sender identity into an opaque payload. Non-object payloads are
/// replaced by a fresh object carrying only the identity fields.
fn enrich(payload: Value, identity: &Identity) -> Value {
    let mut out = payload;
    insert(&mut out, "userId", identity.user_id());
    insert(&mut out, "userName", identity.name().to_string());
    out
}

fn insert(record: &mut Value, key: &str, value: impl Into<Value>) {
    if !record.is_object() {
        *record = Value::Object(serde_json::Map::new());
    }
    if let Some(map) = record.as_object_mut() {
        map.insert(key.to_string(), value.into());
    }
}

/// Give the stored copy an element id when the client supplied none.
/// Uniqueness is best-effort — ids are lookup keys, not a security
/// boundary, and collisions are an accepted risk.
fn ensure_id(record: &mut Value, kind: ElementKind) {
    let has_id = record
        .get("id")
        .is_some_and(|v| !v.is_null() && v.as_str() != Some(""));
    if !has_id {
        insert(record, "id", synth_id(kind.id_prefix()));
    }
}

/// Timestamp + random suffix, matching the ids clients generate.
fn synth_id(prefix: &str) -> String {
    let suffix: f64 = rand::rng().random();
    format!("{prefix}_{}_{suffix}", event::now_ms())
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
