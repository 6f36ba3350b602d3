//! Board membership registry — who is connected to which board.
//!
//! DESIGN
//! ======
//! Process-wide state with a lifecycle tied to the server process, owned by
//! `AppState` and handed to every connection handler. A session belongs to
//! at most one board; the reverse index enforces that on join. Boards whose
//! member set empties are removed outright so churn does not accumulate
//! stale entries.
//!
//! Broadcast always reads the live member set under the lock — never a
//! cached snapshot — so a mutation fans out exactly to the sessions joined
//! at that instant.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::event::{Participant, ServerEvent};

/// One connected member: roster entry plus the session's outbound channel.
#[derive(Debug, Clone)]
struct Member {
    participant: Participant,
    tx: mpsc::Sender<ServerEvent>,
}

#[derive(Default)]
struct RegistryInner {
    /// board id -> session id -> member.
    boards: HashMap<String, HashMap<Uuid, Member>>,
    /// session id -> board id. At most one board per session.
    sessions: HashMap<Uuid, String>,
}

/// Shared membership registry. Clone is cheap (Arc).
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session on a board. If the session was on a different
    /// board it is removed there first, and that board id is returned so
    /// the caller can fire leave-side presence. Re-joining the same board
    /// overwrites the entry (last summary wins, no duplicates).
    pub async fn join(
        &self,
        board_id: &str,
        session_id: Uuid,
        participant: Participant,
        tx: mpsc::Sender<ServerEvent>,
    ) -> Option<String> {
        let mut inner = self.inner.write().await;

        let mut left = None;
        if let Some(previous) = inner.sessions.get(&session_id).cloned() {
            if previous != board_id {
                remove_member(&mut inner, &previous, session_id);
                left = Some(previous);
            }
        }

        inner
            .boards
            .entry(board_id.to_string())
            .or_default()
            .insert(session_id, Member { participant, tx });
        inner.sessions.insert(session_id, board_id.to_string());
        left
    }

    /// Remove a session from a board. Returns whether it was a member.
    /// An emptied board entry is reclaimed.
    pub async fn leave(&self, board_id: &str, session_id: Uuid) -> bool {
        let mut inner = self.inner.write().await;
        let removed = remove_member(&mut inner, board_id, session_id);
        if removed && inner.sessions.get(&session_id).map(String::as_str) == Some(board_id) {
            inner.sessions.remove(&session_id);
        }
        removed
    }

    /// Board the session is currently joined to, if any.
    pub async fn board_of(&self, session_id: Uuid) -> Option<String> {
        self.inner.read().await.sessions.get(&session_id).cloned()
    }

    /// Snapshot of the board's roster. Ordering unspecified.
    pub async fn list_members(&self, board_id: &str) -> Vec<Participant> {
        let inner = self.inner.read().await;
        let Some(members) = inner.boards.get(board_id) else {
            return Vec::new();
        };
        members.values().map(|m| m.participant.clone()).collect()
    }

    /// Number of boards with at least one member.
    pub async fn board_count(&self) -> usize {
        self.inner.read().await.boards.len()
    }

    /// Best-effort fan-out to the board's current members. A full channel
    /// drops that client's copy rather than stalling the relay.
    pub async fn broadcast(&self, board_id: &str, event: &ServerEvent, exclude: Option<Uuid>) {
        let inner = self.inner.read().await;
        let Some(members) = inner.boards.get(board_id) else {
            return;
        };
        for (session_id, member) in members {
            if exclude == Some(*session_id) {
                continue;
            }
            let _ = member.tx.try_send(event.clone());
        }
    }

    /// Deliver an event to a single member's channel.
    pub async fn send_to(&self, board_id: &str, session_id: Uuid, event: &ServerEvent) {
        let inner = self.inner.read().await;
        if let Some(member) = inner.boards.get(board_id).and_then(|members| members.get(&session_id)) {
            let _ = member.tx.try_send(event.clone());
        }
    }
}

fn remove_member(inner: &mut RegistryInner, board_id: &str, session_id: Uuid) -> bool {
    let Some(members) = inner.boards.get_mut(board_id) else {
        return false;
    };
    let removed = members.remove(&session_id).is_some();
    if members.is_empty() {
        inner.boards.remove(board_id);
    }
    removed
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
