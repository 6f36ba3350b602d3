//! Cursor tracker — last-known cursor positions with staleness purge.
//!
//! DESIGN
//! ======
//! Positions are ephemeral: overwritten on every move, dropped on
//! disconnect, and swept on an interval so sessions that vanished without a
//! clean disconnect do not pin entries forever. The sweep is best-effort
//! hygiene, not a correctness requirement — a stale cursor simply stops
//! resolving on the next read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Entries older than this are removed by the sweep.
pub const STALE_AFTER: Duration = Duration::from_secs(30);

/// How often the background sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Last-known cursor position for one session.
#[derive(Debug, Clone)]
pub struct CursorEntry {
    pub user_id: String,
    pub user_name: String,
    pub x: f64,
    pub y: f64,
    pub updated_at: Instant,
}

/// Shared cursor state. Clone is cheap (Arc).
#[derive(Clone, Default)]
pub struct CursorTracker {
    inner: Arc<RwLock<HashMap<Uuid, CursorEntry>>>,
}

impl CursorTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the session's entry with fresh coordinates.
    pub async fn update(&self, session_id: Uuid, user_id: &str, user_name: &str, x: f64, y: f64) {
        self.update_at(session_id, user_id, user_name, x, y, Instant::now()).await;
    }

    /// Like [`update`](Self::update), with an explicit clock for tests.
    pub async fn update_at(&self, session_id: Uuid, user_id: &str, user_name: &str, x: f64, y: f64, now: Instant) {
        let entry = CursorEntry {
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            x,
            y,
            updated_at: now,
        };
        self.inner.write().await.insert(session_id, entry);
    }

    pub async fn get(&self, session_id: Uuid) -> Option<CursorEntry> {
        self.inner.read().await.get(&session_id).cloned()
    }

    /// Drop the session's entry. Called unconditionally on disconnect.
    pub async fn remove(&self, session_id: Uuid) {
        self.inner.write().await.remove(&session_id);
    }

    /// Purge entries not updated within [`STALE_AFTER`] of `now`.
    pub async fn sweep(&self, now: Instant) {
        self.inner
            .write()
            .await
            .retain(|_, entry| now.duration_since(entry.updated_at) <= STALE_AFTER);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Spawn the periodic sweep. Returns a handle for shutdown.
pub fn spawn_sweep_task(cursors: CursorTracker) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            cursors.sweep(Instant::now()).await;
        }
    })
}

#[cfg(test)]
#[path = "cursor_test.rs"]
mod tests;
