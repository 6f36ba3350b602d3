//! syncboard — realtime session layer for a collaborative whiteboard.
//!
//! ARCHITECTURE
//! ============
//! Clients connect over a websocket, get an identity attached (or the
//! anonymous fallback), join one board at a time, and exchange drawing,
//! cursor, and chat events. The relay persists board mutations
//! fire-and-forget and fans events out to the other members of the board.
//! Board metadata and the drawing-object aggregate live in Postgres; all
//! live state (membership, cursors) is in-process.

pub mod db;
pub mod event;
pub mod routes;
pub mod services;
pub mod state;
