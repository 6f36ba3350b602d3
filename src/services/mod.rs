//! Domain services used by the websocket session layer.
//!
//! ARCHITECTURE
//! ============
//! Service modules own identity resolution, membership, presence, relay,
//! and persistence concerns so the websocket route stays focused on
//! protocol translation and lifecycle wiring.

pub mod auth;
pub mod board;
pub mod cursor;
pub mod presence;
pub mod registry;
pub mod relay;
