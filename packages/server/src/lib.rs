//! Development relay server for Lobby.
//!
//! Accepts player registrations over HTTP and relays every named event a
//! WebSocket client sends to all connected clients. It keeps no roster and
//! has no authority over player state.

pub mod handler;
pub mod runner;
pub mod signal;
pub mod state;

pub use runner::Server;
