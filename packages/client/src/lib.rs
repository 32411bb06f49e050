//! Lobby game client.
//!
//! Keeps a live, de-duplicated roster of players from the `player-update`
//! events of a self-reconnecting WebSocket connection.
//!
//! - [`connection::ConnectionManager`] owns the transport and its lifecycle.
//! - [`roster::RosterSynchronizer`] folds player updates into a [`roster::Roster`].
//! - [`session::GameSession`] composes both with player registration.

pub mod config;
pub mod connection;
pub mod error;
pub mod registration;
pub mod roster;
pub mod session;
pub mod view;

pub use lobby_shared::protocol::{self, PlayerRecord};
