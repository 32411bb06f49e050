//! Shared server state.

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};

/// Relayed frames buffered per slow client before it starts lagging
const RELAY_CAPACITY: usize = 256;

/// A registered player name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredPlayer {
    pub name: String,
    /// RFC 3339 registration time (UTC)
    #[serde(rename = "registeredAt")]
    pub registered_at: String,
}

/// Shared application state
pub struct AppState {
    /// Every relayed frame, fanned out to all WebSocket clients
    pub relay: broadcast::Sender<String>,
    /// Players registered through the HTTP API, in registration order
    pub players: Mutex<Vec<RegisteredPlayer>>,
}

impl AppState {
    pub fn new() -> Self {
        let (relay, _) = broadcast::channel(RELAY_CAPACITY);
        Self {
            relay,
            players: Mutex::new(Vec::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
