//! Construction-time configuration for the connection manager.

use std::time::Duration;

/// Default WebSocket endpoint of the relay server
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:5000/ws";

/// Default base URL of the player registration API
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000/api/players";

/// Maximum transport attempts per connect cycle
pub const DEFAULT_RECONNECTION_ATTEMPTS: u32 = 5;

/// Fixed delay between two transport attempts
pub const DEFAULT_RECONNECTION_DELAY: Duration = Duration::from_millis(1000);

/// Connection settings, fixed for the lifetime of a `ConnectionManager`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// WebSocket URL of the server
    pub url: String,
    /// Maximum number of transport attempts per cycle (at least one attempt is always made)
    pub reconnection_attempts: u32,
    /// Fixed delay between attempts; no backoff, no jitter
    pub reconnection_delay: Duration,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_reconnection_attempts(mut self, attempts: u32) -> Self {
        self.reconnection_attempts = attempts;
        self
    }

    pub fn with_reconnection_delay(mut self, delay: Duration) -> Self {
        self.reconnection_delay = delay;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            reconnection_attempts: DEFAULT_RECONNECTION_ATTEMPTS,
            reconnection_delay: DEFAULT_RECONNECTION_DELAY,
        }
    }
}
