//! Connection lifecycle states.

use std::fmt;

/// Lifecycle state of the connection manager.
///
/// ```text
/// Disconnected --connect()--> Connecting --ok--> Connected
/// Connecting/Reconnecting --attempt failed, attempts left--> Reconnecting
/// Connecting/Reconnecting --last attempt failed--> Failed
/// Connected --transport lost--> Reconnecting
/// any --disconnect()--> Disconnected
/// Failed --connect()--> Connecting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl ConnectionState {
    /// Whether a connect cycle is running (a driver owns the transport).
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Reconnecting
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}
