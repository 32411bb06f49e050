//! Error types for the Lobby client.

use thiserror::Error;

/// Transport-level errors. They never escape the connection manager; it logs
/// them and turns them into state transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// The transport could not be opened
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// An established transport failed while reading or writing
    #[error("transport error: {0}")]
    Transport(String),

    /// No async runtime to drive the connection
    #[error("no async runtime available: {0}")]
    Runtime(String),
}

/// Player registration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// Name is empty after trimming
    #[error("player name is required")]
    EmptyName,

    /// The server answered with a non-success status
    #[error("{0}")]
    Rejected(String),

    /// The request never got an answer
    #[error("registration request failed: {0}")]
    Request(String),
}

/// Game session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// `enter` was called on a session that already entered the game
    #[error("session for '{0}' has already entered the game")]
    AlreadyEntered(String),
}
