//! HTTP and WebSocket handlers.

mod http;
mod websocket;

pub use http::{ErrorResponse, RegisterRequest, health_check, list_players, register_player};
pub use websocket::websocket_handler;
