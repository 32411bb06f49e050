//! Connection management: one persistent WebSocket connection with bounded
//! automatic reconnection and named-event publish/subscribe.

mod dispatch;
mod manager;
mod state;
mod transport;

pub use manager::ConnectionManager;
pub use state::ConnectionState;
pub use transport::{Connection, Connector, FrameReader, FrameWriter, WebSocketConnector};

#[cfg(test)]
pub(crate) use transport::MockConnector;
