//! Transport seam between the connection manager and the network.

use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

use crate::error::ConnectionError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Inbound half of an open transport.
#[async_trait]
pub trait FrameReader: Send {
    /// Next text frame, or `None` once the peer closed the transport.
    async fn next_frame(&mut self) -> Option<Result<String, ConnectionError>>;
}

/// Outbound half of an open transport.
#[async_trait]
pub trait FrameWriter: Send {
    async fn send_frame(&mut self, frame: String) -> Result<(), ConnectionError>;

    async fn close(&mut self) -> Result<(), ConnectionError>;
}

/// An open transport, split so reads and writes can be awaited concurrently.
pub struct Connection {
    pub reader: Box<dyn FrameReader>,
    pub writer: Box<dyn FrameWriter>,
}

/// Opens transports. One call is one connection attempt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Connection, ConnectionError>;
}

/// Production connector over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Connection, ConnectionError> {
        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| ConnectionError::Handshake(e.to_string()))?;
        tracing::debug!(
            "WebSocket handshake with {} completed ({})",
            url,
            response.status()
        );

        let (write, read) = ws_stream.split();
        Ok(Connection {
            reader: Box::new(WebSocketReader { read }),
            writer: Box::new(WebSocketWriter { write }),
        })
    }
}

struct WebSocketReader {
    read: SplitStream<WsStream>,
}

#[async_trait]
impl FrameReader for WebSocketReader {
    async fn next_frame(&mut self) -> Option<Result<String, ConnectionError>> {
        loop {
            match self.read.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(data)) => {
                    tracing::debug!("Ignoring binary frame ({} bytes)", data.len());
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Server closed the connection");
                    return None;
                }
                // ping/pong are answered by tungstenite
                Ok(_) => {}
                Err(e) => return Some(Err(ConnectionError::Transport(e.to_string()))),
            }
        }
    }
}

struct WebSocketWriter {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameWriter for WebSocketWriter {
    async fn send_frame(&mut self, frame: String) -> Result<(), ConnectionError> {
        self.write
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.write
            .close()
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }
}
