//! Transport seam for the live channel.
//!
//! The channel state machine talks to a [`Conduit`] trait object rather
//! than a concrete socket, so its lifecycle logic is exercised with a
//! scripted in-memory conduit in tests. [`WsConnector`] is the production
//! implementation: JSON text frames over a websocket.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use wire::Frame;

/// Transport-level failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Dialing the endpoint failed.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The websocket layer reported an error.
    #[error("websocket error: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    /// The peer closed the connection.
    #[error("connection closed")]
    Closed,
    /// An inbound frame failed to decode. Non-fatal: the channel drops the
    /// frame and keeps reading.
    #[error(transparent)]
    Codec(#[from] wire::CodecError),
}

/// A connected, bidirectional frame pipe.
#[async_trait]
pub trait Conduit: Send {
    /// Send one frame to the peer.
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Receive the next frame from the peer.
    ///
    /// `None` means the stream ended cleanly; a [`TransportError::Codec`]
    /// item is recoverable, everything else terminal.
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>>;
}

/// Dials an endpoint and yields a [`Conduit`].
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new conduit to `url`.
    async fn connect(&self, url: &str) -> Result<Box<dyn Conduit>, TransportError>;
}

/// Production connector: websocket with JSON text frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Conduit>, TransportError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        Ok(Box::new(WsConduit { stream }))
    }
}

struct WsConduit {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Conduit for WsConduit {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let text = wire::encode_frame(&frame);
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|error| TransportError::Ws(Box::new(error)))
    }

    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => {
                    return Some(wire::decode_frame(text.as_str()).map_err(TransportError::from));
                }
                Ok(Message::Close(_)) => return None,
                // Pings and pongs are handled by the websocket layer;
                // binary payloads are not part of this protocol.
                Ok(_) => {}
                Err(error) => return Some(Err(TransportError::Ws(Box::new(error)))),
            }
        }
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod transport_test;
