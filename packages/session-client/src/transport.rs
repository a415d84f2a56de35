//! Transport abstraction and WebSocket implementation
//!
//! The connection manager talks to the network through the
//! [`Connector`]/[`TransportSink`]/[`TransportStream`] traits so tests
//! can substitute an in-memory transport. The production implementation
//! wraps a tokio-tungstenite WebSocket.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

/// Transport-level failure
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("transport closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Why the client is closing the transport
///
/// Both reasons close with a normal code; the reason string
/// distinguishes deliberate teardown from idle-connection reaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Normal,
    Inactivity,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "client disconnected",
            Self::Inactivity => "inactivity",
        }
    }
}

/// An inbound transport frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    /// The peer closed the connection; `clean` means a normal close code
    Close { clean: bool },
}

/// Write half of a transport connection
#[async_trait]
pub trait TransportSink: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;
    async fn close(&mut self, reason: CloseReason) -> Result<(), TransportError>;
}

/// Read half of a transport connection
///
/// Yields `None` when the underlying stream ends without a close frame.
#[async_trait]
pub trait TransportStream: Send {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;
}

/// A freshly opened transport, split into its halves
pub type TransportPair = (Box<dyn TransportSink>, Box<dyn TransportStream>);

/// Opens transport connections
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<TransportPair, TransportError>;
}

// =============================================================================
// WebSocket implementation
// =============================================================================

type WsSinkInner = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStreamInner = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Production connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<TransportPair, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        tracing::debug!(host = url.host_str(), "websocket handshake complete");

        let (sink, stream) = stream.split();
        Ok((
            Box::new(WsSink { inner: sink }),
            Box::new(WsStream { inner: stream }),
        ))
    }
}

struct WsSink {
    inner: WsSinkInner,
}

#[async_trait]
impl TransportSink for WsSink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.inner.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self, reason: CloseReason) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: reason.as_str().into(),
        };
        self.inner.send(Message::Close(Some(frame))).await?;
        Ok(())
    }
}

struct WsStream {
    inner: WsStreamInner,
}

#[async_trait]
impl TransportStream for WsStream {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            return match self.inner.next().await? {
                Ok(Message::Text(text)) => Some(Ok(Frame::Text(text))),
                Ok(Message::Close(frame)) => {
                    let clean = matches!(
                        frame,
                        Some(CloseFrame {
                            code: CloseCode::Normal,
                            ..
                        })
                    );
                    Some(Ok(Frame::Close { clean }))
                }
                // Ping/pong are handled by tungstenite; binary frames
                // are not part of this protocol.
                Ok(_) => continue,
                Err(error) => Some(Err(error.into())),
            };
        }
    }
}
