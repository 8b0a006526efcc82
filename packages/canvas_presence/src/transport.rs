//! Transport seam between the connection manager and the socket.
//!
//! The connection manager only ever talks to a [`Connector`] and the
//! [`Transport`] it yields. [`WsConnector`] is the tokio-tungstenite
//! implementation used in production.

use futures::future::BoxFuture;
use futures::{FutureExt, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Inbound frame, reduced to what the presence channel cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close { code: Option<u16>, reason: String },
    /// Ping, pong, binary; ignored
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("transport is closed")]
    Closed,
}

impl TransportError {
    fn from_send(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::Closed
            }
            other => Self::Send(other.to_string()),
        }
    }
}

/// One live, message-oriented connection.
pub trait Transport: Send + 'static {
    /// True while frames can be written.
    fn is_ready(&self) -> bool;

    fn send_text(&mut self, text: String) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Next inbound frame; `None` once the stream has ended.
    fn next_frame(&mut self) -> BoxFuture<'_, Option<Result<Frame, TransportError>>>;

    /// Close gracefully. Errors are swallowed; the transport is unusable afterwards.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// Opens transports to an endpoint.
pub trait Connector: Send + 'static {
    type Transport: Transport;

    fn connect(&self, endpoint: &str) -> BoxFuture<'static, Result<Self::Transport, TransportError>>;
}

/// WebSocket connector (`ws://` and `wss://`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Transport = WsTransport;

    fn connect(&self, endpoint: &str) -> BoxFuture<'static, Result<WsTransport, TransportError>> {
        let endpoint = endpoint.to_string();
        async move {
            let (stream, _response) = tokio_tungstenite::connect_async(&endpoint)
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            Ok(WsTransport { stream, open: true })
        }
        .boxed()
    }
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    open: bool,
}

impl Transport for WsTransport {
    fn is_ready(&self) -> bool {
        self.open
    }

    fn send_text(&mut self, text: String) -> BoxFuture<'_, Result<(), TransportError>> {
        async move {
            if !self.open {
                return Err(TransportError::Closed);
            }
            self.stream
                .send(Message::Text(text.into()))
                .await
                .map_err(TransportError::from_send)
        }
        .boxed()
    }

    fn next_frame(&mut self) -> BoxFuture<'_, Option<Result<Frame, TransportError>>> {
        async move {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Some(Ok(Message::Close(close))) => {
                    self.open = false;
                    let (code, reason) = match close {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.as_str().to_owned()),
                        None => (None, String::new()),
                    };
                    Some(Ok(Frame::Close { code, reason }))
                }
                Some(Ok(_)) => Some(Ok(Frame::Other)),
                Some(Err(e)) => {
                    self.open = false;
                    Some(Err(TransportError::Receive(e.to_string())))
                }
                None => {
                    self.open = false;
                    None
                }
            }
        }
        .boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        async move {
            self.open = false;
            let _ = self.stream.close(None).await;
        }
        .boxed()
    }
}
