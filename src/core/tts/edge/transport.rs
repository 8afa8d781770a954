//! WebSocket transport seam.
//!
//! The session talks to a [`SynthesisSocket`] opened by a
//! [`SynthesisTransport`]. The default transport is `tokio-tungstenite`; tests
//! substitute scripted in-memory sockets.
//!
//! Inbound binary payloads are handed over as a [`ByteSource`] so that
//! transports whose payloads need an asynchronous read (spooled or streamed
//! bodies) plug in the same way as ones that already hold the bytes.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use http::{HeaderName, HeaderValue};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use super::config::EdgeTTSConfig;
use crate::core::tts::base::{TTSError, TTSResult};

/// Close code reported when the peer closed without a status.
pub const CLOSE_NO_STATUS: u16 = 1005;

// =============================================================================
// Byte Sources
// =============================================================================

/// A binary payload that may need an asynchronous read before use.
#[async_trait]
pub trait ByteSource: Send {
    async fn materialize(self: Box<Self>) -> TTSResult<Bytes>;
}

#[async_trait]
impl ByteSource for Bytes {
    async fn materialize(self: Box<Self>) -> TTSResult<Bytes> {
        Ok(*self)
    }
}

#[async_trait]
impl ByteSource for Vec<u8> {
    async fn materialize(self: Box<Self>) -> TTSResult<Bytes> {
        Ok(Bytes::from(*self))
    }
}

/// Payload produced by a future.
pub struct DeferredBytes {
    future: Pin<Box<dyn Future<Output = TTSResult<Bytes>> + Send>>,
}

impl DeferredBytes {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = TTSResult<Bytes>> + Send + 'static,
    {
        Self {
            future: Box::pin(future),
        }
    }
}

#[async_trait]
impl ByteSource for DeferredBytes {
    async fn materialize(self: Box<Self>) -> TTSResult<Bytes> {
        self.future.await
    }
}

// =============================================================================
// Socket Traits
// =============================================================================

/// One inbound WebSocket message.
pub enum InboundMessage {
    Text(String),
    Binary(Box<dyn ByteSource>),
    /// The peer closed the socket.
    Close { code: u16, reason: String },
}

impl std::fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Binary(_) => f.write_str("Binary(..)"),
            Self::Close { code, reason } => f
                .debug_struct("Close")
                .field("code", code)
                .field("reason", reason)
                .finish(),
        }
    }
}

/// An open synthesis socket.
#[async_trait]
pub trait SynthesisSocket: Send {
    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> TTSResult<()>;

    /// Next application message; `None` once the stream has ended.
    async fn next_message(&mut self) -> Option<TTSResult<InboundMessage>>;

    /// Initiate a close handshake. Best effort.
    async fn close(&mut self, code: u16, reason: &str);
}

/// Opens synthesis sockets.
#[async_trait]
pub trait SynthesisTransport: Send + Sync {
    async fn connect(
        &self,
        url: &str,
        config: &EdgeTTSConfig,
    ) -> TTSResult<Box<dyn SynthesisSocket>>;
}

// =============================================================================
// tokio-tungstenite
// =============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default transport on `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

/// Handshake headers of the read-aloud browser extension.
fn handshake_headers(config: &EdgeTTSConfig) -> [(&'static str, String); 6] {
    [
        ("user-agent", config.user_agent.clone()),
        ("origin", config.origin.clone()),
        ("pragma", "no-cache".to_string()),
        ("cache-control", "no-cache".to_string()),
        ("accept-encoding", "gzip, deflate, br".to_string()),
        ("accept-language", "en-US,en;q=0.9".to_string()),
    ]
}

#[async_trait]
impl SynthesisTransport for TungsteniteTransport {
    async fn connect(
        &self,
        url: &str,
        config: &EdgeTTSConfig,
    ) -> TTSResult<Box<dyn SynthesisSocket>> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TTSError::ConnectionFailed(format!("Invalid WebSocket URL: {e}")))?;

        for (name, value) in handshake_headers(config) {
            let value = HeaderValue::from_str(&value).map_err(|e| {
                TTSError::InvalidConfiguration(format!("Invalid {name} header value: {e}"))
            })?;
            request
                .headers_mut()
                .insert(HeaderName::from_static(name), value);
        }

        let (ws_stream, response) = connect_async(request)
            .await
            .map_err(|e| TTSError::ConnectionFailed(format!("WebSocket connect failed: {e}")))?;

        info!(status = %response.status(), "Connected to read-aloud WebSocket");

        let (sink, stream) = ws_stream.split();
        Ok(Box::new(TungsteniteSocket { sink, stream }))
    }
}

struct TungsteniteSocket {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl SynthesisSocket for TungsteniteSocket {
    async fn send_text(&mut self, text: String) -> TTSResult<()> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TTSError::NetworkError(format!("Failed to send frame: {e}")))
    }

    async fn next_message(&mut self) -> Option<TTSResult<InboundMessage>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(TTSError::NetworkError(e.to_string()))),
            };

            return Some(Ok(match message {
                Message::Text(text) => InboundMessage::Text(text.as_str().to_string()),
                Message::Binary(data) => InboundMessage::Binary(Box::new(data)),
                Message::Close(frame) => match frame {
                    Some(frame) => InboundMessage::Close {
                        code: u16::from(frame.code),
                        reason: frame.reason.as_str().to_string(),
                    },
                    None => InboundMessage::Close {
                        code: CLOSE_NO_STATUS,
                        reason: String::new(),
                    },
                },
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }));
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        if let Err(e) = self.sink.send(Message::Close(Some(frame))).await {
            debug!("Close frame not delivered: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_byte_sources_materialize() {
        let from_bytes: Box<dyn ByteSource> = Box::new(Bytes::from_static(&[1, 2]));
        assert_eq!(&from_bytes.materialize().await.unwrap()[..], &[1, 2]);

        let from_vec: Box<dyn ByteSource> = Box::new(vec![3u8, 4]);
        assert_eq!(&from_vec.materialize().await.unwrap()[..], &[3, 4]);

        let deferred: Box<dyn ByteSource> =
            Box::new(DeferredBytes::new(async { Ok(Bytes::from_static(&[5])) }));
        assert_eq!(&deferred.materialize().await.unwrap()[..], &[5]);
    }

    #[test]
    fn test_handshake_headers() {
        let config = EdgeTTSConfig::default();
        let headers = handshake_headers(&config);
        assert!(
            headers
                .iter()
                .any(|(k, v)| *k == "origin" && v.starts_with("chrome-extension://"))
        );
        // from_static panics on uppercase names
        assert!(
            headers
                .iter()
                .all(|(k, _)| !k.chars().any(|c| c.is_ascii_uppercase()))
        );
    }
}
