//! WebSocket Mock Server for the read-aloud synthesis endpoint
//!
//! Accepts connections on an ephemeral loopback port, records the upgrade
//! request, waits for the client's `ssml` message and answers with framed
//! audio the way the real service does.

use super::MockStats;
use bytes::{BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

type MockResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Payload of every audio frame the mock sends.
pub const MOCK_AUDIO_CHUNK: &[u8] = b"ID3\x04mock-mpeg-audio";

/// How the mock answers a synthesis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Audio chunks, one word boundary, then `turn.end`.
    Speak,
    /// Refuse the handshake of any connection carrying `Sec-MS-GEC`.
    RejectAuthenticated,
    /// Audio frames labelled `text/plain`, then `turn.end`.
    TextContentType,
    /// Drop the TCP connection without a close frame.
    AbruptClose,
}

/// One upgrade request seen by the mock.
#[derive(Debug, Clone, Default)]
pub struct RecordedConnection {
    pub uri: String,
    pub user_agent: Option<String>,
    pub origin: Option<String>,
    pub accepted: bool,
    pub text_frames: Vec<String>,
}

impl RecordedConnection {
    pub fn is_authenticated(&self) -> bool {
        self.uri.contains("Sec-MS-GEC=")
    }
}

/// WebSocket Mock Server State
pub struct EdgeMockState {
    pub behavior: MockBehavior,
    pub audio_chunks: usize,
    pub stats: MockStats,
    connections: Mutex<Vec<RecordedConnection>>,
}

impl EdgeMockState {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            audio_chunks: 3,
            stats: MockStats::default(),
            connections: Mutex::new(Vec::new()),
        }
    }

    pub fn speaking() -> Self {
        Self::new(MockBehavior::Speak)
    }

    /// Snapshot of the recorded connections, in arrival order.
    pub fn connections(&self) -> Vec<RecordedConnection> {
        self.connections.lock().clone()
    }

    fn push_connection(&self, connection: RecordedConnection) -> usize {
        let mut connections = self.connections.lock();
        connections.push(connection);
        connections.len() - 1
    }

    fn record_text(&self, index: usize, text: String) {
        if let Some(connection) = self.connections.lock().get_mut(index) {
            connection.text_frames.push(text);
        }
    }
}

/// Binary frame: big-endian header length, header block, payload.
pub fn binary_frame(headers: &str, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + headers.len() + payload.len());
    buf.put_u16(headers.len() as u16);
    buf.put_slice(headers.as_bytes());
    buf.put_slice(payload);
    buf.freeze()
}

fn text_frame(request_id: &str, path: &str, body: &str) -> String {
    format!(
        "X-RequestId:{request_id}\r\nContent-Type:application/json; charset=utf-8\r\nPath:{path}\r\n\r\n{body}"
    )
}

fn request_id_of(message: &str) -> String {
    message
        .lines()
        .find_map(|line| line.strip_prefix("X-RequestId:"))
        .unwrap_or("0")
        .trim()
        .to_string()
}

/// Handle a single synthesis connection
async fn handle_connection(stream: TcpStream, state: Arc<EdgeMockState>) -> MockResult<()> {
    state.stats.record_connection();

    let slot: Arc<Mutex<Option<usize>>> = Arc::default();
    let reject_authenticated = state.behavior == MockBehavior::RejectAuthenticated;

    // Recorded inside the handshake so a refused client never races the log
    let record_state = state.clone();
    let record_slot = slot.clone();
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let mut recorded = RecordedConnection {
            uri: req.uri().to_string(),
            user_agent: header("user-agent"),
            origin: header("origin"),
            ..Default::default()
        };
        let rejected = reject_authenticated && recorded.is_authenticated();
        recorded.accepted = !rejected;
        *record_slot.lock() = Some(record_state.push_connection(recorded));

        if rejected {
            record_state.stats.record_rejection();
            let mut rejection = ErrorResponse::new(Some("token rejected".to_string()));
            *rejection.status_mut() = StatusCode::FORBIDDEN;
            return Err(rejection);
        }
        Ok(resp)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws_stream) => ws_stream,
        Err(_) => return Ok(()),
    };
    let index = slot.lock().unwrap_or(usize::MAX);

    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let text = text.as_str().to_string();
                let is_ssml = text.contains("Path:ssml");
                let request_id = request_id_of(&text);
                state.record_text(index, text);

                if !is_ssml {
                    continue;
                }

                match state.behavior {
                    MockBehavior::AbruptClose => return Ok(()),
                    MockBehavior::TextContentType => {
                        let headers = format!(
                            "X-RequestId:{request_id}\r\nContent-Type:text/plain\r\nPath:audio\r\n"
                        );
                        write
                            .send(Message::Binary(binary_frame(&headers, b"not audio")))
                            .await?;
                    }
                    MockBehavior::Speak | MockBehavior::RejectAuthenticated => {
                        write
                            .send(Message::Text(
                                text_frame(&request_id, "turn.start", "{}").into(),
                            ))
                            .await?;

                        let headers = format!(
                            "X-RequestId:{request_id}\r\nContent-Type:audio/mpeg\r\nPath:audio\r\n"
                        );
                        for i in 0..state.audio_chunks {
                            write
                                .send(Message::Binary(binary_frame(&headers, MOCK_AUDIO_CHUNK)))
                                .await?;
                            state.stats.record_audio_frame();

                            if i == 0 {
                                let metadata = r#"{"Metadata":[{"Type":"WordBoundary","Data":{"Offset":1000000,"Duration":3500000,"text":{"Text":"Hello","Length":5,"BoundaryType":"WordBoundary"}}}]}"#;
                                write
                                    .send(Message::Text(
                                        text_frame(&request_id, "audio.metadata", metadata).into(),
                                    ))
                                    .await?;
                            }
                        }
                    }
                }

                state.stats.record_turn();
                write
                    .send(Message::Text(text_frame(&request_id, "turn.end", "{}").into()))
                    .await?;
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(data)) => {
                write.send(Message::Pong(data)).await?;
            }
            Err(_) => break,
            _ => {}
        }
    }

    Ok(())
}

/// Spawn the mock on an ephemeral loopback port.
///
/// Returns the bound address; the accept loop runs until the runtime stops.
pub async fn spawn_edge_mock(state: Arc<EdgeMockState>) -> MockResult<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let state = state.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, state).await {
                    eprintln!("Mock connection error: {}", e);
                }
            });
        }
    });

    Ok(addr)
}
