//! One synthesis attempt over one socket.
//!
//! # State Machine
//!
//! ```text
//! Connecting ──open──▶ Configuring ──sent──▶ AwaitingAudio ──turn.end / remote close──▶ Closing
//!                                                                                        │
//!                                                        ┌───────────────────────────────┤
//!                                                        ▼                               ▼
//!                                                    Resolved                          Failed
//! ```
//!
//! Cancellation and the deadline are raced against every suspension point
//! (socket open, each send, each inbound message, payload materialization).
//! Cancellation is polled first and wins over every other outcome.

use std::time::Duration;

use bytes::BytesMut;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::attempts::ConnectionAttempt;
use super::config::EdgeTTSConfig;
use super::messages::{
    FrameAction, decode_binary_frame, decode_text_frame, encode_speech_config, encode_ssml,
    parse_word_boundaries, route_frame,
};
use super::transport::{InboundMessage, SynthesisSocket, SynthesisTransport};
use crate::core::tts::base::{
    AudioBuffer, SocketInfo, SocketObserver, TTSError, WordBoundary,
};

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Closure because the attempt ran out of time ("try again later").
pub const CLOSE_TRY_AGAIN_LATER: u16 = 1013;

/// Reported when the stream ended without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Longest wait for a close handshake once the attempt is already over.
const CLOSE_GRACE: Duration = Duration::from_millis(1_000);

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Configuring,
    AwaitingAudio,
    Closing,
    Resolved,
    Failed,
}

/// A failed attempt and whether its socket ever opened.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    pub error: TTSError,
    pub opened: bool,
}

/// Calls the observer with `None` when the socket goes away.
struct ObserverGuard(Option<SocketObserver>);

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        if let Some(observer) = self.0.take() {
            observer(None);
        }
    }
}

/// How the socket ended up closed.
#[derive(Debug, Clone, Copy)]
struct CloseInfo {
    code: u16,
    clean: bool,
}

enum Interrupt {
    Cancelled,
    TimedOut,
}

/// Close `socket`, giving up after [`CLOSE_GRACE`]. Dropping the socket
/// releases it either way.
async fn close_within_grace(socket: &mut Box<dyn SynthesisSocket>, code: u16, reason: &str) {
    if tokio::time::timeout(CLOSE_GRACE, socket.close(code, reason))
        .await
        .is_err()
    {
        debug!(code, "Close handshake did not complete, dropping socket");
    }
}

/// Drives one socket through the protocol for a single utterance.
pub struct SynthesisSession<'a> {
    transport: &'a dyn SynthesisTransport,
    config: &'a EdgeTTSConfig,
    attempt: &'a ConnectionAttempt,
    ssml: &'a str,
    timeout_ms: u64,
    cancellation: CancellationToken,
    observer: Option<SocketObserver>,
    state: SessionState,
}

impl<'a> SynthesisSession<'a> {
    pub fn new(
        transport: &'a dyn SynthesisTransport,
        config: &'a EdgeTTSConfig,
        attempt: &'a ConnectionAttempt,
        ssml: &'a str,
    ) -> Self {
        Self {
            transport,
            config,
            attempt,
            ssml,
            timeout_ms: config.effective_timeout_ms(None),
            cancellation: CancellationToken::new(),
            observer: None,
            state: SessionState::Connecting,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_observer(mut self, observer: Option<SocketObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn fail(&mut self, error: TTSError, opened: bool) -> AttemptFailure {
        self.state = SessionState::Failed;
        AttemptFailure { error, opened }
    }

    async fn interrupt(
        &mut self,
        socket: &mut Box<dyn SynthesisSocket>,
        interrupt: Interrupt,
    ) -> AttemptFailure {
        self.state = SessionState::Closing;
        match interrupt {
            Interrupt::Cancelled => {
                debug!(label = %self.attempt.label, "Attempt cancelled, closing socket");
                close_within_grace(socket, CLOSE_NORMAL, "aborted").await;
                self.fail(TTSError::Cancelled, true)
            }
            Interrupt::TimedOut => {
                close_within_grace(socket, CLOSE_TRY_AGAIN_LATER, "timeout").await;
                let error = self.timeout_error();
                self.fail(error, true)
            }
        }
    }

    fn timeout_error(&self) -> TTSError {
        TTSError::Timeout {
            label: self.attempt.label.clone(),
            timeout_ms: self.timeout_ms,
        }
    }

    /// Run the attempt to completion.
    pub async fn run(&mut self) -> Result<AudioBuffer, AttemptFailure> {
        let transport = self.transport;
        let config = self.config;
        let attempt = self.attempt;
        let cancel = self.cancellation.clone();

        let deadline = tokio::time::sleep(Duration::from_millis(self.timeout_ms));
        tokio::pin!(deadline);

        // Connecting
        self.state = SessionState::Connecting;
        let mut socket = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.fail(TTSError::Cancelled, false)),
            _ = &mut deadline => {
                let error = self.timeout_error();
                return Err(self.fail(error, false));
            }
            result = transport.connect(&attempt.endpoint_url, config) => match result {
                Ok(socket) => socket,
                Err(e) => {
                    let detail = format!(
                        "{} (close code: {CLOSE_ABNORMAL}, clean: false, opened: false, socket error: true)",
                        match e {
                            TTSError::ConnectionFailed(msg) => msg,
                            other => other.to_string(),
                        }
                    );
                    return Err(self.fail(TTSError::ConnectionFailed(detail), false));
                }
            },
        };

        info!(label = %attempt.label, "Synthesis socket open");

        let info = SocketInfo {
            label: attempt.label.clone(),
            url: attempt.endpoint_url.clone(),
        };
        if let Some(observer) = &self.observer {
            observer(Some(&info));
        }
        let _observer_guard = ObserverGuard(self.observer.clone());

        // Configuring
        self.state = SessionState::Configuring;
        let timestamp = attempt.timestamp_format.format(Utc::now());
        let request_id = Uuid::new_v4().simple().to_string();
        let outbound = [
            encode_speech_config(&timestamp, &config.output_format),
            encode_ssml(&request_id, &timestamp, self.ssml),
        ];

        let mut socket_error: Option<String> = None;
        for message in outbound {
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(self.interrupt(&mut socket, Interrupt::Cancelled).await);
                }
                _ = &mut deadline => {
                    return Err(self.interrupt(&mut socket, Interrupt::TimedOut).await);
                }
                sent = socket.send_text(message) => sent,
            };
            if let Err(e) = sent {
                warn!(label = %attempt.label, "Failed to send request frame: {}", e);
                socket_error = Some(e.to_string());
                break;
            }
        }

        // AwaitingAudio
        let mut audio = BytesMut::new();
        let mut word_boundaries: Vec<WordBoundary> = Vec::new();
        let mut close = CloseInfo {
            code: CLOSE_ABNORMAL,
            clean: false,
        };

        if socket_error.is_none() {
            self.state = SessionState::AwaitingAudio;
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(self.interrupt(&mut socket, Interrupt::Cancelled).await);
                    }
                    _ = &mut deadline => {
                        return Err(self.interrupt(&mut socket, Interrupt::TimedOut).await);
                    }
                    next = socket.next_message() => next,
                };

                let frame = match next {
                    None => {
                        debug!(label = %attempt.label, "Socket stream ended without close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(label = %attempt.label, "Socket error: {}", e);
                        socket_error = Some(e.to_string());
                        break;
                    }
                    Some(Ok(InboundMessage::Close { code, reason })) => {
                        debug!(label = %attempt.label, code, reason = %reason, "Remote closed socket");
                        close = CloseInfo { code, clean: true };
                        break;
                    }
                    Some(Ok(InboundMessage::Text(text))) => decode_text_frame(&text),
                    Some(Ok(InboundMessage::Binary(source))) => {
                        let materialized = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                return Err(self.interrupt(&mut socket, Interrupt::Cancelled).await);
                            }
                            _ = &mut deadline => {
                                return Err(self.interrupt(&mut socket, Interrupt::TimedOut).await);
                            }
                            bytes = source.materialize() => bytes,
                        };
                        match materialized {
                            Ok(bytes) => decode_binary_frame(&bytes),
                            Err(e) => {
                                warn!(label = %attempt.label, "Failed to read binary payload: {}", e);
                                socket_error = Some(e.to_string());
                                break;
                            }
                        }
                    }
                };

                match route_frame(&frame) {
                    FrameAction::TurnEnd => {
                        debug!(label = %attempt.label, "turn.end received");
                        self.state = SessionState::Closing;
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                debug!(label = %attempt.label, "Cancelled while closing, dropping socket");
                                return Err(self.fail(TTSError::Cancelled, true));
                            }
                            _ = &mut deadline => {
                                debug!(label = %attempt.label, "Close outlived the deadline, dropping socket");
                            }
                            _ = socket.close(CLOSE_NORMAL, "turn.end") => {}
                        }
                        close = CloseInfo {
                            code: CLOSE_NORMAL,
                            clean: true,
                        };
                        break;
                    }
                    FrameAction::Audio(chunk) => {
                        debug!(label = %attempt.label, bytes = chunk.len(), "Audio chunk");
                        audio.extend_from_slice(&chunk);
                    }
                    FrameAction::Metadata(body) => match parse_word_boundaries(&body) {
                        Ok(mut boundaries) => word_boundaries.append(&mut boundaries),
                        Err(e) => debug!("Skipping malformed metadata: {}", e),
                    },
                    FrameAction::Ignore => {
                        debug!(label = %attempt.label, path = ?frame.path(), "Ignoring frame");
                    }
                }
            }
        }

        // Closing
        self.state = SessionState::Closing;
        if cancel.is_cancelled() {
            return Err(self.fail(TTSError::Cancelled, true));
        }

        if audio.is_empty() {
            let diagnostic = format!(
                "no audio received (close code: {}, clean: {}, opened: true, socket error: {}{})",
                close.code,
                close.clean,
                socket_error.is_some(),
                socket_error
                    .as_deref()
                    .map(|e| format!(", detail: {e}"))
                    .unwrap_or_default()
            );
            return Err(self.fail(TTSError::AudioGenerationFailed(diagnostic), true));
        }

        self.state = SessionState::Resolved;
        info!(
            label = %attempt.label,
            bytes = audio.len(),
            words = word_boundaries.len(),
            "Synthesis resolved"
        );

        let mut buffer = AudioBuffer::new(audio.freeze());
        buffer.word_boundaries = word_boundaries;
        Ok(buffer)
    }
}
