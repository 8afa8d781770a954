//! Shared TTS types: errors, audio buffers, voice descriptors and the
//! `SpeechSynthesizer` seam implemented by providers.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result type for TTS operations
pub type TTSResult<T> = Result<T, TTSError>;

/// Error taxonomy for synthesis calls.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TTSError {
    // ─────────────────────────────────────────────────────────────────────────────
    // Caller errors
    // ─────────────────────────────────────────────────────────────────────────────

    /// Precondition or configuration failure (empty text, empty voice, bad config)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ─────────────────────────────────────────────────────────────────────────────
    // Attempt-scoped errors (retried on the next attempt)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Security token could not be derived
    #[error("Token derivation failed: {0}")]
    TokenDerivation(String),

    /// Socket never opened, or failed before the session could start
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Socket error after the session started
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Frames were exchanged but no audio arrived before close
    #[error("Audio generation failed: {0}")]
    AudioGenerationFailed(String),

    /// The attempt did not resolve before its deadline
    #[error("Attempt '{label}' timed out after {timeout_ms} ms")]
    Timeout { label: String, timeout_ms: u64 },

    // ─────────────────────────────────────────────────────────────────────────────
    // Terminal errors
    // ─────────────────────────────────────────────────────────────────────────────

    /// Caller cancelled the synthesis
    #[error("Synthesis aborted by caller")]
    Cancelled,

    /// Every connection attempt failed
    #[error("All connection attempts failed: {0}")]
    AttemptsExhausted(String),

    /// HTTP-level failure talking to an auxiliary endpoint
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl TTSError {
    /// Whether the orchestrator may move on to the next connection attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::InvalidConfiguration(_))
    }

    /// Whether this error is the cancellation kind.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// MIME type of the assembled audio (the default output format is MP3).
pub const AUDIO_MIME_TYPE: &str = "audio/mpeg";

/// A word boundary reported by the service while streaming audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBoundary {
    /// Offset from the start of the audio, in 100-ns ticks.
    pub offset: u64,
    /// Duration of the word, in 100-ns ticks.
    pub duration: u64,
    /// The spoken word.
    pub text: String,
}

/// Assembled audio for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Concatenated audio payloads, in arrival order.
    pub data: Bytes,
    /// MIME type of `data`.
    pub mime_type: String,
    /// Word boundaries observed during synthesis.
    pub word_boundaries: Vec<WordBoundary>,
}

impl AudioBuffer {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            mime_type: AUDIO_MIME_TYPE.to_string(),
            word_boundaries: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A voice entry from the voice catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoiceDescriptor {
    /// Voice identifier used in SSML, e.g. "en-US-JennyNeural"
    pub short_name: String,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub gender: String,
}

impl VoiceDescriptor {
    pub fn new(short_name: &str, friendly_name: &str, locale: &str, gender: &str) -> Self {
        Self {
            short_name: short_name.to_string(),
            friendly_name: friendly_name.to_string(),
            locale: locale.to_string(),
            gender: gender.to_string(),
        }
    }
}

impl AsRef<str> for VoiceDescriptor {
    fn as_ref(&self) -> &str {
        &self.short_name
    }
}

/// Information about a live synthesis socket, handed to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketInfo {
    /// Attempt label, e.g. "auth-rfc1123"
    pub label: String,
    /// Full URL the socket was opened against
    pub url: String,
}

/// Observer invoked with `Some(info)` when a socket opens and `None` on teardown.
pub type SocketObserver = Arc<dyn Fn(Option<&SocketInfo>) + Send + Sync>;

/// Per-call options for [`SpeechSynthesizer::synthesize`].
#[derive(Clone, Default)]
pub struct SynthesisOptions {
    /// Cancels the whole synthesis, including the attempt in flight.
    pub cancellation: Option<CancellationToken>,
    /// Observability hook for the raw transport.
    pub on_socket_acquired: Option<SocketObserver>,
    /// Per-attempt timeout; clamped to the provider's floor.
    pub timeout_ms: Option<u64>,
}

impl std::fmt::Debug for SynthesisOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisOptions")
            .field("cancellation", &self.cancellation.is_some())
            .field("on_socket_acquired", &self.on_socket_acquired.is_some())
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl SynthesisOptions {
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_socket_observer(mut self, observer: SocketObserver) -> Self {
        self.on_socket_acquired = Some(observer);
        self
    }
}

/// Text-to-speech provider seam.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice` and return the assembled audio.
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        options: SynthesisOptions,
    ) -> TTSResult<AudioBuffer>;

    /// List available voices.
    async fn list_voices(&self) -> Vec<VoiceDescriptor>;

    /// Provider-specific information.
    fn get_provider_info(&self) -> serde_json::Value;
}
