//! Edge "read aloud" TTS client.
//!
//! This module speaks the read-aloud service's pseudo-HTTP-over-WebSocket
//! dialect: header blocks of `Key:Value` lines, a blank line, then a body.
//!
//! # Protocol
//!
//! ```text
//! client                                   service
//!   │── speech.config (text) ───────────────▶│
//!   │── ssml (text) ────────────────────────▶│
//!   │◀──────────────── turn.start (text) ────│
//!   │◀────── audio (binary, u16 BE header) ──│  (repeated)
//!   │◀──────────── audio.metadata (text) ────│  (interleaved)
//!   │◀────────────────── turn.end (text) ────│
//!   │── close(1000) ────────────────────────▶│
//! ```
//!
//! # Authentication
//!
//! The service expects a `Sec-MS-GEC` query parameter: the uppercase hex
//! SHA-256 of a 5-minute-rounded Windows-epoch tick count concatenated with
//! the trusted client token. Server time is tracked via [`ClockSkew`].
//!
//! # Architecture
//!
//! - [`digest`]: SHA-256 with a portable fallback
//! - [`clock`]: clock skew tracking
//! - [`token`]: `Sec-MS-GEC` derivation
//! - [`messages`]: frame codec, SSML and timestamp formats
//! - [`transport`]: WebSocket seam (`tokio-tungstenite` by default)
//! - [`session`]: single-attempt state machine
//! - [`attempts`]: connection variants
//! - [`provider`]: the `EdgeTTS` orchestrator
//! - [`voices`]: voice catalog
//!
//! # Example
//!
//! ```rust,no_run
//! use readaloud_client::core::tts::{EdgeTTS, EdgeTTSConfig, SynthesisOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let tts = EdgeTTS::new(EdgeTTSConfig::default())?;
//! let audio = tts
//!     .synthesize("Hello, world!", "en-US-JennyNeural", SynthesisOptions::default())
//!     .await?;
//! std::fs::write("hello.mp3", &audio.data)?;
//! # Ok(())
//! # }
//! ```

pub mod attempts;
pub mod clock;
pub mod config;
pub mod digest;
pub mod messages;
pub mod provider;
pub mod session;
pub mod token;
pub mod transport;
pub mod voices;


pub use attempts::{ConnectionAttempt, build_attempts};
pub use clock::{Clock, ClockSkew, SystemClock};
pub use config::EdgeTTSConfig;
pub use digest::{DigestBackend, DigestEngine, PortableSha256, Sha2Backend};
pub use messages::{Frame, FrameAction, FrameKind, Prosody, TimestampFormat};
pub use provider::EdgeTTS;
pub use session::{AttemptFailure, SessionState, SynthesisSession};
pub use token::{SecurityToken, TokenDeriver};
pub use transport::{
    ByteSource, InboundMessage, SynthesisSocket, SynthesisTransport, TungsteniteTransport,
};
pub use voices::VoiceCatalog;

// =============================================================================
// API Constants
// =============================================================================

/// Read-aloud synthesis WebSocket endpoint.
pub const EDGE_TTS_WSS_URL: &str =
    "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1";

/// Voice catalog endpoint.
pub const EDGE_TTS_VOICE_LIST_URL: &str =
    "https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voices/list";

/// Trusted client token; also the shared secret of the `Sec-MS-GEC` derivation.
pub const TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";

/// Browser build the handshake impersonates.
pub const CHROMIUM_FULL_VERSION: &str = "143.0.3650.139";

/// `Sec-MS-GEC-Version` value paired with the derived token.
pub const SEC_MS_GEC_VERSION: &str = "1-143.0.3650.139";

/// Origin header of the read-aloud browser extension.
pub const EDGE_ORIGIN: &str = "chrome-extension://jdiccldimpdaibmpdkjnbmckianbfold";

/// User agent of the impersonated browser.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36 Edg/143.0.0.0";

/// Marker the service expects in the client identity.
pub const EXPECTED_CLIENT_FAMILY: &str = "Edg/";

// =============================================================================
// Limits and Defaults
// =============================================================================

/// Default audio output format.
pub const DEFAULT_OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

/// Default voice.
pub const DEFAULT_VOICE: &str = "en-US-AriaNeural";

/// Default per-attempt timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 25_000;

/// Lowest per-attempt timeout accepted; smaller values are raised to this.
pub const MIN_TIMEOUT_MS: u64 = 5_000;

/// Seconds between 1601-01-01 and 1970-01-01.
pub const WINDOWS_EPOCH_OFFSET_SECS: u64 = 11_644_473_600;

/// Token validity window in seconds.
pub const TOKEN_WINDOW_SECS: u64 = 300;
