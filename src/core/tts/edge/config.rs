//! Configuration for the read-aloud client.
//!
//! Every field has a working default, so `EdgeTTSConfig::default()` talks to
//! the public service. Overrides exist mainly for local mock servers and for
//! tracking the browser build the service expects.
//!
//! # Example
//!
//! ```rust
//! use readaloud_client::core::tts::edge::{EdgeTTSConfig, Prosody};
//!
//! let config = EdgeTTSConfig::default()
//!     .with_endpoint_url("ws://127.0.0.1:9000/edge/v1")
//!     .with_timeout_ms(10_000)
//!     .with_prosody(Prosody {
//!         rate: "+10%".to_string(),
//!         ..Default::default()
//!     });
//!
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::messages::Prosody;
use super::{
    DEFAULT_OUTPUT_FORMAT, DEFAULT_TIMEOUT_MS, DEFAULT_USER_AGENT, EDGE_ORIGIN,
    EDGE_TTS_VOICE_LIST_URL, EDGE_TTS_WSS_URL, EXPECTED_CLIENT_FAMILY, MIN_TIMEOUT_MS,
    SEC_MS_GEC_VERSION, TRUSTED_CLIENT_TOKEN,
};
use crate::core::tts::base::{TTSError, TTSResult};
use crate::utils::url_validation::{validate_http_url, validate_websocket_url};

/// Read-aloud client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeTTSConfig {
    /// Synthesis WebSocket endpoint.
    pub endpoint_url: String,

    /// Voice catalog HTTP endpoint.
    pub voice_list_url: String,

    /// Trusted client token; also the token derivation secret.
    pub trusted_client_token: String,

    /// `Sec-MS-GEC-Version` sent alongside derived tokens.
    pub sec_ms_gec_version: String,

    /// Client identity presented in the handshake.
    pub user_agent: String,

    /// `Origin` header presented in the handshake.
    pub origin: String,

    /// Requested audio output format.
    pub output_format: String,

    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,

    /// Prosody applied to every utterance.
    pub prosody: Prosody,
}

impl Default for EdgeTTSConfig {
    fn default() -> Self {
        Self {
            endpoint_url: EDGE_TTS_WSS_URL.to_string(),
            voice_list_url: EDGE_TTS_VOICE_LIST_URL.to_string(),
            trusted_client_token: TRUSTED_CLIENT_TOKEN.to_string(),
            sec_ms_gec_version: SEC_MS_GEC_VERSION.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            origin: EDGE_ORIGIN.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            prosody: Prosody::default(),
        }
    }
}

impl EdgeTTSConfig {
    /// Validate endpoints and required fields.
    ///
    /// A timeout below the floor is not an error; it is raised at use.
    pub fn validate(&self) -> TTSResult<()> {
        validate_websocket_url(&self.endpoint_url).map_err(|e| {
            TTSError::InvalidConfiguration(format!("endpoint_url '{}': {}", self.endpoint_url, e))
        })?;

        validate_http_url(&self.voice_list_url).map_err(|e| {
            TTSError::InvalidConfiguration(format!(
                "voice_list_url '{}': {}",
                self.voice_list_url, e
            ))
        })?;

        if self.trusted_client_token.trim().is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "trusted_client_token must not be empty".to_string(),
            ));
        }

        if self.output_format.trim().is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "output_format must not be empty".to_string(),
            ));
        }

        if self.timeout_ms < MIN_TIMEOUT_MS {
            warn!(
                timeout_ms = self.timeout_ms,
                min_timeout_ms = MIN_TIMEOUT_MS,
                "Configured timeout is below the floor and will be raised"
            );
        }

        Ok(())
    }

    /// Timeout for one attempt: the per-call override or the configured
    /// value, never below [`MIN_TIMEOUT_MS`].
    #[inline]
    pub fn effective_timeout_ms(&self, override_ms: Option<u64>) -> u64 {
        override_ms.unwrap_or(self.timeout_ms).max(MIN_TIMEOUT_MS)
    }

    /// Whether the configured identity looks like the browser the service
    /// expects.
    #[inline]
    pub fn has_expected_identity(&self) -> bool {
        self.user_agent.contains(EXPECTED_CLIENT_FAMILY)
    }

    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = url.into();
        self
    }

    pub fn with_voice_list_url(mut self, url: impl Into<String>) -> Self {
        self.voice_list_url = url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = format.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_prosody(mut self, prosody: Prosody) -> Self {
        self.prosody = prosody;
        self
    }

    pub fn with_sec_ms_gec_version(mut self, version: impl Into<String>) -> Self {
        self.sec_ms_gec_version = version.into();
        self
    }
}
