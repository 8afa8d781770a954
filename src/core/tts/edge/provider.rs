//! `EdgeTTS`: the attempt orchestrator.
//!
//! A synthesis call validates its input without touching the network, builds
//! the SSML document once, then walks the connection variants from
//! [`build_attempts`](super::attempts::build_attempts) strictly in sequence.
//! The first attempt that yields audio wins; audio is never merged across
//! attempts. Failures are labelled and aggregated into one error.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::attempts::build_attempts;
use super::clock::ClockSkew;
use super::config::EdgeTTSConfig;
use super::digest::DigestEngine;
use super::messages::{build_ssml, escape_xml, sanitize_text};
use super::session::{AttemptFailure, SynthesisSession};
use super::token::TokenDeriver;
use super::transport::{SynthesisTransport, TungsteniteTransport};
use super::voices::VoiceCatalog;
use super::{EXPECTED_CLIENT_FAMILY, MIN_TIMEOUT_MS};
use crate::core::tts::base::{
    AudioBuffer, SpeechSynthesizer, SynthesisOptions, TTSError, TTSResult, VoiceDescriptor,
};

/// Read-aloud synthesis client.
pub struct EdgeTTS {
    config: EdgeTTSConfig,
    transport: Arc<dyn SynthesisTransport>,
    skew: Arc<ClockSkew>,
    deriver: Arc<TokenDeriver>,
    catalog: VoiceCatalog,
}

impl EdgeTTS {
    /// Client on the default `tokio-tungstenite` transport and system clock.
    pub fn new(config: EdgeTTSConfig) -> TTSResult<Self> {
        Self::with_parts(
            config,
            Arc::new(TungsteniteTransport),
            Arc::new(ClockSkew::default()),
        )
    }

    /// Client on a custom transport.
    pub fn with_transport(
        config: EdgeTTSConfig,
        transport: Arc<dyn SynthesisTransport>,
    ) -> TTSResult<Self> {
        Self::with_parts(config, transport, Arc::new(ClockSkew::default()))
    }

    pub fn with_parts(
        config: EdgeTTSConfig,
        transport: Arc<dyn SynthesisTransport>,
        skew: Arc<ClockSkew>,
    ) -> TTSResult<Self> {
        config.validate()?;

        let deriver = Arc::new(TokenDeriver::with_parts(
            skew.clone(),
            DigestEngine::default(),
            config.trusted_client_token.clone(),
            config.sec_ms_gec_version.clone(),
        ));
        let catalog = VoiceCatalog::new(&config, skew.clone(), deriver.clone())?;

        Ok(Self {
            config,
            transport,
            skew,
            deriver,
            catalog,
        })
    }

    #[inline]
    pub fn config(&self) -> &EdgeTTSConfig {
        &self.config
    }

    /// Clock skew shared by token derivation and the voice catalog.
    #[inline]
    pub fn clock_skew(&self) -> &Arc<ClockSkew> {
        &self.skew
    }

    #[inline]
    pub fn voice_catalog(&self) -> &VoiceCatalog {
        &self.catalog
    }

    /// Synthesize `text` with `voice`, given as a short name or a
    /// [`VoiceDescriptor`].
    pub async fn synthesize(
        &self,
        text: &str,
        voice: impl AsRef<str>,
        options: SynthesisOptions,
    ) -> TTSResult<AudioBuffer> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Text must not be empty".to_string(),
            ));
        }
        let voice = voice.as_ref().trim();
        if voice.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Voice must not be empty".to_string(),
            ));
        }

        let cancel = options.cancellation.unwrap_or_default();
        if cancel.is_cancelled() {
            return Err(TTSError::Cancelled);
        }

        let ssml = build_ssml(&escape_xml(&sanitize_text(text)), voice, &self.config.prosody);
        let attempts = build_attempts(&self.config, &self.deriver)?;
        let timeout_ms = self.config.effective_timeout_ms(options.timeout_ms);

        info!(
            voice = %voice,
            chars = text.chars().count(),
            attempts = attempts.len(),
            "Starting synthesis"
        );

        let mut failures = Vec::with_capacity(attempts.len());
        let mut any_opened = false;

        for attempt in &attempts {
            let mut session = SynthesisSession::new(
                self.transport.as_ref(),
                &self.config,
                attempt,
                &ssml,
            )
            .with_timeout_ms(timeout_ms)
            .with_cancellation(cancel.clone())
            .with_observer(options.on_socket_acquired.clone());

            match session.run().await {
                Ok(audio) => return Ok(audio),
                Err(AttemptFailure { error, .. }) if !error.is_retryable() => return Err(error),
                Err(AttemptFailure { error, opened }) => {
                    warn!(
                        label = %attempt.label,
                        state = ?session.state(),
                        "Synthesis attempt failed: {}",
                        error
                    );
                    any_opened |= opened;
                    failures.push(format!("{}: {}", attempt.label, error));
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(TTSError::Cancelled);
        }

        let mut message = failures.join("; ");
        if !any_opened && !self.config.has_expected_identity() {
            message.push_str(&format!(
                "; hint: connections were likely not accepted by this client identity \
                 (user agent does not contain '{EXPECTED_CLIENT_FAMILY}')"
            ));
        }

        Err(TTSError::AttemptsExhausted(message))
    }

    pub fn get_provider_info(&self) -> serde_json::Value {
        serde_json::json!({
            "provider": "edge-readaloud",
            "version": env!("CARGO_PKG_VERSION"),
            "api_type": "WebSocket",
            "endpoint": self.config.endpoint_url,
            "voice_list_endpoint": self.config.voice_list_url,
            "output_format": self.config.output_format,
            "mime_type": crate::core::tts::base::AUDIO_MIME_TYPE,
            "timeout_ms": self.config.effective_timeout_ms(None),
            "min_timeout_ms": MIN_TIMEOUT_MS,
            "clock_skew_seconds": self.skew.skew_seconds(),
            "attempts": ["auth-rfc1123", "auth-iso8601", "anon-rfc1123", "anon-iso8601"],
            "features": {
                "word_boundaries": true,
                "prosody": true,
                "cancellation": true,
                "security_token": true,
            },
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for EdgeTTS {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        options: SynthesisOptions,
    ) -> TTSResult<AudioBuffer> {
        EdgeTTS::synthesize(self, text, voice, options).await
    }

    async fn list_voices(&self) -> Vec<VoiceDescriptor> {
        self.catalog.list_voices().await
    }

    fn get_provider_info(&self) -> serde_json::Value {
        EdgeTTS::get_provider_info(self)
    }
}
