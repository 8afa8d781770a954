//! Voice catalog.
//!
//! The catalog endpoint is plain HTTPS. Its `Date` response header is the
//! cheapest source of server time available, so every fetch also refines
//! the shared [`ClockSkew`].

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::header::{DATE, USER_AGENT};
use tracing::{debug, info, warn};
use url::Url;

use super::clock::ClockSkew;
use super::config::EdgeTTSConfig;
use super::token::TokenDeriver;
use crate::core::tts::base::{TTSError, TTSResult, VoiceDescriptor};

/// Voices returned when the catalog is unreachable or empty.
static BUILTIN_VOICES: Lazy<Vec<VoiceDescriptor>> = Lazy::new(|| {
    vec![
        VoiceDescriptor::new(
            "en-US-JennyNeural",
            "Microsoft Jenny Online (Natural) - English (United States)",
            "en-US",
            "Female",
        ),
        VoiceDescriptor::new(
            "en-US-AriaNeural",
            "Microsoft Aria Online (Natural) - English (United States)",
            "en-US",
            "Female",
        ),
        VoiceDescriptor::new(
            "en-US-GuyNeural",
            "Microsoft Guy Online (Natural) - English (United States)",
            "en-US",
            "Male",
        ),
        VoiceDescriptor::new(
            "en-GB-SoniaNeural",
            "Microsoft Sonia Online (Natural) - English (United Kingdom)",
            "en-GB",
            "Female",
        ),
        VoiceDescriptor::new(
            "en-GB-RyanNeural",
            "Microsoft Ryan Online (Natural) - English (United Kingdom)",
            "en-GB",
            "Male",
        ),
        VoiceDescriptor::new(
            "zh-CN-XiaoxiaoNeural",
            "Microsoft Xiaoxiao Online (Natural) - Chinese (Mainland)",
            "zh-CN",
            "Female",
        ),
        VoiceDescriptor::new(
            "ja-JP-NanamiNeural",
            "Microsoft Nanami Online (Natural) - Japanese (Japan)",
            "ja-JP",
            "Female",
        ),
    ]
});

/// Built-in fallback voice list.
pub fn builtin_voices() -> Vec<VoiceDescriptor> {
    BUILTIN_VOICES.clone()
}

/// Voices whose locale starts with `prefix` (case-insensitive).
pub fn filter_by_locale(voices: &[VoiceDescriptor], prefix: &str) -> Vec<VoiceDescriptor> {
    let prefix = prefix.to_ascii_lowercase();
    voices
        .iter()
        .filter(|v| v.locale.to_ascii_lowercase().starts_with(&prefix))
        .cloned()
        .collect()
}

/// HTTP client for the voice catalog.
pub struct VoiceCatalog {
    client: reqwest::Client,
    voice_list_url: String,
    trusted_client_token: String,
    user_agent: String,
    skew: Arc<ClockSkew>,
    deriver: Arc<TokenDeriver>,
}

impl VoiceCatalog {
    pub fn new(
        config: &EdgeTTSConfig,
        skew: Arc<ClockSkew>,
        deriver: Arc<TokenDeriver>,
    ) -> TTSResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.effective_timeout_ms(None)))
            .build()
            .map_err(|e| TTSError::InternalError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            voice_list_url: config.voice_list_url.clone(),
            trusted_client_token: config.trusted_client_token.clone(),
            user_agent: config.user_agent.clone(),
            skew,
            deriver,
        })
    }

    fn request_url(&self) -> TTSResult<Url> {
        let mut url = Url::parse(&self.voice_list_url).map_err(|e| {
            TTSError::InvalidConfiguration(format!(
                "voice_list_url '{}': {}",
                self.voice_list_url, e
            ))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("trustedclienttoken", &self.trusted_client_token);
            match self.deriver.derive() {
                Ok(token) => {
                    query.append_pair("Sec-MS-GEC", &token.token);
                    query.append_pair("Sec-MS-GEC-Version", &token.format_version);
                }
                Err(e) => warn!("Fetching voices without a security token: {}", e),
            }
        }

        Ok(url)
    }

    /// Fetch the catalog.
    ///
    /// The `Date` header is observed even when the status is an error.
    pub async fn fetch_voices(&self) -> TTSResult<Vec<VoiceDescriptor>> {
        let url = self.request_url()?;
        debug!(url = %url, "Fetching voice catalog");

        let local_at_request = self.skew.local_epoch_seconds();
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| TTSError::ProviderError(format!("Voice catalog request failed: {e}")))?;

        if let Some(date) = response.headers().get(DATE).and_then(|v| v.to_str().ok()) {
            self.skew.observe_date_header(date, local_at_request);
        }

        let status = response.status();
        if !status.is_success() {
            return Err(TTSError::ProviderError(format!(
                "Voice catalog returned HTTP {status}"
            )));
        }

        let voices: Vec<VoiceDescriptor> = response
            .json()
            .await
            .map_err(|e| TTSError::ProviderError(format!("Invalid voice catalog body: {e}")))?;

        info!("Fetched {} voices", voices.len());
        Ok(voices)
    }

    /// Catalog voices, or the built-in list when the catalog is unavailable
    /// or empty.
    pub async fn list_voices(&self) -> Vec<VoiceDescriptor> {
        match self.fetch_voices().await {
            Ok(voices) if !voices.is_empty() => voices,
            Ok(_) => {
                warn!("Voice catalog is empty, using built-in voices");
                builtin_voices()
            }
            Err(e) => {
                warn!("Voice catalog unavailable, using built-in voices: {}", e);
                builtin_voices()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_voices() {
        let voices = builtin_voices();
        assert_eq!(voices.len(), 7);
        assert!(voices.iter().any(|v| v.short_name == "en-US-JennyNeural"));
        assert!(voices.iter().any(|v| v.short_name == "ja-JP-NanamiNeural"));
    }

    #[test]
    fn test_filter_by_locale() {
        let voices = builtin_voices();
        assert_eq!(filter_by_locale(&voices, "en-US").len(), 3);
        assert_eq!(filter_by_locale(&voices, "en").len(), 5);
        assert_eq!(filter_by_locale(&voices, "ZH-cn").len(), 1);
        assert!(filter_by_locale(&voices, "fr-FR").is_empty());
    }

    #[test]
    fn test_request_url_carries_token() {
        let skew = Arc::new(ClockSkew::default());
        let deriver = Arc::new(TokenDeriver::new(skew.clone()));
        let catalog = VoiceCatalog::new(&EdgeTTSConfig::default(), skew, deriver).unwrap();

        let url = catalog.request_url().unwrap();
        let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(keys, ["trustedclienttoken", "Sec-MS-GEC", "Sec-MS-GEC-Version"]);
    }
}
