mod base;
pub mod edge;

pub use base::{
    AUDIO_MIME_TYPE, AudioBuffer, SocketInfo, SocketObserver, SpeechSynthesizer,
    SynthesisOptions, TTSError, TTSResult, VoiceDescriptor, WordBoundary,
};
pub use edge::{
    DEFAULT_VOICE, EDGE_TTS_VOICE_LIST_URL, EDGE_TTS_WSS_URL, EdgeTTS, EdgeTTSConfig, Prosody,
};
use std::collections::HashMap;

/// Factory function to create a speech synthesizer.
///
/// # Supported Providers
///
/// - `"edge"`, `"edge-tts"` or `"readaloud"` - Edge read-aloud WebSocket service
///
/// # Example
///
/// ```rust,no_run
/// use readaloud_client::core::tts::{EdgeTTSConfig, create_tts_provider};
///
/// let provider = create_tts_provider("edge", EdgeTTSConfig::default())?;
/// # Ok::<(), readaloud_client::core::tts::TTSError>(())
/// ```
pub fn create_tts_provider(
    provider_type: &str,
    config: EdgeTTSConfig,
) -> TTSResult<Box<dyn SpeechSynthesizer>> {
    match provider_type.to_lowercase().as_str() {
        "edge" | "edge-tts" | "edge_tts" | "readaloud" | "read-aloud" => {
            Ok(Box::new(EdgeTTS::new(config)?))
        }
        _ => Err(TTSError::InvalidConfiguration(format!(
            "Unsupported TTS provider: {provider_type}. Supported providers: edge"
        ))),
    }
}

/// Returns a map of provider names to their default endpoint URLs.
pub fn get_tts_provider_urls() -> HashMap<String, String> {
    let mut urls = HashMap::new();
    urls.insert("edge".to_string(), EDGE_TTS_WSS_URL.to_string());
    urls.insert("edge-voices".to_string(), EDGE_TTS_VOICE_LIST_URL.to_string());
    urls
}
