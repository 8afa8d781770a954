pub mod tts;

// Re-export commonly used types for convenience
pub use tts::{
    AudioBuffer, EdgeTTS, EdgeTTSConfig, SpeechSynthesizer, SynthesisOptions, TTSError,
    TTSResult, VoiceDescriptor, create_tts_provider, get_tts_provider_urls,
};
