//! Configuration module for the read-aloud client
//!
//! This module loads client configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//!
//! # Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `READALOUD_ENDPOINT_URL` | synthesis WebSocket endpoint |
//! | `READALOUD_VOICE_LIST_URL` | voice catalog endpoint |
//! | `READALOUD_TRUSTED_CLIENT_TOKEN` | trusted client token |
//! | `READALOUD_GEC_VERSION` | `Sec-MS-GEC-Version` value |
//! | `READALOUD_USER_AGENT` | handshake user agent |
//! | `READALOUD_OUTPUT_FORMAT` | audio output format |
//! | `READALOUD_TIMEOUT_MS` | per-attempt timeout |
//! | `READALOUD_VOICE` | default voice |
//! | `READALOUD_RATE` / `READALOUD_PITCH` / `READALOUD_VOLUME` | prosody |
//!
//! # Example
//! ```rust,no_run
//! use readaloud_client::config::ClientConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variable fallbacks
//! let config = ClientConfig::from_file(Path::new("config.yaml"))?;
//!
//! println!("Default voice: {}", config.default_voice);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use thiserror::Error;

use crate::core::tts::edge::{DEFAULT_VOICE, EdgeTTSConfig};
use crate::core::tts::TTSError;

mod yaml;

pub use yaml::{ServiceYaml, SynthesisYaml, YamlConfig};

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<TTSError> for ConfigError {
    fn from(err: TTSError) -> Self {
        match err {
            TTSError::InvalidConfiguration(msg) => Self::Invalid(msg),
            other => Self::Invalid(other.to_string()),
        }
    }
}

/// Client configuration
///
/// Contains the read-aloud client settings plus the default voice used by
/// the CLI when none is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub tts: EdgeTTSConfig,
    pub default_voice: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tts: EdgeTTSConfig::default(),
            default_voice: DEFAULT_VOICE.to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// Note: the .env file is loaded in main.rs at startup, so its values
    /// are visible here as ordinary environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, with environment variables as
    /// the base and YAML values taking precedence.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;

        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.apply_yaml(yaml_config);
        config.validate()?;

        Ok(config)
    }

    /// Build from defaults overridden by a variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();
        let tts = &mut config.tts;

        if let Some(v) = get("READALOUD_ENDPOINT_URL") {
            tts.endpoint_url = v;
        }
        if let Some(v) = get("READALOUD_VOICE_LIST_URL") {
            tts.voice_list_url = v;
        }
        if let Some(v) = get("READALOUD_TRUSTED_CLIENT_TOKEN") {
            tts.trusted_client_token = v;
        }
        if let Some(v) = get("READALOUD_GEC_VERSION") {
            tts.sec_ms_gec_version = v;
        }
        if let Some(v) = get("READALOUD_USER_AGENT") {
            tts.user_agent = v;
        }
        if let Some(v) = get("READALOUD_OUTPUT_FORMAT") {
            tts.output_format = v;
        }
        if let Some(v) = get("READALOUD_TIMEOUT_MS") {
            tts.timeout_ms = v.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    key: "READALOUD_TIMEOUT_MS",
                    value: v.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(v) = get("READALOUD_RATE") {
            tts.prosody.rate = v;
        }
        if let Some(v) = get("READALOUD_PITCH") {
            tts.prosody.pitch = v;
        }
        if let Some(v) = get("READALOUD_VOLUME") {
            tts.prosody.volume = v;
        }
        if let Some(v) = get("READALOUD_VOICE") {
            config.default_voice = v;
        }

        Ok(config)
    }

    /// Overlay values present in the YAML file.
    pub fn apply_yaml(&mut self, yaml: YamlConfig) {
        if let Some(service) = yaml.service {
            let tts = &mut self.tts;
            if let Some(v) = service.endpoint_url {
                tts.endpoint_url = v;
            }
            if let Some(v) = service.voice_list_url {
                tts.voice_list_url = v;
            }
            if let Some(v) = service.trusted_client_token {
                tts.trusted_client_token = v;
            }
            if let Some(v) = service.gec_version {
                tts.sec_ms_gec_version = v;
            }
            if let Some(v) = service.user_agent {
                tts.user_agent = v;
            }
        }

        if let Some(synthesis) = yaml.synthesis {
            let tts = &mut self.tts;
            if let Some(v) = synthesis.output_format {
                tts.output_format = v;
            }
            if let Some(v) = synthesis.timeout_ms {
                tts.timeout_ms = v;
            }
            if let Some(v) = synthesis.rate {
                tts.prosody.rate = v;
            }
            if let Some(v) = synthesis.pitch {
                tts.prosody.pitch = v;
            }
            if let Some(v) = synthesis.volume {
                tts.prosody.volume = v;
            }
            if let Some(v) = synthesis.voice {
                self.default_voice = v;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_voice.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default voice must not be empty".to_string(),
            ));
        }
        self.tts.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.default_voice, "en-US-AriaNeural");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("READALOUD_ENDPOINT_URL", "ws://localhost:9000/edge/v1"),
            ("READALOUD_TIMEOUT_MS", "8000"),
            ("READALOUD_VOICE", "en-GB-RyanNeural"),
            ("READALOUD_RATE", "-10%"),
            ("READALOUD_USER_AGENT", ""),
        ]))
        .unwrap();

        assert_eq!(config.tts.endpoint_url, "ws://localhost:9000/edge/v1");
        assert_eq!(config.tts.timeout_ms, 8_000);
        assert_eq!(config.default_voice, "en-GB-RyanNeural");
        assert_eq!(config.tts.prosody.rate, "-10%");
        // Empty values fall back to defaults
        assert!(config.tts.has_expected_identity());
    }

    #[test]
    fn test_invalid_timeout_env() {
        let result = ClientConfig::from_lookup(lookup(&[("READALOUD_TIMEOUT_MS", "fast")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                key: "READALOUD_TIMEOUT_MS",
                ..
            })
        ));
    }

    #[test]
    fn test_yaml_overrides_env() {
        let mut config = ClientConfig::from_lookup(lookup(&[
            ("READALOUD_VOICE", "en-GB-RyanNeural"),
            ("READALOUD_OUTPUT_FORMAT", "audio-16khz-32kbitrate-mono-mp3"),
        ]))
        .unwrap();

        config.apply_yaml(
            YamlConfig::from_str("synthesis:\n  voice: \"zh-CN-XiaoxiaoNeural\"\n").unwrap(),
        );

        assert_eq!(config.default_voice, "zh-CN-XiaoxiaoNeural");
        assert_eq!(config.tts.output_format, "audio-16khz-32kbitrate-mono-mp3");
    }

    #[test]
    fn test_from_file_validates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "service:\n  endpoint_url: \"https://not-a-socket.example.com\"\n")
            .unwrap();

        let result = ClientConfig::from_file(&path);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_file_applies_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "service:\n  endpoint_url: \"ws://127.0.0.1:9000/edge/v1\"\nsynthesis:\n  timeout_ms: 6000\n  pitch: \"+5Hz\"\n",
        )
        .unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.tts.endpoint_url, "ws://127.0.0.1:9000/edge/v1");
        assert_eq!(config.tts.timeout_ms, 6_000);
        assert_eq!(config.tts.prosody.pitch, "+5Hz");
    }

    #[test]
    fn test_empty_voice_rejected() {
        let config = ClientConfig {
            default_voice: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
