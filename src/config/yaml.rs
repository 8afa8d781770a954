use serde::Deserialize;
use std::path::Path;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// service:
///   endpoint_url: "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1"
///   voice_list_url: "https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voices/list"
///   trusted_client_token: "6A5AA1D4EAFF4E9FB37E23D68491D6F4"
///   gec_version: "1-143.0.3650.139"
///   user_agent: "Mozilla/5.0 ... Edg/143.0.0.0"
///
/// synthesis:
///   voice: "en-US-JennyNeural"
///   output_format: "audio-24khz-48kbitrate-mono-mp3"
///   timeout_ms: 25000
///   rate: "+0%"
///   pitch: "+0Hz"
///   volume: "+0%"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub service: Option<ServiceYaml>,
    pub synthesis: Option<SynthesisYaml>,
}

/// Remote service settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServiceYaml {
    pub endpoint_url: Option<String>,
    pub voice_list_url: Option<String>,
    pub trusted_client_token: Option<String>,
    pub gec_version: Option<String>,
    pub user_agent: Option<String>,
}

/// Synthesis defaults from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SynthesisYaml {
    pub voice: Option<String>,
    pub output_format: Option<String>,
    pub timeout_ms: Option<u64>,
    pub rate: Option<String>,
    pub pitch: Option<String>,
    pub volume: Option<String>,
}

impl YamlConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_str(&contents)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }
}
