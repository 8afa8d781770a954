use std::path::PathBuf;

use tracing::{error, info};

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use anyhow::anyhow;

use readaloud_client::{
    ClientConfig,
    core::tts::{EdgeTTS, SynthesisOptions, edge::voices::filter_by_locale},
};

/// readaloud - Edge read-aloud speech synthesis client
#[derive(Parser, Debug)]
#[command(name = "readaloud")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize text to an MP3 file
    Speak {
        /// Text to speak
        #[arg(short = 't', long = "text")]
        text: String,

        /// Voice short name (defaults to the configured voice)
        #[arg(short = 'v', long = "voice")]
        voice: Option<String>,

        /// Output file path
        #[arg(short = 'o', long = "output", default_value = "output.mp3")]
        output: PathBuf,

        /// Per-attempt timeout in milliseconds
        #[arg(long = "timeout-ms")]
        timeout_ms: Option<u64>,
    },

    /// List available voices
    Voices {
        /// Only show voices whose locale starts with this prefix (e.g. en-US)
        #[arg(short = 'l', long = "locale")]
        locale: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file or environment
    let config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        ClientConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ClientConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    let tts = EdgeTTS::new(config.tts.clone()).map_err(|e| anyhow!(e.to_string()))?;

    match cli.command {
        Commands::Speak {
            text,
            voice,
            output,
            timeout_ms,
        } => {
            let voice = voice.unwrap_or_else(|| config.default_voice.clone());

            // Ctrl-C aborts the synthesis in flight
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal.cancel();
                }
            });

            let mut options = SynthesisOptions::default().with_cancellation(cancel);
            if let Some(timeout_ms) = timeout_ms {
                options = options.with_timeout_ms(timeout_ms);
            }

            let audio = match tts.synthesize(&text, &voice, options).await {
                Ok(audio) => audio,
                Err(e) => {
                    error!("Synthesis failed: {}", e);
                    return Err(anyhow!(e));
                }
            };

            tokio::fs::write(&output, &audio.data)
                .await
                .map_err(|e| anyhow!("Failed to write to {}: {}", output.display(), e))?;

            println!(
                "Wrote {} bytes ({}, {} word boundaries) to {}",
                audio.len(),
                audio.mime_type,
                audio.word_boundaries.len(),
                output.display()
            );
        }
        Commands::Voices { locale } => {
            let voices = tts.voice_catalog().list_voices().await;
            let voices = match locale {
                Some(prefix) => filter_by_locale(&voices, &prefix),
                None => voices,
            };

            for voice in &voices {
                println!(
                    "{:<40} {:<8} {:<8} {}",
                    voice.short_name, voice.locale, voice.gender, voice.friendly_name
                );
            }
            info!("Listed {} voices", voices.len());
        }
    }

    Ok(())
}
