//! Frame codec for the read-aloud WebSocket dialect.
//!
//! Every message, in both directions, is a header block of `Key:Value` lines
//! separated by `\r\n`, followed by a blank line and a body:
//!
//! ```text
//! X-RequestId:5f0c…\r\n
//! Content-Type:application/ssml+xml\r\n
//! X-Timestamp:Sat, 17 Oct 2026 08:05:09 GMT+0000 (Coordinated Universal Time)Z\r\n
//! Path:ssml\r\n
//! \r\n
//! <speak …>…</speak>
//! ```
//!
//! Inbound binary messages carry the same header block behind a 2-byte
//! big-endian length prefix, followed by the raw audio payload:
//!
//! ```text
//! ┌────────┬──────────────────────────┬───────────────┐
//! │ u16 BE │ header block (L bytes)   │ audio payload │
//! └────────┴──────────────────────────┴───────────────┘
//! ```
//!
//! Exact key names, colon-no-space formatting and `\r\n` line endings are
//! load-bearing; the service parses them literally.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::tts::base::WordBoundary;

/// Header block / body separator.
const HEADER_SEPARATOR: &str = "\r\n\r\n";

// =============================================================================
// Frame
// =============================================================================

/// WebSocket message type a frame was decoded from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameKind {
    /// Control signal; its body is never audio.
    #[default]
    Text,
    Binary,
}

/// Decoded wire unit: headers plus an optional payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub headers: HashMap<String, String>,
    pub payload: Bytes,
}

impl Frame {
    /// Header value by case-insensitive key.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// The `Path` header, if any.
    #[inline]
    pub fn path(&self) -> Option<&str> {
        self.header("Path")
    }

    /// Payload interpreted as UTF-8 text (lossy).
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Parse `Key:Value` lines; lines with no `:` or a leading `:` are skipped.
fn parse_header_lines(block: &str) -> HashMap<String, String> {
    block
        .split("\r\n")
        .filter_map(|line| match line.find(':') {
            Some(idx) if idx > 0 => Some((
                line[..idx].to_string(),
                line[idx + 1..].trim().to_string(),
            )),
            _ => None,
        })
        .collect()
}

/// Decode a text frame.
///
/// Splits on the first blank line; a frame without one is all headers.
pub fn decode_text_frame(text: &str) -> Frame {
    let (block, body) = match text.find(HEADER_SEPARATOR) {
        Some(idx) => (&text[..idx], &text[idx + HEADER_SEPARATOR.len()..]),
        None => (text, ""),
    };

    Frame {
        kind: FrameKind::Text,
        headers: parse_header_lines(block),
        payload: Bytes::copy_from_slice(body.as_bytes()),
    }
}

/// Decode a length-prefixed binary frame. Never fails.
///
/// A buffer shorter than the prefix yields an empty frame. A zero or
/// oversized header length degrades to "no headers, everything after the
/// prefix is payload".
pub fn decode_binary_frame(data: &Bytes) -> Frame {
    if data.len() < 2 {
        return Frame {
            kind: FrameKind::Binary,
            ..Default::default()
        };
    }

    let header_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if header_len == 0 || 2 + header_len > data.len() {
        return Frame {
            kind: FrameKind::Binary,
            headers: HashMap::new(),
            payload: data.slice(2..),
        };
    }

    let block = String::from_utf8_lossy(&data[2..2 + header_len]);
    Frame {
        kind: FrameKind::Binary,
        headers: parse_header_lines(&block),
        payload: data.slice(2 + header_len..),
    }
}

// =============================================================================
// Routing
// =============================================================================

/// What the session should do with a decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameAction {
    /// End of turn: close the socket.
    TurnEnd,
    /// Append to the audio buffer.
    Audio(Bytes),
    /// Word boundary / sentence metadata JSON.
    Metadata(String),
    /// Nothing to do.
    Ignore,
}

/// Dispatch a frame by its `Path` header.
///
/// Audio is only ever taken from binary frames.
pub fn route_frame(frame: &Frame) -> FrameAction {
    let Some(path) = frame.path() else {
        return FrameAction::Ignore;
    };

    if path.eq_ignore_ascii_case("turn.end") {
        FrameAction::TurnEnd
    } else if path.eq_ignore_ascii_case("audio") {
        if frame.kind != FrameKind::Binary || frame.payload.is_empty() {
            return FrameAction::Ignore;
        }
        if let Some(content_type) = frame.header("Content-Type")
            && !content_type.to_ascii_lowercase().starts_with("audio/")
        {
            debug!("Dropping audio frame with content type '{}'", content_type);
            return FrameAction::Ignore;
        }
        FrameAction::Audio(frame.payload.clone())
    } else if path.eq_ignore_ascii_case("audio.metadata") {
        FrameAction::Metadata(frame.body_text())
    } else {
        FrameAction::Ignore
    }
}

// =============================================================================
// Timestamps
// =============================================================================

/// Textual timestamp encodings accepted by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampFormat {
    /// `Sat, 17 Oct 2026 08:05:09 GMT+0000 (Coordinated Universal Time)`
    Rfc1123Like,
    /// `20261017T080509`
    IsoCompact,
}

impl TimestampFormat {
    pub fn format(&self, at: DateTime<Utc>) -> String {
        match self {
            Self::Rfc1123Like => format!(
                "{} GMT+0000 (Coordinated Universal Time)",
                at.format("%a, %d %b %Y %H:%M:%S")
            ),
            Self::IsoCompact => at.format("%Y%m%dT%H%M%S").to_string(),
        }
    }

    /// Suffix used in attempt labels.
    pub fn label_suffix(&self) -> &'static str {
        match self {
            Self::Rfc1123Like => "rfc1123",
            Self::IsoCompact => "iso8601",
        }
    }
}

// =============================================================================
// Outbound Messages
// =============================================================================

#[derive(Debug, Serialize)]
struct SpeechConfigBody<'a> {
    context: SpeechConfigContext<'a>,
}

#[derive(Debug, Serialize)]
struct SpeechConfigContext<'a> {
    synthesis: SpeechConfigSynthesis<'a>,
}

#[derive(Debug, Serialize)]
struct SpeechConfigSynthesis<'a> {
    audio: SpeechConfigAudio<'a>,
}

#[derive(Debug, Serialize)]
struct SpeechConfigAudio<'a> {
    metadataoptions: MetadataOptions,
    #[serde(rename = "outputFormat")]
    output_format: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MetadataOptions {
    sentence_boundary_enabled: &'static str,
    word_boundary_enabled: &'static str,
}

/// Speech-config JSON body.
pub fn speech_config_body(output_format: &str) -> String {
    let body = SpeechConfigBody {
        context: SpeechConfigContext {
            synthesis: SpeechConfigSynthesis {
                audio: SpeechConfigAudio {
                    metadataoptions: MetadataOptions {
                        sentence_boundary_enabled: "false",
                        word_boundary_enabled: "true",
                    },
                    output_format,
                },
            },
        },
    };

    // Plain string fields cannot fail to serialize
    serde_json::to_string(&body).unwrap_or_default()
}

/// Speech-config message, sent first on every socket.
pub fn encode_speech_config(timestamp: &str, output_format: &str) -> String {
    format!(
        "X-Timestamp:{timestamp}\r\n\
         Content-Type:application/json; charset=utf-8\r\n\
         Path:speech.config\r\n\r\n\
         {}",
        speech_config_body(output_format)
    )
}

/// SSML message. The service expects a trailing `Z` on this timestamp
/// whatever its format.
pub fn encode_ssml(request_id: &str, timestamp: &str, ssml: &str) -> String {
    format!(
        "X-RequestId:{request_id}\r\n\
         Content-Type:application/ssml+xml\r\n\
         X-Timestamp:{timestamp}Z\r\n\
         Path:ssml\r\n\r\n\
         {ssml}"
    )
}

// =============================================================================
// SSML
// =============================================================================

/// Prosody settings applied to the whole utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prosody {
    /// e.g. "+0%", "-10%"
    pub rate: String,
    /// e.g. "+0Hz", "+5Hz"
    pub pitch: String,
    /// e.g. "+0%", "-20%"
    pub volume: String,
}

impl Default for Prosody {
    fn default() -> Self {
        Self {
            rate: "+0%".to_string(),
            pitch: "+0Hz".to_string(),
            volume: "+0%".to_string(),
        }
    }
}

/// Replace control characters the service rejects with spaces.
///
/// Tab, line feed and carriage return are kept.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' => ' ',
            other => other,
        })
        .collect()
}

/// Escape the five XML special characters.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Build the SSML document.
///
/// `text` must already be sanitized and escaped; `voice` and the prosody
/// values are escaped here.
pub fn build_ssml(text: &str, voice: &str, prosody: &Prosody) -> String {
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='en-US'>\
         <voice name='{}'>\
         <prosody pitch='{}' rate='{}' volume='{}'>{text}</prosody>\
         </voice></speak>",
        escape_xml(voice),
        escape_xml(&prosody.pitch),
        escape_xml(&prosody.rate),
        escape_xml(&prosody.volume),
    )
}

// =============================================================================
// Metadata
// =============================================================================

#[derive(Debug, Deserialize)]
struct MetadataEnvelope {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<MetadataEntry>,
}

#[derive(Debug, Deserialize)]
struct MetadataEntry {
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "Data")]
    data: Option<MetadataData>,
}

#[derive(Debug, Deserialize)]
struct MetadataData {
    #[serde(rename = "Offset", default)]
    offset: u64,
    #[serde(rename = "Duration", default)]
    duration: u64,
    text: Option<MetadataText>,
}

#[derive(Debug, Deserialize)]
struct MetadataText {
    #[serde(rename = "Text", default)]
    text: String,
}

/// Extract word boundaries from an `audio.metadata` body.
///
/// Entries of other types are skipped.
pub fn parse_word_boundaries(body: &str) -> Result<Vec<WordBoundary>, serde_json::Error> {
    let envelope: MetadataEnvelope = serde_json::from_str(body)?;

    Ok(envelope
        .metadata
        .into_iter()
        .filter(|entry| entry.kind == "WordBoundary")
        .filter_map(|entry| entry.data)
        .map(|data| WordBoundary {
            offset: data.offset,
            duration: data.duration,
            text: data.text.map(|t| t.text).unwrap_or_default(),
        })
        .collect())
}
