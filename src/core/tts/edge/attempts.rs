//! Connection variants tried for one synthesis call.
//!
//! The service has been seen to reject tokens or timestamp encodings
//! intermittently, so a call walks an ordered list of variants:
//!
//! | Label           | `Sec-MS-GEC` | Timestamp       |
//! |-----------------|--------------|-----------------|
//! | `auth-rfc1123`  | yes          | RFC 1123-like   |
//! | `auth-iso8601`  | yes          | ISO 8601 basic  |
//! | `anon-rfc1123`  | no           | RFC 1123-like   |
//! | `anon-iso8601`  | no           | ISO 8601 basic  |
//!
//! Each token-bearing variant carries its own freshly derived token.

use tracing::warn;
use url::Url;
use uuid::Uuid;

use super::config::EdgeTTSConfig;
use super::messages::TimestampFormat;
use super::token::{SecurityToken, TokenDeriver};
use crate::core::tts::base::{TTSError, TTSResult};

const TIMESTAMP_FORMATS: [TimestampFormat; 2] =
    [TimestampFormat::Rfc1123Like, TimestampFormat::IsoCompact];

/// One connection variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttempt {
    /// Full WebSocket URL including query parameters.
    pub endpoint_url: String,
    pub timestamp_format: TimestampFormat,
    /// e.g. "auth-rfc1123"
    pub label: String,
    /// Whether the URL carries a security token.
    pub authenticated: bool,
}

/// Build the endpoint URL for one attempt.
///
/// Query order: `TrustedClientToken`, optional `Sec-MS-GEC` and
/// `Sec-MS-GEC-Version`, then `ConnectionId`.
pub fn build_endpoint_url(
    config: &EdgeTTSConfig,
    token: Option<&SecurityToken>,
) -> TTSResult<String> {
    let mut url = Url::parse(&config.endpoint_url).map_err(|e| {
        TTSError::InvalidConfiguration(format!("endpoint_url '{}': {}", config.endpoint_url, e))
    })?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("TrustedClientToken", &config.trusted_client_token);
        if let Some(token) = token {
            query.append_pair("Sec-MS-GEC", &token.token);
            query.append_pair("Sec-MS-GEC-Version", &token.format_version);
        }
        query.append_pair("ConnectionId", &Uuid::new_v4().to_string());
    }

    Ok(url.into())
}

/// Ordered attempts for one synthesis call: token-bearing first.
///
/// A token-bearing attempt whose token cannot be derived is left out.
pub fn build_attempts(
    config: &EdgeTTSConfig,
    deriver: &TokenDeriver,
) -> TTSResult<Vec<ConnectionAttempt>> {
    let mut attempts = Vec::with_capacity(4);

    for format in TIMESTAMP_FORMATS {
        match deriver.derive() {
            Ok(token) => attempts.push(ConnectionAttempt {
                endpoint_url: build_endpoint_url(config, Some(&token))?,
                timestamp_format: format,
                label: format!("auth-{}", format.label_suffix()),
                authenticated: true,
            }),
            Err(e) => {
                warn!(
                    "Security token unavailable, skipping auth-{} attempt: {}",
                    format.label_suffix(),
                    e
                );
            }
        }
    }

    for format in TIMESTAMP_FORMATS {
        attempts.push(ConnectionAttempt {
            endpoint_url: build_endpoint_url(config, None)?,
            timestamp_format: format,
            label: format!("anon-{}", format.label_suffix()),
            authenticated: false,
        });
    }

    Ok(attempts)
}
