//! Endpoint URL validation.
//!
//! Endpoints are overridable from configuration, mostly to point the client
//! at a local mock service. The checks here make sure an override:
//! - Parses as an absolute URL with a host
//! - Uses a scheme the corresponding client can speak (`wss`/`ws`, `https`/`http`)
//!
//! Plaintext schemes are accepted but logged unless the host is loopback.

use thiserror::Error;
use tracing::warn;
use url::Url;

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be {expected}, got: {got}")]
    UnsupportedScheme { expected: &'static str, got: String },

    #[error("URL must have a host")]
    MissingHost,
}

/// Whether the URL's host is loopback (`localhost`, `127.0.0.0/8`, `::1`).
pub fn is_loopback_host(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

fn validate_with_schemes(
    url: &str,
    secure: &'static str,
    plain: &'static str,
    expected: &'static str,
) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;

    let scheme = parsed.scheme();
    if scheme != secure && scheme != plain {
        return Err(UrlValidationError::UnsupportedScheme {
            expected,
            got: scheme.to_string(),
        });
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    if scheme == plain && !is_loopback_host(&parsed) {
        warn!(url = %parsed, "Endpoint uses an unencrypted scheme");
    }

    Ok(parsed)
}

/// Validates a WebSocket endpoint (`wss://` or `ws://`).
///
/// # Example
/// ```
/// use readaloud_client::utils::url_validation::validate_websocket_url;
///
/// assert!(validate_websocket_url("wss://speech.platform.bing.com/v1").is_ok());
/// assert!(validate_websocket_url("ws://127.0.0.1:9000/v1").is_ok());
/// assert!(validate_websocket_url("https://speech.platform.bing.com/v1").is_err());
/// ```
pub fn validate_websocket_url(url: &str) -> Result<Url, UrlValidationError> {
    validate_with_schemes(url, "wss", "ws", "wss or ws")
}

/// Validates an HTTP endpoint (`https://` or `http://`).
pub fn validate_http_url(url: &str) -> Result<Url, UrlValidationError> {
    validate_with_schemes(url, "https", "http", "https or http")
}
