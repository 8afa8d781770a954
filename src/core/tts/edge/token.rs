//! `Sec-MS-GEC` security token derivation.

use std::sync::Arc;

use tracing::debug;

use super::clock::ClockSkew;
use super::digest::DigestEngine;
use super::{SEC_MS_GEC_VERSION, TOKEN_WINDOW_SECS, TRUSTED_CLIENT_TOKEN, WINDOWS_EPOCH_OFFSET_SECS};
use crate::core::tts::base::{TTSError, TTSResult};

/// Hundred-nanosecond ticks per second.
const TICKS_PER_SECOND: u64 = 10_000_000;

/// A time-boxed authentication token and its format version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityToken {
    /// 64 uppercase hex characters
    pub token: String,
    /// Value for `Sec-MS-GEC-Version`
    pub format_version: String,
}

/// Derives security tokens from skew-corrected time.
pub struct TokenDeriver {
    skew: Arc<ClockSkew>,
    digest: DigestEngine,
    secret: String,
    format_version: String,
}

impl TokenDeriver {
    pub fn new(skew: Arc<ClockSkew>) -> Self {
        Self::with_parts(
            skew,
            DigestEngine::default(),
            TRUSTED_CLIENT_TOKEN,
            SEC_MS_GEC_VERSION,
        )
    }

    pub fn with_parts(
        skew: Arc<ClockSkew>,
        digest: DigestEngine,
        secret: impl Into<String>,
        format_version: impl Into<String>,
    ) -> Self {
        Self {
            skew,
            digest,
            secret: secret.into(),
            format_version: format_version.into(),
        }
    }

    /// Derive a token for the current skew-corrected time.
    pub fn derive(&self) -> TTSResult<SecurityToken> {
        self.derive_at(self.skew.current_adjusted_epoch_seconds())
    }

    /// Derive a token for a given adjusted Unix time.
    pub fn derive_at(&self, adjusted_epoch_seconds: f64) -> TTSResult<SecurityToken> {
        let ticks = window_ticks(adjusted_epoch_seconds)?;
        let input = format!("{ticks}{}", self.secret);
        let token = self.digest.digest_hex_upper(input.as_bytes());

        debug!("Derived security token for window starting at tick {}", ticks);

        Ok(SecurityToken {
            token,
            format_version: self.format_version.clone(),
        })
    }
}

/// Windows-epoch tick count of the 300-second window containing the instant.
pub fn window_ticks(adjusted_epoch_seconds: f64) -> TTSResult<u64> {
    if !adjusted_epoch_seconds.is_finite() || adjusted_epoch_seconds < 0.0 {
        return Err(TTSError::TokenDerivation(format!(
            "clock reading {adjusted_epoch_seconds} is not a valid epoch time"
        )));
    }

    let windows_seconds = (adjusted_epoch_seconds.floor() as u64)
        .checked_add(WINDOWS_EPOCH_OFFSET_SECS)
        .ok_or_else(|| TTSError::TokenDerivation("clock reading overflows".to_string()))?;
    let rounded = windows_seconds - windows_seconds % TOKEN_WINDOW_SECS;

    rounded
        .checked_mul(TICKS_PER_SECOND)
        .ok_or_else(|| TTSError::TokenDerivation("tick count overflows".to_string()))
}
