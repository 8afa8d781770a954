//! Clock skew tracking between the local clock and the service clock.
//!
//! The token derivation is time-boxed against *server* time, so a local clock
//! that is off by more than a few minutes produces rejected tokens. Any HTTP
//! response with a `Date` header can refine the estimate.
//!
//! Each observation is *added* to the running skew rather than replacing it.
//! Repeated observations compound instead of converging; this matches the
//! behaviour the service has been exercised against and is kept as-is.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::DateTime;
use parking_lot::Mutex;
use tracing::debug;

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch, with sub-second precision.
    fn now_epoch_seconds(&self) -> f64;
}

/// Wall clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }
}

/// Running estimate of `server time - local time`, in seconds.
///
/// Shared through `Arc` by the token deriver and the voice catalog. Writes go
/// through a single mutex so concurrent observations are applied one at a
/// time.
pub struct ClockSkew {
    clock: Arc<dyn Clock>,
    skew_seconds: Mutex<f64>,
}

impl Default for ClockSkew {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for ClockSkew {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockSkew")
            .field("skew_seconds", &self.skew_seconds())
            .finish()
    }
}

impl ClockSkew {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            skew_seconds: Mutex::new(0.0),
        }
    }

    /// Local epoch seconds, without correction.
    #[inline]
    pub fn local_epoch_seconds(&self) -> f64 {
        self.clock.now_epoch_seconds()
    }

    /// Local epoch seconds corrected by the current skew.
    pub fn current_adjusted_epoch_seconds(&self) -> f64 {
        self.local_epoch_seconds() + self.skew_seconds()
    }

    /// Current skew in seconds.
    pub fn skew_seconds(&self) -> f64 {
        *self.skew_seconds.lock()
    }

    /// Record a server time sample taken at `local_epoch_seconds_at_request`.
    pub fn observe(&self, server_epoch_seconds: f64, local_epoch_seconds_at_request: f64) {
        if !server_epoch_seconds.is_finite() || !local_epoch_seconds_at_request.is_finite() {
            return;
        }

        let mut skew = self.skew_seconds.lock();
        *skew += server_epoch_seconds - local_epoch_seconds_at_request;
        debug!("Clock skew updated to {:.3}s", *skew);
    }

    /// Record the server time carried by an HTTP `Date` header.
    ///
    /// Returns `true` when the header parsed and the skew was updated.
    pub fn observe_date_header(&self, value: &str, local_epoch_seconds_at_request: f64) -> bool {
        match parse_http_date(value) {
            Some(server) => {
                self.observe(server, local_epoch_seconds_at_request);
                true
            }
            None => {
                debug!("Ignoring unparseable Date header: {}", value);
                false
            }
        }
    }
}

/// Parse an HTTP `Date` value (IMF-fixdate / RFC 2822) to epoch seconds.
pub fn parse_http_date(value: &str) -> Option<f64> {
    let parsed = DateTime::parse_from_rfc2822(value.trim()).ok()?;
    Some(parsed.timestamp() as f64 + f64::from(parsed.timestamp_subsec_millis()) / 1000.0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Clock pinned to a settable instant.
    pub(crate) struct FixedClock(pub Mutex<f64>);

    impl FixedClock {
        pub(crate) fn at(seconds: f64) -> Arc<Self> {
            Arc::new(Self(Mutex::new(seconds)))
        }

        pub(crate) fn set(&self, seconds: f64) {
            *self.0.lock() = seconds;
        }
    }

    impl Clock for FixedClock {
        fn now_epoch_seconds(&self) -> f64 {
            *self.0.lock()
        }
    }

    #[test]
    fn test_initial_skew_is_zero() {
        let skew = ClockSkew::new(FixedClock::at(1_000.0));
        assert_eq!(skew.skew_seconds(), 0.0);
        assert_eq!(skew.current_adjusted_epoch_seconds(), 1_000.0);
    }

    #[test]
    fn test_observe_adjusts_current_time() {
        let skew = ClockSkew::new(FixedClock::at(1_000.0));
        skew.observe(1_120.0, 1_000.0);
        assert_eq!(skew.skew_seconds(), 120.0);
        assert_eq!(skew.current_adjusted_epoch_seconds(), 1_120.0);
    }

    #[test]
    fn test_observations_accumulate() {
        let skew = ClockSkew::new(FixedClock::at(0.0));
        skew.observe(110.0, 100.0);
        skew.observe(110.0, 100.0);
        assert_eq!(skew.skew_seconds(), 20.0);

        skew.observe(90.0, 100.0);
        assert_eq!(skew.skew_seconds(), 10.0);
    }

    #[test]
    fn test_observe_date_header() {
        let skew = ClockSkew::new(FixedClock::at(0.0));
        // 2024-01-01T00:00:00Z
        let applied = skew.observe_date_header("Mon, 01 Jan 2024 00:00:00 GMT", 1_704_067_140.0);
        assert!(applied);
        assert_eq!(skew.skew_seconds(), 60.0);
    }

    #[test]
    fn test_invalid_date_header_is_ignored() {
        let skew = ClockSkew::new(FixedClock::at(0.0));
        assert!(!skew.observe_date_header("not a date", 100.0));
        assert!(!skew.observe_date_header("", 100.0));
        assert_eq!(skew.skew_seconds(), 0.0);
    }

    #[test]
    fn test_non_finite_samples_are_ignored() {
        let skew = ClockSkew::new(FixedClock::at(0.0));
        skew.observe(f64::NAN, 1.0);
        skew.observe(1.0, f64::INFINITY);
        assert_eq!(skew.skew_seconds(), 0.0);
    }

    #[test]
    fn test_parse_http_date() {
        assert_eq!(
            parse_http_date("Thu, 01 Jan 1970 00:01:40 GMT"),
            Some(100.0)
        );
        assert_eq!(parse_http_date("garbage"), None);
    }
}
