//! Clock-skew guard for the signed timestamp.

use chrono::{DateTime, Utc};

use crate::result::TimestampResult;

/// Error reported when the timestamp is not a plain decimal integer.
pub const INVALID_TIMESTAMP_FORMAT: &str = "invalid timestamp format";
/// Error reported when the timestamp is too far from the verifier's clock.
pub const TIMESTAMP_OUT_OF_TOLERANCE: &str = "timestamp outside allowed skew";

/// Bounds the accepted difference between the signer's and verifier's clocks.
#[derive(Debug, Clone, Copy)]
pub struct TimestampGuard {
    tolerance_secs: u64,
}

impl TimestampGuard {
    /// Create a guard accepting up to `tolerance_secs` of skew in either direction.
    #[must_use]
    pub fn new(tolerance_secs: u64) -> Self {
        Self { tolerance_secs }
    }

    /// The configured tolerance in seconds.
    #[must_use]
    pub fn tolerance_secs(&self) -> u64 {
        self.tolerance_secs
    }

    /// Check a caller-supplied timestamp against `now`.
    ///
    /// The value must consist of ASCII digits only. Signs, whitespace,
    /// fractions and exponents are all rejected as malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::DateTime;
    /// use dualsig_auth::timestamp::TimestampGuard;
    ///
    /// let now = DateTime::from_timestamp(1_700_000_300, 0).unwrap();
    /// let result = TimestampGuard::new(120).check("1700000000", now);
    /// assert!(!result.valid);
    /// assert_eq!(result.skew_seconds, Some(300));
    /// ```
    #[must_use]
    pub fn check(&self, value: &str, now: DateTime<Utc>) -> TimestampResult {
        let Some(timestamp) = parse_unix_seconds(value) else {
            return TimestampResult {
                valid: false,
                value: None,
                skew_seconds: None,
                error: Some(INVALID_TIMESTAMP_FORMAT.to_owned()),
            };
        };

        let skew = now.timestamp().abs_diff(timestamp);
        let valid = skew <= self.tolerance_secs;

        TimestampResult {
            valid,
            value: Some(timestamp),
            skew_seconds: Some(skew),
            error: (!valid).then(|| TIMESTAMP_OUT_OF_TOLERANCE.to_owned()),
        }
    }
}

impl Default for TimestampGuard {
    fn default() -> Self {
        Self::new(dualsig_core::DEFAULT_TIMESTAMP_TOLERANCE_SECS)
    }
}

fn parse_unix_seconds(value: &str) -> Option<i64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
