//! Per-request verification outcome.
//!
//! A [`ValidationResult`] is created fresh for every request, consumed by the
//! caller to allow or deny it, logged, and dropped. Its `Serialize` output is
//! meant for internal logs: recomputed signatures are skipped so they never
//! reach a log sink. Callers answering the remote peer should only ever send
//! [`ValidationResult::outward_message`].

use serde::Serialize;

/// The generic message returned to a caller whose request was rejected.
pub const AUTHENTICATION_FAILED: &str = "authentication failed";

/// Which signature version(s) authenticated the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchedVersion {
    /// Only the legacy v1 signature matched.
    V1,
    /// Only the v2 signature matched.
    V2,
    /// Both signatures matched.
    Both,
    /// No signature matched.
    None,
}

impl MatchedVersion {
    /// Combine the outcome of the individual version checks.
    #[must_use]
    pub fn from_outcomes(v1_valid: bool, v2_valid: bool) -> Self {
        match (v1_valid, v2_valid) {
            (true, true) => Self::Both,
            (true, false) => Self::V1,
            (false, true) => Self::V2,
            (false, false) => Self::None,
        }
    }

    /// The lowercase name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
            Self::Both => "both",
            Self::None => "none",
        }
    }
}

/// Monitoring reason code for a rejected request.
///
/// Replays carry their own code so they can be told apart from plain
/// signature failures on dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// A required header was absent or unreadable.
    MissingHeader,
    /// The timestamp was not a decimal integer.
    InvalidTimestamp,
    /// The timestamp was outside the allowed skew.
    TimestampSkew,
    /// The nonce had already been used.
    ReplayDetected,
    /// A signature was checked and did not match.
    SignatureMismatch,
    /// No signature for an accepted version was supplied.
    NoAcceptableSignature,
}

impl RejectReason {
    /// The snake_case code used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingHeader => "missing_header",
            Self::InvalidTimestamp => "invalid_timestamp",
            Self::TimestampSkew => "timestamp_skew",
            Self::ReplayDetected => "replay_detected",
            Self::SignatureMismatch => "signature_mismatch",
            Self::NoAcceptableSignature => "no_acceptable_signature",
        }
    }
}

/// Outcome of one version's signature check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureCheck {
    /// Whether the supplied signature matched.
    pub valid: bool,
    /// The recomputed signature. Never serialized.
    #[serde(skip_serializing)]
    pub signature: String,
    /// Why the check failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of the timestamp check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampResult {
    /// Whether the timestamp was well-formed and within tolerance.
    pub valid: bool,
    /// The parsed unix seconds, when well-formed.
    pub value: Option<i64>,
    /// `|now - value|` in seconds, when well-formed.
    pub skew_seconds: Option<u64>,
    /// Why the check failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of the nonce replay check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceResult {
    /// Whether the nonce was unused, or absent.
    pub valid: bool,
    /// The nonce that was checked. `None` means the caller sent none and the
    /// request is not covered by replay protection.
    pub nonce: Option<String>,
    /// Whether the verdict came from the process-local cache rather than
    /// the distributed store.
    pub cached: bool,
    /// Why the check failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NonceResult {
    /// The result for a request that carried no nonce.
    #[must_use]
    pub fn uncovered() -> Self {
        Self {
            valid: true,
            nonce: None,
            cached: false,
            error: None,
        }
    }
}

/// The combined verdict for one request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Whether the request is authentic, fresh, and not a replay.
    pub valid: bool,
    /// Which version(s) matched.
    pub version: MatchedVersion,
    /// The v1 check, when it was attempted.
    pub v1_result: Option<SignatureCheck>,
    /// The v2 check, when it was attempted.
    pub v2_result: Option<SignatureCheck>,
    /// The timestamp check.
    pub timestamp_result: TimestampResult,
    /// The nonce check.
    pub nonce_result: NonceResult,
    /// Non-fatal observations, in the order they were made.
    pub warnings: Vec<String>,
    /// Why the request was rejected, if it was.
    pub reason: Option<RejectReason>,
}

impl ValidationResult {
    /// A rejection raised before any check could run, e.g. a missing header.
    #[must_use]
    pub fn malformed(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            version: MatchedVersion::None,
            v1_result: None,
            v2_result: None,
            timestamp_result: TimestampResult {
                valid: false,
                value: None,
                skew_seconds: None,
                error: Some(error.into()),
            },
            nonce_result: NonceResult::uncovered(),
            warnings: Vec::new(),
            reason: Some(RejectReason::MissingHeader),
        }
    }

    /// The only message that may be returned to the remote caller.
    ///
    /// `None` when the request is valid.
    #[must_use]
    pub fn outward_message(&self) -> Option<&'static str> {
        (!self.valid).then_some(AUTHENTICATION_FAILED)
    }

    /// Whether v1 and v2 were both checked and disagreed.
    #[must_use]
    pub fn has_version_mismatch(&self) -> bool {
        matches!(
            (&self.v1_result, &self.v2_result),
            (Some(v1), Some(v2)) if v1.valid != v2.valid
        )
    }
}
