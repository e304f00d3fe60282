//! The per-request validation pipeline.
//!
//! [`SignatureValidator::validate`] runs the checks in a fixed order against
//! one snapshot of the rollout policy:
//!
//! 1. the timestamp is parsed and checked against the allowed skew;
//! 2. each signature version the current phase accepts, and for which a
//!    header was supplied, is recomputed and compared in constant time. If
//!    v1 and v2 are both checked and disagree the request is rejected and a
//!    security event is logged;
//! 3. the nonce is atomically claimed when the request is otherwise
//!    acceptable, and only looked up otherwise, so a forged or stale request
//!    cannot burn a legitimate caller's nonce.
//!
//! The outcome is always a [`ValidationResult`]. Nothing is returned as an
//! error, and one structured log event is emitted per call.

use std::sync::Arc;
use std::time::Instant;

use dualsig_core::{Clock, SignatureConfig};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::headers::SignatureHeaders;
use crate::nonce::{NonceGuard, NonceStore};
use crate::result::{
    MatchedVersion, NonceResult, RejectReason, SignatureCheck, TimestampResult, ValidationResult,
};
use crate::rollout::{RolloutController, RolloutPolicy};
use crate::signer::{SigningInput, constant_time_eq, sign};
use crate::timestamp::TimestampGuard;

/// Warning recorded when a v1 signature arrives after v1 acceptance ended.
pub const V1_IGNORED_WARNING: &str = "v1 signature provided but validation disabled";
/// Warning recorded when the nonce store could not be consulted.
pub const NONCE_DEGRADED_WARNING: &str = "nonce store unavailable, replay check used local cache";
/// Warning recorded when v1 and v2 disagree.
pub const VERSION_MISMATCH_WARNING: &str = "v1 and v2 signatures disagree";
/// Error attached to a signature check that did not match.
pub const SIGNATURE_MISMATCH: &str = "signature mismatch";

/// Log target for security-relevant events.
pub const SECURITY_LOG_TARGET: &str = "dualsig::security";

/// One request as seen by the validator.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    /// HTTP method.
    pub method: &'a str,
    /// Path with raw query string.
    pub path: &'a str,
    /// Raw body bytes.
    pub body: &'a [u8],
    /// Signature headers.
    pub headers: &'a SignatureHeaders,
}

impl SignedRequest<'_> {
    fn signing_input(&self) -> SigningInput<'_> {
        SigningInput {
            method: self.method,
            path: self.path,
            timestamp: &self.headers.timestamp,
            nonce: self.headers.nonce.as_deref(),
            body: self.body,
        }
    }
}

/// Validates signed requests.
///
/// Cheap to share behind an `Arc`; every method takes `&self` and concurrent
/// validations do not block each other.
#[derive(Debug)]
pub struct SignatureValidator {
    rollout: Arc<RolloutController>,
    timestamps: TimestampGuard,
    nonces: NonceGuard,
    clock: Arc<dyn Clock>,
}

impl SignatureValidator {
    /// Assemble a validator from its parts.
    pub fn new(
        rollout: Arc<RolloutController>,
        timestamps: TimestampGuard,
        nonces: NonceGuard,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rollout,
            timestamps,
            nonces,
            clock,
        }
    }

    /// Build a validator from loaded configuration and a nonce store.
    pub fn from_config(
        config: &SignatureConfig,
        store: Arc<dyn NonceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rollout = Arc::new(RolloutController::new(
            RolloutPolicy::from_config(config),
            Arc::clone(&clock),
        ));
        let timestamps = TimestampGuard::new(config.timestamp_tolerance_secs);
        let nonces = NonceGuard::from_config(config, store, Arc::clone(&clock));
        Self::new(rollout, timestamps, nonces, clock)
    }

    /// The rollout controller, for status reporting and hot reload.
    #[must_use]
    pub fn rollout(&self) -> &Arc<RolloutController> {
        &self.rollout
    }

    /// The nonce guard.
    #[must_use]
    pub fn nonces(&self) -> &NonceGuard {
        &self.nonces
    }

    /// Start purging expired nonces from the local cache and the store.
    ///
    /// Long-running services call this once after construction and keep the
    /// handle; aborting it stops the purge. Must be called from within a
    /// Tokio runtime.
    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        let interval = self.nonces.purge_interval();
        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        info!(interval_ms, "starting nonce purge");
        self.nonces.spawn_maintenance()
    }

    /// Validate a request taken apart by an HTTP layer.
    ///
    /// Missing or unreadable signature headers produce a rejected result with
    /// [`RejectReason::MissingHeader`].
    pub async fn validate_parts(
        &self,
        parts: &http::request::Parts,
        body: &[u8],
    ) -> ValidationResult {
        let headers = match SignatureHeaders::from_headers(&parts.headers) {
            Ok(headers) => headers,
            Err(e) => {
                warn!(
                    method = %parts.method,
                    path = parts.uri.path(),
                    reason = RejectReason::MissingHeader.as_str(),
                    error = %e,
                    "signature validation failed"
                );
                return ValidationResult::malformed(e.to_string());
            }
        };

        let path = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path(), http::uri::PathAndQuery::as_str);

        self.validate(&SignedRequest {
            method: parts.method.as_str(),
            path,
            body,
            headers: &headers,
        })
        .await
    }

    /// Validate one request.
    pub async fn validate(&self, request: &SignedRequest<'_>) -> ValidationResult {
        let started = Instant::now();
        let policy = self.rollout.policy();
        let now = self.clock.now();
        let phase = policy.phase_at(now);
        let headers = request.headers;
        let input = request.signing_input();
        let mut warnings = Vec::new();

        let timestamp_result = self.timestamps.check(&headers.timestamp, now);

        let v1_result = match headers.v1_signature.as_deref() {
            Some(supplied) if phase.accepts_v1() => Some(check_signature(
                policy.secret_v1.expose(),
                &input.canonical_v1(),
                supplied,
            )),
            Some(_) => {
                debug!(phase = phase.as_str(), "ignoring v1 signature");
                warnings.push(V1_IGNORED_WARNING.to_owned());
                None
            }
            None => None,
        };

        let v2_result = headers.v2_signature.as_deref().map(|supplied| {
            check_signature(policy.secret_v2.expose(), &input.canonical_v2(), supplied)
        });

        let v1_valid = v1_result.as_ref().is_some_and(|r| r.valid);
        let v2_valid = v2_result.as_ref().is_some_and(|r| r.valid);
        let version = MatchedVersion::from_outcomes(v1_valid, v2_valid);

        let mismatch = v1_result.is_some() && v2_result.is_some() && v1_valid != v2_valid;
        let authenticated = (v1_valid || v2_valid) && !mismatch;

        let claim = timestamp_result.valid && authenticated;
        let nonce = self.nonces.check(headers.nonce.as_deref(), claim).await;
        if nonce.degraded {
            warnings.push(NONCE_DEGRADED_WARNING.to_owned());
        }
        let nonce_result = nonce.result;

        let valid = timestamp_result.valid && nonce_result.valid && authenticated;

        if mismatch {
            error!(
                target: SECURITY_LOG_TARGET,
                method = request.method,
                path = request.path,
                phase = phase.as_str(),
                v1_valid,
                v2_valid,
                "signature version mismatch"
            );
            warnings.push(VERSION_MISMATCH_WARNING.to_owned());
        }

        let any_checked = v1_result.is_some() || v2_result.is_some();
        let reason = (!valid).then(|| reject_reason(&timestamp_result, &nonce_result, any_checked));

        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if valid {
            info!(
                method = request.method,
                path = request.path,
                latency_ms,
                phase = phase.as_str(),
                version = version.as_str(),
                nonce_covered = nonce_result.nonce.is_some(),
                warnings = warnings.len(),
                "signature validated"
            );
        } else {
            warn!(
                method = request.method,
                path = request.path,
                latency_ms,
                phase = phase.as_str(),
                version = version.as_str(),
                reason = reason.map_or("unknown", RejectReason::as_str),
                skew_seconds = timestamp_result.skew_seconds,
                warnings = warnings.len(),
                "signature validation failed"
            );
        }

        ValidationResult {
            valid,
            version,
            v1_result,
            v2_result,
            timestamp_result,
            nonce_result,
            warnings,
            reason,
        }
    }
}

fn check_signature(secret: &[u8], canonical: &[u8], supplied: &str) -> SignatureCheck {
    let expected = sign(secret, canonical);
    let valid = constant_time_eq(supplied.as_bytes(), expected.as_bytes());
    SignatureCheck {
        valid,
        signature: expected,
        error: (!valid).then(|| SIGNATURE_MISMATCH.to_owned()),
    }
}

fn reject_reason(
    timestamp: &TimestampResult,
    nonce: &NonceResult,
    any_signature_checked: bool,
) -> RejectReason {
    if timestamp.value.is_none() {
        RejectReason::InvalidTimestamp
    } else if !timestamp.valid {
        RejectReason::TimestampSkew
    } else if !nonce.valid {
        RejectReason::ReplayDetected
    } else if !any_signature_checked {
        RejectReason::NoAcceptableSignature
    } else {
        RejectReason::SignatureMismatch
    }
}
