//! Signature verification configuration.
//!
//! Provides [`SignatureConfig`], the process-wide settings for the dual
//! signature rollout. Values are loaded from environment variables at
//! startup; the secrets themselves are provisioned by the environment and
//! never logged.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use crate::error::{DualSigError, DualSigResult};
use crate::secret::SharedSecret;

/// Default accepted clock skew in seconds.
pub const DEFAULT_TIMESTAMP_TOLERANCE_SECS: u64 = 120;
/// Default nonce time-to-live in seconds.
pub const DEFAULT_NONCE_TTL_SECS: u64 = 600;
/// Default bound on a single distributed nonce store call.
pub const DEFAULT_NONCE_STORE_TIMEOUT_MS: u64 = 250;
/// Default interval between local nonce cache purges.
pub const DEFAULT_NONCE_PURGE_INTERVAL_SECS: u64 = 300;
/// Longest accepted nonce time-to-live in seconds (one week).
pub const MAX_NONCE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
/// Longest accepted interval between local nonce cache purges in seconds.
pub const MAX_NONCE_PURGE_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Signature verification configuration.
///
/// # Examples
///
/// ```
/// use dualsig_core::SignatureConfig;
///
/// let config = SignatureConfig::builder().secret_v1("s3cr3t".into()).build();
/// assert_eq!(config.timestamp_tolerance_secs, 120);
/// assert!(config.uses_fallback_secret_v2());
/// ```
#[derive(Debug, Clone, Serialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct SignatureConfig {
    /// Secret for legacy v1 signatures.
    pub secret_v1: SharedSecret,

    /// Secret for v2 signatures. When unset, the v1 secret is reused.
    #[builder(default, setter(strip_option))]
    pub secret_v2: Option<SharedSecret>,

    /// Maximum accepted `|now - timestamp|` in seconds.
    #[builder(default = DEFAULT_TIMESTAMP_TOLERANCE_SECS)]
    pub timestamp_tolerance_secs: u64,

    /// How long a recorded nonce stays "used".
    #[builder(default = DEFAULT_NONCE_TTL_SECS)]
    pub nonce_ttl_secs: u64,

    /// Upper bound on a distributed nonce store call before falling back to
    /// the local cache.
    #[builder(default = DEFAULT_NONCE_STORE_TIMEOUT_MS)]
    pub nonce_store_timeout_ms: u64,

    /// How often expired entries are purged from the local nonce cache.
    #[builder(default = DEFAULT_NONCE_PURGE_INTERVAL_SECS)]
    pub nonce_purge_interval_secs: u64,

    /// Whether v1 signatures are accepted alongside v2 until `rollout_end`.
    #[builder(default = false)]
    pub dual_signature_enabled: bool,

    /// End of the dual-signature window.
    #[builder(default, setter(strip_option))]
    pub rollout_end: Option<DateTime<Utc>>,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl SignatureConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `SIGNATURE_SECRET_V1` | *(required)* |
    /// | `SIGNATURE_SECRET_V2` | value of `SIGNATURE_SECRET_V1` |
    /// | `SIGNATURE_TIMESTAMP_TOLERANCE_SECS` | `120` |
    /// | `SIGNATURE_NONCE_TTL_SECS` | `600` |
    /// | `SIGNATURE_NONCE_STORE_TIMEOUT_MS` | `250` |
    /// | `SIGNATURE_NONCE_PURGE_INTERVAL_SECS` | `300` |
    /// | `SIGNATURE_DUAL_ENABLED` | `false` |
    /// | `SIGNATURE_ROLLOUT_END` | *(unset)*, RFC 3339 or unix milliseconds |
    /// | `LOG_LEVEL` | `info` |
    pub fn from_env() -> DualSigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DualSigResult<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let secret_v1 = get("SIGNATURE_SECRET_V1")
            .map(SharedSecret::from)
            .ok_or(DualSigError::MissingConfig("SIGNATURE_SECRET_V1"))?;

        let mut config = Self::builder().secret_v1(secret_v1).build();

        if let Some(v) = get("SIGNATURE_SECRET_V2") {
            config.secret_v2 = Some(SharedSecret::from(v));
        }
        if let Some(v) = get("SIGNATURE_TIMESTAMP_TOLERANCE_SECS") {
            config.timestamp_tolerance_secs =
                parse_u64("SIGNATURE_TIMESTAMP_TOLERANCE_SECS", &v)?;
        }
        if let Some(v) = get("SIGNATURE_NONCE_TTL_SECS") {
            config.nonce_ttl_secs =
                parse_in_range("SIGNATURE_NONCE_TTL_SECS", &v, 1, MAX_NONCE_TTL_SECS)?;
        }
        if let Some(v) = get("SIGNATURE_NONCE_STORE_TIMEOUT_MS") {
            config.nonce_store_timeout_ms = parse_u64("SIGNATURE_NONCE_STORE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("SIGNATURE_NONCE_PURGE_INTERVAL_SECS") {
            config.nonce_purge_interval_secs = parse_in_range(
                "SIGNATURE_NONCE_PURGE_INTERVAL_SECS",
                &v,
                1,
                MAX_NONCE_PURGE_INTERVAL_SECS,
            )?;
        }
        if let Some(v) = get("SIGNATURE_DUAL_ENABLED") {
            config.dual_signature_enabled = parse_bool(&v);
        }
        if let Some(v) = get("SIGNATURE_ROLLOUT_END") {
            config.rollout_end = Some(parse_rollout_end(&v)?);
        }
        if let Some(v) = get("LOG_LEVEL") {
            config.log_level = v;
        }

        Ok(config)
    }

    /// Whether the v2 secret silently falls back to the v1 secret.
    #[must_use]
    pub fn uses_fallback_secret_v2(&self) -> bool {
        self.secret_v2.is_none()
    }

    /// The secret used for v2 signatures.
    #[must_use]
    pub fn effective_secret_v2(&self) -> &SharedSecret {
        self.secret_v2.as_ref().unwrap_or(&self.secret_v1)
    }

    /// The end of the rollout window, or the unix epoch when none is set.
    ///
    /// An unset end means the dual-signature window is already closed.
    #[must_use]
    pub fn rollout_end_or_epoch(&self) -> DateTime<Utc> {
        self.rollout_end.unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Nonce TTL as a [`Duration`].
    #[must_use]
    pub fn nonce_ttl(&self) -> Duration {
        Duration::from_secs(self.nonce_ttl_secs)
    }

    /// Distributed nonce store timeout as a [`Duration`].
    #[must_use]
    pub fn nonce_store_timeout(&self) -> Duration {
        Duration::from_millis(self.nonce_store_timeout_ms)
    }

    /// Local nonce cache purge interval as a [`Duration`].
    #[must_use]
    pub fn nonce_purge_interval(&self) -> Duration {
        Duration::from_secs(self.nonce_purge_interval_secs)
    }

    /// Emit startup warnings for risky but permitted settings.
    ///
    /// Returns the warnings that were logged.
    pub fn log_startup_warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();

        if self.uses_fallback_secret_v2() {
            warn!(
                "SIGNATURE_SECRET_V2 is not set: v2 signatures are verified with the v1 secret. \
                 Configure a dedicated v2 secret before the rollout ends."
            );
            warnings.push("v2 secret falls back to v1 secret");
        }
        if self.dual_signature_enabled && self.rollout_end.is_none() {
            warn!("dual signatures enabled without SIGNATURE_ROLLOUT_END: v1 is rejected");
            warnings.push("dual signatures enabled without rollout end");
        }

        info!(
            dual_signature_enabled = self.dual_signature_enabled,
            rollout_end = ?self.rollout_end,
            timestamp_tolerance_secs = self.timestamp_tolerance_secs,
            nonce_ttl_secs = self.nonce_ttl_secs,
            "loaded signature configuration"
        );

        warnings
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn parse_u64(name: &'static str, value: &str) -> DualSigResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| DualSigError::InvalidConfig {
            name,
            reason: e.to_string(),
        })
}

fn parse_in_range(name: &'static str, value: &str, min: u64, max: u64) -> DualSigResult<u64> {
    let parsed = parse_u64(name, value)?;
    if (min..=max).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(DualSigError::InvalidConfig {
            name,
            reason: format!("{parsed} is outside {min}..={max}"),
        })
    }
}

/// Parse the rollout end as RFC 3339 or as unix milliseconds.
fn parse_rollout_end(value: &str) -> DualSigResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| DualSigError::InvalidConfig {
            name: "SIGNATURE_ROLLOUT_END",
            reason: format!("expected RFC 3339 or unix milliseconds, got {value:?}"),
        })
}
