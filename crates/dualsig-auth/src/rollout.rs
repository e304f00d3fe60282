//! Dual-signature migration policy.
//!
//! The rollout phase is a pure function of the policy and wall-clock time:
//!
//! | Phase | Condition | v1 | v2 |
//! |-------|-----------|----|----|
//! | `rollout` | dual signatures enabled and `now < rollout_end` | yes | yes |
//! | `v2-only` | dual signatures enabled and `now >= rollout_end` | no | yes |
//! | `disabled` | dual signatures disabled | no | yes |
//!
//! [`RolloutController`] holds the current policy behind a lock so it can be
//! hot-reloaded. Each validation takes one snapshot of the policy up front
//! and never observes a reconfiguration half way through.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dualsig_core::{Clock, SharedSecret, SignatureConfig};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

/// The migration stage governing which signature versions are honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RolloutPhase {
    /// Both v1 and v2 signatures are checked.
    #[serde(rename = "rollout")]
    Rollout,
    /// The rollout window has closed; v1 is ignored.
    #[serde(rename = "v2-only")]
    V2Only,
    /// Dual signatures were never enabled; v1 is ignored.
    #[serde(rename = "disabled")]
    Disabled,
}

impl RolloutPhase {
    /// Whether v1 signatures are checked in this phase.
    #[must_use]
    pub fn accepts_v1(self) -> bool {
        matches!(self, Self::Rollout)
    }

    /// Whether v2 signatures are checked in this phase. Always true.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn accepts_v2(self) -> bool {
        true
    }

    /// The name used in logs and the status surface.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rollout => "rollout",
            Self::V2Only => "v2-only",
            Self::Disabled => "disabled",
        }
    }
}

/// Secrets and acceptance window for the dual-signature migration.
#[derive(Debug, Clone)]
pub struct RolloutPolicy {
    /// Secret for v1 signatures.
    pub secret_v1: SharedSecret,
    /// Secret for v2 signatures. May equal `secret_v1` during bootstrap.
    pub secret_v2: SharedSecret,
    /// Whether v1 is accepted alongside v2 before `rollout_end`.
    pub dual_signature_enabled: bool,
    /// The instant v1 acceptance stops.
    pub rollout_end: DateTime<Utc>,
}

impl RolloutPolicy {
    /// Build a policy from loaded configuration.
    ///
    /// A missing v2 secret falls back to the v1 secret, and a missing
    /// rollout end closes the dual window immediately.
    #[must_use]
    pub fn from_config(config: &SignatureConfig) -> Self {
        Self {
            secret_v1: config.secret_v1.clone(),
            secret_v2: config.effective_secret_v2().clone(),
            dual_signature_enabled: config.dual_signature_enabled,
            rollout_end: config.rollout_end_or_epoch(),
        }
    }

    /// The phase in effect at `now`.
    #[must_use]
    pub fn phase_at(&self, now: DateTime<Utc>) -> RolloutPhase {
        if !self.dual_signature_enabled {
            RolloutPhase::Disabled
        } else if now < self.rollout_end {
            RolloutPhase::Rollout
        } else {
            RolloutPhase::V2Only
        }
    }

    /// Milliseconds left in the dual window at `now`; zero outside of it.
    #[must_use]
    pub fn remaining_ms_at(&self, now: DateTime<Utc>) -> u64 {
        if self.phase_at(now) != RolloutPhase::Rollout {
            return 0;
        }
        u64::try_from((self.rollout_end - now).num_milliseconds()).unwrap_or(0)
    }

    /// The read-only status snapshot at `now`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> RolloutStatus {
        let phase = self.phase_at(now);
        RolloutStatus {
            phase,
            v1_accepted: phase.accepts_v1(),
            v2_accepted: phase.accepts_v2(),
            remaining_ms: self.remaining_ms_at(now),
            rollout_end: self.rollout_end,
        }
    }
}

/// Operational view of the rollout, for dashboards and health endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutStatus {
    /// The current phase.
    pub phase: RolloutPhase,
    /// Whether v1 signatures are currently checked.
    pub v1_accepted: bool,
    /// Whether v2 signatures are currently checked.
    pub v2_accepted: bool,
    /// Milliseconds until v1 acceptance ends.
    pub remaining_ms: u64,
    /// The configured end of the dual window.
    pub rollout_end: DateTime<Utc>,
}

/// Holds the live [`RolloutPolicy`].
#[derive(Debug)]
pub struct RolloutController {
    policy: RwLock<Arc<RolloutPolicy>>,
    clock: Arc<dyn Clock>,
}

impl RolloutController {
    /// Create a controller for `policy`, reading time from `clock`.
    pub fn new(policy: RolloutPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy: RwLock::new(Arc::new(policy)),
            clock,
        }
    }

    /// A snapshot of the current policy.
    #[must_use]
    pub fn policy(&self) -> Arc<RolloutPolicy> {
        self.policy.read().clone()
    }

    /// Replace the policy. In-flight validations keep their snapshot.
    pub fn reconfigure(&self, policy: RolloutPolicy) {
        info!(
            dual_signature_enabled = policy.dual_signature_enabled,
            rollout_end = %policy.rollout_end,
            "rollout policy reconfigured"
        );
        *self.policy.write() = Arc::new(policy);
    }

    /// The phase in effect right now.
    #[must_use]
    pub fn phase(&self) -> RolloutPhase {
        self.policy().phase_at(self.clock.now())
    }

    /// The status snapshot right now.
    #[must_use]
    pub fn status(&self) -> RolloutStatus {
        self.policy().status_at(self.clock.now())
    }
}
