use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dualsig_core::{Clock, DEFAULT_NONCE_PURGE_INTERVAL_SECS, SignatureConfig};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::cache::LocalNonceCache;
use super::store::{NonceStore, StoreError};
use crate::result::NonceResult;

/// Prefix applied to nonces when used as store keys.
pub const NONCE_KEY_PREFIX: &str = "nonce:";
/// Error reported when a nonce has been seen before.
pub const NONCE_ALREADY_USED: &str = "nonce already used";
/// Shortest interval [`NonceGuard::spawn_maintenance`] will tick at.
pub const MIN_PURGE_INTERVAL: Duration = Duration::from_millis(1);

/// The nonce check's verdict plus whether it had to bypass the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceOutcome {
    /// The verdict.
    pub result: NonceResult,
    /// The distributed store failed or timed out and the local cache decided.
    pub degraded: bool,
}

impl NonceOutcome {
    fn fresh(nonce: &str, cached: bool, degraded: bool) -> Self {
        Self {
            result: NonceResult {
                valid: true,
                nonce: Some(nonce.to_owned()),
                cached,
                error: None,
            },
            degraded,
        }
    }

    fn replayed(nonce: &str, cached: bool, degraded: bool) -> Self {
        Self {
            result: NonceResult {
                valid: false,
                nonce: Some(nonce.to_owned()),
                cached,
                error: Some(NONCE_ALREADY_USED.to_owned()),
            },
            degraded,
        }
    }
}

/// Replay protection over a distributed [`NonceStore`] with a local fallback.
///
/// Every store call is bounded by a timeout. When the store errors or times
/// out, the guard decides from the [`LocalNonceCache`] alone and reports the
/// outcome as degraded. The cache is written only after the store call has
/// resolved, so a dropped validation future leaves no partial record behind.
#[derive(Debug, Clone)]
pub struct NonceGuard {
    store: Arc<dyn NonceStore>,
    cache: Arc<LocalNonceCache>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    timeout: Duration,
    purge_interval: Duration,
}

impl NonceGuard {
    /// Create a guard. `ttl` applies to both the store and the local cache.
    pub fn new(
        store: Arc<dyn NonceStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache: Arc::new(LocalNonceCache::new(ttl)),
            clock,
            ttl,
            timeout,
            purge_interval: Duration::from_secs(DEFAULT_NONCE_PURGE_INTERVAL_SECS),
        }
    }

    /// Create a guard with TTL, timeout and purge interval taken from `config`.
    pub fn from_config(
        config: &SignatureConfig,
        store: Arc<dyn NonceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(store, clock, config.nonce_ttl(), config.nonce_store_timeout())
            .with_purge_interval(config.nonce_purge_interval())
    }

    /// Set how often [`NonceGuard::spawn_maintenance`] purges.
    #[must_use]
    pub fn with_purge_interval(mut self, interval: Duration) -> Self {
        self.purge_interval = interval.max(MIN_PURGE_INTERVAL);
        self
    }

    /// The local fallback cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<LocalNonceCache> {
        &self.cache
    }

    /// The interval [`NonceGuard::spawn_maintenance`] ticks at.
    #[must_use]
    pub fn purge_interval(&self) -> Duration {
        self.purge_interval
    }

    /// Drop expired nonces from the local cache and the store once.
    ///
    /// Returns how many entries were removed from each. A store failure is
    /// logged and counted as zero.
    pub async fn purge_expired(&self) -> (usize, usize) {
        let cached = self.cache.purge_expired(self.clock.now());
        let stored = match self.bounded(self.store.purge_expired()).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "nonce store purge failed");
                0
            }
        };
        (cached, stored)
    }

    /// Purge expired nonces every purge interval until the task is aborted.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        let guard = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(guard.purge_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let (cached, stored) = guard.purge_expired().await;
                if cached + stored > 0 {
                    debug!(
                        cached,
                        stored,
                        remaining = guard.cache.len(),
                        "purged expired nonces"
                    );
                }
            }
        })
    }

    /// Check a request's nonce, recording it when `record` is set.
    ///
    /// An absent or empty nonce is valid and uncovered by replay protection.
    /// Callers pass `record = false` when the request is already doomed, e.g.
    /// by a stale timestamp, so a rejected request cannot burn a nonce.
    pub async fn check(&self, nonce: Option<&str>, record: bool) -> NonceOutcome {
        let Some(nonce) = nonce.filter(|n| !n.is_empty()) else {
            debug!("request carries no nonce, replay protection not applied");
            return NonceOutcome {
                result: NonceResult::uncovered(),
                degraded: false,
            };
        };

        if record {
            self.claim(nonce).await
        } else {
            self.is_used(nonce).await
        }
    }

    /// Look `nonce` up without recording it.
    pub async fn is_used(&self, nonce: &str) -> NonceOutcome {
        let key = store_key(nonce);
        let outcome = self.bounded(self.store.exists(&key)).await;
        let now = self.clock.now();

        match outcome {
            Ok(true) => NonceOutcome::replayed(nonce, false, false),
            Ok(false) if self.cache.contains(nonce, now) => {
                NonceOutcome::replayed(nonce, true, false)
            }
            Ok(false) => NonceOutcome::fresh(nonce, false, false),
            Err(e) => {
                warn!(error = %e, "nonce store lookup failed, using local cache");
                if self.cache.contains(nonce, now) {
                    NonceOutcome::replayed(nonce, true, true)
                } else {
                    NonceOutcome::fresh(nonce, true, true)
                }
            }
        }
    }

    /// Atomically record `nonce`, failing if it was already recorded.
    pub async fn claim(&self, nonce: &str) -> NonceOutcome {
        let key = store_key(nonce);
        let first_seen = self.clock.now();
        let value = first_seen.timestamp().to_string();
        let outcome = self
            .bounded(self.store.set_if_absent(&key, &value, self.ttl))
            .await;

        match outcome {
            Ok(true) => {
                if self.cache.insert_if_absent(nonce, first_seen) {
                    NonceOutcome::fresh(nonce, false, false)
                } else {
                    // Seen locally while the store was unreachable.
                    warn!("nonce accepted by store but already seen locally");
                    NonceOutcome::replayed(nonce, true, false)
                }
            }
            Ok(false) => NonceOutcome::replayed(nonce, false, false),
            Err(e) => {
                warn!(error = %e, "nonce store write failed, using local cache");
                if self.cache.insert_if_absent(nonce, first_seen) {
                    NonceOutcome::fresh(nonce, true, true)
                } else {
                    NonceOutcome::replayed(nonce, true, true)
                }
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}

fn store_key(nonce: &str) -> String {
    format!("{NONCE_KEY_PREFIX}{nonce}")
}
