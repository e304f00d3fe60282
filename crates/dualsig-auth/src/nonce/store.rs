//! The distributed nonce store seam.
//!
//! The authoritative record of used nonces lives in a store shared by every
//! instance of the service. This crate only needs two operations from it, and
//! the recording one must be atomic: the store either claims the key for the
//! caller or reports that it was already taken, with no window in between.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dualsig_core::Clock;

/// Failures talking to the distributed store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or returned an error.
    #[error("nonce store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer within the configured bound.
    #[error("nonce store call timed out after {0:?}")]
    Timeout(Duration),

    /// The requested TTL cannot be represented as an expiry time.
    #[error("nonce ttl {0:?} is out of range")]
    InvalidTtl(Duration),
}

/// A key-value store with TTLs, shared across service instances.
///
/// Implementations wrap e.g. a Redis connection (`EXISTS` and
/// `SET key value NX EX ttl`). They must be safe to call concurrently from
/// many tasks and from many processes.
#[async_trait::async_trait]
pub trait NonceStore: Send + Sync + Debug {
    /// Whether `key` is currently set.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Set `key` to `value` with a time-to-live, only if it is not already set.
    ///
    /// Returns `true` if this call created the key, `false` if it existed.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
    -> Result<bool, StoreError>;

    /// Drop expired keys and return how many were removed.
    ///
    /// Stores that expire keys on their own, like Redis, keep the default.
    async fn purge_expired(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: DateTime<Utc>,
}

/// An in-process [`NonceStore`].
///
/// Suitable for single-instance deployments and tests. Replay protection
/// does not extend across processes with this store. Expired entries stay in
/// memory until [`NonceStore::purge_expired`] runs, which
/// [`NonceGuard::spawn_maintenance`](super::NonceGuard::spawn_maintenance)
/// does on an interval.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use dualsig_auth::nonce::{MemoryNonceStore, NonceStore};
/// use dualsig_core::SystemClock;
///
/// # tokio_test::block_on(async {
/// let store = MemoryNonceStore::new(Arc::new(SystemClock));
/// let ttl = Duration::from_secs(600);
/// assert!(store.set_if_absent("nonce:a", "1", ttl).await.unwrap());
/// assert!(!store.set_if_absent("nonce:a", "2", ttl).await.unwrap());
/// # });
/// ```
#[derive(Debug)]
pub struct MemoryNonceStore {
    entries: DashMap<String, StoredValue>,
    clock: Arc<dyn Clock>,
}

impl MemoryNonceStore {
    /// Create an empty store that expires entries according to `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The value stored under `key`, if it has not expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        self.entries
            .get(key)
            .filter(|v| v.expires_at > now)
            .map(|v| v.value.clone())
    }
}

#[async_trait::async_trait]
impl NonceStore for MemoryNonceStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let now = self.clock.now();
        Ok(self.entries.get(key).is_some_and(|v| v.expires_at > now))
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(StoreError::InvalidTtl(ttl))?;
        let stored = StoredValue {
            value: value.to_owned(),
            expires_at,
        };

        // The shard lock is held for the whole match, so check and insert are
        // one step.
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut entry) => {
                if entry.get().expires_at > now {
                    Ok(false)
                } else {
                    entry.insert(stored);
                    Ok(true)
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(stored);
                Ok(true)
            }
        }
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, v| v.expires_at > now);
        Ok(before.saturating_sub(self.entries.len()))
    }
}
