//! Process-local backstop for the nonce store.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Nonces seen by this process, keyed by nonce with their first-seen time.
///
/// Entries live for the same TTL as in the distributed store. Expired entries
/// are ignored on lookup and removed by [`LocalNonceCache::purge_expired`],
/// which [`NonceGuard::spawn_maintenance`](super::NonceGuard::spawn_maintenance)
/// runs on an interval.
#[derive(Debug)]
pub struct LocalNonceCache {
    entries: DashMap<String, DateTime<Utc>>,
    ttl: TimeDelta,
}

impl LocalNonceCache {
    /// Create an empty cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    fn is_live(&self, first_seen: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(first_seen) < self.ttl
    }

    /// Record `nonce` as seen at `now` unless a live entry exists.
    ///
    /// Returns `true` if this call recorded it.
    pub fn insert_if_absent(&self, nonce: &str, now: DateTime<Utc>) -> bool {
        match self.entries.entry(nonce.to_owned()) {
            Entry::Occupied(mut entry) => {
                if self.is_live(*entry.get(), now) {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Whether `nonce` has a live entry at `now`.
    #[must_use]
    pub fn contains(&self, nonce: &str, now: DateTime<Utc>) -> bool {
        self.entries
            .get(nonce)
            .is_some_and(|first_seen| self.is_live(*first_seen, now))
    }

    /// Remove entries that have outlived the TTL at `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, first_seen| self.is_live(*first_seen, now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
