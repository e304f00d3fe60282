//! Replay protection.
//!
//! A nonce is recorded in a distributed [`NonceStore`] with a TTL so every
//! instance rejects its reuse. The [`LocalNonceCache`] mirrors recent nonces
//! in-process and takes over when the store is unreachable, trading
//! cross-instance coverage for availability.

mod cache;
mod guard;
mod store;

pub use cache::LocalNonceCache;
pub use guard::{
    MIN_PURGE_INTERVAL, NONCE_ALREADY_USED, NONCE_KEY_PREFIX, NonceGuard, NonceOutcome,
};
pub use store::{MemoryNonceStore, NonceStore, StoreError};
