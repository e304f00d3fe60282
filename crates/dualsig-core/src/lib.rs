//! Core configuration, clock, and error types for dualsig.
//!
//! This crate holds the pieces shared by the signature protocol crate and the
//! binaries: the process-wide [`SignatureConfig`], the redacting
//! [`SharedSecret`] wrapper, and the [`Clock`] abstraction that every
//! time-dependent check reads from.

mod clock;
mod config;
mod error;
mod secret;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    DEFAULT_NONCE_PURGE_INTERVAL_SECS, DEFAULT_NONCE_STORE_TIMEOUT_MS, DEFAULT_NONCE_TTL_SECS,
    DEFAULT_TIMESTAMP_TOLERANCE_SECS, MAX_NONCE_PURGE_INTERVAL_SECS, MAX_NONCE_TTL_SECS,
    SignatureConfig,
};
pub use error::{DualSigError, DualSigResult};
pub use secret::SharedSecret;
