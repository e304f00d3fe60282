//! Dual-version HMAC request signatures with replay protection.
//!
//! This crate verifies HMAC-SHA256 signatures on incoming requests while a
//! fleet of callers migrates from a legacy signing scheme (v1) to one that
//! also binds method, path, query, and nonce (v2).
//!
//! # Overview
//!
//! v1 signs `timestamp || body`. v2 signs a canonical newline-joined tuple of
//! method, path with sorted query, timestamp, nonce, and body. During the
//! rollout window both are honored; afterwards only v2 is. Every request must
//! also carry a fresh timestamp and may carry a nonce, which is claimed
//! atomically in a distributed store so it cannot be replayed.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use dualsig_auth::client::RequestSigner;
//! use dualsig_auth::nonce::MemoryNonceStore;
//! use dualsig_auth::validator::{SignatureValidator, SignedRequest};
//! use dualsig_core::{SignatureConfig, SystemClock};
//!
//! # tokio_test::block_on(async {
//! let config = SignatureConfig::builder().secret_v1("s3cr3t".into()).build();
//! let clock = Arc::new(SystemClock);
//! let store = Arc::new(MemoryNonceStore::new(clock.clone()));
//! let validator = SignatureValidator::from_config(&config, store, clock);
//!
//! let signer = RequestSigner::builder().secret_v2(Some("s3cr3t".into())).build();
//! let headers = signer.sign("POST", "/v1/events", b"{}");
//!
//! let result = validator
//!     .validate(&SignedRequest {
//!         method: "POST",
//!         path: "/v1/events",
//!         body: b"{}",
//!         headers: &headers,
//!     })
//!     .await;
//! assert!(result.valid);
//! # });
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - Signing input construction for v1 and v2
//! - [`client`] - Caller-side request signing
//! - [`error`] - Header extraction errors
//! - [`headers`] - Signature header names and extraction
//! - [`nonce`] - Replay protection over a distributed store and local cache
//! - [`result`] - Per-request verdict types
//! - [`rollout`] - Migration phase and policy hot reload
//! - [`signer`] - HMAC-SHA256 signing and constant-time verification
//! - [`timestamp`] - Clock-skew guard
//! - [`validator`] - The validation pipeline

pub mod canonical;
pub mod client;
pub mod error;
pub mod headers;
pub mod nonce;
pub mod result;
pub mod rollout;
pub mod signer;
pub mod timestamp;
pub mod validator;

pub use client::RequestSigner;
pub use error::AuthError;
pub use headers::SignatureHeaders;
pub use result::{AUTHENTICATION_FAILED, MatchedVersion, RejectReason, ValidationResult};
pub use rollout::{RolloutController, RolloutPhase, RolloutPolicy, RolloutStatus};
pub use validator::{SignatureValidator, SignedRequest};
