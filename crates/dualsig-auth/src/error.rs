//! Error types for signature extraction.
//!
//! These errors describe malformed input only. Verification outcomes
//! (mismatch, replay, skew) are reported through
//! [`ValidationResult`](crate::result::ValidationResult), never as errors.

/// Errors raised while reading signature material from a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A required header is missing from the request.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// A header is present but is not valid visible ASCII.
    #[error("invalid header value: {0}")]
    InvalidHeader(&'static str),
}
