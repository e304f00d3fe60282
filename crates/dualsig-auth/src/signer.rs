//! HMAC-SHA256 signing and constant-time verification.
//!
//! Signatures travel as lowercase hex. Verification recomputes the expected
//! digest and compares the hex strings with [`subtle::ConstantTimeEq`], so
//! the time taken does not depend on how many leading characters matched.
//! Inputs of the wrong length are rejected without panicking.

use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::canonical::{canonical_v1, canonical_v2};

type HmacSha256 = Hmac<Sha256>;

/// The request fields covered by a signature.
#[derive(Debug, Clone, Copy)]
pub struct SigningInput<'a> {
    /// HTTP method, any case.
    pub method: &'a str,
    /// Request path including the raw query string.
    pub path: &'a str,
    /// Unix seconds as sent by the caller.
    pub timestamp: &'a str,
    /// Optional nonce.
    pub nonce: Option<&'a str>,
    /// Raw request body.
    pub body: &'a [u8],
}

impl SigningInput<'_> {
    /// The v1 signing input for this request.
    #[must_use]
    pub fn canonical_v1(&self) -> Vec<u8> {
        canonical_v1(self.timestamp, self.body)
    }

    /// The v2 signing input for this request.
    #[must_use]
    pub fn canonical_v2(&self) -> Vec<u8> {
        canonical_v2(
            self.method,
            self.path,
            self.timestamp,
            self.nonce,
            self.body,
        )
    }
}

/// Compute the lowercase hex HMAC-SHA256 of `message` keyed by `secret`.
///
/// # Examples
///
/// ```
/// use dualsig_auth::signer::sign;
///
/// let sig = sign(b"key", b"The quick brown fox jumps over the lazy dog");
/// assert_eq!(sig, "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8");
/// ```
#[must_use]
pub fn sign(secret: &[u8], message: &[u8]) -> String {
    let mut mac = <HmacSha256 as KeyInit>::new_from_slice(secret)
        .expect("HMAC can accept keys of any length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes().as_slice())
}

/// Check `supplied_hex` against the HMAC of `message` in constant time.
///
/// Returns `false` for any mismatch, including a supplied value of the wrong
/// length or uppercase hex.
#[must_use]
pub fn verify(secret: &[u8], message: &[u8], supplied_hex: &str) -> bool {
    let expected = sign(secret, message);
    constant_time_eq(supplied_hex.as_bytes(), expected.as_bytes())
}

/// Constant-time byte comparison.
///
/// Slices of different lengths compare unequal; only the length, never the
/// content, influences timing in that case.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Sign a request with the v1 scheme.
#[must_use]
pub fn sign_v1(secret: &[u8], input: &SigningInput<'_>) -> String {
    sign(secret, &input.canonical_v1())
}

/// Sign a request with the v2 scheme.
#[must_use]
pub fn sign_v2(secret: &[u8], input: &SigningInput<'_>) -> String {
    sign(secret, &input.canonical_v2())
}
