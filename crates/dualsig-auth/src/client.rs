//! Caller-side request signing.

use std::sync::Arc;

use dualsig_core::{Clock, SharedSecret, SystemClock};
use http::HeaderMap;
use typed_builder::TypedBuilder;

use crate::error::AuthError;
use crate::headers::SignatureHeaders;
use crate::signer::{SigningInput, sign_v1, sign_v2};

/// Produces signature headers for outgoing requests.
///
/// Each configured secret adds the matching signature: a v1 secret yields
/// `x-signature`, a v2 secret yields `x-signature-v2`. During a rollout both
/// are usually set.
///
/// # Examples
///
/// ```
/// use dualsig_auth::client::RequestSigner;
///
/// let signer = RequestSigner::builder()
///     .secret_v2(Some("s3cr3t".into()))
///     .build();
/// let headers = signer.sign("POST", "/v1/events", br#"{"ok":true}"#);
/// assert!(headers.v1_signature.is_none());
/// assert_eq!(headers.v2_signature.as_deref().map(str::len), Some(64));
/// assert!(headers.nonce.is_some());
/// ```
#[derive(Debug, TypedBuilder)]
pub struct RequestSigner {
    /// Secret for the legacy v1 signature.
    #[builder(default)]
    secret_v1: Option<SharedSecret>,
    /// Secret for the v2 signature.
    #[builder(default)]
    secret_v2: Option<SharedSecret>,
    /// Source of the signed timestamp.
    #[builder(default = Arc::new(SystemClock))]
    clock: Arc<dyn Clock>,
    /// Whether to attach a fresh random nonce.
    #[builder(default = true)]
    include_nonce: bool,
}

impl RequestSigner {
    /// Sign a request at the current time with a fresh nonce.
    #[must_use]
    pub fn sign(&self, method: &str, path: &str, body: &[u8]) -> SignatureHeaders {
        let timestamp = self.clock.now().timestamp().to_string();
        let nonce = self
            .include_nonce
            .then(|| uuid::Uuid::new_v4().to_string());
        self.sign_with(method, path, body, &timestamp, nonce.as_deref())
    }

    /// Sign a request with an explicit timestamp and nonce.
    #[must_use]
    pub fn sign_with(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        timestamp: &str,
        nonce: Option<&str>,
    ) -> SignatureHeaders {
        let input = SigningInput {
            method,
            path,
            timestamp,
            nonce,
            body,
        };

        SignatureHeaders {
            v1_signature: self.secret_v1.as_ref().map(|s| sign_v1(s.expose(), &input)),
            v2_signature: self.secret_v2.as_ref().map(|s| sign_v2(s.expose(), &input)),
            timestamp: timestamp.to_owned(),
            nonce: nonce.map(str::to_owned),
        }
    }

    /// Sign and write the headers onto `headers`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidHeader`] if a value cannot be carried in
    /// an HTTP header.
    pub fn sign_headers(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        headers: &mut HeaderMap,
    ) -> Result<SignatureHeaders, AuthError> {
        let signed = self.sign(method, path, body);
        signed.apply_to(headers)?;
        Ok(signed)
    }

    /// Sign an [`http::Request`] in place, taking method and path from it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidHeader`] if a value cannot be carried in
    /// an HTTP header.
    pub fn sign_request<B>(
        &self,
        request: &mut http::Request<B>,
        body: &[u8],
    ) -> Result<SignatureHeaders, AuthError> {
        let method = request.method().as_str().to_owned();
        let path = request
            .uri()
            .path_and_query()
            .map_or_else(|| request.uri().path().to_owned(), |pq| pq.as_str().to_owned());
        self.sign_headers(&method, &path, body, request.headers_mut())
    }
}
