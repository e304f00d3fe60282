//! Signature material carried in HTTP headers.

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::error::AuthError;

/// Header carrying the v1 signature.
pub const SIGNATURE_V1_HEADER: &str = "x-signature";
/// Header carrying the v2 signature.
pub const SIGNATURE_V2_HEADER: &str = "x-signature-v2";
/// Header carrying the unix-seconds timestamp.
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
/// Header carrying the optional nonce.
pub const NONCE_HEADER: &str = "x-nonce";

/// The signature-related headers of one request.
///
/// Empty header values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureHeaders {
    /// Legacy v1 signature, lowercase hex.
    pub v1_signature: Option<String>,
    /// v2 signature, lowercase hex.
    pub v2_signature: Option<String>,
    /// Unix seconds as sent by the caller, unparsed.
    pub timestamp: String,
    /// Replay-protection nonce.
    pub nonce: Option<String>,
}

impl SignatureHeaders {
    /// Extract the signature headers from `headers`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingHeader`] when the timestamp is absent and
    /// [`AuthError::InvalidHeader`] when any of the headers is not visible
    /// ASCII.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        let timestamp = optional(headers, TIMESTAMP_HEADER)?
            .ok_or(AuthError::MissingHeader(TIMESTAMP_HEADER))?;

        Ok(Self {
            v1_signature: optional(headers, SIGNATURE_V1_HEADER)?,
            v2_signature: optional(headers, SIGNATURE_V2_HEADER)?,
            timestamp,
            nonce: optional(headers, NONCE_HEADER)?,
        })
    }

    /// Write these values onto `headers`, replacing existing ones.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidHeader`] if a value cannot be carried in
    /// an HTTP header.
    pub fn apply_to(&self, headers: &mut HeaderMap) -> Result<(), AuthError> {
        insert(headers, TIMESTAMP_HEADER, &self.timestamp)?;
        if let Some(sig) = &self.v1_signature {
            insert(headers, SIGNATURE_V1_HEADER, sig)?;
        }
        if let Some(sig) = &self.v2_signature {
            insert(headers, SIGNATURE_V2_HEADER, sig)?;
        }
        if let Some(nonce) = &self.nonce {
            insert(headers, NONCE_HEADER, nonce)?;
        }
        Ok(())
    }

    /// The headers as name/value pairs, in a stable order.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![(TIMESTAMP_HEADER, self.timestamp.as_str())];
        if let Some(nonce) = &self.nonce {
            pairs.push((NONCE_HEADER, nonce.as_str()));
        }
        if let Some(sig) = &self.v1_signature {
            pairs.push((SIGNATURE_V1_HEADER, sig.as_str()));
        }
        if let Some(sig) = &self.v2_signature {
            pairs.push((SIGNATURE_V2_HEADER, sig.as_str()));
        }
        pairs
    }
}

fn optional(headers: &HeaderMap, name: &'static str) -> Result<Option<String>, AuthError> {
    headers
        .get(name)
        .map(|v| v.to_str().map_err(|_| AuthError::InvalidHeader(name)))
        .transpose()
        .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned))
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), AuthError> {
    let value = HeaderValue::from_str(value).map_err(|_| AuthError::InvalidHeader(name))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_should_extract_all_headers() {
        let map = headers(&[
            ("x-signature", "aa"),
            ("x-signature-v2", "bb"),
            ("x-timestamp", "1700000000"),
            ("x-nonce", "n-1"),
        ]);
        let parsed = SignatureHeaders::from_headers(&map).unwrap();
        assert_eq!(parsed.v1_signature.as_deref(), Some("aa"));
        assert_eq!(parsed.v2_signature.as_deref(), Some("bb"));
        assert_eq!(parsed.timestamp, "1700000000");
        assert_eq!(parsed.nonce.as_deref(), Some("n-1"));
    }

    #[test]
    fn test_should_require_timestamp() {
        let map = headers(&[("x-signature-v2", "bb")]);
        assert!(matches!(
            SignatureHeaders::from_headers(&map),
            Err(AuthError::MissingHeader(TIMESTAMP_HEADER))
        ));

        let map = headers(&[("x-timestamp", "  ")]);
        assert!(matches!(
            SignatureHeaders::from_headers(&map),
            Err(AuthError::MissingHeader(TIMESTAMP_HEADER))
        ));
    }

    #[test]
    fn test_should_treat_empty_values_as_absent() {
        let map = headers(&[("x-timestamp", "1"), ("x-nonce", ""), ("x-signature", "")]);
        let parsed = SignatureHeaders::from_headers(&map).unwrap();
        assert!(parsed.nonce.is_none());
        assert!(parsed.v1_signature.is_none());
    }

    #[test]
    fn test_should_reject_non_ascii_header() {
        let mut map = headers(&[("x-timestamp", "1")]);
        map.insert("x-nonce", HeaderValue::from_bytes(b"caf\xc3\xa9").unwrap());
        assert!(matches!(
            SignatureHeaders::from_headers(&map),
            Err(AuthError::InvalidHeader(NONCE_HEADER))
        ));
    }

    #[test]
    fn test_should_apply_onto_header_map() {
        let sig = SignatureHeaders {
            v1_signature: None,
            v2_signature: Some("bb".to_owned()),
            timestamp: "1700000000".to_owned(),
            nonce: Some("n-1".to_owned()),
        };
        let mut map = HeaderMap::new();
        sig.apply_to(&mut map).unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(SignatureHeaders::from_headers(&map).unwrap(), sig);
    }

    #[test]
    fn test_should_refuse_unencodable_nonce() {
        let sig = SignatureHeaders {
            timestamp: "1".to_owned(),
            nonce: Some("line\nbreak".to_owned()),
            ..SignatureHeaders::default()
        };
        assert!(matches!(
            sig.apply_to(&mut HeaderMap::new()),
            Err(AuthError::InvalidHeader(NONCE_HEADER))
        ));
    }
}
