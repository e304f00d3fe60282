//! Signing client to validator, over real `http` request parts.

#[cfg(test)]
mod tests {
    use dualsig_auth::canonical::canonical_v2;
    use dualsig_auth::signer::sign;
    use dualsig_auth::{AUTHENTICATION_FAILED, MatchedVersion, RejectReason};

    use crate::{Harness, SECRET_V2, START};

    #[tokio::test]
    async fn test_should_accept_dual_signed_request() {
        let h = Harness::rollout();
        let signer = h.signer(true, true);

        let result = h
            .round_trip(&signer, "POST", "/v1/orders?page=2&limit=10", br#"{"sku":"A-1"}"#)
            .await;

        assert!(result.valid, "{result:?}");
        assert_eq!(result.version, MatchedVersion::Both);
        assert!(result.timestamp_result.valid);
        assert!(result.nonce_result.nonce.is_some());
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_should_accept_binary_body() {
        let h = Harness::rollout();
        let body = [0_u8, 159, 146, 150, 255, b'\n'];

        let result = h.round_trip(&h.signer(false, true), "PUT", "/v1/blob", &body).await;
        assert!(result.valid);
        assert_eq!(result.version, MatchedVersion::V2);
    }

    #[tokio::test]
    async fn test_should_reject_request_sent_to_other_path() {
        let h = Harness::rollout();
        let signer = h.signer(false, true);

        let mut request = http::Request::builder()
            .method("POST")
            .uri("/v1/orders")
            .body(())
            .unwrap();
        signer.sign_request(&mut request, b"{}").unwrap();
        *request.uri_mut() = "/v1/admin".parse().unwrap();
        let (parts, ()) = request.into_parts();

        let result = h.validator.validate_parts(&parts, b"{}").await;
        assert!(!result.valid);
        assert_eq!(result.reason, Some(RejectReason::SignatureMismatch));
        assert_eq!(result.outward_message(), Some(AUTHENTICATION_FAILED));
    }

    #[tokio::test]
    async fn test_should_accept_reordered_query() {
        let h = Harness::with_vars(&[]);
        let timestamp = START.to_string();
        let signature = sign(
            SECRET_V2.as_bytes(),
            &canonical_v2("get", "/v1/ping?b=2&a=1", &timestamp, Some("n-1"), b""),
        );

        let (parts, ()) = http::Request::builder()
            .method("GET")
            .uri("/v1/ping?a=1&b=2")
            .header("X-Timestamp", &timestamp)
            .header("X-Nonce", "n-1")
            .header("X-Signature-V2", &signature)
            .body(())
            .unwrap()
            .into_parts();

        let result = h.validator.validate_parts(&parts, b"").await;
        assert!(result.valid, "{result:?}");
    }

    #[tokio::test]
    async fn test_should_keep_recomputed_signatures_out_of_serialized_result() {
        let h = Harness::rollout();
        let mut request = http::Request::builder()
            .method("POST")
            .uri("/v1/orders")
            .body(())
            .unwrap();
        h.signer(true, true).sign_request(&mut request, b"{}").unwrap();
        let (parts, ()) = request.into_parts();

        let result = h.validator.validate_parts(&parts, b"tampered").await;
        assert!(!result.valid);

        let expected_v2 = &result.v2_result.as_ref().unwrap().signature;
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains(expected_v2.as_str()));
        assert!(!json.contains(SECRET_V2));
        assert!(json.contains("\"reason\":\"signature_mismatch\""));
    }

    #[tokio::test]
    async fn test_should_reject_request_without_timestamp() {
        let h = Harness::rollout();
        let (parts, ()) = http::Request::builder()
            .method("POST")
            .uri("/v1/orders")
            .header("x-signature-v2", "00")
            .body(())
            .unwrap()
            .into_parts();

        let result = h.validator.validate_parts(&parts, b"{}").await;
        assert!(!result.valid);
        assert_eq!(result.reason, Some(RejectReason::MissingHeader));
    }
}
