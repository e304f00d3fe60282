//! Replay protection under concurrency and store outages.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeDelta;
    use dualsig_auth::validator::{NONCE_DEGRADED_WARNING, SignedRequest};
    use dualsig_auth::{RejectReason, SignatureHeaders};
    use dualsig_core::Clock;

    use crate::Harness;

    async fn validate(h: &Harness, headers: &SignatureHeaders) -> dualsig_auth::ValidationResult {
        h.validator
            .validate(&SignedRequest {
                method: "POST",
                path: "/v1/transfers",
                body: b"{\"amount\":100}",
                headers,
            })
            .await
    }

    fn signed(h: &Harness) -> SignatureHeaders {
        h.signer(true, true)
            .sign("POST", "/v1/transfers", b"{\"amount\":100}")
    }

    #[tokio::test]
    async fn test_should_reject_second_use_of_nonce() {
        let h = Harness::rollout();
        let headers = signed(&h);

        assert!(validate(&h, &headers).await.valid);

        let replay = validate(&h, &headers).await;
        assert!(!replay.valid);
        assert_eq!(replay.reason, Some(RejectReason::ReplayDetected));
        assert!(replay.v1_result.as_ref().is_some_and(|r| r.valid));
        assert!(replay.v2_result.as_ref().is_some_and(|r| r.valid));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_should_admit_exactly_one_of_concurrent_replays() {
        let h = Arc::new(Harness::rollout());
        let headers = Arc::new(signed(&h));

        let attempts = (0..64).map(|_| {
            let h = Arc::clone(&h);
            let headers = Arc::clone(&headers);
            tokio::spawn(async move { validate(&h, &headers).await })
        });

        let results: Vec<_> = futures::future::join_all(attempts)
            .await
            .into_iter()
            .map(|r| r.expect("task panicked"))
            .collect();

        assert_eq!(results.iter().filter(|r| r.valid).count(), 1);
        assert!(
            results
                .iter()
                .filter(|r| !r.valid)
                .all(|r| r.reason == Some(RejectReason::ReplayDetected))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_should_admit_distinct_nonces_concurrently() {
        let h = Arc::new(Harness::rollout());

        let attempts = (0..64).map(|_| {
            let h = Arc::clone(&h);
            tokio::spawn(async move {
                let headers = signed(&h);
                validate(&h, &headers).await.valid
            })
        });

        let admitted = futures::future::join_all(attempts)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(true)))
            .count();
        assert_eq!(admitted, 64);
    }

    #[tokio::test]
    async fn test_should_stay_available_during_store_outage() {
        let h = Harness::rollout();
        h.store.set_down(true);
        let headers = signed(&h);

        let first = validate(&h, &headers).await;
        assert!(first.valid);
        assert!(first.nonce_result.cached);
        assert!(first.warnings.iter().any(|w| w == NONCE_DEGRADED_WARNING));

        let replay = validate(&h, &headers).await;
        assert!(!replay.valid);
        assert_eq!(replay.reason, Some(RejectReason::ReplayDetected));
    }

    #[tokio::test]
    async fn test_should_remember_outage_nonces_after_recovery() {
        let h = Harness::rollout();
        let headers = signed(&h);

        h.store.set_down(true);
        assert!(validate(&h, &headers).await.valid);

        h.store.set_down(false);
        let replay = validate(&h, &headers).await;
        assert!(!replay.valid);
        assert_eq!(replay.reason, Some(RejectReason::ReplayDetected));
        assert!(replay.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_should_release_nonce_after_ttl() {
        let h = Harness::with_vars(&[
            ("SIGNATURE_DUAL_ENABLED", "true"),
            ("SIGNATURE_ROLLOUT_END", "2100-01-01T00:00:00Z"),
            ("SIGNATURE_NONCE_TTL_SECS", "60"),
        ]);
        let signer = h.signer(false, true);
        let nonce = "fixed-nonce";

        let first = signer.sign_with(
            "POST",
            "/v1/transfers",
            b"{\"amount\":100}",
            &h.clock.now().timestamp().to_string(),
            Some(nonce),
        );
        assert!(validate(&h, &first).await.valid);

        h.clock.advance(TimeDelta::seconds(61));
        let later = signer.sign_with(
            "POST",
            "/v1/transfers",
            b"{\"amount\":100}",
            &h.clock.now().timestamp().to_string(),
            Some(nonce),
        );
        assert!(validate(&h, &later).await.valid);
    }

    #[tokio::test]
    async fn test_should_leave_requests_without_nonce_uncovered() {
        let h = Harness::rollout();
        let mut headers = signed(&h);
        headers.nonce = None;
        headers.v2_signature = None;

        assert!(validate(&h, &headers).await.valid);
        let again = validate(&h, &headers).await;
        assert!(again.valid);
        assert!(again.nonce_result.nonce.is_none());
    }
}
