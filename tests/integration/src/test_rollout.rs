//! Migration phases as seen by callers.

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use dualsig_auth::validator::{V1_IGNORED_WARNING, VERSION_MISMATCH_WARNING};
    use dualsig_auth::{MatchedVersion, RejectReason, RolloutPhase, RolloutPolicy};

    use crate::{Harness, START, config_from};

    #[tokio::test]
    async fn test_should_stop_accepting_v1_when_window_closes() {
        let h = Harness::rollout();
        let legacy = h.signer(true, false);

        let before = h.round_trip(&legacy, "POST", "/v1/events", b"{}").await;
        assert!(before.valid);
        assert_eq!(before.version, MatchedVersion::V1);

        h.clock.advance(TimeDelta::seconds(3600));
        assert_eq!(h.validator.rollout().phase(), RolloutPhase::V2Only);

        let after = h.round_trip(&legacy, "POST", "/v1/events", b"{}").await;
        assert!(!after.valid);
        assert_eq!(after.version, MatchedVersion::None);
        assert!(after.warnings.iter().any(|w| w == V1_IGNORED_WARNING));
        assert_eq!(after.reason, Some(RejectReason::NoAcceptableSignature));

        let modern = h.round_trip(&h.signer(true, true), "POST", "/v1/events", b"{}").await;
        assert!(modern.valid);
        assert_eq!(modern.version, MatchedVersion::V2);
    }

    #[tokio::test]
    async fn test_should_reject_disagreeing_signatures_during_rollout() {
        let h = Harness::rollout();
        let mut headers = h.signer(true, true).sign("POST", "/v1/events", b"{}");
        // v2 signed by a caller holding a stale secret.
        let stale = dualsig_auth::RequestSigner::builder()
            .secret_v2(Some("outdated".into()))
            .build()
            .sign_with("POST", "/v1/events", b"{}", &headers.timestamp, headers.nonce.as_deref());
        headers.v2_signature = stale.v2_signature;

        let result = h
            .validator
            .validate(&dualsig_auth::SignedRequest {
                method: "POST",
                path: "/v1/events",
                body: b"{}",
                headers: &headers,
            })
            .await;

        assert!(!result.valid);
        assert!(result.has_version_mismatch());
        assert!(result.warnings.iter().any(|w| w == VERSION_MISMATCH_WARNING));
        assert_eq!(result.reason, Some(RejectReason::SignatureMismatch));
    }

    #[tokio::test]
    async fn test_should_treat_missing_rollout_end_as_closed() {
        let h = Harness::with_vars(&[("SIGNATURE_DUAL_ENABLED", "true")]);
        assert_eq!(h.validator.rollout().phase(), RolloutPhase::V2Only);

        let result = h.round_trip(&h.signer(true, false), "GET", "/v1/ping", b"").await;
        assert!(!result.valid);
    }

    #[test]
    fn test_should_report_status_snapshot() {
        let h = Harness::rollout();
        let status = h.validator.rollout().status();
        assert_eq!(status.phase, RolloutPhase::Rollout);
        assert!(status.v1_accepted);
        assert!(status.v2_accepted);
        assert_eq!(status.remaining_ms, 3_600_000);

        h.clock.advance(TimeDelta::minutes(30));
        assert_eq!(h.validator.rollout().status().remaining_ms, 1_800_000);

        let json = serde_json::to_value(h.validator.rollout().status()).unwrap();
        assert_eq!(json["phase"], "rollout");
        assert_eq!(json["remainingMs"], 1_800_000);
    }

    #[tokio::test]
    async fn test_should_apply_hot_reloaded_window() {
        let h = Harness::with_vars(&[]);
        assert_eq!(h.validator.rollout().phase(), RolloutPhase::Disabled);

        let extended = ((START + 600) * 1000).to_string();
        let config = config_from(&[
            ("SIGNATURE_DUAL_ENABLED", "true"),
            ("SIGNATURE_ROLLOUT_END", extended.as_str()),
        ]);
        h.validator
            .rollout()
            .reconfigure(RolloutPolicy::from_config(&config));

        let result = h.round_trip(&h.signer(true, false), "GET", "/v1/ping", b"").await;
        assert!(result.valid);
        assert_eq!(result.version, MatchedVersion::V1);
    }
}
