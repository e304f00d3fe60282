//! End-to-end tests for dualsig: a signing client on one side, the full
//! validator on the other.
//!
//! Everything runs in-process against [`MemoryNonceStore`] or the
//! [`FlakyStore`] wrapper, so no external services are needed:
//! ```text
//! cargo test -p dualsig-integration
//! ```

use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dualsig_auth::nonce::{MemoryNonceStore, NonceStore, StoreError};
use dualsig_auth::{RequestSigner, SignatureValidator};
use dualsig_core::{Clock, FixedClock, SharedSecret, SignatureConfig};

static INIT: Once = Once::new();

/// Unix seconds at which every harness clock starts.
pub const START: i64 = 1_700_000_000;
/// v1 secret used by the harness.
pub const SECRET_V1: &str = "legacy-s3cr3t";
/// v2 secret used by the harness.
pub const SECRET_V2: &str = "modern-s3cr3t";

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A [`NonceStore`] that can be switched off to simulate an outage.
#[derive(Debug)]
pub struct FlakyStore {
    inner: MemoryNonceStore,
    down: AtomicBool,
}

impl FlakyStore {
    /// Wrap a fresh in-memory store.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: MemoryNonceStore::new(clock),
            down: AtomicBool::new(false),
        }
    }

    /// Make every call fail (`true`) or succeed (`false`).
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("simulated outage".to_owned()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl NonceStore for FlakyStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.exists(key).await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.set_if_absent(key, value, ttl).await
    }
}

/// A validator wired to a controllable clock and store.
#[derive(Debug)]
pub struct Harness {
    /// The clock shared by validator and signers.
    pub clock: Arc<FixedClock>,
    /// The nonce store behind the validator.
    pub store: Arc<FlakyStore>,
    /// The validator under test.
    pub validator: Arc<SignatureValidator>,
}

impl Harness {
    /// Build a harness from environment-style variables.
    ///
    /// The secrets are always set; `vars` adds or overrides the rest.
    #[must_use]
    pub fn with_vars(vars: &[(&str, &str)]) -> Self {
        init_tracing();

        let config = config_from(vars);
        let clock = Arc::new(FixedClock::at_unix(START));
        let store = Arc::new(FlakyStore::new(clock.clone()));
        let validator = Arc::new(SignatureValidator::from_config(
            &config,
            store.clone(),
            clock.clone(),
        ));

        Self {
            clock,
            store,
            validator,
        }
    }

    /// A harness in the rollout phase, with the window closing an hour
    /// after [`START`].
    #[must_use]
    pub fn rollout() -> Self {
        let end = ((START + 3600) * 1000).to_string();
        Self::with_vars(&[
            ("SIGNATURE_DUAL_ENABLED", "true"),
            ("SIGNATURE_ROLLOUT_END", end.as_str()),
        ])
    }

    /// A signer sharing this harness's clock.
    #[must_use]
    pub fn signer(&self, v1: bool, v2: bool) -> RequestSigner {
        let clock: Arc<dyn Clock> = self.clock.clone();
        RequestSigner::builder()
            .secret_v1(v1.then(|| SharedSecret::from(SECRET_V1)))
            .secret_v2(v2.then(|| SharedSecret::from(SECRET_V2)))
            .clock(clock)
            .build()
    }

    /// Sign an HTTP request and run it through the validator.
    pub async fn round_trip(
        &self,
        signer: &RequestSigner,
        method: &str,
        uri: &str,
        body: &[u8],
    ) -> dualsig_auth::ValidationResult {
        let mut request = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .expect("valid request");
        signer
            .sign_request(&mut request, body)
            .expect("signable request");
        let (parts, ()) = request.into_parts();
        self.validator.validate_parts(&parts, body).await
    }
}

/// Load a [`SignatureConfig`] from the harness secrets plus `vars`.
///
/// # Panics
///
/// Panics if the variables do not form a valid configuration.
#[must_use]
pub fn config_from(vars: &[(&str, &str)]) -> SignatureConfig {
    let mut all = vec![
        ("SIGNATURE_SECRET_V1".to_owned(), SECRET_V1.to_owned()),
        ("SIGNATURE_SECRET_V2".to_owned(), SECRET_V2.to_owned()),
    ];
    all.extend(vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())));

    SignatureConfig::from_lookup(|name| {
        all.iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    })
    .expect("valid test configuration")
}

mod test_flow;
mod test_replay;
mod test_rollout;
