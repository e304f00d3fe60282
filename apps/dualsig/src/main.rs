//! dualsig - sign, verify, and inspect dual-version request signatures.
//!
//! Operational companion to the `dualsig-auth` crate. `sign` prints the
//! headers a caller must send, `verify` runs a request through the same
//! validator a service would use, and `status` prints where the v1 to v2
//! migration currently stands.
//!
//! # Usage
//!
//! ```text
//! echo '{}' | SIGNATURE_SECRET_V1=s3cr3t dualsig sign POST /v1/events
//! SIGNATURE_SECRET_V1=s3cr3t dualsig status
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SIGNATURE_SECRET_V1` | *(required)* | Legacy v1 secret |
//! | `SIGNATURE_SECRET_V2` | value of `SIGNATURE_SECRET_V1` | v2 secret |
//! | `SIGNATURE_TIMESTAMP_TOLERANCE_SECS` | `120` | Allowed clock skew |
//! | `SIGNATURE_NONCE_TTL_SECS` | `600` | Nonce lifetime, 1 to 604800 |
//! | `SIGNATURE_NONCE_STORE_TIMEOUT_MS` | `250` | Bound on nonce store calls |
//! | `SIGNATURE_NONCE_PURGE_INTERVAL_SECS` | `300` | Nonce purge interval, 1 to 86400 |
//! | `SIGNATURE_DUAL_ENABLED` | `false` | Accept v1 until the rollout end |
//! | `SIGNATURE_ROLLOUT_END` | *(unset)* | RFC 3339 or unix milliseconds |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod cli;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dualsig_auth::nonce::MemoryNonceStore;
use dualsig_auth::{RequestSigner, SignatureValidator};
use dualsig_core::{Clock, SignatureConfig, SystemClock};
use http::{HeaderName, HeaderValue, Method, Request};
use tokio::io::AsyncReadExt;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, RequestTarget};

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config
/// value. Logs go to stderr so stdout carries only command output.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

async fn read_body(target: &RequestTarget) -> Result<Vec<u8>> {
    match target.body_file() {
        None => {
            let mut body = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut body)
                .await
                .context("failed to read body from stdin")?;
            Ok(body)
        }
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read body from {}", path.display())),
    }
}

fn sign(
    config: &SignatureConfig,
    clock: Arc<dyn Clock>,
    method: &str,
    path: &str,
    body: &[u8],
    v1: bool,
    nonce: bool,
) -> Result<()> {
    let signer = RequestSigner::builder()
        .secret_v1(v1.then(|| config.secret_v1.clone()))
        .secret_v2(Some(config.effective_secret_v2().clone()))
        .clock(clock)
        .include_nonce(nonce)
        .build();
    let headers = signer.sign(method, path, body);

    let mut out = std::io::stdout().lock();
    for (name, value) in headers.to_pairs() {
        writeln!(out, "{name}: {value}")?;
    }
    Ok(())
}

async fn verify(
    config: &SignatureConfig,
    clock: Arc<dyn Clock>,
    method: &str,
    path: &str,
    body: &[u8],
    headers: &[(String, String)],
) -> Result<bool> {
    let mut builder = Request::builder()
        .method(Method::from_bytes(method.as_bytes()).context("invalid method")?)
        .uri(path);
    for (name, value) in headers {
        builder = builder.header(
            HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name: {name}"))?,
            HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {name}"))?,
        );
    }
    let (parts, ()) = builder
        .body(())
        .context("failed to build request")?
        .into_parts();

    let store = Arc::new(MemoryNonceStore::new(Arc::clone(&clock)));
    let validator = SignatureValidator::from_config(config, store, clock);
    let result = validator.validate_parts(&parts, body).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(result.valid)
}

fn status(config: &SignatureConfig, clock: &dyn Clock) -> Result<()> {
    let status = dualsig_auth::RolloutPolicy::from_config(config).status_at(clock.now());
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = SignatureConfig::from_env().context("failed to load signature configuration")?;
    init_tracing(&config.log_level)?;
    config.log_startup_warnings();
    debug!(?config, "configuration loaded");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Command::Sign(cmd) => {
            let body = read_body(&cmd.target).await?;
            let target = &cmd.target;
            sign(
                &config,
                clock,
                &target.method,
                &target.path,
                &body,
                !cmd.no_v1,
                !cmd.no_nonce,
            )
        }
        Command::Verify(cmd) => {
            let body = read_body(&cmd.target).await?;
            let target = &cmd.target;
            let valid = verify(
                &config,
                clock,
                &target.method,
                &target.path,
                &body,
                &cmd.headers,
            )
            .await?;
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Status => status(&config, clock.as_ref()),
    }
}
