//! Command-line argument parsing.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};

/// Sign, verify, and inspect dual-version request signatures.
#[derive(Parser, Debug)]
#[command(name = "dualsig", disable_help_subcommand = true)]
pub struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print the signature headers for a request.
    Sign(SignCommand),
    /// Validate a request against supplied headers.
    Verify(VerifyCommand),
    /// Print the rollout status as JSON.
    Status,
}

/// The request a command operates on.
#[derive(Args, Debug, PartialEq, Eq)]
pub struct RequestTarget {
    /// HTTP method.
    pub method: String,
    /// Path with optional query.
    pub path: String,
    /// Body file; stdin when `-` or omitted.
    #[arg(value_name = "BODY_FILE")]
    pub body: Option<PathBuf>,
}

impl RequestTarget {
    /// The body file, or `None` for stdin.
    #[must_use]
    pub fn body_file(&self) -> Option<&Path> {
        self.body.as_deref().filter(|p| p.as_os_str() != "-")
    }
}

/// Arguments for `sign`.
#[derive(Args, Debug, PartialEq, Eq)]
pub struct SignCommand {
    /// Request to sign.
    #[command(flatten)]
    pub target: RequestTarget,
    /// Omit the legacy v1 signature.
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_v1: bool,
    /// Omit the nonce header.
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_nonce: bool,
}

/// Arguments for `verify`.
#[derive(Args, Debug, PartialEq, Eq)]
pub struct VerifyCommand {
    /// Request to verify.
    #[command(flatten)]
    pub target: RequestTarget,
    /// Request header as `name:value`; repeatable.
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("header must be name:value, got {raw:?}"))?;
    Ok((name.trim().to_ascii_lowercase(), value.trim().to_owned()))
}
