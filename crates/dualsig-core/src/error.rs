//! Error types for the dualsig core.

/// Core error type for dualsig configuration and infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum DualSigError {
    /// A required configuration value is missing.
    #[error("missing configuration value: {0}")]
    MissingConfig(&'static str),

    /// A configuration value could not be parsed.
    #[error("invalid configuration value for {name}: {reason}")]
    InvalidConfig {
        /// The variable or field name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Convenience result type for dualsig core operations.
pub type DualSigResult<T> = Result<T, DualSigError>;
