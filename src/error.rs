//! Crate error type.
//!
//! Upstream outcomes are not errors here: the invoker classifies them into
//! [`crate::invoker::InvokeResult`]. `GateError` covers infrastructure
//! failures such as bad configuration or client construction.

use thiserror::Error;

/// Errors raised while configuring or running the gateway.
#[derive(Debug, Error)]
pub enum GateError {
    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure talking to the upstream generation service.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Filesystem error (config file reads).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML config parse failure.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = GateError::Config("timeout must be non-zero".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: timeout must be non-zero"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GateError = io.into();
        assert!(matches!(err, GateError::Io(_)));
    }
}
