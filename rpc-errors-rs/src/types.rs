//! # Crate Error Types
//!
//! Errors raised by this crate's own plumbing (configuration loading,
//! session options, logging setup). Failures that are being translated for
//! the wire are modelled by [`crate::failure::Failure`], not by this type.

/// A type alias for Result with the error type defaulting to our Error
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid value for session option {key}: {value}")]
    InvalidSessionOption { key: String, value: String },

    #[error("Unknown session option: {0}")]
    UnknownSessionOption(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidSessionOption {
            key: "phoenix.errors.enrichment.enabled".to_string(),
            value: "maybe".to_string(),
        };

        let display = err.to_string();
        assert!(display.contains("phoenix.errors.enrichment.enabled"));
        assert!(display.contains("maybe"));
    }
}
