//! Error types for laekning-eventhub
//!
//! This module defines the crate-level error type, using `thiserror` for
//! ergonomic error handling. Module-specific errors (decoding, credentials,
//! Key Vault, connection strings, the partition consumer) live next to the
//! code that produces them and convert into [`LaekningError`] at the command
//! boundary.

use thiserror::Error;

/// Main error type for laekning-eventhub operations
///
/// Everything that can stop the program before or while it is polling the
/// event stream ends up as one of these variants. Per-record decode failures
/// are not part of this enum; they are reported and skipped.
#[derive(Error, Debug)]
pub enum LaekningError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Secret resolution errors (missing, empty or unreadable secrets)
    #[error("Secret error: {0}")]
    Secret(String),

    /// Token acquisition errors
    #[error("Credential error: {0}")]
    Credential(String),

    /// Connection descriptor errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Event stream consumer errors
    #[error("Consumer error: {0}")]
    Consumer(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for laekning-eventhub operations
///
/// Uses `anyhow::Error` so command handlers can attach context while
/// propagating any of the module errors.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = LaekningError::Config("batch_size must be greater than 0".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: batch_size must be greater than 0"
        );
    }

    #[test]
    fn test_secret_error_display() {
        let error = LaekningError::Secret("EventHubName is empty".to_string());
        assert_eq!(error.to_string(), "Secret error: EventHubName is empty");
    }

    #[test]
    fn test_credential_error_display() {
        let error = LaekningError::Credential("no credential succeeded".to_string());
        assert_eq!(
            error.to_string(),
            "Credential error: no credential succeeded"
        );
    }

    #[test]
    fn test_connection_error_display() {
        let error = LaekningError::Connection("missing Endpoint".to_string());
        assert_eq!(error.to_string(), "Connection error: missing Endpoint");
    }

    #[test]
    fn test_consumer_error_display() {
        let error = LaekningError::Consumer("no partitions".to_string());
        assert_eq!(error.to_string(), "Consumer error: no partitions");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: LaekningError = io_error.into();
        assert!(matches!(error, LaekningError::Io(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: LaekningError = yaml_error.into();
        assert!(matches!(error, LaekningError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LaekningError>();
    }
}
