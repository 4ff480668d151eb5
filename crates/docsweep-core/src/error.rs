//! Error types for docsweep

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using SweepError
pub type Result<T> = std::result::Result<T, SweepError>;

/// Error type alias for convenience
pub type Error = SweepError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOT_FOUND: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
    pub const USER_ABORT: i32 = 4;
}

/// Main error type for docsweep
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store error (HTTP {status}): {body}")]
    Store { status: u16, body: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Bulk write rejected {failed} of {total} documents (first: {first})")]
    BulkWrite {
        failed: usize,
        total: usize,
        first: String,
    },

    #[error("Audit write failed for {}: {source}", .path.display())]
    Audit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SweepError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DocumentNotFound(_) => exit_codes::NOT_FOUND,
            Self::InvalidInput(_) | Self::Config(_) => exit_codes::INVALID_INPUT,
            _ => exit_codes::GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            SweepError::DocumentNotFound("b1".into()).exit_code(),
            exit_codes::NOT_FOUND
        );
        assert_eq!(
            SweepError::InvalidInput("bad date".into()).exit_code(),
            exit_codes::INVALID_INPUT
        );
        assert_eq!(
            SweepError::Store {
                status: 500,
                body: "boom".into()
            }
            .exit_code(),
            exit_codes::GENERAL_ERROR
        );
    }

    #[test]
    fn test_audit_error_names_path() {
        let err = SweepError::Audit {
            path: PathBuf::from("/logs/cleaned_facilities_p1.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("cleaned_facilities_p1.json"));
    }
}
