//! Error types for demo workflow operations

use std::path::Path;
use thiserror::Error;

/// Result type alias for demo workflow operations
pub type Result<T> = std::result::Result<T, DemoError>;

/// Error types for the demo workflow
#[derive(Error, Debug)]
pub enum DemoError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport failures while fetching a remote asset
    #[error("Network error: {message}: {source}")]
    Network {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Archive could not be opened or unpacked
    #[error("Archive error: {0}")]
    Archive(String),

    /// Downloaded bytes do not match the expected digest
    #[error("Integrity check failed for '{path}': expected {expected}, got {actual}")]
    Integrity {
        path: String,
        expected: String,
        actual: String,
    },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// External program could not be started
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Working directory is not a project root
    #[error("Preflight check failed: {0}")]
    Preflight(String),
}

impl DemoError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new archive error
    pub fn archive<S: Into<String>>(msg: S) -> Self {
        Self::Archive(msg.into())
    }

    /// Create a new preflight error
    pub fn preflight<S: Into<String>>(msg: S) -> Self {
        Self::Preflight(msg.into())
    }

    /// Create network error with a description of the failed transfer
    pub fn network_error<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Network {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<Path>>(operation: &str, path: P, error: &std::io::Error) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create archive error with the archive path
    pub fn archive_error<P: AsRef<Path>>(
        path: P,
        error: impl std::fmt::Display,
    ) -> Self {
        Self::Archive(format!(
            "Failed to extract '{}': {}",
            path.as_ref().display(),
            error
        ))
    }

    /// Create integrity error for a mismatching digest
    pub fn integrity_error<P: AsRef<Path>>(path: P, expected: &str, actual: &str) -> Self {
        Self::Integrity {
            path: path.as_ref().display().to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create launch error for a program that could not be spawned
    pub fn launch_error<S: Into<String>>(program: S, source: std::io::Error) -> Self {
        Self::Launch {
            program: program.into(),
            source,
        }
    }
}
