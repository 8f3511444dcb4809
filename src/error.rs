//! Crate-level error types for the command line and configuration loading.
//!
//! Binder failures keep their own [`crate::binder::Error`]; this module wraps
//! them together with argument and configuration problems.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, BinderError>;

/// Main error type for the command line tool
#[derive(Error, Debug)]
pub enum BinderError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Binder errors
    #[error("Binder error: {0}")]
    Binder(#[from] crate::binder::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Missing required argument
    #[error("Missing required argument: {argument}")]
    MissingArgument {
        /// Argument name
        argument: String,
    },

    /// A configuration file could not be read
    #[error("Failed to read configuration {path}: {reason}")]
    ConfigUnreadable {
        /// Configuration file path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },
}

impl BinderError {
    /// Exit code reported for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cli(_) => 2,
            _ => 1,
        }
    }
}
