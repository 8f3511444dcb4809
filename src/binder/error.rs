//! Fatal binder errors.
//!
//! Recoverable problems found while binding are *diagnostics* and are written to
//! [`Messaging`](super::Messaging). The types in this module are reserved for
//! invariant violations and I/O failures that make continuing impossible.

use std::{fmt::Display, path::PathBuf};

use super::data::SymbolKind;

/// Result type alias for binder operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a bind immediately.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Error with added context.
    #[error("{context}: {source}")]
    Context {
        /// What was being attempted.
        context: String,
        /// Underlying error.
        source: Box<Self>,
    },

    /// File system error tied to a path.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Operation being performed.
        context: &'static str,
        /// Path the operation was performed on.
        path: PathBuf,
        /// Underlying I/O error.
        error: std::io::Error,
    },

    /// Plain I/O error.
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    /// Zip container error.
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    /// Invalid pattern.
    #[error("{0}")]
    RegexError(#[from] regex::Error),

    /// Walking a directory tree failed.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// A cabinet worker task panicked or was cancelled.
    #[error("cabinet worker failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    /// Exactly one symbol of a kind was expected in the section.
    #[error("exactly one {kind} symbol expected in the section but found {count}")]
    SingleSymbolExpected {
        /// Kind that was looked up.
        kind: SymbolKind,
        /// Number of symbols actually found.
        count: usize,
    },

    /// The intermediate did not contain exactly one section.
    #[error("intermediate {id} must contain exactly one section but has {count}")]
    SingleSectionExpected {
        /// Intermediate id.
        id: String,
        /// Number of sections found.
        count: usize,
    },

    /// Generic error.
    #[error("{0}")]
    GenericError(String),
}

/// Convenient extension for attaching context to errors and empty options.
pub trait Context<T> {
    /// Wraps the error value with additional context.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Wraps the error value with lazily evaluated context.
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context {
            context: context.to_string(),
            source: Box::new(e),
        })
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context {
            context: f().to_string(),
            source: Box::new(e),
        })
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Attaches file system context to I/O results.
pub trait ErrorExt<T> {
    /// Maps an I/O error to [`Error::Fs`] naming the operation and path.
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Returns early with a [`Error::GenericError`].
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::binder::Error::GenericError($msg.into()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::binder::Error::GenericError(format!($fmt, $($arg)*)))
    };
}
