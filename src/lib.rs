//! Installer database binder library.
//!
//! Turns a linked, resolved installer intermediate into a Windows Installer
//! style database, its cabinets and the list of files to lay out beside it.
//!
//! It can be used both as a CLI tool and as a library dependency; see
//! [`binder`] for the library entry point.

pub mod binder;
pub mod cli;
pub mod error;
pub mod metadata;

// Re-export commonly used types
pub use binder::{BindResult, BindSettings, Binder, SettingsBuilder};
pub use error::{BinderError, CliError, Result};
