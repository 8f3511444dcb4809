//! Accumulating diagnostic sink.
//!
//! Stages never stop at the first problem. Each problem is recorded here as a
//! [`Diagnostic`] and the orchestrator checks [`Messaging::encountered_error`]
//! at stage boundaries.

use super::data::SourceLineNumber;
use std::{
    fmt,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// Every problem the binder knows how to report.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Message {
    #[error("intermediate {id} must be linked and resolved before binding")]
    IntermediatesMustBeResolved { id: String },

    #[error("the codepage '{value}' is not valid for an installer database")]
    InvalidCodepage { value: String },

    #[error("the product version '{version}' is invalid; expected major.minor.build with major and minor at most 255 and build at most 65535")]
    InvalidProductVersion { version: String },

    #[error("unresolved bind-time variable '{variable}' in field {field} of {symbol}")]
    UnresolvedBindVariable {
        symbol: String,
        field: String,
        variable: String,
    },

    #[error("could not read text file '{path}' for field {field}: {reason}")]
    TextFileUnreadable {
        path: PathBuf,
        field: String,
        reason: String,
    },

    #[error("duplicate table definition '{table}'")]
    DuplicateTableDefinition { table: String },

    #[error("action '{action}' in {table} is scheduled relative to '{parent}' which is not in the table")]
    ActionParentMissing {
        table: String,
        action: String,
        parent: String,
    },

    #[error("action '{action}' in {table} participates in a circular ordering dependency")]
    ActionCircularDependency { table: String, action: String },

    #[error("action '{action}' in {table} has no sequence and is not a standard action")]
    ActionNotScheduled { table: String, action: String },

    #[error("no free sequence number for action '{action}' in {table} relative to '{parent}'")]
    ActionCannotBeSequenced {
        table: String,
        action: String,
        parent: String,
    },

    #[error("the required property '{property}' is missing")]
    MissingRequiredProperty { property: String },

    #[error("file '{id}' from merge module '{merge}' collides with a file already in the package; move it to a different identifier")]
    DuplicateFileId { id: String, merge: String },

    #[error("could not open merge module '{path}': {reason}")]
    MergeModuleUnreadable { path: PathBuf, reason: String },

    #[error("could not extract embedded file '{id}' from '{uri}': {reason}")]
    EmbeddedFileExtractFailed {
        id: String,
        uri: PathBuf,
        reason: String,
    },

    #[error("the file '{path}' for {file} could not be found: {reason}")]
    FileNotFound {
        file: String,
        path: PathBuf,
        reason: String,
    },

    #[error("component '{component}' has an invalid GUID '{guid}'")]
    InvalidComponentGuid { component: String, guid: String },

    #[error("component '{component}' has the same GUID {guid} as component '{other}'")]
    DuplicateComponentGuid {
        component: String,
        other: String,
        guid: String,
    },

    #[error("cannot generate a GUID for component '{component}': it has no key path and shares directory '{directory}' with '{other}'")]
    ComponentDirectoryGuidConflict {
        component: String,
        other: String,
        directory: String,
    },

    #[error("cannot generate a GUID for component '{component}': its key path could not be resolved")]
    CannotResolveKeyPath { component: String },

    #[error("directory '{directory}' is referenced but not defined")]
    UndefinedDirectory { directory: String },

    #[error("file '{file}' is assigned to disk {disk_id} but no media with that id exists")]
    MissingMedia { file: String, disk_id: u32 },

    #[error("cabinet '{cabinet}' could not be created: {reason}")]
    CabinetCreationFailed { cabinet: String, reason: String },

    #[error("symbol kind '{kind}' is not understood by the binder or any extension")]
    UnknownSymbolKind { kind: String },

    #[error("custom table row for '{table}' refers to an undefined table")]
    UndefinedCustomTable { table: String },

    #[error("table '{table}' in merge module '{merge}' has a different schema than the package")]
    ModuleTableSchemaMismatch { table: String, merge: String },

    #[error("merging module '{merge}' conflicts on {table} row '{key}', which cannot be renamed")]
    MergeConflict {
        merge: String,
        table: String,
        key: String,
    },

    #[error("stream data '{path}' for {table} could not be read: {reason}")]
    StreamDataUnreadable {
        table: String,
        path: PathBuf,
        reason: String,
    },

    #[error("'{path}' is larger than an installer database ({kind}) may be")]
    WindowsInstallerFileTooLarge { path: PathBuf, kind: String },

    #[error("post-bind extension failed: {reason}")]
    PostBindFailed { reason: String },
}

impl Message {
    /// Stable numeric id of the message.
    pub fn id(&self) -> u32 {
        match self {
            Self::IntermediatesMustBeResolved { .. } => 1,
            Self::InvalidCodepage { .. } => 2,
            Self::InvalidProductVersion { .. } => 3,
            Self::UnresolvedBindVariable { .. } => 4,
            Self::TextFileUnreadable { .. } => 5,
            Self::DuplicateTableDefinition { .. } => 6,
            Self::ActionParentMissing { .. } => 10,
            Self::ActionCircularDependency { .. } => 11,
            Self::ActionCannotBeSequenced { .. } => 12,
            Self::MissingRequiredProperty { .. } => 13,
            Self::ActionNotScheduled { .. } => 14,
            Self::DuplicateFileId { .. } => 20,
            Self::MergeModuleUnreadable { .. } => 21,
            Self::EmbeddedFileExtractFailed { .. } => 22,
            Self::FileNotFound { .. } => 23,
            Self::InvalidComponentGuid { .. } => 30,
            Self::DuplicateComponentGuid { .. } => 31,
            Self::ComponentDirectoryGuidConflict { .. } => 32,
            Self::CannotResolveKeyPath { .. } => 33,
            Self::UndefinedDirectory { .. } => 34,
            Self::MissingMedia { .. } => 40,
            Self::CabinetCreationFailed { .. } => 41,
            Self::UnknownSymbolKind { .. } => 50,
            Self::UndefinedCustomTable { .. } => 51,
            Self::ModuleTableSchemaMismatch { .. } => 52,
            Self::MergeConflict { .. } => 53,
            Self::StreamDataUnreadable { .. } => 54,
            Self::WindowsInstallerFileTooLarge { .. } => 60,
            Self::PostBindFailed { .. } => 61,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: Message,
    pub source: Option<SourceLineNumber>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        if let Some(source) = &self.source {
            write!(f, "{source}: ")?;
        }
        write!(f, "{level} MSI{:04}: {}", self.message.id(), self.message)
    }
}

/// Shared, clonable diagnostic sink.
#[derive(Clone, Debug, Default)]
pub struct Messaging {
    diagnostics: Arc<Mutex<Vec<Diagnostic>>>,
}

impl Messaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self, source: Option<&SourceLineNumber>, message: Message) {
        self.write(Severity::Error, source, message);
    }

    pub fn warning(&self, source: Option<&SourceLineNumber>, message: Message) {
        self.write(Severity::Warning, source, message);
    }

    fn write(&self, severity: Severity, source: Option<&SourceLineNumber>, message: Message) {
        let diagnostic = Diagnostic {
            severity,
            message,
            source: source.cloned(),
        };
        match severity {
            Severity::Warning => log::warn!("{diagnostic}"),
            Severity::Error => log::error!("{diagnostic}"),
        }
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    /// True once any error-severity diagnostic was recorded.
    pub fn encountered_error(&self) -> bool {
        self.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Snapshot of everything recorded so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_do_not_count_as_errors() {
        let messaging = Messaging::new();
        messaging.warning(
            None,
            Message::PostBindFailed {
                reason: "disk full".into(),
            },
        );
        assert!(!messaging.encountered_error());

        let clone = messaging.clone();
        clone.error(
            Some(&SourceLineNumber::new("product.wxs", Some(7))),
            Message::InvalidCodepage {
                value: "abc".into(),
            },
        );
        assert!(messaging.encountered_error());
        assert_eq!(messaging.diagnostics().len(), 2);
        assert_eq!(
            messaging.diagnostics()[1].to_string(),
            "product.wxs(7): error MSI0002: the codepage 'abc' is not valid for an installer database"
        );
    }
}
