//! Ledger of every file the binder read or wrote.

use super::symbol::SourceLineNumber;
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Purpose of a tracked file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackedFileType {
    /// Read by the bind.
    Input,
    /// Produced by the bind.
    BuiltOutput,
    /// Copied or moved into the layout.
    CopiedOutput,
    /// Kept in the intermediate folder.
    Intermediate,
    /// Scratch file.
    Temporary,
}

impl TrackedFileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::BuiltOutput => "BuiltOutput",
            Self::CopiedOutput => "CopiedOutput",
            Self::Intermediate => "Intermediate",
            Self::Temporary => "Temporary",
        }
    }

    /// Parses a type name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        [
            Self::Input,
            Self::BuiltOutput,
            Self::CopiedOutput,
            Self::Intermediate,
            Self::Temporary,
        ]
        .into_iter()
        .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for TrackedFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    pub path: PathBuf,
    pub file_type: TrackedFileType,
    pub source: Option<SourceLineNumber>,
}

impl TrackedFile {
    /// Tracks `path` made absolute against the current directory.
    pub fn new(path: &Path, file_type: TrackedFileType) -> Self {
        let path = path
            .absolutize()
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| path.to_path_buf());
        Self {
            path,
            file_type,
            source: None,
        }
    }

    pub fn with_source(mut self, source: Option<SourceLineNumber>) -> Self {
        self.source = source;
        self
    }
}

/// Append-only list of [`TrackedFile`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFiles(Vec<TrackedFile>);

impl TrackedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a file and returns its absolute path.
    pub fn track(&mut self, path: &Path, file_type: TrackedFileType) -> PathBuf {
        let tracked = TrackedFile::new(path, file_type);
        let path = tracked.path.clone();
        self.0.push(tracked);
        path
    }

    pub fn push(&mut self, tracked: TrackedFile) {
        self.0.push(tracked);
    }

    pub fn extend(&mut self, tracked: impl IntoIterator<Item = TrackedFile>) {
        self.0.extend(tracked);
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedFile> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn of_type(&self, file_type: TrackedFileType) -> impl Iterator<Item = &TrackedFile> {
        self.0.iter().filter(move |t| t.file_type == file_type)
    }
}

impl IntoIterator for TrackedFiles {
    type Item = TrackedFile;
    type IntoIter = std::vec::IntoIter<TrackedFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
