//! Canonical per-file working record.

use super::symbol::SourceLineNumber;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a [`FileFacade`] came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacadeOrigin {
    /// A `File` symbol of the section, by index.
    Section { symbol: usize },
    /// A file row of a merged module.
    MergeModule { merge: String },
    /// A `File` row of a patch transform.
    Transform { storage: String, row: usize },
}

/// MSI file hash: MD5 of the content split into four 32-bit parts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHash(pub [i32; 4]);

impl FileHash {
    pub fn from_digest(digest: [u8; 16]) -> Self {
        let mut parts = [0i32; 4];
        for (part, chunk) in parts.iter_mut().zip(digest.chunks_exact(4)) {
            *part = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self(parts)
    }
}

/// Splits an installer file name of the form `short|long` into its long and
/// optional short part.
pub fn split_file_name(name: &str) -> (&str, Option<&str>) {
    match name.split_once('|') {
        Some((short, long)) => (long, Some(short)),
        None => (name, None),
    }
}

/// One installable file.
///
/// Facades are created once by the collector and then mutated in place by
/// later stages so that identity is preserved across passes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFacade {
    pub id: String,
    pub component: String,
    pub directory: String,
    /// Long file name in the target directory.
    pub name: String,
    /// Short (8.3) file name, when authored.
    pub short_name: Option<String>,
    /// Absolute path of the file to install.
    pub source_path: PathBuf,
    /// Disk id authored on the file, if any.
    pub disk_id: Option<u32>,
    /// Disk id after media assignment.
    pub assigned_disk_id: u32,
    pub sequence: u32,
    pub file_size: u64,
    pub version: Option<String>,
    pub language: Option<String>,
    pub hash: Option<FileHash>,
    /// Authored compression; `None` follows the package default.
    pub compressed: Option<bool>,
    /// Patch group of files added by a patch.
    pub patch_group: Option<i64>,
    pub origin: FacadeOrigin,
    pub source: Option<SourceLineNumber>,
}

impl FileFacade {
    pub fn from_module(&self) -> bool {
        matches!(self.origin, FacadeOrigin::MergeModule { .. })
    }

    pub fn from_transform(&self) -> bool {
        matches!(self.origin, FacadeOrigin::Transform { .. })
    }

    pub fn symbol_index(&self) -> Option<usize> {
        match self.origin {
            FacadeOrigin::Section { symbol } => Some(symbol),
            _ => None,
        }
    }

    /// Effective compression given the package default.
    pub fn is_compressed(&self, package_compressed: bool) -> bool {
        self.compressed.unwrap_or(package_compressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_split_into_long_and_short() {
        assert_eq!(split_file_name("APP~1.EXE|application.exe"), ("application.exe", Some("APP~1.EXE")));
        assert_eq!(split_file_name("app.exe"), ("app.exe", None));
    }

    #[test]
    fn hash_parts_are_little_endian() {
        let mut digest = [0u8; 16];
        digest[0] = 1;
        digest[4] = 0xff;
        digest[5] = 0xff;
        digest[6] = 0xff;
        digest[7] = 0xff;

        let hash = FileHash::from_digest(digest);
        assert_eq!(hash.0, [1, -1, 0, 0]);
    }
}
