//! File content hashing.
//!
//! MD5 digests feed the `MsiFileHash` table; SHA-256 fingerprints key the
//! cabinet cache.

use crate::binder::{data::FileHash, error::ErrorExt, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Calculates the installer file hash of a file.
///
/// The MD5 digest of the content is split into four signed parts.
pub async fn calculate_file_hash(file_path: &Path) -> Result<FileHash> {
    let content = tokio::fs::read(file_path)
        .await
        .fs_context("reading file for hash calculation", file_path)?;

    Ok(FileHash::from_digest(md5::compute(&content).0))
}

/// Incremental SHA-256 fingerprint over a sequence of fields.
///
/// Every field is length-prefixed so adjacent values cannot run together.
#[derive(Clone, Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&mut self, value: impl AsRef<[u8]>) -> &mut Self {
        let value = value.as_ref();
        self.hasher.update((value.len() as u64).to_le_bytes());
        self.hasher.update(value);
        self
    }

    /// Adds the SHA-256 digest of a file's content as one field.
    pub fn file(&mut self, path: &Path) -> Result<&mut Self> {
        let mut file = std::fs::File::open(path).fs_context("opening file for fingerprint", path)?;
        let mut content = Sha256::new();
        std::io::copy(&mut file, &mut content).fs_context("reading file for fingerprint", path)?;
        Ok(self.field(content.finalize()))
    }

    /// Hex-encoded digest (64 characters).
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Stable identifier for a generated row: `prefix` followed by 32 hex digits
/// derived from `parts`.
pub fn generate_identifier(prefix: &str, parts: &[&str]) -> String {
    let mut fingerprint = Fingerprint::new();
    for part in parts {
        fingerprint.field(part);
    }
    let digest = fingerprint.finish().to_ascii_uppercase();
    format!("{prefix}{}", &digest[..32])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_separates_fields() {
        let mut joined = Fingerprint::new();
        joined.field("ab").field("c");
        let mut split = Fingerprint::new();
        split.field("a").field("bc");

        assert_ne!(joined.finish(), split.finish());
    }

    #[test]
    fn generated_identifiers_are_stable_and_distinct() {
        let first = generate_identifier("reg", &["Provider", "Dependency", "MinVersion"]);
        assert_eq!(first, generate_identifier("reg", &["Provider", "Dependency", "MinVersion"]));
        assert_ne!(first, generate_identifier("reg", &["Provider", "Dependency", "MaxVersion"]));
        assert_eq!(first.len(), 35);
        assert!(first.starts_with("reg"));
    }

    #[tokio::test]
    async fn file_hash_matches_md5_of_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("readme.txt");
        std::fs::write(&path, b"hello").expect("write");

        let hash = calculate_file_hash(&path).await.expect("hash");
        assert_eq!(hash, FileHash::from_digest(md5::compute(b"hello").0));
    }
}
