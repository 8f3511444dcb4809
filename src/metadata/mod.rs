//! Bind configuration loaded from a TOML file.
//!
//! ```toml
//! [bind]
//! intermediate_folder = "obj"
//! output = "bin/product.msi"
//! cab_cache = "~/.cache/kodegen/cabinets"
//! default_compression_level = "high"
//! threads = 4
//! ```

use crate::binder::CompressionLevel;
use crate::error::{BinderError, CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings read from the `[bind]` table.
///
/// Every field is optional; command line flags take precedence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BindManifest {
    pub intermediate_folder: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub pdb: Option<PathBuf>,
    pub codepage: Option<i32>,
    pub summary_codepage: Option<i32>,
    pub lcid: Option<i32>,
    pub default_compression_level: Option<CompressionLevel>,
    pub cab_cache: Option<PathBuf>,
    pub threads: Option<usize>,
    pub suppress_layout: Option<bool>,
    pub suppress_validation_rows: Option<bool>,
    pub tracking_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    bind: BindManifest,
}

/// Load the `[bind]` table of a TOML file.
///
/// Relative paths in the file are resolved against the file's directory.
/// A file without a `[bind]` table yields an empty manifest.
pub fn load_bind_manifest(path: &Path) -> Result<BindManifest> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        BinderError::Cli(CliError::ConfigUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    })?;

    let file: ManifestFile = toml::from_str(&content)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(file.bind.relative_to(base))
}

impl BindManifest {
    fn relative_to(self, base: &Path) -> Self {
        let resolve = |p: Option<PathBuf>| p.map(|p| if p.is_absolute() { p } else { base.join(p) });
        Self {
            intermediate_folder: resolve(self.intermediate_folder),
            output: resolve(self.output),
            pdb: resolve(self.pdb),
            cab_cache: resolve(self.cab_cache),
            tracking_file: resolve(self.tracking_file),
            ..self
        }
    }
}

/// Per-user cabinet cache, used when `--cab-cache` is given without a path.
pub fn default_cab_cache() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("kodegen").join("cabinets"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_table_paths_are_relative_to_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bind.toml");
        std::fs::write(
            &path,
            "[bind]\nintermediate_folder = \"obj\"\noutput = \"/abs/product.msi\"\nthreads = 2\ndefault_compression_level = \"high\"\n",
        )
        .expect("write");

        let manifest = load_bind_manifest(&path).expect("manifest");

        assert_eq!(manifest.intermediate_folder, Some(dir.path().join("obj")));
        assert_eq!(manifest.output, Some(PathBuf::from("/abs/product.msi")));
        assert_eq!(manifest.threads, Some(2));
        assert_eq!(manifest.default_compression_level, Some(CompressionLevel::High));
        assert_eq!(manifest.pdb, None);
    }

    #[test]
    fn missing_table_is_empty_and_unknown_keys_fail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let empty = dir.path().join("empty.toml");
        std::fs::write(&empty, "[other]\nx = 1\n").expect("write");
        assert_eq!(load_bind_manifest(&empty).expect("manifest"), BindManifest::default());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[bind]\nunknown = 1\n").expect("write");
        assert!(matches!(load_bind_manifest(&bad), Err(BinderError::Toml(_))));

        assert!(matches!(
            load_bind_manifest(&dir.path().join("missing.toml")),
            Err(BinderError::Cli(CliError::ConfigUnreadable { .. }))
        ));
    }
}
