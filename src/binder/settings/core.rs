//! Core BindSettings struct and implementations.

use super::CompressionLevel;
use std::path::{Path, PathBuf};

/// Main settings for bind operations.
///
/// Central configuration for the binder, constructed via [`SettingsBuilder`].
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_msi::binder::SettingsBuilder;
///
/// # fn example() -> kodegen_bundler_msi::binder::Result<()> {
/// let settings = SettingsBuilder::new()
///     .intermediate_folder("obj")
///     .output_path("bin/product.msi")
///     .cabbing_thread_count(4)
///     .build()?;
/// # Ok(())
/// # }
/// ```
///
/// [`SettingsBuilder`]: super::SettingsBuilder
#[derive(Clone, Debug)]
pub struct BindSettings {
    /// Working directory for extracted, generated and temporary files.
    intermediate_folder: PathBuf,

    /// Path of the installer database to produce.
    output_path: PathBuf,

    /// Optional companion debug database.
    pdb_path: Option<PathBuf>,

    /// Codepage used when the package does not author one.
    resolved_codepage: Option<i32>,

    /// Codepage of the summary information stream.
    resolved_summary_information_codepage: Option<i32>,

    /// Language used when the package does not author one.
    resolved_lcid: Option<i32>,

    /// Compression level for media that do not author one.
    default_compression_level: Option<CompressionLevel>,

    /// Directory of previously built cabinets keyed by content fingerprint.
    cab_cache_path: Option<PathBuf>,

    /// Size of the cabinet worker pool.
    cabbing_thread_count: usize,

    /// Skip cabinet creation and file layout.
    suppress_layout: bool,

    /// Skip the `_Validation` table.
    suppress_adding_validation_rows: bool,

    /// Where to write the tracked file ledger.
    tracking_file: Option<PathBuf>,
}

impl BindSettings {
    pub fn intermediate_folder(&self) -> &Path {
        &self.intermediate_folder
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Directory the database is written to; external cabinets and
    /// uncompressed files are laid out relative to it.
    pub fn layout_directory(&self) -> PathBuf {
        self.output_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    pub fn pdb_path(&self) -> Option<&Path> {
        self.pdb_path.as_deref()
    }

    pub fn resolved_codepage(&self) -> Option<i32> {
        self.resolved_codepage
    }

    pub fn resolved_summary_information_codepage(&self) -> Option<i32> {
        self.resolved_summary_information_codepage
    }

    pub fn resolved_lcid(&self) -> Option<i32> {
        self.resolved_lcid
    }

    pub fn default_compression_level(&self) -> Option<CompressionLevel> {
        self.default_compression_level
    }

    pub fn cab_cache_path(&self) -> Option<&Path> {
        self.cab_cache_path.as_deref()
    }

    pub fn cabbing_thread_count(&self) -> usize {
        self.cabbing_thread_count
    }

    pub fn suppress_layout(&self) -> bool {
        self.suppress_layout
    }

    pub fn suppress_adding_validation_rows(&self) -> bool {
        self.suppress_adding_validation_rows
    }

    pub fn tracking_file(&self) -> Option<&Path> {
        self.tracking_file.as_deref()
    }

    /// Creates a new BindSettings instance (used by SettingsBuilder).
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        intermediate_folder: PathBuf,
        output_path: PathBuf,
        pdb_path: Option<PathBuf>,
        resolved_codepage: Option<i32>,
        resolved_summary_information_codepage: Option<i32>,
        resolved_lcid: Option<i32>,
        default_compression_level: Option<CompressionLevel>,
        cab_cache_path: Option<PathBuf>,
        cabbing_thread_count: usize,
        suppress_layout: bool,
        suppress_adding_validation_rows: bool,
        tracking_file: Option<PathBuf>,
    ) -> Self {
        Self {
            intermediate_folder,
            output_path,
            pdb_path,
            resolved_codepage,
            resolved_summary_information_codepage,
            resolved_lcid,
            default_compression_level,
            cab_cache_path,
            cabbing_thread_count,
            suppress_layout,
            suppress_adding_validation_rows,
            tracking_file,
        }
    }
}
