//! Builder for constructing BindSettings.

use super::{BindSettings, CompressionLevel};
use std::path::{Path, PathBuf};

/// Builder for constructing [`BindSettings`].
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_msi::binder::{CompressionLevel, SettingsBuilder};
///
/// # fn example() -> kodegen_bundler_msi::binder::Result<()> {
/// let settings = SettingsBuilder::new()
///     .intermediate_folder("obj")
///     .output_path("bin/product.msi")
///     .cab_cache_path("cabcache")
///     .default_compression_level(CompressionLevel::High)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
    intermediate_folder: Option<PathBuf>,
    output_path: Option<PathBuf>,
    pdb_path: Option<PathBuf>,
    resolved_codepage: Option<i32>,
    resolved_summary_information_codepage: Option<i32>,
    resolved_lcid: Option<i32>,
    default_compression_level: Option<CompressionLevel>,
    cab_cache_path: Option<PathBuf>,
    cabbing_thread_count: Option<usize>,
    suppress_layout: bool,
    suppress_adding_validation_rows: bool,
    tracking_file: Option<PathBuf>,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the intermediate folder.
    ///
    /// # Required
    ///
    /// This field is required for building.
    pub fn intermediate_folder<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.intermediate_folder = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the database output path.
    ///
    /// # Required
    ///
    /// This field is required for building.
    pub fn output_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the debug database path.
    ///
    /// Default: None (no debug database)
    pub fn pdb_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.pdb_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Codepage used when the package authors none.
    ///
    /// Default: None (65001)
    pub fn resolved_codepage(mut self, codepage: i32) -> Self {
        self.resolved_codepage = Some(codepage);
        self
    }

    /// Summary information codepage override.
    pub fn resolved_summary_information_codepage(mut self, codepage: i32) -> Self {
        self.resolved_summary_information_codepage = Some(codepage);
        self
    }

    /// Language used when the package authors none.
    pub fn resolved_lcid(mut self, lcid: i32) -> Self {
        self.resolved_lcid = Some(lcid);
        self
    }

    /// Default compression level for cabinets.
    ///
    /// Default: None ([`CompressionLevel::Mszip`])
    pub fn default_compression_level(mut self, level: CompressionLevel) -> Self {
        self.default_compression_level = Some(level);
        self
    }

    /// Cabinet cache directory.
    ///
    /// Default: None (no reuse between builds)
    pub fn cab_cache_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cab_cache_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Number of cabinets built concurrently.
    ///
    /// Default: number of logical CPUs
    pub fn cabbing_thread_count(mut self, count: usize) -> Self {
        self.cabbing_thread_count = Some(count);
        self
    }

    /// Skip creating cabinets and laying out uncompressed files.
    ///
    /// Default: false
    pub fn suppress_layout(mut self, suppress: bool) -> Self {
        self.suppress_layout = suppress;
        self
    }

    /// Skip the `_Validation` table in the generated database.
    ///
    /// Default: false
    pub fn suppress_adding_validation_rows(mut self, suppress: bool) -> Self {
        self.suppress_adding_validation_rows = suppress;
        self
    }

    /// Write the tracked file ledger to this path.
    ///
    /// Default: None
    pub fn tracking_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.tracking_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Builds the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing:
    /// - `intermediate_folder`
    /// - `output_path`
    pub fn build(self) -> crate::binder::Result<BindSettings> {
        use crate::binder::error::Context;

        let cabbing_thread_count = self
            .cabbing_thread_count
            .filter(|count| *count > 0)
            .unwrap_or_else(num_cpus::get);

        Ok(BindSettings::new(
            self.intermediate_folder
                .context("intermediate_folder is required")?,
            self.output_path.context("output_path is required")?,
            self.pdb_path,
            self.resolved_codepage,
            self.resolved_summary_information_codepage,
            self.resolved_lcid,
            self.default_compression_level,
            self.cab_cache_path,
            cabbing_thread_count,
            self.suppress_layout,
            self.suppress_adding_validation_rows,
            self.tracking_file,
        ))
    }
}
