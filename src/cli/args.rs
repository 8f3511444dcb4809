//! Command line argument parsing and validation.
//!
//! This module provides CLI argument parsing using clap and merges the
//! arguments over an optional `[bind]` configuration file.

use crate::binder::{BindSettings, CompressionLevel, SettingsBuilder};
use crate::error::{CliError, Result};
use crate::metadata::{BindManifest, default_cab_cache, load_bind_manifest};
use clap::Parser;
use std::path::PathBuf;

/// Installer database binder
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_bundler_msi",
    version,
    about = "Binds a linked installer intermediate into an installer database",
    long_about = "Binds a linked and resolved installer intermediate into an installer database,
builds its cabinets and lays out uncompressed files next to it.

Usage:
  kodegen_bundler_msi --section obj/product.wixipl.json --output bin/product.msi
  kodegen_bundler_msi --section obj/patch.json --output patch.msp --transform RTM=rtm.json
  kodegen_bundler_msi --section obj/product.json --config bind.toml --cab-cache

Exit code 0 = database guaranteed to exist at output path."
)]
pub struct Args {
    /// Linked intermediate to bind (JSON)
    #[arg(short = 's', long, value_name = "PATH")]
    pub section: PathBuf,

    /// Installer database to produce
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Working directory for extracted and temporary files
    ///
    /// Defaults to an `obj` directory next to the output.
    #[arg(long, value_name = "DIR")]
    pub intermediate_folder: Option<PathBuf>,

    /// Debug database to write alongside the output
    #[arg(long, value_name = "PATH")]
    pub pdb: Option<PathBuf>,

    /// Reuse cabinets from this cache directory
    ///
    /// Without a value the per-user cache directory is used.
    #[arg(long, value_name = "DIR", num_args = 0..=1)]
    pub cab_cache: Option<Option<PathBuf>>,

    /// Number of cabinets built in parallel
    #[arg(long, value_name = "COUNT")]
    pub threads: Option<usize>,

    /// TOML file with a [bind] table
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Patch transform as NAME=PATH (JSON table set); repeatable
    #[arg(long = "transform", value_name = "NAME=PATH")]
    pub transforms: Vec<String>,

    /// Write the tracked file ledger to this path
    #[arg(long, value_name = "PATH")]
    pub tracking_file: Option<PathBuf>,

    /// Codepage used when the package does not author one
    #[arg(long, value_name = "CODEPAGE")]
    pub codepage: Option<i32>,

    /// Language used when the package does not author one
    #[arg(long, value_name = "LCID")]
    pub lcid: Option<i32>,

    /// Compression level for media that do not author one
    #[arg(long, value_name = "LEVEL")]
    pub compression: Option<CompressionLevel>,

    /// Skip cabinet creation and file layout
    #[arg(long)]
    pub suppress_layout: bool,

    /// Do not add the _Validation table
    #[arg(long)]
    pub suppress_validation_rows: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.section.as_os_str().is_empty() {
            return Err("Section path cannot be empty".to_string());
        }
        if self.threads == Some(0) {
            return Err("Thread count must be at least 1".to_string());
        }
        for transform in &self.transforms {
            parse_transform(transform)?;
        }
        Ok(())
    }

    /// Patch transforms as `(name, path)` pairs.
    pub fn transform_paths(&self) -> std::result::Result<Vec<(String, PathBuf)>, String> {
        self.transforms.iter().map(|t| parse_transform(t)).collect()
    }

    /// Builds bind settings from these arguments layered over the
    /// configuration file, if any.
    pub fn settings(&self) -> Result<BindSettings> {
        let manifest = match &self.config {
            Some(path) => load_bind_manifest(path)?,
            None => BindManifest::default(),
        };

        let output = self
            .output
            .clone()
            .or(manifest.output)
            .ok_or_else(|| CliError::MissingArgument {
                argument: "--output".to_string(),
            })?;
        let intermediate_folder = self
            .intermediate_folder
            .clone()
            .or(manifest.intermediate_folder)
            .unwrap_or_else(|| {
                output
                    .parent()
                    .map(|p| p.join("obj"))
                    .unwrap_or_else(|| PathBuf::from("obj"))
            });

        let mut builder = SettingsBuilder::new()
            .intermediate_folder(intermediate_folder)
            .output_path(&output)
            .suppress_layout(self.suppress_layout || manifest.suppress_layout.unwrap_or(false))
            .suppress_adding_validation_rows(
                self.suppress_validation_rows || manifest.suppress_validation_rows.unwrap_or(false),
            );

        if let Some(pdb) = self.pdb.clone().or(manifest.pdb) {
            builder = builder.pdb_path(pdb);
        }
        if let Some(codepage) = self.codepage.or(manifest.codepage) {
            builder = builder.resolved_codepage(codepage);
        }
        if let Some(codepage) = manifest.summary_codepage {
            builder = builder.resolved_summary_information_codepage(codepage);
        }
        if let Some(lcid) = self.lcid.or(manifest.lcid) {
            builder = builder.resolved_lcid(lcid);
        }
        if let Some(level) = self.compression.or(manifest.default_compression_level) {
            builder = builder.default_compression_level(level);
        }
        if let Some(threads) = self.threads.or(manifest.threads) {
            builder = builder.cabbing_thread_count(threads);
        }
        if let Some(tracking) = self.tracking_file.clone().or(manifest.tracking_file) {
            builder = builder.tracking_file(tracking);
        }

        let cab_cache = match &self.cab_cache {
            Some(Some(path)) => Some(path.clone()),
            Some(None) => default_cab_cache(),
            None => manifest.cab_cache,
        };
        if let Some(cache) = cab_cache {
            builder = builder.cab_cache_path(cache);
        }

        Ok(builder.build()?)
    }
}

fn parse_transform(value: &str) -> std::result::Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("Invalid transform '{value}': expected NAME=PATH")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_the_configuration_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("bind.toml");
        std::fs::write(
            &config,
            "[bind]\noutput = \"from-config.msi\"\nthreads = 3\nsuppress_layout = true\n",
        )
        .expect("write");

        let args = Args::try_parse_from([
            "kodegen_bundler_msi",
            "--section",
            "product.json",
            "--config",
            config.to_str().expect("utf-8"),
            "--threads",
            "5",
        ])
        .expect("parse");
        let settings = args.settings().expect("settings");

        assert_eq!(settings.output_path(), dir.path().join("from-config.msi"));
        assert_eq!(settings.intermediate_folder(), dir.path().join("obj"));
        assert_eq!(settings.cabbing_thread_count(), 5);
        assert!(settings.suppress_layout());
        assert_eq!(settings.cab_cache_path(), None);
    }

    #[test]
    fn transforms_need_a_name_and_a_path() {
        let args = Args::try_parse_from([
            "kodegen_bundler_msi",
            "--section",
            "patch.json",
            "--output",
            "patch.msp",
            "--transform",
            "RTM=rtm.json",
            "--transform",
            "broken",
        ])
        .expect("parse");

        assert!(args.validate().is_err());
        assert_eq!(
            parse_transform("RTM=rtm.json"),
            Ok(("RTM".to_string(), PathBuf::from("rtm.json")))
        );
    }

    #[test]
    fn output_is_required_somewhere() {
        let args = Args::try_parse_from(["kodegen_bundler_msi", "--section", "product.json"])
            .expect("parse");
        assert!(args.settings().is_err());
    }
}
