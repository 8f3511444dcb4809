//! Command line interface for the installer database binder.
//!
//! This module parses arguments, runs the [`Binder`] and lays out its output.

mod args;

pub use args::Args;

use crate::binder::{Binder, Intermediate, SubStorage, WindowsInstallerData};
use crate::error::{CliError, Result};
use std::path::Path;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute(&args).await
}

/// Runs one bind for already parsed arguments.
///
/// Returns 0 only when the database was produced and every file was laid
/// out; 1 when the binder reported errors.
pub async fn execute(args: &Args) -> Result<i32> {
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let settings = args.settings()?;
    let intermediate = Intermediate::load(&args.section)?;
    let transforms = load_transforms(args)?;

    let mut binder = Binder::new(settings);
    let Some(result) = binder.bind(intermediate, transforms).await? else {
        eprintln!(
            "Bind failed with {} error(s)",
            binder.messaging().error_count()
        );
        return Ok(1);
    };

    let transferred = result.transfer_files().await?;
    log::info!("Transferred {transferred} file(s)");
    println!("{}", result.database_path.display());
    Ok(0)
}

fn load_transforms(args: &Args) -> Result<Vec<SubStorage>> {
    let paths = args
        .transform_paths()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    paths
        .into_iter()
        .map(|(name, path)| {
            Ok(SubStorage {
                name,
                data: load_table_set(&path)?,
            })
        })
        .collect()
}

fn load_table_set(path: &Path) -> Result<WindowsInstallerData> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
