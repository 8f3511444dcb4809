//! Tracked file ledger output.

use crate::binder::{
    Result,
    data::{TrackedFile, TrackedFileType, TrackedFiles, WindowsInstallerData},
    database::generate::object_paths,
    error::ErrorExt,
};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

/// Tracks every object column path of `data` as an input unless it is
/// already tracked as an input or a scratch file.
pub fn track_input_files(data: &WindowsInstallerData, tracked: &mut TrackedFiles) {
    let known: HashSet<PathBuf> = tracked
        .iter()
        .filter(|t| {
            matches!(
                t.file_type,
                TrackedFileType::Input | TrackedFileType::Intermediate | TrackedFileType::Temporary
            )
        })
        .map(|t| t.path.clone())
        .collect();

    let mut added = HashSet::new();
    for (_, path) in object_paths(data) {
        let input = TrackedFile::new(&path, TrackedFileType::Input);
        if known.contains(&input.path) || !added.insert(input.path.clone()) {
            continue;
        }
        tracked.push(input);
    }
}

/// Writes the ledger as `Type<TAB>Path` lines.
pub async fn write_tracking_file(path: &Path, tracked: &TrackedFiles) -> Result<()> {
    let mut content = String::new();
    for file in tracked.iter() {
        content.push_str(file.file_type.as_str());
        content.push('\t');
        content.push_str(&file.path.to_string_lossy());
        content.push('\n');
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .fs_context("creating tracking file directory", parent)?;
    }
    tokio::fs::write(path, content)
        .await
        .fs_context("writing tracking file", path)
}

/// One line of a tracking file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedEntry {
    /// Type name as written; unknown names are kept.
    pub tracked_type: String,
    pub path: PathBuf,
}

/// A tracking file read back and split by purpose.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackingReport {
    pub all: Vec<TrackedEntry>,
    pub built_outputs: Vec<PathBuf>,
    pub copied_outputs: Vec<PathBuf>,
    pub inputs: Vec<PathBuf>,
    /// Built and copied outputs.
    pub outputs: Vec<PathBuf>,
    /// Lines that are not `Type<TAB>Path`.
    pub malformed: Vec<String>,
}

/// Reads a tracking file. A missing file yields an empty report.
pub fn read_tracking(path: &Path) -> Result<TrackingReport> {
    let mut report = TrackingReport::default();
    if !path.is_file() {
        return Ok(report);
    }

    let content = std::fs::read_to_string(path).fs_context("reading tracking file", path)?;
    for line in content.lines() {
        let parts = line
            .split_once('\t')
            .filter(|(tracked_type, path)| !tracked_type.is_empty() && !path.is_empty());
        let Some((tracked_type, file)) = parts else {
            log::error!("Failed to parse tracked line: {line}");
            report.malformed.push(line.to_string());
            continue;
        };

        let file = PathBuf::from(file);
        match TrackedFileType::parse(tracked_type) {
            Some(TrackedFileType::BuiltOutput) => {
                report.built_outputs.push(file.clone());
                report.outputs.push(file.clone());
            }
            Some(TrackedFileType::CopiedOutput) => {
                report.copied_outputs.push(file.clone());
                report.outputs.push(file.clone());
            }
            Some(TrackedFileType::Input) => report.inputs.push(file.clone()),
            _ => {}
        }
        report.all.push(TrackedEntry {
            tracked_type: tracked_type.to_string(),
            path: file,
        });
    }

    Ok(report)
}
