//! Outcome of a successful bind.

use crate::binder::{
    Result,
    data::{SourceLineNumber, TrackedFiles, WindowsInstallerData},
    utils::fs,
};
use std::path::PathBuf;

/// A file the caller still has to put in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileTransfer {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Move rather than copy; the source is a scratch file.
    pub move_file: bool,
    pub source_line: Option<SourceLineNumber>,
}

impl FileTransfer {
    pub fn copy(source: PathBuf, destination: PathBuf) -> Self {
        Self {
            source,
            destination,
            move_file: false,
            source_line: None,
        }
    }

    pub fn with_source_line(mut self, source_line: Option<SourceLineNumber>) -> Self {
        self.source_line = source_line;
        self
    }

    /// Source and destination are the same file.
    pub fn is_redundant(&self) -> bool {
        self.source == self.destination
    }

    /// Performs the transfer, creating destination directories as needed.
    pub async fn execute(&self) -> Result<()> {
        if self.is_redundant() {
            return Ok(());
        }
        log::debug!(
            "{} {} to {}",
            if self.move_file { "Moving" } else { "Copying" },
            self.source.display(),
            self.destination.display()
        );
        if self.move_file {
            fs::move_file(&self.source, &self.destination).await
        } else {
            fs::copy_file(&self.source, &self.destination).await
        }
    }
}

/// Everything a bind produced.
#[derive(Clone, Debug)]
pub struct BindResult {
    /// The table model written to [`BindResult::database_path`].
    pub data: WindowsInstallerData,
    pub database_path: PathBuf,
    pub pdb_path: Option<PathBuf>,
    pub tracked_files: TrackedFiles,
    /// Cabinets and uncompressed files to lay out next to the database.
    pub file_transfers: Vec<FileTransfer>,
}

impl BindResult {
    /// Executes every pending file transfer in order.
    pub async fn transfer_files(&self) -> Result<usize> {
        let mut transferred = 0;
        for transfer in &self.file_transfers {
            if transfer.is_redundant() {
                continue;
            }
            transfer.execute().await?;
            transferred += 1;
        }
        Ok(transferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::data::OutputType;

    #[tokio::test]
    async fn transfers_copy_and_move() {
        let dir = tempfile::tempdir().expect("tempdir");
        let copied = dir.path().join("copied.txt");
        let moved = dir.path().join("moved.txt");
        std::fs::write(&copied, b"copy").expect("write");
        std::fs::write(&moved, b"move").expect("write");

        let result = BindResult {
            data: WindowsInstallerData::new(OutputType::Package, 65001),
            database_path: dir.path().join("product.msi"),
            pdb_path: None,
            tracked_files: TrackedFiles::new(),
            file_transfers: vec![
                FileTransfer::copy(copied.clone(), dir.path().join("out").join("copied.txt")),
                FileTransfer {
                    move_file: true,
                    ..FileTransfer::copy(moved.clone(), dir.path().join("out").join("moved.txt"))
                },
                FileTransfer::copy(copied.clone(), copied.clone()),
            ],
        };

        assert_eq!(result.transfer_files().await.expect("transfer"), 2);
        assert!(copied.is_file());
        assert!(!moved.exists());
        assert_eq!(
            std::fs::read(dir.path().join("out").join("moved.txt")).expect("read"),
            b"move"
        );
    }
}
