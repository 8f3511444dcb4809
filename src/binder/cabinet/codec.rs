//! Cabinet codec contract and the default implementation.

use crate::binder::{Result, error::ErrorExt, settings::CompressionLevel};
use flate2::{read::GzDecoder, write::GzEncoder};
use std::{
    fs::File,
    path::{Path, PathBuf},
};

/// One file stored in a cabinet under `name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CabinetMember {
    /// Name of the entry inside the cabinet (the file id).
    pub name: String,
    pub source: PathBuf,
    pub size: u64,
    pub version: Option<String>,
}

/// Archive codec used for cabinets.
///
/// Implementations run on blocking worker threads and must be safe to call
/// concurrently for distinct cabinet paths.
pub trait CabinetCodec: Send + Sync {
    /// Writes `members` into a new archive at `cabinet`.
    fn create(&self, cabinet: &Path, members: &[CabinetMember], level: CompressionLevel)
    -> Result<()>;

    /// Extracts every entry of `cabinet` below `destination` and returns the
    /// extracted paths.
    fn extract(&self, cabinet: &Path, destination: &Path) -> Result<Vec<PathBuf>>;
}

/// Gzip-compressed tar archives with normalized headers.
///
/// Modification times, owners and modes are fixed so rebuilding a cabinet
/// from the same members produces the same bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct TarGzCodec;

impl CabinetCodec for TarGzCodec {
    fn create(
        &self,
        cabinet: &Path,
        members: &[CabinetMember],
        level: CompressionLevel,
    ) -> Result<()> {
        if let Some(parent) = cabinet.parent() {
            std::fs::create_dir_all(parent).fs_context("creating cabinet directory", parent)?;
        }

        let file = File::create(cabinet).fs_context("creating cabinet", cabinet)?;
        let mut builder = tar::Builder::new(GzEncoder::new(file, level.to_flate2()));
        builder.mode(tar::HeaderMode::Deterministic);

        for member in members {
            let mut source =
                File::open(&member.source).fs_context("opening cabinet member", &member.source)?;
            let size = source
                .metadata()
                .fs_context("reading cabinet member metadata", &member.source)?
                .len();

            let mut header = tar::Header::new_gnu();
            header.set_size(size);
            header.set_mode(0o644);
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);
            header.set_entry_type(tar::EntryType::Regular);
            builder
                .append_data(&mut header, &member.name, &mut source)
                .fs_context("adding cabinet member", &member.source)?;
        }

        builder
            .into_inner()
            .fs_context("finishing cabinet", cabinet)?
            .finish()
            .fs_context("finishing cabinet", cabinet)?;
        Ok(())
    }

    fn extract(&self, cabinet: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
        let file = File::open(cabinet).fs_context("opening cabinet", cabinet)?;
        std::fs::create_dir_all(destination)
            .fs_context("creating extraction directory", destination)?;

        tar::Archive::new(GzDecoder::new(file))
            .unpack(destination)
            .fs_context("extracting cabinet", cabinet)?;

        let mut extracted = Vec::new();
        for entry in walkdir::WalkDir::new(destination).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() {
                extracted.push(entry.into_path());
            }
        }
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(dir: &Path, name: &str, content: &[u8]) -> CabinetMember {
        let source = dir.join(format!("{name}.src"));
        std::fs::write(&source, content).expect("write member");
        CabinetMember {
            name: name.to_string(),
            source,
            size: content.len() as u64,
            version: None,
        }
    }

    #[test]
    fn rebuilding_produces_identical_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let members = vec![
            member(dir.path(), "app.exe", b"binary"),
            member(dir.path(), "readme.txt", b"read me"),
        ];

        let first = dir.path().join("first.cab");
        let second = dir.path().join("second.cab");
        TarGzCodec
            .create(&first, &members, CompressionLevel::High)
            .expect("first");
        TarGzCodec
            .create(&second, &members, CompressionLevel::High)
            .expect("second");

        assert_eq!(
            std::fs::read(&first).expect("read first"),
            std::fs::read(&second).expect("read second")
        );
    }

    #[test]
    fn extract_returns_members_by_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let members = vec![member(dir.path(), "lib.dll", b"library")];
        let cabinet = dir.path().join("module.cab");
        TarGzCodec
            .create(&cabinet, &members, CompressionLevel::Mszip)
            .expect("create");

        let out = dir.path().join("out");
        let extracted = TarGzCodec.extract(&cabinet, &out).expect("extract");

        assert_eq!(extracted, vec![out.join("lib.dll")]);
        assert_eq!(std::fs::read(&extracted[0]).expect("read"), b"library");
    }
}
