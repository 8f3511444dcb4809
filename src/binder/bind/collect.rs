//! File facade collection.

use crate::binder::{
    data::{
        ExpectedEmbeddedFile, FacadeOrigin, FileFacade, Section, Symbol, SymbolKind,
        TrackedFileType, TrackedFiles, split_file_name,
    },
    error::{ErrorExt, Result},
    messaging::{Message, Messaging},
};
use std::{borrow::Cow, fs::File, path::PathBuf};

/// Extracts files embedded in library and extension containers to the
/// paths the linker expects them at.
pub fn extract_embedded_files(
    embedded_files: &[ExpectedEmbeddedFile],
    tracked: &mut TrackedFiles,
    messaging: &Messaging,
) {
    for embedded in embedded_files {
        match extract_embedded_file(embedded) {
            Ok(()) => {
                tracked.track(&embedded.output_path, TrackedFileType::Intermediate);
            }
            Err(e) => messaging.error(
                None,
                Message::EmbeddedFileExtractFailed {
                    id: embedded.embedded_id.clone(),
                    uri: embedded.uri.clone(),
                    reason: e.to_string(),
                },
            ),
        }
    }
}

fn extract_embedded_file(embedded: &ExpectedEmbeddedFile) -> Result<()> {
    let container = File::open(&embedded.uri).fs_context("opening container", &embedded.uri)?;
    let mut zip = zip::ZipArchive::new(container)?;
    let mut entry = zip.by_name(&embedded.embedded_id)?;

    if let Some(parent) = embedded.output_path.parent() {
        std::fs::create_dir_all(parent).fs_context("creating directory", parent)?;
    }
    let mut out =
        File::create(&embedded.output_path).fs_context("creating file", &embedded.output_path)?;
    std::io::copy(&mut entry, &mut out).fs_context("extracting file", &embedded.output_path)?;
    Ok(())
}

/// One facade per `File` symbol of the section.
pub fn file_facades_from_section(section: &Section) -> Vec<FileFacade> {
    section
        .indices_of(&SymbolKind::File)
        .into_iter()
        .map(|index| {
            let symbol = &section.symbols[index];
            let mut facade = FileFacade {
                id: symbol.id().to_string(),
                component: String::new(),
                directory: String::new(),
                name: String::new(),
                short_name: None,
                source_path: PathBuf::new(),
                disk_id: None,
                assigned_disk_id: 1,
                sequence: 0,
                file_size: 0,
                version: None,
                language: None,
                hash: None,
                compressed: None,
                patch_group: None,
                origin: FacadeOrigin::Section { symbol: index },
                source: symbol.source.clone(),
            };
            refresh_from_symbol(&mut facade, section, symbol);
            facade
        })
        .collect()
}

/// Copies the authored fields of `symbol` into `facade`.
///
/// Computed values (size, hash, sequence, assigned disk) are left alone.
pub fn refresh_from_symbol(facade: &mut FileFacade, section: &Section, symbol: &Symbol) {
    let text = |name: &str| symbol.text(name).map(Cow::into_owned);

    facade.component = text("Component_").unwrap_or_default();
    facade.directory = text("Directory_")
        .or_else(|| {
            section
                .find(&SymbolKind::Component, &facade.component)
                .and_then(|c| c.text("Directory_"))
                .map(Cow::into_owned)
        })
        .unwrap_or_default();

    let file_name = text("FileName").unwrap_or_else(|| facade.id.clone());
    let (name, short_name) = split_file_name(&file_name);
    facade.name = name.to_string();
    facade.short_name = short_name.map(str::to_string);

    facade.source_path = PathBuf::from(text("Source").unwrap_or_else(|| facade.name.clone()));
    facade.disk_id = symbol.int("DiskId").and_then(|d| u32::try_from(d).ok());
    if let Some(disk_id) = facade.disk_id {
        facade.assigned_disk_id = disk_id;
    }
    facade.compressed = symbol.flag("Compressed");
    facade.patch_group = symbol.int("PatchGroup");
    facade.version = text("Version").or(facade.version.take());
    facade.language = text("Language").or(facade.language.take());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::data::SectionType;
    use std::io::Write;

    #[test]
    fn file_symbols_become_facades() {
        let mut section = Section::new(SectionType::Package);
        section.add(Symbol::new(SymbolKind::Component, "Main").with("Directory_", "INSTALLFOLDER"));
        section.add(
            Symbol::new(SymbolKind::File, "app.exe")
                .with("Component_", "Main")
                .with("FileName", "APP~1.EXE|application.exe")
                .with("Source", "/build/app.exe")
                .with("DiskId", 2)
                .with("Compressed", "no"),
        );

        let facades = file_facades_from_section(&section);

        assert_eq!(facades.len(), 1);
        let facade = &facades[0];
        assert_eq!(facade.directory, "INSTALLFOLDER");
        assert_eq!(facade.name, "application.exe");
        assert_eq!(facade.short_name.as_deref(), Some("APP~1.EXE"));
        assert_eq!(facade.source_path, PathBuf::from("/build/app.exe"));
        assert_eq!(facade.assigned_disk_id, 2);
        assert_eq!(facade.compressed, Some(false));
        assert_eq!(facade.symbol_index(), Some(1));
    }

    #[test]
    fn embedded_files_are_extracted_and_tracked() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = dir.path().join("lib.wixlib");
        {
            let mut zip = zip::ZipWriter::new(File::create(&library).expect("create"));
            zip.start_file("0", zip::write::SimpleFileOptions::default())
                .expect("start");
            zip.write_all(b"payload").expect("write");
            zip.finish().expect("finish");
        }

        let embedded = vec![
            ExpectedEmbeddedFile {
                uri: library.clone(),
                embedded_id: "0".into(),
                output_path: dir.path().join("out").join("payload.bin"),
            },
            ExpectedEmbeddedFile {
                uri: library,
                embedded_id: "missing".into(),
                output_path: dir.path().join("out").join("missing.bin"),
            },
        ];

        let messaging = Messaging::new();
        let mut tracked = TrackedFiles::new();
        extract_embedded_files(&embedded, &mut tracked, &messaging);

        assert_eq!(
            std::fs::read(dir.path().join("out").join("payload.bin")).expect("read"),
            b"payload"
        );
        assert_eq!(tracked.of_type(TrackedFileType::Intermediate).count(), 1);
        assert_eq!(messaging.error_count(), 1);
    }
}
