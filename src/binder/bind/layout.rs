//! Layout of cabinets and uncompressed files next to the database.

use super::{directories::DirectoryResolver, result::FileTransfer};
use crate::binder::{
    data::{FileFacade, Section, Symbol, SymbolKind, TrackedFileType, TrackedFiles},
    extension::BinderExtension,
};
use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

/// `Media` symbol of a disk.
pub fn media_for_disk(section: &Section, disk_id: u32) -> Option<&Symbol> {
    section.symbols_of(&SymbolKind::Media).find(|media| {
        media
            .int("DiskId")
            .or_else(|| media.id().parse().ok())
            == Some(i64::from(disk_id))
    })
}

/// Directory the content of `media` is laid out to.
///
/// The first extension to answer wins. Otherwise the media's `Layout` is
/// used as-is when absolute and below `layout_directory` when relative; no
/// layout means `layout_directory` itself.
pub fn resolve_media_layout(
    extensions: &mut [Box<dyn BinderExtension>],
    media: Option<&Symbol>,
    layout_directory: &Path,
) -> PathBuf {
    let media_layout = media.and_then(|m| m.text("Layout")).map(Cow::into_owned);

    if let Some(media) = media {
        let resolved = extensions.iter_mut().find_map(|extension| {
            extension.resolve_media(media, media_layout.as_deref(), layout_directory)
        });
        if let Some(resolved) = resolved {
            return resolved;
        }
    }

    match media_layout {
        None => layout_directory.to_path_buf(),
        Some(layout) if Path::new(&layout).is_absolute() => PathBuf::from(layout),
        Some(layout) => layout_directory.join(layout),
    }
}

/// Transfers for every uncompressed file, tracked as copied outputs.
///
/// Files land below their media's layout directory at their source
/// directory path, using short names unless `long_names` is set.
pub fn layout_uncompressed_files(
    section: &Section,
    facades: &[FileFacade],
    uncompressed: &[usize],
    directories: &DirectoryResolver,
    long_names: bool,
    layout_directory: &Path,
    extensions: &mut [Box<dyn BinderExtension>],
    tracked: &mut TrackedFiles,
) -> Vec<FileTransfer> {
    let mut transfers = Vec::new();

    for &index in uncompressed {
        let Some(facade) = facades.get(index) else {
            continue;
        };
        let media = media_for_disk(section, facade.assigned_disk_id);
        let media_layout = resolve_media_layout(extensions, media, layout_directory);

        let relative = directories
            .source_path(&facade.directory, long_names)
            .unwrap_or_default();
        let name = match &facade.short_name {
            Some(short) if !long_names => short.as_str(),
            _ => facade.name.as_str(),
        };
        let destination = tracked.track(
            &media_layout.join(relative).join(name),
            TrackedFileType::CopiedOutput,
        );

        transfers.push(
            FileTransfer::copy(facade.source_path.clone(), destination)
                .with_source_line(facade.source.clone()),
        );
    }

    transfers
}
