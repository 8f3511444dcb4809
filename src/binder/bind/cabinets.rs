//! Cabinet planning, creation and placement.

use super::{
    layout::{media_for_disk, resolve_media_layout},
    media::CabinetGroup,
    result::FileTransfer,
};
use crate::binder::{
    cabinet::{CabinetCodec, CabinetMember, CabinetWorkItem, cabinet_fingerprint, create_cabinets},
    data::{FileFacade, Section, TrackedFileType, TrackedFiles},
    extension::{BinderExtension, CabinetBuildOption},
    messaging::Messaging,
    settings::{BindSettings, CompressionLevel},
};
use std::{path::PathBuf, sync::Arc};

/// A cabinet to store as a database stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbeddedCabinet {
    pub name: String,
    pub path: PathBuf,
}

/// Outcome of [`build_cabinets`].
#[derive(Clone, Debug, Default)]
pub struct CabinetOutput {
    pub embedded: Vec<EmbeddedCabinet>,
    pub transfers: Vec<FileTransfer>,
}

fn members(group: &CabinetGroup, facades: &[FileFacade]) -> Vec<CabinetMember> {
    group
        .files
        .iter()
        .filter_map(|&index| facades.get(index))
        .map(|facade| CabinetMember {
            name: facade.id.clone(),
            source: facade.source_path.clone(),
            size: facade.file_size,
            version: facade.version.clone(),
        })
        .collect()
}

/// Turns cabinet groups into work items.
///
/// An extension may place a cabinet anywhere. Otherwise a configured cache
/// holds cabinets by content fingerprint and a hit is copied rather than
/// rebuilt; without a cache cabinets are built in the intermediate folder.
pub fn plan_cabinets(
    groups: &[CabinetGroup],
    facades: &[FileFacade],
    settings: &BindSettings,
    extensions: &mut [Box<dyn BinderExtension>],
) -> Vec<CabinetWorkItem> {
    groups
        .iter()
        .map(|group| {
            let members = members(group, facades);
            let level = group
                .compression_level
                .or(settings.default_compression_level())
                .unwrap_or(CompressionLevel::Mszip);

            let default_path = settings.intermediate_folder().join(&group.cabinet);
            let group_files: Vec<FileFacade> = group
                .files
                .iter()
                .filter_map(|&index| facades.get(index).cloned())
                .collect();
            let resolved = extensions
                .iter_mut()
                .find_map(|extension| extension.resolve_cabinet(&default_path, &group_files));

            let (path, build_option) = match (resolved, settings.cab_cache_path()) {
                (Some(resolved), _) => (resolved.path, resolved.build_option),
                (None, Some(cache)) => match cabinet_fingerprint(&members, level) {
                    Ok(fingerprint) => {
                        let path = cache.join(format!("{fingerprint}.cab"));
                        let option = if path.is_file() {
                            CabinetBuildOption::Copy
                        } else {
                            CabinetBuildOption::BuildAndCopy
                        };
                        (path, option)
                    }
                    Err(e) => {
                        log::debug!("Not caching {}: {e}", group.cabinet);
                        (default_path, CabinetBuildOption::BuildAndMove)
                    }
                },
                (None, None) => (default_path, CabinetBuildOption::BuildAndMove),
            };

            CabinetWorkItem {
                cabinet_name: group.cabinet.clone(),
                disk_id: group.disk_id,
                path,
                build_option,
                members,
                level,
            }
        })
        .collect()
}

/// Builds every cabinet and decides where each one ends up.
///
/// Embedded cabinets become database streams; the others become transfers
/// into their media's layout directory.
#[allow(clippy::too_many_arguments)]
pub async fn build_cabinets(
    section: &Section,
    groups: &[CabinetGroup],
    facades: &[FileFacade],
    settings: &BindSettings,
    extensions: &mut [Box<dyn BinderExtension>],
    codec: Arc<dyn CabinetCodec>,
    tracked: &mut TrackedFiles,
    messaging: &Messaging,
) -> CabinetOutput {
    let items = plan_cabinets(groups, facades, settings, extensions);
    log::info!("Creating {} cabinet file(s)", items.len());

    let created = create_cabinets(items, codec, settings.cabbing_thread_count(), messaging).await;
    let layout_directory = settings.layout_directory();
    let mut output = CabinetOutput::default();

    for cabinet in created {
        let file_type = if cabinet.reused {
            TrackedFileType::Input
        } else {
            TrackedFileType::Intermediate
        };
        tracked.track(&cabinet.path, file_type);

        let embedded = groups
            .iter()
            .find(|g| g.disk_id == cabinet.disk_id && g.cabinet == cabinet.cabinet_name)
            .is_some_and(|g| g.embedded);
        if embedded {
            output.embedded.push(EmbeddedCabinet {
                name: cabinet.cabinet_name,
                path: cabinet.path,
            });
            continue;
        }

        let media = media_for_disk(section, cabinet.disk_id);
        let destination = resolve_media_layout(extensions, media, &layout_directory)
            .join(&cabinet.cabinet_name);
        let destination = tracked.track(&destination, TrackedFileType::CopiedOutput);
        output.transfers.push(FileTransfer {
            source: cabinet.path,
            destination,
            move_file: cabinet.build_option == CabinetBuildOption::BuildAndMove,
            source_line: media.and_then(|m| m.source.clone()),
        });
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{cabinet::TarGzCodec, settings::SettingsBuilder};

    fn facade(dir: &std::path::Path, id: &str) -> FileFacade {
        let source = dir.join(id);
        std::fs::write(&source, id.as_bytes()).expect("write");
        FileFacade {
            id: id.to_string(),
            component: "Main".into(),
            directory: "INSTALLFOLDER".into(),
            name: id.to_string(),
            short_name: None,
            source_path: source,
            disk_id: None,
            assigned_disk_id: 1,
            sequence: 0,
            file_size: id.len() as u64,
            version: None,
            language: None,
            hash: None,
            compressed: None,
            patch_group: None,
            origin: crate::binder::data::FacadeOrigin::Section { symbol: 0 },
            source: None,
        }
    }

    #[tokio::test]
    async fn cached_cabinets_are_copied_not_rebuilt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = dir.path().join("cache");
        let facades = vec![facade(dir.path(), "a.txt")];
        let groups = vec![CabinetGroup {
            disk_id: 1,
            cabinet: "product.cab".into(),
            embedded: false,
            compression_level: None,
            files: vec![0],
        }];
        let settings = SettingsBuilder::new()
            .intermediate_folder(dir.path().join("obj"))
            .output_path(dir.path().join("bin").join("product.msi"))
            .cab_cache_path(&cache)
            .build()
            .expect("settings");
        let section = Section::new(crate::binder::data::SectionType::Package);

        let first = build_cabinets(
            &section,
            &groups,
            &facades,
            &settings,
            &mut [],
            Arc::new(TarGzCodec),
            &mut TrackedFiles::new(),
            &Messaging::new(),
        )
        .await;
        let cached = first.transfers[0].source.clone();
        let bytes = std::fs::read(&cached).expect("read");

        let items = plan_cabinets(&groups, &facades, &settings, &mut []);
        assert_eq!(items[0].build_option, CabinetBuildOption::Copy);
        assert_eq!(items[0].path, cached);

        let second = build_cabinets(
            &section,
            &groups,
            &facades,
            &settings,
            &mut [],
            Arc::new(TarGzCodec),
            &mut TrackedFiles::new(),
            &Messaging::new(),
        )
        .await;
        assert_eq!(std::fs::read(&second.transfers[0].source).expect("read"), bytes);
        assert!(!second.transfers[0].move_file);
        assert_eq!(
            second.transfers[0].destination,
            dir.path().join("bin").join("product.cab")
        );
    }

    #[tokio::test]
    async fn embedded_cabinets_become_streams() {
        let dir = tempfile::tempdir().expect("tempdir");
        let facades = vec![facade(dir.path(), "b.txt")];
        let groups = vec![CabinetGroup {
            disk_id: 1,
            cabinet: "inner.cab".into(),
            embedded: true,
            compression_level: Some(CompressionLevel::High),
            files: vec![0],
        }];
        let settings = SettingsBuilder::new()
            .intermediate_folder(dir.path().join("obj"))
            .output_path(dir.path().join("product.msi"))
            .build()
            .expect("settings");

        let output = build_cabinets(
            &Section::new(crate::binder::data::SectionType::Package),
            &groups,
            &facades,
            &settings,
            &mut [],
            Arc::new(TarGzCodec),
            &mut TrackedFiles::new(),
            &Messaging::new(),
        )
        .await;

        assert!(output.transfers.is_empty());
        assert_eq!(
            output.embedded,
            vec![EmbeddedCabinet {
                name: "inner.cab".into(),
                path: dir.path().join("obj").join("inner.cab"),
            }]
        );
        assert!(output.embedded[0].path.is_file());
    }
}
