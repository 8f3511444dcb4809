//! Media assignment and file sequencing.
//!
//! Every compressed file lands in exactly one cabinet group; uncompressed
//! files are listed separately for layout. Sequence numbers then follow
//! disk order so each `Media.LastSequence` bounds its files.

use super::directories::DirectoryResolver;
use crate::binder::{
    data::{FileFacade, Section, SectionType, Symbol, SymbolKind, definitions::MERGE_MODULE_CABINET},
    messaging::{Message, Messaging},
    settings::CompressionLevel,
};
use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
};

const DEFAULT_CABINET_TEMPLATE: &str = "cab{0}.cab";
const DEFAULT_MAXIMUM_MEDIA_SIZE_MB: i64 = 200;

/// Files that share one cabinet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CabinetGroup {
    pub disk_id: u32,
    /// Cabinet name without the embedding `#`.
    pub cabinet: String,
    /// Stored as a stream of the database rather than next to it.
    pub embedded: bool,
    pub compression_level: Option<CompressionLevel>,
    /// Indices into the facade list, in sequence order.
    pub files: Vec<usize>,
}

/// Outcome of [`assign_media`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaAssignment {
    pub groups: Vec<CabinetGroup>,
    /// Indices of files laid out next to the database.
    pub uncompressed: Vec<usize>,
}

/// Orders facades by disk, target directory, name and id so that sequence
/// numbers are stable and related files compress together.
pub fn order_facades(facades: &mut [FileFacade], directories: &DirectoryResolver) {
    facades.sort_by_cached_key(|facade| {
        (
            facade.disk_id.unwrap_or(0),
            directories
                .target_path(&facade.directory)
                .unwrap_or_else(|| facade.directory.clone())
                .to_lowercase(),
            facade.name.to_lowercase(),
            facade.id.clone(),
        )
    });
}

#[derive(Clone, Debug)]
struct MediaTemplate {
    cabinet_template: String,
    maximum_files: usize,
    maximum_size: u64,
    compression_level: Option<CompressionLevel>,
    embed: bool,
    volume_label: Option<String>,
    disk_prompt: Option<String>,
}

impl MediaTemplate {
    fn from_symbol(symbol: &Symbol) -> Self {
        let text = |name: &str| symbol.text(name).map(Cow::into_owned);
        let maximum_size_mb = symbol
            .int("MaximumUncompressedMediaSize")
            .unwrap_or(DEFAULT_MAXIMUM_MEDIA_SIZE_MB);
        Self {
            cabinet_template: text("CabinetTemplate")
                .unwrap_or_else(|| DEFAULT_CABINET_TEMPLATE.to_string()),
            maximum_files: symbol
                .int("MaximumFilesPerCabinet")
                .and_then(|m| usize::try_from(m).ok())
                .unwrap_or(0),
            maximum_size: u64::try_from(maximum_size_mb)
                .unwrap_or(0)
                .saturating_mul(1024 * 1024),
            compression_level: text("CompressionLevel").and_then(|l| l.parse().ok()),
            embed: symbol.flag("EmbedCab").unwrap_or(false),
            volume_label: text("VolumeLabel"),
            disk_prompt: text("DiskPrompt"),
        }
    }

    fn cabinet_name(&self, disk_id: u32) -> String {
        self.cabinet_template.replace("{0}", &disk_id.to_string())
    }

    fn media_symbol(&self, disk_id: u32) -> Symbol {
        let cabinet = self.cabinet_name(disk_id);
        let cabinet = if self.embed {
            format!("#{cabinet}")
        } else {
            cabinet
        };
        let mut media = Symbol::new(SymbolKind::Media, disk_id.to_string())
            .with("DiskId", disk_id)
            .with("Cabinet", cabinet);
        if let Some(level) = self.compression_level {
            media.set("CompressionLevel", level.as_str());
        }
        if let Some(label) = &self.volume_label {
            media.set("VolumeLabel", label.as_str());
        }
        if let Some(prompt) = &self.disk_prompt {
            media.set("DiskPrompt", prompt.as_str());
        }
        media
    }

    fn exceeded(&self, count: usize, size: u64) -> bool {
        (self.maximum_files > 0 && count >= self.maximum_files)
            || (self.maximum_size > 0 && size >= self.maximum_size)
    }
}

fn media_disk_id(media: &Symbol) -> Option<u32> {
    media
        .int("DiskId")
        .or_else(|| media.id().parse().ok())
        .and_then(|d| u32::try_from(d).ok())
}

fn media_by_disk(section: &Section) -> BTreeMap<u32, usize> {
    section
        .indices_of(&SymbolKind::Media)
        .into_iter()
        .filter_map(|index| Some((media_disk_id(&section.symbols[index])?, index)))
        .collect()
}

/// Assigns every facade a disk and every compressed facade a cabinet.
///
/// Module output packs every file into the single module cabinet. With a
/// media template, files without an authored disk fill cabinets in order
/// and a new cabinet opens once the template's file count or size ceiling
/// is reached; authored disks always win and are not subject to the
/// ceiling. Without a template every file's disk must name an authored
/// `Media`.
pub fn assign_media(
    section: &mut Section,
    facades: &mut [FileFacade],
    package_compressed: bool,
    messaging: &Messaging,
) -> MediaAssignment {
    if section.section_type == SectionType::Module {
        for facade in facades.iter_mut() {
            facade.assigned_disk_id = 1;
        }
        let groups = (!facades.is_empty())
            .then(|| CabinetGroup {
                disk_id: 1,
                cabinet: MERGE_MODULE_CABINET.to_string(),
                embedded: true,
                compression_level: None,
                files: (0..facades.len()).collect(),
            })
            .into_iter()
            .collect();
        return MediaAssignment {
            groups,
            uncompressed: Vec::new(),
        };
    }

    let template = section
        .symbols_of(&SymbolKind::MediaTemplate)
        .next()
        .map(MediaTemplate::from_symbol);

    match template {
        Some(template) => assign_with_template(section, facades, package_compressed, &template),
        None => assign_to_authored_media(section, facades, package_compressed, messaging),
    }
}

fn assign_with_template(
    section: &mut Section,
    facades: &mut [FileFacade],
    package_compressed: bool,
    template: &MediaTemplate,
) -> MediaAssignment {
    let mut media = media_by_disk(section);
    let reserved: BTreeSet<u32> = media
        .keys()
        .copied()
        .chain(facades.iter().filter_map(|f| f.disk_id))
        .collect();

    let mut explicit: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    let mut greedy: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    let mut uncompressed = Vec::new();

    let next_free = |after: u32| (after + 1..).find(|d| !reserved.contains(d)).unwrap_or(after + 1);
    let mut current = next_free(0);
    let mut current_count = 0usize;
    let mut current_size = 0u64;

    for (index, facade) in facades.iter_mut().enumerate() {
        if !facade.is_compressed(package_compressed) {
            facade.assigned_disk_id = facade.disk_id.unwrap_or(1);
            uncompressed.push(index);
            continue;
        }
        if let Some(disk_id) = facade.disk_id {
            facade.assigned_disk_id = disk_id;
            explicit.entry(disk_id).or_default().push(index);
            continue;
        }

        if current_count > 0 && template.exceeded(current_count, current_size) {
            current = next_free(current);
            current_count = 0;
            current_size = 0;
        }
        facade.assigned_disk_id = current;
        greedy.entry(current).or_default().push(index);
        current_count += 1;
        current_size += facade.file_size;
    }

    let mut disks: BTreeMap<u32, Vec<usize>> = explicit;
    for (disk_id, files) in greedy {
        disks.entry(disk_id).or_default().extend(files);
    }
    for facade_index in &uncompressed {
        let disk_id = facades[*facade_index].assigned_disk_id;
        disks.entry(disk_id).or_default();
    }

    for &disk_id in disks.keys() {
        if !media.contains_key(&disk_id) {
            let index = section.add(template.media_symbol(disk_id));
            media.insert(disk_id, index);
        }
    }

    let mut groups = Vec::new();
    for (disk_id, files) in disks {
        if files.is_empty() {
            continue;
        }
        let Some(&media_index) = media.get(&disk_id) else {
            continue;
        };
        // Authored media without a cabinet holds its files loose.
        match group_for_media(&section.symbols[media_index], disk_id, &files) {
            Some(group) => groups.push(group),
            None => uncompressed.extend(files),
        }
    }

    MediaAssignment {
        groups,
        uncompressed,
    }
}

fn group_for_media(media: &Symbol, disk_id: u32, files: &[usize]) -> Option<CabinetGroup> {
    let cabinet = media.text("Cabinet")?;
    let (cabinet, embedded) = match cabinet.strip_prefix('#') {
        Some(name) => (name.to_string(), true),
        None => (cabinet.into_owned(), false),
    };
    Some(CabinetGroup {
        disk_id,
        cabinet,
        embedded,
        compression_level: media
            .text("CompressionLevel")
            .and_then(|l| l.parse().ok()),
        files: files.to_vec(),
    })
}

fn assign_to_authored_media(
    section: &Section,
    facades: &mut [FileFacade],
    package_compressed: bool,
    messaging: &Messaging,
) -> MediaAssignment {
    let media = media_by_disk(section);
    let mut disks: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    let mut uncompressed = Vec::new();

    for (index, facade) in facades.iter_mut().enumerate() {
        let disk_id = facade.disk_id.unwrap_or(1);
        facade.assigned_disk_id = disk_id;

        let Some(&media_index) = media.get(&disk_id) else {
            messaging.error(
                facade.source.as_ref(),
                Message::MissingMedia {
                    file: facade.id.clone(),
                    disk_id,
                },
            );
            continue;
        };

        let has_cabinet = section.symbols[media_index].text("Cabinet").is_some();
        if facade.is_compressed(package_compressed) && has_cabinet {
            disks.entry(disk_id).or_default().push(index);
        } else {
            uncompressed.push(index);
        }
    }

    let groups = disks
        .into_iter()
        .filter_map(|(disk_id, files)| {
            group_for_media(&section.symbols[*media.get(&disk_id)?], disk_id, &files)
        })
        .collect();

    MediaAssignment {
        groups,
        uncompressed,
    }
}

/// Numbers files disk by disk, compressed before uncompressed, and writes
/// the numbers to the facades, their `File` symbols and `Media.LastSequence`.
pub fn update_media_sequences(
    section: &mut Section,
    facades: &mut [FileFacade],
    assignment: &MediaAssignment,
) {
    let mut by_disk: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for group in &assignment.groups {
        by_disk
            .entry(group.disk_id)
            .or_default()
            .extend(group.files.iter().copied());
    }
    for &index in &assignment.uncompressed {
        by_disk
            .entry(facades[index].assigned_disk_id)
            .or_default()
            .push(index);
    }

    let media = media_by_disk(section);
    let mut sequence = 0u32;
    let mut last_sequences: BTreeMap<u32, u32> = BTreeMap::new();

    for (disk_id, files) in by_disk {
        for index in files {
            sequence += 1;
            let facade = &mut facades[index];
            facade.sequence = sequence;
            if let Some(symbol_index) = facade.symbol_index() {
                let file = &mut section.symbols[symbol_index];
                if file.int("Sequence") != Some(i64::from(sequence)) {
                    file.set("Sequence", sequence);
                }
            }
        }
        last_sequences.insert(disk_id, sequence);
    }

    // Media without files still bound the files of earlier disks.
    let mut last = 0;
    for (disk_id, index) in media {
        if let Some(&sequence) = last_sequences.get(&disk_id) {
            last = sequence;
        }
        section.symbols[index].set("LastSequence", last);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{bind::collect::file_facades_from_section, data::FacadeOrigin};

    fn file(id: &str) -> Symbol {
        Symbol::new(SymbolKind::File, id)
            .with("FileName", id)
            .with("Component_", "Main")
    }

    fn files_of(assignment: &MediaAssignment, facades: &[FileFacade]) -> Vec<(String, Vec<String>)> {
        assignment
            .groups
            .iter()
            .map(|g| {
                (
                    g.cabinet.clone(),
                    g.files.iter().map(|&i| facades[i].id.clone()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn template_ceiling_opens_new_cabinets() {
        let mut section = Section::new(SectionType::Package);
        section.add(
            Symbol::anonymous(SymbolKind::MediaTemplate)
                .with("CabinetTemplate", "part{0}.cab")
                .with("MaximumFilesPerCabinet", 2),
        );
        for id in ["file1", "file2", "file3"] {
            section.add(file(id));
        }
        let mut facades = file_facades_from_section(&section);
        let messaging = Messaging::new();

        let assignment = assign_media(&mut section, &mut facades, true, &messaging);
        update_media_sequences(&mut section, &mut facades, &assignment);

        assert!(!messaging.encountered_error());
        assert_eq!(
            files_of(&assignment, &facades),
            vec![
                ("part1.cab".to_string(), vec!["file1".to_string(), "file2".to_string()]),
                ("part2.cab".to_string(), vec!["file3".to_string()]),
            ]
        );
        let last: Vec<i64> = section
            .symbols_of(&SymbolKind::Media)
            .filter_map(|m| m.int("LastSequence"))
            .collect();
        assert_eq!(last, vec![2, 3]);
        assert_eq!(
            facades.iter().map(|f| f.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn authored_disks_win_over_the_template() {
        let mut section = Section::new(SectionType::Package);
        section.add(
            Symbol::anonymous(SymbolKind::MediaTemplate)
                .with("MaximumFilesPerCabinet", 1)
                .with("EmbedCab", "yes"),
        );
        section.add(file("a").with("DiskId", 1));
        section.add(file("b").with("DiskId", 1));
        section.add(file("c"));
        let mut facades = file_facades_from_section(&section);

        let assignment = assign_media(&mut section, &mut facades, true, &Messaging::new());

        assert_eq!(
            files_of(&assignment, &facades),
            vec![
                ("cab1.cab".to_string(), vec!["a".to_string(), "b".to_string()]),
                ("cab2.cab".to_string(), vec!["c".to_string()]),
            ]
        );
        assert!(assignment.groups.iter().all(|g| g.embedded));
    }

    #[test]
    fn partition_is_complete_and_disjoint() {
        let mut section = Section::new(SectionType::Package);
        section.add(
            Symbol::new(SymbolKind::Media, "1")
                .with("DiskId", 1)
                .with("Cabinet", "#product.cab"),
        );
        section.add(Symbol::new(SymbolKind::Media, "2").with("DiskId", 2));
        section.add(file("packed"));
        section.add(file("loose").with("Compressed", "no"));
        section.add(file("disk2").with("DiskId", 2));
        let mut facades = file_facades_from_section(&section);
        let messaging = Messaging::new();

        let assignment = assign_media(&mut section, &mut facades, true, &messaging);
        update_media_sequences(&mut section, &mut facades, &assignment);

        let mut seen: Vec<usize> = assignment
            .groups
            .iter()
            .flat_map(|g| g.files.iter().copied())
            .chain(assignment.uncompressed.iter().copied())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(assignment.groups.len(), 1);
        assert_eq!(assignment.groups[0].cabinet, "product.cab");
        assert_eq!(assignment.uncompressed, vec![1, 2]);

        let sequences: Vec<(String, u32)> =
            facades.iter().map(|f| (f.id.clone(), f.sequence)).collect();
        assert_eq!(
            sequences,
            vec![
                ("packed".to_string(), 1),
                ("loose".to_string(), 2),
                ("disk2".to_string(), 3)
            ]
        );
    }

    #[test]
    fn undefined_media_is_reported() {
        let mut section = Section::new(SectionType::Package);
        section.add(file("orphan").with("DiskId", 7));
        let mut facades = file_facades_from_section(&section);
        let messaging = Messaging::new();

        assign_media(&mut section, &mut facades, true, &messaging);

        assert_eq!(messaging.diagnostics()[0].message.id(), 40);
    }

    #[test]
    fn module_files_share_the_module_cabinet() {
        let mut section = Section::new(SectionType::Module);
        section.add(file("x"));
        let mut facades = file_facades_from_section(&section);
        facades.push(FileFacade {
            id: "y".into(),
            origin: FacadeOrigin::MergeModule { merge: "m".into() },
            ..facades[0].clone()
        });

        let assignment = assign_media(&mut section, &mut facades, false, &Messaging::new());

        assert_eq!(assignment.groups.len(), 1);
        assert_eq!(assignment.groups[0].cabinet, MERGE_MODULE_CABINET);
        assert_eq!(assignment.groups[0].files, vec![0, 1]);
    }
}
