//! Media assignment partitions every file exactly once.

use kodegen_bundler_msi::binder::{
    Messaging, Section, SectionType, Symbol, SymbolKind,
    bind::{
        collect::file_facades_from_section,
        media::{assign_media, update_media_sequences},
    },
};
use std::collections::BTreeSet;

fn section() -> Section {
    let mut section = Section::new(SectionType::Package);
    section.add(
        Symbol::anonymous(SymbolKind::MediaTemplate)
            .with("CabinetTemplate", "data{0}.cab")
            .with("MaximumFilesPerCabinet", 3),
    );
    section.add(
        Symbol::new(SymbolKind::Media, "5")
            .with("DiskId", 5)
            .with("Cabinet", "#manual.cab"),
    );
    for index in 0..10 {
        let mut file = Symbol::new(SymbolKind::File, format!("f{index:02}"))
            .with("Component_", "Main")
            .with("FileName", format!("file{index:02}.dat"))
            .with("FileSize", 10);
        match index {
            2 | 3 => file.set("DiskId", 5),
            7 => file.set("Compressed", "no"),
            _ => {}
        }
        section.add(file);
    }
    section
}

#[test]
fn every_file_is_placed_once_and_ceilings_hold() {
    let mut section = section();
    let mut facades = file_facades_from_section(&section);
    let messaging = Messaging::new();

    let assignment = assign_media(&mut section, &mut facades, true, &messaging);
    update_media_sequences(&mut section, &mut facades, &assignment);
    assert!(!messaging.encountered_error());

    let mut placed: Vec<usize> = assignment
        .groups
        .iter()
        .flat_map(|g| g.files.iter().copied())
        .chain(assignment.uncompressed.iter().copied())
        .collect();
    placed.sort_unstable();
    assert_eq!(placed, (0..facades.len()).collect::<Vec<_>>());

    for group in &assignment.groups {
        if group.disk_id != 5 {
            assert!(group.files.len() <= 3, "{} over ceiling", group.cabinet);
        }
    }

    let manual = assignment
        .groups
        .iter()
        .find(|g| g.disk_id == 5)
        .expect("authored disk");
    assert!(manual.embedded);
    assert_eq!(manual.cabinet, "manual.cab");
    let manual_ids: BTreeSet<_> = manual.files.iter().map(|&i| facades[i].id.as_str()).collect();
    assert_eq!(manual_ids, BTreeSet::from(["f02", "f03"]));

    let uncompressed: Vec<_> = assignment
        .uncompressed
        .iter()
        .map(|&i| facades[i].id.as_str())
        .collect();
    assert_eq!(uncompressed, vec!["f07"]);

    let sequences: BTreeSet<u32> = facades.iter().map(|f| f.sequence).collect();
    assert_eq!(sequences, (1..=10).collect::<BTreeSet<u32>>());
}
