//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use kodegen_bundler_msi::binder::{
    Section, SectionType, SettingsBuilder, Symbol, SymbolKind,
    data::{Row, Table},
};
use std::path::{Path, PathBuf};

pub const PRODUCT_CODE: &str = "{6E0F8A1C-3B2D-4C5E-9F70-1A2B3C4D5E6F}";
pub const MODULE_GUID: &str = "{0A1B2C3D-4E5F-4A6B-8C7D-9E0F1A2B3C4D}";

/// Writes `contents` to `dir/name` and returns the path.
pub fn source_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join("src").join(name);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("create src");
    std::fs::write(&path, contents).expect("write source");
    path
}

/// Settings writing `bin/product.msi` with scratch files below `obj`.
pub fn settings(dir: &Path) -> SettingsBuilder {
    SettingsBuilder::new()
        .intermediate_folder(dir.join("obj"))
        .output_path(dir.join("bin").join("product.msi"))
        .cabbing_thread_count(2)
}

fn directories(section: &mut Section) {
    section.add(Symbol::new(SymbolKind::Directory, "TARGETDIR").with("DefaultDir", "SourceDir"));
    section.add(
        Symbol::new(SymbolKind::Directory, "ProgramFilesFolder")
            .with("Directory_Parent", "TARGETDIR")
            .with("DefaultDir", "PFiles"),
    );
    section.add(
        Symbol::new(SymbolKind::Directory, "INSTALLFOLDER")
            .with("Directory_Parent", "ProgramFilesFolder")
            .with("DefaultDir", "APP|Application"),
    );
}

/// One component per file, each keyed by its file.
fn components(section: &mut Section, files: &[(&str, &Path)]) {
    for (id, source) in files {
        let component = format!("C_{}", id.replace('.', "_"));
        section.add(
            Symbol::new(SymbolKind::Component, &component)
                .with("ComponentId", "*")
                .with("Directory_", "INSTALLFOLDER")
                .with("Attributes", 0)
                .with("KeyPath", *id),
        );
        section.add(
            Symbol::new(SymbolKind::File, *id)
                .with("Component_", component.as_str())
                .with("FileName", *id)
                .with("Source", &*source.to_string_lossy()),
        );
    }
}

/// A compressed package with the required properties and no media.
pub fn package(files: &[(&str, &Path)]) -> Section {
    let mut section = Section::new(SectionType::Package);
    section.add(
        Symbol::new(SymbolKind::Package, "Product")
            .with("Compressed", "yes")
            .with("Version", "1.2.3")
            .with("Language", 1033)
            .with("Name", "Sample"),
    );
    for (property, value) in [
        ("ProductCode", PRODUCT_CODE),
        ("ProductVersion", "1.2.3"),
        ("Manufacturer", "Kodegen"),
        ("ProductName", "Sample"),
    ] {
        section.add(Symbol::new(SymbolKind::Property, property).with("Value", value));
    }
    directories(&mut section);
    components(&mut section, files);
    section
}

/// [`package`] with a media template of `maximum_files` per cabinet.
pub fn templated_package(files: &[(&str, &Path)], maximum_files: i64) -> Section {
    let mut section = package(files);
    section.add(
        Symbol::anonymous(SymbolKind::MediaTemplate)
            .with("CabinetTemplate", "part{0}.cab")
            .with("MaximumFilesPerCabinet", maximum_files),
    );
    section
}

/// A merge module with one private property.
pub fn module(files: &[(&str, &Path)]) -> Section {
    let mut section = Section::new(SectionType::Module);
    section.add(
        Symbol::new(SymbolKind::Module, "Runtime")
            .with("Guid", MODULE_GUID)
            .with("Language", 1033)
            .with("Version", "2.0.0"),
    );
    section.add(Symbol::new(SymbolKind::Property, "InstallMode").with("Value", "full"));
    directories(&mut section);
    components(&mut section, files);
    section
}

/// Text of `column` in `row`.
pub fn text(table: &Table, row: &Row, column: &str) -> Option<String> {
    table.value(row, column).map(|v| v.as_text().into_owned())
}

/// Text of `column` in every row of `table`.
pub fn column(table: &Table, column: &str) -> Vec<Option<String>> {
    table.rows.iter().map(|row| text(table, row, column)).collect()
}
