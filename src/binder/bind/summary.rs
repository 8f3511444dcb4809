//! Summary information of the database.

use crate::binder::data::{Section, SectionType, Symbol, SymbolKind, Value};
use std::{borrow::Cow, fmt};

const PID_CODEPAGE: i64 = 1;
const PID_TITLE: i64 = 2;
const PID_TEMPLATE: i64 = 7;
const PID_REVISION_NUMBER: i64 = 9;
const PID_CREATE_TIME: i64 = 12;
const PID_LAST_SAVE_TIME: i64 = 13;
const PID_PAGE_COUNT: i64 = 14;
const PID_WORD_COUNT: i64 = 15;
const PID_APP_NAME: i64 = 18;

const WORD_COUNT_SHORT_NAMES: i64 = 0x1;
const WORD_COUNT_COMPRESSED: i64 = 0x2;

const DEFAULT_INSTALLER_VERSION: i64 = 500;
const APP_NAME: &str = concat!("kodegen_bundler_msi ", env!("CARGO_PKG_VERSION"));

/// Target platform of a package.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Platform {
    #[default]
    X86,
    X64,
    Arm64,
}

impl Platform {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "x86" | "intel" => Some(Self::X86),
            "x64" | "amd64" => Some(Self::X64),
            "arm64" => Some(Self::Arm64),
            _ => None,
        }
    }

    /// Name used in the summary information template.
    fn template_name(&self) -> &'static str {
        match self {
            Self::X86 => "Intel",
            Self::X64 => "x64",
            Self::Arm64 => "Arm64",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_name())
    }
}

/// Package-level facts derived while binding summary information.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryInfo {
    pub compressed: bool,
    pub long_names: bool,
    pub installer_version: i64,
    pub platform: Platform,
    /// `.GUID` suffix for module output.
    pub modularization_suffix: Option<String>,
}

/// Modularization suffix derived from a module GUID.
pub fn modularization_suffix(guid: &str) -> String {
    let guid = guid.trim_matches(|c| c == '{' || c == '}');
    format!(".{}", guid.to_ascii_uppercase().replace('-', "_"))
}

fn summary_index(section: &Section, property_id: i64) -> Option<usize> {
    section.symbols.iter().position(|s| {
        s.kind == SymbolKind::SummaryInformation && s.int("PropertyId") == Some(property_id)
    })
}

/// Sets a summary property. Authored values win unless `overwrite` is set.
fn set_summary(section: &mut Section, property_id: i64, value: impl Into<Value>, overwrite: bool) {
    match summary_index(section, property_id) {
        Some(index) if overwrite => section.symbols[index].set("Value", value),
        Some(index) if section.symbols[index].text("Value").is_none() => {
            section.symbols[index].set("Value", value)
        }
        Some(_) => {}
        None => {
            section.add(
                Symbol::anonymous(SymbolKind::SummaryInformation)
                    .with("PropertyId", property_id)
                    .with("Value", value),
            );
        }
    }
}

/// Writes the summary information symbols for the package-type symbol at
/// `package_index` and returns the facts later stages need.
pub fn bind_summary_info(
    section: &mut Section,
    package_index: usize,
    codepage: i32,
    summary_codepage: Option<i32>,
    product_language: Option<&str>,
) -> SummaryInfo {
    let package = &section.symbols[package_index];
    let section_type = section.section_type;

    let compressed = match section_type {
        SectionType::Package => package.flag("Compressed").unwrap_or(false),
        SectionType::Module | SectionType::Patch => true,
    };
    let long_names = !package.flag("ShortNames").unwrap_or(false);
    let installer_version = package
        .int("InstallerVersion")
        .unwrap_or(DEFAULT_INSTALLER_VERSION);
    let platform = package
        .text("Platform")
        .and_then(|p| Platform::parse(&p))
        .unwrap_or_default();
    let title = package.text("Name").map(Cow::into_owned);
    let modularization_suffix = (section_type == SectionType::Module)
        .then(|| package.text("Guid").map(|g| modularization_suffix(&g)))
        .flatten();

    let revision = match section_type {
        SectionType::Patch => package.text("PatchCode"),
        _ => package.text("PackageCode"),
    }
    .map(Cow::into_owned)
    .unwrap_or_else(|| format!("{{{}}}", uuid::Uuid::new_v4().to_string().to_ascii_uppercase()));

    let language = product_language
        .map(str::to_string)
        .or_else(|| package.text("Language").map(Cow::into_owned))
        .unwrap_or_else(|| "0".to_string());

    set_summary(
        section,
        PID_CODEPAGE,
        summary_codepage.unwrap_or(codepage),
        summary_codepage.is_some(),
    );
    if let Some(title) = title {
        set_summary(section, PID_TITLE, title, false);
    }
    if section_type != SectionType::Patch {
        set_summary(section, PID_TEMPLATE, format!("{platform};{language}"), false);
    }
    set_summary(section, PID_REVISION_NUMBER, revision, false);

    let now = chrono::Utc::now().format("%Y/%m/%d %H:%M:%S").to_string();
    set_summary(section, PID_CREATE_TIME, now.as_str(), false);
    set_summary(section, PID_LAST_SAVE_TIME, now, false);
    set_summary(section, PID_PAGE_COUNT, installer_version, false);

    let mut word_count = 0;
    if !long_names {
        word_count |= WORD_COUNT_SHORT_NAMES;
    }
    if compressed {
        word_count |= WORD_COUNT_COMPRESSED;
    }
    set_summary(section, PID_WORD_COUNT, word_count, true);
    set_summary(section, PID_APP_NAME, APP_NAME, false);

    SummaryInfo {
        compressed,
        long_names,
        installer_version,
        platform,
        modularization_suffix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(section: &Section, property_id: i64) -> Option<String> {
        summary_index(section, property_id)
            .and_then(|i| section.symbols[i].text("Value"))
            .map(Cow::into_owned)
    }

    #[test]
    fn package_fields_drive_summary_information() {
        let mut section = Section::new(SectionType::Package);
        let package = section.add(
            Symbol::new(SymbolKind::Package, "Product")
                .with("Compressed", "yes")
                .with("Platform", "x64")
                .with("PackageCode", "{11111111-2222-3333-4444-555555555555}")
                .with("InstallerVersion", 200),
        );

        let info = bind_summary_info(&mut section, package, 1252, None, Some("1033"));

        assert!(info.compressed);
        assert!(info.long_names);
        assert_eq!(info.installer_version, 200);
        assert_eq!(info.platform, Platform::X64);
        assert_eq!(info.modularization_suffix, None);
        assert_eq!(summary(&section, PID_TEMPLATE).as_deref(), Some("x64;1033"));
        assert_eq!(summary(&section, PID_WORD_COUNT).as_deref(), Some("2"));
        assert_eq!(summary(&section, PID_CODEPAGE).as_deref(), Some("1252"));
        assert_eq!(
            summary(&section, PID_REVISION_NUMBER).as_deref(),
            Some("{11111111-2222-3333-4444-555555555555}")
        );
    }

    #[test]
    fn authored_summary_values_are_kept() {
        let mut section = Section::new(SectionType::Package);
        let package = section.add(Symbol::new(SymbolKind::Package, "Product"));
        section.add(
            Symbol::anonymous(SymbolKind::SummaryInformation)
                .with("PropertyId", PID_CREATE_TIME)
                .with("Value", "2020/01/01 00:00:00"),
        );

        bind_summary_info(&mut section, package, 65001, None, None);
        bind_summary_info(&mut section, package, 65001, None, None);

        assert_eq!(
            summary(&section, PID_CREATE_TIME).as_deref(),
            Some("2020/01/01 00:00:00")
        );
        let create_times = section
            .symbols_of(&SymbolKind::SummaryInformation)
            .filter(|s| s.int("PropertyId") == Some(PID_CREATE_TIME))
            .count();
        assert_eq!(create_times, 1);
    }

    #[test]
    fn module_guid_becomes_the_suffix() {
        let mut section = Section::new(SectionType::Module);
        let module = section.add(
            Symbol::new(SymbolKind::Module, "Shared")
                .with("Guid", "{8e3f2a40-1b2c-4d5e-8f90-a1b2c3d4e5f6}"),
        );

        let info = bind_summary_info(&mut section, module, 65001, None, None);

        assert!(info.compressed);
        assert_eq!(
            info.modularization_suffix.as_deref(),
            Some(".8E3F2A40_1B2C_4D5E_8F90_A1B2C3D4E5F6")
        );
    }
}
