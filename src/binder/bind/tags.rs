//! Package software identification tags.
//!
//! Each `PackageTag` names a `File` whose content is generated here: an
//! ISO/IEC 19770-2 tag describing the package. The file's source is pointed
//! at the generated tag and a `SoftwareIdentificationTag` row records it.

use crate::binder::{
    Result,
    data::{Section, Symbol, SymbolKind, TrackedFileType, TrackedFiles, split_file_name},
    error::{Error, ErrorExt},
    utils::fs,
};
use handlebars::Handlebars;
use std::{borrow::Cow, collections::BTreeMap, path::Path};

const TAG_FOLDER: &str = "_swidtag";

const SOFTWARE_TAG_TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<SoftwareIdentity tagId="{{tag_id}}" name="{{name}}" version="{{version}}" versionScheme="multipartnumeric" xmlns="http://standards.iso.org/iso/19770/-2/2015/schema.xsd">
  <Entity name="{{manufacturer}}" regid="{{regid}}" role="softwareCreator tagCreator" />
{{#if persistent_id}}  <Meta persistentId="{{persistent_id}}" />
{{/if}}</SoftwareIdentity>
"#;

fn property(section: &Section, name: &str) -> Option<String> {
    section
        .find(&SymbolKind::Property, name)
        .and_then(|p| p.text("Value"))
        .map(Cow::into_owned)
}

fn without_braces(guid: &str) -> &str {
    guid.trim_start_matches('{').trim_end_matches('}')
}

/// Writes a tag file for every `PackageTag` and redirects its `File`.
pub async fn process_package_software_tags(
    section: &mut Section,
    package_index: usize,
    intermediate_folder: &Path,
    tracked: &mut TrackedFiles,
) -> Result<()> {
    let tags: Vec<usize> = section.indices_of(&SymbolKind::PackageTag);
    if tags.is_empty() {
        return Ok(());
    }

    let package = &section.symbols[package_index];
    let product_name = package.text("Name").map(Cow::into_owned).unwrap_or_default();
    let version = package.text("Version").map(Cow::into_owned).unwrap_or_default();
    let manufacturer = property(section, "Manufacturer").unwrap_or_default();
    let product_code = property(section, "ProductCode").unwrap_or_default();
    let upgrade_code = property(section, "UpgradeCode");
    let tag_id = without_braces(&product_code).to_string();
    let persistent_id = upgrade_code.as_deref().map(without_braces).map(str::to_string);

    let mut handlebars = Handlebars::new();
    handlebars
        .register_template_string("swidtag", SOFTWARE_TAG_TEMPLATE)
        .map_err(|e| Error::GenericError(format!("failed to register tag template: {e}")))?;

    let folder = intermediate_folder.join(TAG_FOLDER);
    fs::create_dir_all(&folder, false).await?;

    for index in tags {
        let tag = &section.symbols[index];
        let (Some(file_id), Some(regid)) = (tag.text("File_"), tag.text("Regid")) else {
            log::warn!("Package tag {} names no file or regid", tag.id());
            continue;
        };
        let (file_id, regid) = (file_id.into_owned(), regid.into_owned());
        let name = tag
            .text("Name")
            .map(Cow::into_owned)
            .unwrap_or_else(|| product_name.clone());
        let source = tag.source.clone();
        let tag_symbol_id = tag.id().to_string();

        let Some(file) = section.find_mut(&SymbolKind::File, &file_id) else {
            log::warn!("Package tag {tag_symbol_id} names missing file {file_id}");
            continue;
        };
        let file_name = file
            .text("FileName")
            .map(|n| split_file_name(&n).0.to_string())
            .unwrap_or_else(|| format!("{file_id}.swidtag"));

        let mut data = BTreeMap::new();
        data.insert("tag_id", tag_id.clone());
        data.insert("name", name);
        data.insert("version", version.clone());
        data.insert("manufacturer", manufacturer.clone());
        data.insert("regid", regid.clone());
        if let Some(persistent_id) = &persistent_id {
            data.insert("persistent_id", persistent_id.clone());
        }
        let content = handlebars
            .render("swidtag", &data)
            .map_err(|e| Error::GenericError(format!("failed to render tag {tag_symbol_id}: {e}")))?;

        let path = folder.join(&file_name);
        tokio::fs::write(&path, content)
            .await
            .fs_context("writing software tag", &path)?;
        file.set("Source", &*path.to_string_lossy());
        tracked.track(&path, TrackedFileType::Intermediate);

        let mut row = Symbol::new(SymbolKind::SoftwareIdentificationTag, tag_symbol_id)
            .with("File_", file_id.as_str())
            .with("Regid", regid.as_str())
            .with("UniqueId", tag_id.as_str())
            .with("Type", "product");
        row.source = source;
        section.add(row);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::data::SectionType;

    fn section() -> (Section, usize) {
        let mut section = Section::new(SectionType::Package);
        let package = section.add(
            Symbol::new(SymbolKind::Package, "Product")
                .with("Name", "Sample & Co")
                .with("Version", "1.2.3"),
        );
        for (name, value) in [
            ("Manufacturer", "Kodegen"),
            ("ProductCode", "{6E0F8A1C-3B2D-4C5E-9F70-1A2B3C4D5E6F}"),
            ("UpgradeCode", "{11111111-2222-3333-4444-555555555555}"),
        ] {
            section.add(Symbol::new(SymbolKind::Property, name).with("Value", value));
        }
        section.add(
            Symbol::new(SymbolKind::File, "tag")
                .with("FileName", "SAMPLE~1.SWI|sample.swidtag")
                .with("Source", "placeholder"),
        );
        section.add(
            Symbol::new(SymbolKind::PackageTag, "Tag")
                .with("File_", "tag")
                .with("Regid", "regid.2024-01.ai.kodegen"),
        );
        (section, package)
    }

    #[tokio::test]
    async fn tag_file_replaces_the_file_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut section, package) = section();
        let mut tracked = TrackedFiles::new();

        process_package_software_tags(&mut section, package, dir.path(), &mut tracked)
            .await
            .expect("tags");

        let path = dir.path().join(TAG_FOLDER).join("sample.swidtag");
        let file = section.find(&SymbolKind::File, "tag").expect("file");
        assert_eq!(file.text("Source").as_deref(), Some(&*path.to_string_lossy()));

        let content = std::fs::read_to_string(&path).expect("tag");
        assert!(content.contains(r#"tagId="6E0F8A1C-3B2D-4C5E-9F70-1A2B3C4D5E6F""#));
        assert!(content.contains(r#"name="Sample &amp; Co""#));
        assert!(content.contains(r#"regid="regid.2024-01.ai.kodegen""#));
        assert!(content.contains(r#"persistentId="11111111-2222-3333-4444-555555555555""#));
        assert!(tracked.of_type(TrackedFileType::Intermediate).any(|t| t.path == path));

        let row = section
            .find(&SymbolKind::SoftwareIdentificationTag, "Tag")
            .expect("tag row");
        assert_eq!(row.text("File_").as_deref(), Some("tag"));
        assert_eq!(
            row.text("UniqueId").as_deref(),
            Some("6E0F8A1C-3B2D-4C5E-9F70-1A2B3C4D5E6F")
        );
    }

    #[tokio::test]
    async fn tag_for_a_missing_file_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut section, package) = section();
        section.add(
            Symbol::new(SymbolKind::PackageTag, "Stray")
                .with("File_", "nowhere")
                .with("Regid", "regid.2024-01.ai.kodegen"),
        );

        process_package_software_tags(&mut section, package, dir.path(), &mut TrackedFiles::new())
            .await
            .expect("tags");

        assert!(section.find(&SymbolKind::SoftwareIdentificationTag, "Stray").is_none());
        assert!(section.find(&SymbolKind::SoftwareIdentificationTag, "Tag").is_some());
    }
}
