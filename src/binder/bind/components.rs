//! Component GUIDs and create-folder synthesis.

use super::directories::DirectoryResolver;
use crate::binder::{
    data::{Section, Symbol, SymbolKind, split_file_name},
    messaging::{Message, Messaging},
};
use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap, HashSet},
};
use uuid::Uuid;

/// Namespace of generated component GUIDs.
const COMPONENT_GUID_NAMESPACE: Uuid = Uuid::from_u128(0x3064E5C6_FB63_4FE9_AC49_E446A792EFA5);

/// `Component.Attributes` bit for a registry key path.
const REGISTRY_KEY_PATH: i64 = 0x4;

/// Gives every component without a key path a `CreateFolder` for its own
/// directory, unless it already has one.
pub fn add_create_folders(section: &mut Section) {
    let existing: HashSet<(String, String)> = section
        .symbols_of(&SymbolKind::CreateFolder)
        .filter_map(|c| {
            Some((
                c.text("Directory_")?.into_owned(),
                c.text("Component_")?.into_owned(),
            ))
        })
        .collect();
    let with_folder: HashSet<&str> = existing.iter().map(|(_, c)| c.as_str()).collect();

    let missing: Vec<(String, String, Option<_>)> = section
        .symbols_of(&SymbolKind::Component)
        .filter(|c| c.text("KeyPath").is_none() && !with_folder.contains(c.id()))
        .filter_map(|c| {
            Some((
                c.text("Directory_")?.into_owned(),
                c.id().to_string(),
                c.source.clone(),
            ))
        })
        .collect();

    for (directory, component, source) in missing {
        let mut folder = Symbol::anonymous(SymbolKind::CreateFolder)
            .with("Directory_", directory.as_str())
            .with("Component_", component.as_str());
        folder.source = source;
        section.add(folder);
    }
}

/// What a component's GUID is derived from.
enum GuidSource {
    Path(String),
    Directory(String),
}

fn is_generated(guid: Option<&str>) -> bool {
    matches!(guid, None | Some("") | Some("*"))
}

/// Canonical uppercase braced form of an authored GUID.
fn normalize_guid(guid: &str) -> Option<String> {
    let parsed = Uuid::parse_str(guid.trim_matches(|c| c == '{' || c == '}')).ok()?;
    Some(format!("{{{}}}", parsed.hyphenated().to_string().to_ascii_uppercase()))
}

/// Deterministic GUID for a key path.
pub fn component_guid(key: &str) -> String {
    let uuid = Uuid::new_v3(&COMPONENT_GUID_NAMESPACE, key.to_lowercase().as_bytes());
    format!("{{{}}}", uuid.hyphenated().to_string().to_ascii_uppercase())
}

fn guid_source(
    section: &Section,
    component: &Symbol,
    directories: &DirectoryResolver,
) -> Option<GuidSource> {
    let directory = component.text("Directory_")?;
    let Some(key_path) = component.text("KeyPath") else {
        return directories
            .target_path(&directory)
            .map(GuidSource::Directory);
    };

    let attributes = component.int("Attributes").unwrap_or(0);
    if attributes & REGISTRY_KEY_PATH != 0 {
        let registry = section.find(&SymbolKind::Registry, &key_path)?;
        let root = registry.int("Root")?;
        let key = registry.text("Key")?;
        let name = registry.text("Name").unwrap_or(Cow::Borrowed(""));
        return Some(GuidSource::Path(format!("{root}\\{key}\\{name}")));
    }

    let file = section.find(&SymbolKind::File, &key_path)?;
    let file_directory = file
        .text("Directory_")
        .unwrap_or_else(|| directory.clone());
    let file_name = file
        .text("FileName")
        .unwrap_or(Cow::Borrowed(file.id()));
    let (name, _) = split_file_name(&file_name);
    let path = directories.target_path(&file_directory)?;
    Some(GuidSource::Path(format!("{path}\\{name}")))
}

/// Generates the GUID of every component authored with `*` or none, and
/// validates the authored ones.
///
/// Components without a key path are keyed by their directory; two such
/// components sharing a directory cannot both be generated.
pub fn finalize_component_guids(
    section: &mut Section,
    directories: &DirectoryResolver,
    messaging: &Messaging,
) {
    let mut updates = Vec::new();
    let mut directory_owners: HashMap<String, String> = HashMap::new();

    for index in section.indices_of(&SymbolKind::Component) {
        let component = &section.symbols[index];
        let authored = component.text("ComponentId");
        if !is_generated(authored.as_deref()) {
            let authored = authored.unwrap_or_default();
            match normalize_guid(&authored) {
                Some(guid) if guid != authored => updates.push((index, guid)),
                Some(_) => {}
                None => messaging.error(
                    component.source.as_ref(),
                    Message::InvalidComponentGuid {
                        component: component.id().to_string(),
                        guid: authored.into_owned(),
                    },
                ),
            }
            continue;
        }

        match guid_source(section, component, directories) {
            Some(GuidSource::Path(key)) => updates.push((index, component_guid(&key))),
            Some(GuidSource::Directory(key)) => {
                let lowered = key.to_lowercase();
                match directory_owners.get(&lowered) {
                    Some(other) => messaging.error(
                        component.source.as_ref(),
                        Message::ComponentDirectoryGuidConflict {
                            component: component.id().to_string(),
                            other: other.clone(),
                            directory: component
                                .text("Directory_")
                                .map(Cow::into_owned)
                                .unwrap_or_default(),
                        },
                    ),
                    None => {
                        directory_owners.insert(lowered, component.id().to_string());
                        updates.push((index, component_guid(&key)));
                    }
                }
            }
            None => messaging.error(
                component.source.as_ref(),
                Message::CannotResolveKeyPath {
                    component: component.id().to_string(),
                },
            ),
        }
    }

    for (index, guid) in updates {
        section.symbols[index].set("ComponentId", guid);
    }

    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    for component in section.symbols_of(&SymbolKind::Component) {
        let Some(guid) = component.text("ComponentId") else {
            continue;
        };
        if is_generated(Some(&*guid)) || normalize_guid(&guid).is_none() {
            continue;
        }
        match owners.get(&*guid) {
            Some(other) => messaging.error(
                component.source.as_ref(),
                Message::DuplicateComponentGuid {
                    component: component.id().to_string(),
                    other: other.clone(),
                    guid: guid.into_owned(),
                },
            ),
            None => {
                owners.insert(guid.into_owned(), component.id().to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::data::SectionType;

    fn section() -> Section {
        let mut section = Section::new(SectionType::Package);
        section.add(Symbol::new(SymbolKind::Directory, "TARGETDIR").with("DefaultDir", "SourceDir"));
        section.add(
            Symbol::new(SymbolKind::Directory, "ProgramFilesFolder")
                .with("Directory_Parent", "TARGETDIR")
                .with("DefaultDir", "PFiles"),
        );
        section.add(
            Symbol::new(SymbolKind::Directory, "INSTALLFOLDER")
                .with("Directory_Parent", "ProgramFilesFolder")
                .with("DefaultDir", "App"),
        );
        section.add(
            Symbol::new(SymbolKind::Component, "Main")
                .with("ComponentId", "*")
                .with("Directory_", "INSTALLFOLDER")
                .with("KeyPath", "app.exe"),
        );
        section.add(
            Symbol::new(SymbolKind::File, "app.exe")
                .with("Component_", "Main")
                .with("FileName", "APP~1.EXE|App.exe"),
        );
        section
    }

    #[test]
    fn generated_guids_are_stable_and_case_insensitive() {
        let mut first = section();
        let mut second = section();
        let messaging = Messaging::new();

        let directories = DirectoryResolver::new(&first);
        finalize_component_guids(&mut first, &directories, &messaging);
        let directories = DirectoryResolver::new(&second);
        finalize_component_guids(&mut second, &directories, &messaging);

        let guid = first.symbols[3].text("ComponentId").map(Cow::into_owned);
        assert!(!messaging.encountered_error());
        assert_eq!(guid, second.symbols[3].text("ComponentId").map(Cow::into_owned));
        assert_eq!(
            guid.as_deref(),
            Some(component_guid("programfilesfolder\\app\\app.exe").as_str())
        );
        assert_eq!(
            component_guid("ProgramFilesFolder\\App\\App.exe"),
            component_guid("programfilesfolder\\app\\app.exe")
        );
    }

    #[test]
    fn generated_guid_is_version_three() {
        let guid = component_guid("ProgramFilesFolder\\App\\App.exe");
        let parsed = Uuid::parse_str(guid.trim_matches(|c| c == '{' || c == '}')).expect("uuid");
        assert_eq!(parsed.get_version_num(), 3);
        assert!(guid.starts_with('{') && guid.ends_with('}'));
        assert_eq!(guid, guid.to_ascii_uppercase());
    }

    #[test]
    fn directory_guids_conflict_when_shared() {
        let mut section = section();
        for id in ["First", "Second"] {
            section.add(
                Symbol::new(SymbolKind::Component, id)
                    .with("Directory_", "INSTALLFOLDER")
                    .with("ComponentId", "*"),
            );
        }
        section.add(
            Symbol::new(SymbolKind::Component, "Broken")
                .with("Directory_", "INSTALLFOLDER")
                .with("ComponentId", "not-a-guid"),
        );

        let messaging = Messaging::new();
        let directories = DirectoryResolver::new(&section);
        finalize_component_guids(&mut section, &directories, &messaging);

        let ids: Vec<u32> = messaging
            .diagnostics()
            .iter()
            .map(|d| d.message.id())
            .collect();
        assert_eq!(ids, vec![32, 30]);
    }

    #[test]
    fn duplicate_authored_guids_are_reported() {
        let mut section = section();
        for id in ["One", "Two"] {
            section.add(
                Symbol::new(SymbolKind::Component, id)
                    .with("Directory_", "INSTALLFOLDER")
                    .with("ComponentId", "{8e3f2a40-1b2c-4d5e-8f90-a1b2c3d4e5f6}"),
            );
        }

        let messaging = Messaging::new();
        let directories = DirectoryResolver::new(&section);
        finalize_component_guids(&mut section, &directories, &messaging);

        let ids: Vec<u32> = messaging
            .diagnostics()
            .iter()
            .map(|d| d.message.id())
            .collect();
        assert_eq!(ids, vec![31]);
        assert_eq!(
            section.symbols[5].text("ComponentId").as_deref(),
            Some("{8E3F2A40-1B2C-4D5E-8F90-A1B2C3D4E5F6}")
        );
    }

    #[test]
    fn components_without_key_path_get_a_create_folder() {
        let mut section = section();
        section.add(Symbol::new(SymbolKind::Component, "Empty").with("Directory_", "INSTALLFOLDER"));

        add_create_folders(&mut section);
        add_create_folders(&mut section);

        let folders: Vec<_> = section.symbols_of(&SymbolKind::CreateFolder).collect();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].text("Component_").as_deref(), Some("Empty"));
    }
}
