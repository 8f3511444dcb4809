//! Directory tree resolution.

use crate::binder::data::{
    Section, SymbolKind, definitions::is_standard_directory, split_file_name,
};
use std::{borrow::Cow, collections::HashMap, path::PathBuf};

const TARGETDIR: &str = "TARGETDIR";

#[derive(Clone, Debug)]
struct DirectoryEntry {
    parent: Option<String>,
    target: DirectoryName,
    source: DirectoryName,
}

#[derive(Clone, Debug, Default)]
struct DirectoryName {
    long: String,
    short: Option<String>,
}

impl DirectoryName {
    fn parse(name: &str) -> Self {
        let (long, short) = split_file_name(name);
        Self {
            long: long.to_string(),
            short: short.map(str::to_string),
        }
    }

    fn pick(&self, long_names: bool) -> &str {
        match &self.short {
            Some(short) if !long_names => short,
            _ => &self.long,
        }
    }
}

/// Resolves directory identifiers to target and source paths.
///
/// `DefaultDir` is `target[:source]` where each part may be `short|long`;
/// `.` means "same as the parent". Target paths are rooted at the standard
/// directory they live under, named by its identifier. Source paths follow
/// `DefaultDir` names up to `TARGETDIR`, the empty root.
#[derive(Clone, Debug, Default)]
pub struct DirectoryResolver {
    entries: HashMap<String, DirectoryEntry>,
}

impl DirectoryResolver {
    pub fn new(section: &Section) -> Self {
        let entries = section
            .symbols_of(&SymbolKind::Directory)
            .map(|directory| {
                let default_dir = directory
                    .text("DefaultDir")
                    .map(Cow::into_owned)
                    .unwrap_or_else(|| directory.id().to_string());
                let (target, source) = match default_dir.split_once(':') {
                    Some((target, source)) => (target.to_string(), source.to_string()),
                    None => (default_dir.clone(), default_dir),
                };
                (
                    directory.id().to_string(),
                    DirectoryEntry {
                        parent: directory.text("Directory_Parent").map(Cow::into_owned),
                        target: DirectoryName::parse(&target),
                        source: DirectoryName::parse(&source),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    fn segments(&self, id: &str, source: bool, long_names: bool) -> Option<Vec<String>> {
        let mut segments = Vec::new();
        let mut current = id.to_string();

        // Bounded walk so a malformed parent cycle cannot loop forever.
        for _ in 0..=self.entries.len() {
            if current == TARGETDIR {
                segments.reverse();
                return Some(segments);
            }
            let standard = is_standard_directory(&current);
            if standard && !source {
                segments.push(current);
                segments.reverse();
                return Some(segments);
            }
            let Some(entry) = self.entries.get(&current) else {
                if standard {
                    segments.push(current);
                    segments.reverse();
                    return Some(segments);
                }
                return None;
            };

            let name = if source { &entry.source } else { &entry.target };
            let name = name.pick(long_names);
            match &entry.parent {
                None => {
                    segments.push(current.clone());
                    segments.reverse();
                    return Some(segments);
                }
                Some(parent) => {
                    if name != "." && !name.is_empty() {
                        segments.push(name.to_string());
                    }
                    current = parent.clone();
                }
            }
        }
        None
    }

    /// Installed path of a directory, `\` separated, rooted at its standard
    /// directory.
    pub fn target_path(&self, id: &str) -> Option<String> {
        self.segments(id, false, true).map(|s| s.join("\\"))
    }

    /// Relative source layout path of a directory.
    pub fn source_path(&self, id: &str, long_names: bool) -> Option<PathBuf> {
        self.segments(id, true, long_names)
            .map(|s| s.iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::data::{SectionType, Symbol};

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
                .with("DefaultDir", "APPLIC~1|Application:Src"),
        );
        section.add(
            Symbol::new(SymbolKind::Directory, "Same")
                .with("Directory_Parent", "INSTALLFOLDER")
                .with("DefaultDir", "."),
        );
        section
    }

    #[test]
    fn target_paths_are_rooted_at_standard_directories() {
        let resolver = DirectoryResolver::new(&section());
        assert_eq!(
            resolver.target_path("INSTALLFOLDER").as_deref(),
            Some("ProgramFilesFolder\\Application")
        );
        assert_eq!(
            resolver.target_path("Same").as_deref(),
            Some("ProgramFilesFolder\\Application")
        );
        assert_eq!(resolver.target_path("Undefined"), None);
    }

    #[test]
    fn source_paths_follow_the_source_name() {
        let resolver = DirectoryResolver::new(&section());
        assert_eq!(
            resolver.source_path("INSTALLFOLDER", true),
            Some(PathBuf::from("PFiles").join("Src"))
        );
    }
}
