//! Linked intermediate and its single section.

use super::symbol::{Symbol, SymbolKind};
use crate::binder::error::{Error, ErrorExt, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Intermediate level set by the linker.
pub const LEVEL_LINKED: &str = "linked";
/// Intermediate level set once all bind paths are resolved.
pub const LEVEL_RESOLVED: &str = "resolved";
/// Intermediate level set by the binder.
pub const LEVEL_FULLY_BOUND: &str = "fullyBound";

/// Package type of a section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    #[default]
    Package,
    Module,
    Patch,
}

/// The single connected symbol graph being bound.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", default)]
    pub section_type: SectionType,

    #[serde(default)]
    pub symbols: Vec<Symbol>,
}

impl Section {
    pub fn new(section_type: SectionType) -> Self {
        Self {
            id: None,
            section_type,
            symbols: Vec::new(),
        }
    }

    pub fn add(&mut self, symbol: Symbol) -> usize {
        self.symbols.push(symbol);
        self.symbols.len() - 1
    }

    pub fn symbols_of<'a>(&'a self, kind: &'a SymbolKind) -> impl Iterator<Item = &'a Symbol> + 'a {
        self.symbols.iter().filter(move |s| &s.kind == kind)
    }

    pub fn symbols_of_mut<'a>(
        &'a mut self,
        kind: &'a SymbolKind,
    ) -> impl Iterator<Item = &'a mut Symbol> + 'a {
        self.symbols.iter_mut().filter(move |s| &s.kind == kind)
    }

    /// Indices of all symbols of a kind, in section order.
    pub fn indices_of(&self, kind: &SymbolKind) -> Vec<usize> {
        self.symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| &s.kind == kind)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn find(&self, kind: &SymbolKind, id: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| &s.kind == kind && s.id() == id)
    }

    pub fn find_mut(&mut self, kind: &SymbolKind, id: &str) -> Option<&mut Symbol> {
        self.symbols
            .iter_mut()
            .find(|s| &s.kind == kind && s.id() == id)
    }

    pub fn position(&self, kind: &SymbolKind, id: &str) -> Option<usize> {
        self.symbols
            .iter()
            .position(|s| &s.kind == kind && s.id() == id)
    }

    /// Index of the only symbol of `kind`.
    ///
    /// Anything other than exactly one such symbol is a fatal error.
    pub fn single_index(&self, kind: SymbolKind) -> Result<usize> {
        let indices = self.indices_of(&kind);
        match indices.as_slice() {
            [index] => Ok(*index),
            _ => Err(Error::SingleSymbolExpected {
                kind,
                count: indices.len(),
            }),
        }
    }

    pub fn has_delayed_fields(&self) -> bool {
        self.symbols.iter().any(Symbol::has_delayed_fields)
    }

    pub(crate) fn settle_marks(&mut self) {
        for symbol in &mut self.symbols {
            symbol.settle_marks();
        }
    }
}

/// A file embedded in a library or extension container that must be
/// extracted before binding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedEmbeddedFile {
    /// Container (zip) holding the file.
    pub uri: PathBuf,

    /// Entry name inside the container.
    pub embedded_id: String,

    /// Where the file is expected to be extracted to.
    pub output_path: PathBuf,
}

/// Output of the linker: one resolved section plus bookkeeping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intermediate {
    pub id: String,

    #[serde(default)]
    pub levels: Vec<String>,

    #[serde(default)]
    pub sections: Vec<Section>,

    #[serde(default)]
    pub embedded_files: Vec<ExpectedEmbeddedFile>,
}

impl Intermediate {
    /// Wraps a linked and resolved section.
    pub fn from_section(id: impl Into<String>, section: Section) -> Self {
        Self {
            id: id.into(),
            levels: vec![LEVEL_LINKED.to_string(), LEVEL_RESOLVED.to_string()],
            sections: vec![section],
            embedded_files: Vec::new(),
        }
    }

    pub fn has_level(&self, level: &str) -> bool {
        self.levels.iter().any(|l| l == level)
    }

    pub fn update_level(&mut self, level: &str) {
        if !self.has_level(level) {
            self.levels.push(level.to_string());
        }
    }

    /// Loads an intermediate from its JSON form.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).fs_context("reading intermediate", path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).fs_context("writing intermediate", path)
    }
}
