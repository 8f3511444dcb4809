//! Table and row model of the installer database.

use super::symbol::{SourceLineNumber, SymbolKind, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Storage type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    /// Path to a file whose bytes are stored as a stream.
    Object,
}

/// How a column participates in modularization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnModularizeType {
    #[default]
    None,
    /// The whole value is an identifier.
    Column,
    /// The value is a property name; public properties are left alone.
    Property,
    /// Formatted text whose `[Identifier]` references are rewritten.
    Condition,
    /// A companion file reference unless the value is a version.
    CompanionFile,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub modularize: ColumnModularizeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ColumnDefinition {
    pub fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            column_type: ColumnType::String,
            primary_key: false,
            nullable: false,
            modularize: ColumnModularizeType::None,
            category: None,
        }
    }

    pub fn number(name: &str) -> Self {
        Self {
            column_type: ColumnType::Number,
            ..Self::string(name)
        }
    }

    pub fn object(name: &str) -> Self {
        Self {
            column_type: ColumnType::Object,
            ..Self::string(name)
        }
    }

    pub fn key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn modularize(mut self, modularize: ColumnModularizeType) -> Self {
        self.modularize = modularize;
        self
    }

    /// Identifier column: modularized as a whole value.
    pub fn ident(self) -> Self {
        self.modularize(ColumnModularizeType::Column)
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    /// Symbol kind whose fields map one-to-one onto the columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_kind: Option<SymbolKind>,
    pub columns: Vec<ColumnDefinition>,
    /// Unreal tables exist only while binding and are never written.
    #[serde(default)]
    pub unreal: bool,
}

impl TableDefinition {
    pub fn new(name: &str, symbol_kind: Option<SymbolKind>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.to_string(),
            symbol_kind,
            columns,
            unreal: false,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Closed set of table definitions used by a bind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableDefinitions(BTreeMap<String, TableDefinition>);

impl TableDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition; returns `false` if one with the same name exists.
    pub fn add(&mut self, definition: TableDefinition) -> bool {
        if self.0.contains_key(&definition.name) {
            return false;
        }
        self.0.insert(definition.name.clone(), definition);
        true
    }

    pub fn get(&self, name: &str) -> Option<&TableDefinition> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Definition whose rows are produced from symbols of `kind`.
    pub fn for_symbol(&self, kind: &SymbolKind) -> Option<&TableDefinition> {
        self.0
            .values()
            .find(|d| d.symbol_kind.as_ref() == Some(kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableDefinition> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub fields: Vec<Option<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceLineNumber>,
}

impl Row {
    pub fn new(column_count: usize) -> Self {
        Self {
            fields: vec![None; column_count],
            source: None,
        }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.fields.get(index).and_then(Option::as_ref)
    }

    pub fn text(&self, index: usize) -> Option<String> {
        self.get(index).map(|v| v.as_text().into_owned())
    }

    pub fn set(&mut self, index: usize, value: Option<Value>) {
        if let Some(field) = self.fields.get_mut(index) {
            *field = value;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(definition: &TableDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            columns: definition.columns.clone(),
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn create_row(&mut self, source: Option<SourceLineNumber>) -> &mut Row {
        let mut row = Row::new(self.columns.len());
        row.source = source;
        self.rows.push(row);
        let last = self.rows.len() - 1;
        &mut self.rows[last]
    }

    /// Primary key of a row: key column values joined with `/`.
    pub fn primary_key(&self, row: &Row) -> String {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| row.text(i).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Value of a named column of a row.
    pub fn value<'a>(&self, row: &'a Row, column: &str) -> Option<&'a Value> {
        self.column_index(column).and_then(|i| row.get(i))
    }

    /// Whether two tables have the same column layout.
    pub fn same_shape(&self, other: &Table) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.name == b.name && a.column_type == b.column_type)
    }
}

/// Kind of database being produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    Package,
    Module,
    Patch,
    Transform,
}

/// A named, nested table set (patch transforms).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubStorage {
    pub name: String,
    pub data: WindowsInstallerData,
}

/// Logical content of the installer database.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowsInstallerData {
    pub output_type: OutputType,
    pub codepage: i32,
    #[serde(default)]
    pub tables: BTreeMap<String, Table>,
    #[serde(default)]
    pub sub_storages: Vec<SubStorage>,
}

impl WindowsInstallerData {
    pub fn new(output_type: OutputType, codepage: i32) -> Self {
        Self {
            output_type,
            codepage,
            tables: BTreeMap::new(),
            sub_storages: Vec::new(),
        }
    }

    /// Returns the table for `definition`, creating it when missing.
    pub fn ensure_table(&mut self, definition: &TableDefinition) -> &mut Table {
        self.tables
            .entry(definition.name.clone())
            .or_insert_with(|| Table::new(definition))
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&Table, &Row)> {
        self.tables
            .values()
            .flat_map(|t| t.rows.iter().map(move |r| (t, r)))
    }
}
