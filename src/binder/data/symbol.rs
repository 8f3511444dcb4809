//! Symbols of the linked intermediate and their fields.
//!
//! A [`Symbol`] is a typed record with an optional [`Identifier`], the source
//! location it was authored at and a set of named fields. A field is either
//! known or *delayed*: delayed fields carry an expression containing
//! `!(bind.name)` references that can only be evaluated once the bind-time
//! variable cache is complete.

use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::BTreeMap, fmt};

/// Source location a symbol or row was authored at.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLineNumber {
    /// Authoring file.
    pub file: String,

    /// Line within the authoring file, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl SourceLineNumber {
    /// Creates a source location.
    pub fn new(file: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLineNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}({})", self.file, line),
            None => write!(f, "{}", self.file),
        }
    }
}

/// Visibility of an identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// Unique toolchain-wide and stable across builds.
    #[default]
    Global,
    /// Generated by the toolchain; unique within the section only.
    Private,
}

/// Identifier of a symbol.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// Visibility.
    #[serde(default)]
    pub access: Access,

    /// Identifier text.
    pub id: String,
}

impl Identifier {
    /// Creates a global identifier.
    pub fn global(id: impl Into<String>) -> Self {
        Self {
            access: Access::Global,
            id: id.into(),
        }
    }

    /// Creates a private identifier.
    pub fn private(id: impl Into<String>) -> Self {
        Self {
            access: Access::Private,
            id: id.into(),
        }
    }
}

/// Kind of a symbol.
///
/// Kinds the binder does not know are kept as [`SymbolKind::Extension`] so
/// extensions get a chance to claim them during table materialization.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SymbolKind {
    Package,
    Module,
    Patch,
    SummaryInformation,
    Property,
    Directory,
    Component,
    File,
    MsiFileHash,
    Media,
    MediaTemplate,
    Merge,
    Action,
    CustomAction,
    Feature,
    FeatureComponents,
    CreateFolder,
    Binary,
    Registry,
    SuppressModularization,
    CustomTable,
    CustomTableRow,
    PackageTag,
    SoftwareIdentificationTag,
    DependencyProvider,
    Dependency,
    DependencyRef,
    InstanceTransforms,
    InstanceComponent,
    Extension(String),
}

impl SymbolKind {
    /// Name of the kind as used in intermediates.
    pub fn name(&self) -> &str {
        match self {
            Self::Package => "Package",
            Self::Module => "Module",
            Self::Patch => "Patch",
            Self::SummaryInformation => "SummaryInformation",
            Self::Property => "Property",
            Self::Directory => "Directory",
            Self::Component => "Component",
            Self::File => "File",
            Self::MsiFileHash => "MsiFileHash",
            Self::Media => "Media",
            Self::MediaTemplate => "MediaTemplate",
            Self::Merge => "Merge",
            Self::Action => "Action",
            Self::CustomAction => "CustomAction",
            Self::Feature => "Feature",
            Self::FeatureComponents => "FeatureComponents",
            Self::CreateFolder => "CreateFolder",
            Self::Binary => "Binary",
            Self::Registry => "Registry",
            Self::SuppressModularization => "SuppressModularization",
            Self::CustomTable => "CustomTable",
            Self::CustomTableRow => "CustomTableRow",
            Self::PackageTag => "PackageTag",
            Self::SoftwareIdentificationTag => "SoftwareIdentificationTag",
            Self::DependencyProvider => "DependencyProvider",
            Self::Dependency => "Dependency",
            Self::DependencyRef => "DependencyRef",
            Self::InstanceTransforms => "InstanceTransforms",
            Self::InstanceComponent => "InstanceComponent",
            Self::Extension(name) => name,
        }
    }
}

impl From<String> for SymbolKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Package" => Self::Package,
            "Module" => Self::Module,
            "Patch" => Self::Patch,
            "SummaryInformation" => Self::SummaryInformation,
            "Property" => Self::Property,
            "Directory" => Self::Directory,
            "Component" => Self::Component,
            "File" => Self::File,
            "MsiFileHash" => Self::MsiFileHash,
            "Media" => Self::Media,
            "MediaTemplate" => Self::MediaTemplate,
            "Merge" => Self::Merge,
            "Action" => Self::Action,
            "CustomAction" => Self::CustomAction,
            "Feature" => Self::Feature,
            "FeatureComponents" => Self::FeatureComponents,
            "CreateFolder" => Self::CreateFolder,
            "Binary" => Self::Binary,
            "Registry" => Self::Registry,
            "SuppressModularization" => Self::SuppressModularization,
            "CustomTable" => Self::CustomTable,
            "CustomTableRow" => Self::CustomTableRow,
            "PackageTag" => Self::PackageTag,
            "SoftwareIdentificationTag" => Self::SoftwareIdentificationTag,
            "DependencyProvider" => Self::DependencyProvider,
            "Dependency" => Self::Dependency,
            "DependencyRef" => Self::DependencyRef,
            "InstanceTransforms" => Self::InstanceTransforms,
            "InstanceComponent" => Self::InstanceComponent,
            _ => Self::Extension(name),
        }
    }
}

impl From<SymbolKind> for String {
    fn from(kind: SymbolKind) -> Self {
        kind.name().to_string()
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A known scalar value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    /// Returns the value as text.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Int(value) => Cow::Owned(value.to_string()),
            Self::Str(value) => Cow::Borrowed(value),
        }
    }

    /// Returns the value as a number, parsing text when needed.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Str(value) => value.trim().parse().ok(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

/// Value of a field: known now, or delayed until the variable cache exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Known(Value),
    Delayed(String),
}

/// Provenance marker of a field.
///
/// The binder clears markers to [`FieldMark::Authored`] before handing the
/// section to extensions so that fields an extension touched can be found
/// afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FieldMark {
    #[default]
    Authored,
    Resolved,
    Modified,
}

/// A named field of a symbol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FieldRepr", into = "FieldRepr")]
pub struct Field {
    pub value: FieldValue,
    pub mark: FieldMark,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FieldRepr {
    Delayed { delayed: String },
    Known(Value),
}

impl From<FieldRepr> for Field {
    fn from(repr: FieldRepr) -> Self {
        let value = match repr {
            FieldRepr::Delayed { delayed } => FieldValue::Delayed(delayed),
            FieldRepr::Known(value) => FieldValue::Known(value),
        };
        Self {
            value,
            mark: FieldMark::Authored,
        }
    }
}

impl From<Field> for FieldRepr {
    fn from(field: Field) -> Self {
        match field.value {
            FieldValue::Delayed(delayed) => Self::Delayed { delayed },
            FieldValue::Known(value) => Self::Known(value),
        }
    }
}

/// A typed record of the intermediate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub kind: SymbolKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Identifier>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceLineNumber>,

    #[serde(default)]
    fields: BTreeMap<String, Field>,
}

impl Symbol {
    /// Creates a symbol with a global identifier.
    pub fn new(kind: SymbolKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: Some(Identifier::global(id)),
            source: None,
            fields: BTreeMap::new(),
        }
    }

    /// Creates a symbol without identifier.
    pub fn anonymous(kind: SymbolKind) -> Self {
        Self {
            kind,
            id: None,
            source: None,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style setter for authored fields.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(
            name.to_string(),
            Field {
                value: FieldValue::Known(value.into()),
                mark: FieldMark::Authored,
            },
        );
        self
    }

    /// Builder-style setter for delayed fields.
    pub fn with_delayed(mut self, name: &str, expression: impl Into<String>) -> Self {
        self.fields.insert(
            name.to_string(),
            Field {
                value: FieldValue::Delayed(expression.into()),
                mark: FieldMark::Authored,
            },
        );
        self
    }

    /// Builder-style setter for the source location.
    pub fn at(mut self, source: SourceLineNumber) -> Self {
        self.source = Some(source);
        self
    }

    /// Identifier text, or the empty string for anonymous symbols.
    pub fn id(&self) -> &str {
        self.id.as_ref().map(|i| i.id.as_str()).unwrap_or("")
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// Known value of a field. Delayed and missing fields yield `None`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.fields.get(name).map(|f| &f.value) {
            Some(FieldValue::Known(value)) => Some(value),
            _ => None,
        }
    }

    /// Known value of a field as text; empty strings yield `None`.
    pub fn text(&self, name: &str) -> Option<Cow<'_, str>> {
        self.value(name)
            .map(Value::as_text)
            .filter(|text| !text.is_empty())
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(Value::as_int)
    }

    /// Yes/no style flag; numbers are true when non-zero.
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.value(name)? {
            Value::Int(value) => Some(*value != 0),
            Value::Str(value) => match value.to_ascii_lowercase().as_str() {
                "yes" | "true" | "1" => Some(true),
                "no" | "false" | "0" => Some(false),
                _ => None,
            },
        }
    }

    /// Sets a field and marks it as modified.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(
            name.to_string(),
            Field {
                value: FieldValue::Known(value.into()),
                mark: FieldMark::Modified,
            },
        );
    }

    /// Sets a delayed field and marks it as modified.
    pub fn set_delayed(&mut self, name: &str, expression: impl Into<String>) {
        self.fields.insert(
            name.to_string(),
            Field {
                value: FieldValue::Delayed(expression.into()),
                mark: FieldMark::Modified,
            },
        );
    }

    /// Sets a field as the outcome of delayed resolution.
    pub(crate) fn set_resolved(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(
            name.to_string(),
            Field {
                value: FieldValue::Known(value.into()),
                mark: FieldMark::Resolved,
            },
        );
    }

    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    pub fn has_delayed_fields(&self) -> bool {
        self.fields
            .values()
            .any(|f| matches!(f.value, FieldValue::Delayed(_)))
    }

    /// Names and expressions of the delayed fields.
    pub fn delayed_fields(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .filter_map(|(name, field)| match &field.value {
                FieldValue::Delayed(expression) => Some((name.clone(), expression.clone())),
                FieldValue::Known(_) => None,
            })
            .collect()
    }

    /// True when any field was modified since the marks were last settled.
    pub fn is_modified(&self) -> bool {
        self.fields.values().any(|f| f.mark == FieldMark::Modified)
    }

    pub(crate) fn settle_marks(&mut self) {
        for field in self.fields.values_mut() {
            field.mark = FieldMark::Authored;
        }
    }
}
