//! Data model shared by every binder stage.
//!
//! - [`symbol`] - symbols, identifiers and delayed fields
//! - [`section`] - the linked section and its intermediate
//! - [`facade`] - per-file working records
//! - [`tracked`] - tracked file ledger
//! - [`table`] - table definitions, rows and the database model
//! - [`definitions`] - built-in table schema

pub mod definitions;
mod facade;
mod section;
mod symbol;
mod table;
mod tracked;

pub use facade::{FacadeOrigin, FileFacade, FileHash, split_file_name};
pub use section::{
    ExpectedEmbeddedFile, Intermediate, LEVEL_FULLY_BOUND, LEVEL_LINKED, LEVEL_RESOLVED, Section,
    SectionType,
};
pub use symbol::{
    Access, Field, FieldMark, FieldValue, Identifier, SourceLineNumber, Symbol, SymbolKind, Value,
};
pub use table::{
    ColumnDefinition, ColumnModularizeType, ColumnType, OutputType, Row, SubStorage, Table,
    TableDefinition, TableDefinitions, WindowsInstallerData,
};
pub use tracked::{TrackedFile, TrackedFileType, TrackedFiles};
