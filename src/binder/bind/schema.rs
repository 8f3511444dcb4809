//! Table definitions used by a bind.

use crate::binder::{
    data::{
        ColumnDefinition, Section, SymbolKind, TableDefinition, TableDefinitions,
        definitions::standard_table_definitions,
    },
    extension::BinderExtension,
    messaging::{Message, Messaging},
};

/// Merges the built-in schema, extension schema and `CustomTable` symbols.
///
/// Later definitions never replace earlier ones; a duplicate name is an
/// error diagnostic.
pub fn load_table_definitions(
    section: &Section,
    extensions: &[Box<dyn BinderExtension>],
    messaging: &Messaging,
) -> TableDefinitions {
    let mut definitions = TableDefinitions::new();
    for definition in standard_table_definitions() {
        definitions.add(definition);
    }

    for definition in extensions.iter().flat_map(|e| e.table_definitions()) {
        let name = definition.name.clone();
        if !definitions.add(definition) {
            messaging.error(None, Message::DuplicateTableDefinition { table: name });
        }
    }

    for symbol in section.symbols_of(&SymbolKind::CustomTable) {
        let columns = symbol
            .text("Columns")
            .map(|c| parse_columns(&c))
            .unwrap_or_default();
        let mut definition = TableDefinition::new(symbol.id(), None, columns);
        definition.unreal = symbol.flag("Unreal").unwrap_or(false);

        if !definitions.add(definition) {
            messaging.error(
                symbol.source.as_ref(),
                Message::DuplicateTableDefinition {
                    table: symbol.id().to_string(),
                },
            );
        }
    }

    definitions
}

/// Parses `Name:type[:key][:nullable]` column lists separated by commas.
fn parse_columns(columns: &str) -> Vec<ColumnDefinition> {
    columns
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|column| {
            let mut parts = column.split(':');
            let name = parts.next().unwrap_or_default();
            let mut definition = match parts.next() {
                Some("number") => ColumnDefinition::number(name),
                Some("object") => ColumnDefinition::object(name),
                _ => ColumnDefinition::string(name),
            };
            for modifier in parts {
                definition = match modifier {
                    "key" => definition.key(),
                    "nullable" => definition.nullable(),
                    _ => definition,
                };
            }
            definition
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::data::{ColumnType, SectionType, Symbol};

    #[test]
    fn custom_tables_join_the_builtin_schema() {
        let mut section = Section::new(SectionType::Package);
        section.add(
            Symbol::new(SymbolKind::CustomTable, "Settings")
                .with("Columns", "Id:string:key, Weight:number:nullable, Blob:object"),
        );

        let messaging = Messaging::new();
        let definitions = load_table_definitions(&section, &[], &messaging);

        assert!(!messaging.encountered_error());
        assert!(definitions.contains("File"));
        let settings = definitions.get("Settings").expect("custom table");
        assert_eq!(settings.columns.len(), 3);
        assert!(settings.columns[0].primary_key);
        assert_eq!(settings.columns[1].column_type, ColumnType::Number);
        assert!(settings.columns[1].nullable);
        assert_eq!(settings.columns[2].column_type, ColumnType::Object);
    }

    #[test]
    fn redefining_a_table_is_reported() {
        let mut section = Section::new(SectionType::Package);
        section.add(Symbol::new(SymbolKind::CustomTable, "Property").with("Columns", "A:string:key"));

        let messaging = Messaging::new();
        let definitions = load_table_definitions(&section, &[], &messaging);

        assert!(messaging.encountered_error());
        assert_eq!(definitions.get("Property").expect("property").columns.len(), 2);
    }
}
