//! Renders the finalized section into the table model.

use crate::binder::{
    data::{
        ColumnType, OutputType, Section, SectionType, Symbol, SymbolKind, TableDefinition,
        TableDefinitions, Value, WindowsInstallerData,
        definitions::{MODULE_IGNORE_TABLE, module_sequence_table},
    },
    extension::BinderExtension,
    messaging::{Message, Messaging},
};

/// Output type produced for a section type.
pub fn output_type(section_type: SectionType) -> OutputType {
    match section_type {
        SectionType::Package => OutputType::Package,
        SectionType::Module => OutputType::Module,
        SectionType::Patch => OutputType::Patch,
    }
}

/// Kinds consumed by the binder itself that never become rows directly.
fn is_binder_only(kind: &SymbolKind) -> bool {
    matches!(
        kind,
        SymbolKind::Package
            | SymbolKind::Patch
            | SymbolKind::MediaTemplate
            | SymbolKind::Merge
            | SymbolKind::SuppressModularization
            | SymbolKind::CustomTable
            | SymbolKind::PackageTag
            | SymbolKind::DependencyProvider
            | SymbolKind::Dependency
            | SymbolKind::DependencyRef
            | SymbolKind::InstanceTransforms
            | SymbolKind::InstanceComponent
    )
}

/// Builds the [`WindowsInstallerData`] for `section`.
///
/// `modularization_suffix` is the module suffix for module output and is
/// used for the `ModuleSignature` and `ModuleComponents` tables.
pub fn materialize(
    section: &Section,
    codepage: i32,
    modularization_suffix: Option<&str>,
    table_definitions: &TableDefinitions,
    extensions: &mut [Box<dyn BinderExtension>],
    messaging: &Messaging,
) -> WindowsInstallerData {
    let output_type = output_type(section.section_type);
    let mut data = WindowsInstallerData::new(output_type, codepage);

    for symbol in &section.symbols {
        match &symbol.kind {
            kind if is_binder_only(kind) => {}
            SymbolKind::Module => {
                add_module_rows(section, symbol, modularization_suffix, table_definitions, &mut data)
            }
            SymbolKind::Media if output_type == OutputType::Module => {}
            SymbolKind::MsiFileHash if hashes_versioned_file(section, symbol) => {}
            SymbolKind::Action => add_action_row(symbol, output_type, table_definitions, &mut data),
            SymbolKind::CustomTableRow => {
                let table = symbol.text("Table").unwrap_or_default();
                match table_definitions.get(&table) {
                    Some(definition) => add_symbol_row(symbol, definition, &mut data),
                    None => messaging.error(
                        symbol.source.as_ref(),
                        Message::UndefinedCustomTable {
                            table: table.into_owned(),
                        },
                    ),
                }
            }
            kind => match table_definitions.for_symbol(kind) {
                Some(definition) => add_symbol_row(symbol, definition, &mut data),
                None => {
                    let claimed = extensions.iter_mut().any(|extension| {
                        extension.try_process_symbol(section, symbol, &mut data, table_definitions)
                    });
                    if !claimed {
                        messaging.error(
                            symbol.source.as_ref(),
                            Message::UnknownSymbolKind {
                                kind: kind.to_string(),
                            },
                        );
                    }
                }
            },
        }
    }

    data
}

/// Versioned files are identified by version, never by hash.
fn hashes_versioned_file(section: &Section, hash: &Symbol) -> bool {
    hash.text("File_")
        .and_then(|file| section.find(&SymbolKind::File, &file))
        .is_some_and(|file| file.text("Version").is_some())
}

/// Maps symbol fields onto same-named columns. A missing first key column
/// takes the symbol's identifier.
pub fn add_symbol_row(symbol: &Symbol, definition: &TableDefinition, data: &mut WindowsInstallerData) {
    let table = data.ensure_table(definition);
    let row = table.create_row(symbol.source.clone());
    let first_key = definition.columns.iter().position(|c| c.primary_key);

    for (index, column) in definition.columns.iter().enumerate() {
        let value = symbol.value(&column.name).cloned().or_else(|| {
            (Some(index) == first_key && symbol.id.is_some())
                .then(|| Value::from(symbol.id()))
        });
        row.set(index, value.map(|v| coerce(v, column.column_type)));
    }
}

fn coerce(value: Value, column_type: ColumnType) -> Value {
    match (column_type, &value) {
        (ColumnType::Number, Value::Str(text)) => text
            .trim()
            .parse()
            .map(Value::Int)
            .unwrap_or(value),
        _ => value,
    }
}

fn add_action_row(
    symbol: &Symbol,
    output_type: OutputType,
    table_definitions: &TableDefinitions,
    data: &mut WindowsInstallerData,
) {
    let Some(sequence_table) = symbol.text("SequenceTable") else {
        return;
    };
    let action = symbol
        .text("Action")
        .map(|a| a.into_owned())
        .unwrap_or_else(|| symbol.id().to_string());

    if output_type == OutputType::Module {
        let name = module_sequence_table(&sequence_table);
        let Some(definition) = table_definitions.get(&name) else {
            return;
        };
        let table = data.ensure_table(definition);
        let row = table.create_row(symbol.source.clone());
        row.set(0, Some(Value::from(action)));

        // Relative actions keep their anchor so the consumer can resequence.
        let (base, after) = match (symbol.text("Before"), symbol.text("After")) {
            (_, Some(parent)) => (Some(parent.into_owned()), Some(1)),
            (Some(parent), None) => (Some(parent.into_owned()), Some(0)),
            (None, None) => (None, None),
        };
        match base {
            Some(base) => {
                row.set(2, Some(Value::from(base)));
                row.set(3, after.map(Value::Int));
            }
            None => row.set(1, symbol.int("Sequence").map(Value::Int)),
        }
        row.set(4, symbol.value("Condition").cloned());
    } else if let Some(definition) = table_definitions.get(&sequence_table) {
        let table = data.ensure_table(definition);
        let row = table.create_row(symbol.source.clone());
        row.set(0, Some(Value::from(action)));
        row.set(1, symbol.value("Condition").cloned());
        row.set(2, symbol.int("Sequence").map(Value::Int));
    }
}

fn add_module_rows(
    section: &Section,
    module: &Symbol,
    modularization_suffix: Option<&str>,
    table_definitions: &TableDefinitions,
    data: &mut WindowsInstallerData,
) {
    let module_id = format!("{}{}", module.id(), modularization_suffix.unwrap_or_default());
    let language = module.int("Language").unwrap_or(0);

    if let Some(definition) = table_definitions.get("ModuleSignature") {
        let row = data.ensure_table(definition).create_row(module.source.clone());
        row.set(0, Some(Value::from(module_id.clone())));
        row.set(1, Some(Value::Int(language)));
        row.set(2, module.value("Version").cloned());
    }

    if let Some(definition) = table_definitions.get("ModuleComponents") {
        for component in section.symbols_of(&SymbolKind::Component) {
            let row = data
                .ensure_table(definition)
                .create_row(component.source.clone());
            row.set(0, Some(Value::from(component.id())));
            row.set(1, Some(Value::from(module_id.clone())));
            row.set(2, Some(Value::Int(language)));
        }
    }

    if let Some(definition) = table_definitions.get(MODULE_IGNORE_TABLE) {
        data.ensure_table(definition);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::data::definitions::standard_table_definitions;

    fn definitions() -> TableDefinitions {
        let mut definitions = TableDefinitions::new();
        for definition in standard_table_definitions() {
            definitions.add(definition);
        }
        definitions
    }

    #[test]
    fn missing_key_column_takes_symbol_id() {
        let mut section = Section::new(SectionType::Package);
        section.add(Symbol::new(SymbolKind::Property, "Manufacturer").with("Value", "Acme"));

        let messaging = Messaging::new();
        let data = materialize(&section, 1252, None, &definitions(), &mut [], &messaging);

        let table = data.table("Property").expect("property table");
        assert_eq!(table.rows[0].text(0).as_deref(), Some("Manufacturer"));
        assert_eq!(table.rows[0].text(1).as_deref(), Some("Acme"));
        assert_eq!(data.codepage, 1252);
    }

    #[test]
    fn unknown_kinds_are_reported_unless_claimed() {
        struct Claims;
        impl BinderExtension for Claims {
            fn try_process_symbol(
                &mut self,
                _section: &Section,
                symbol: &Symbol,
                _data: &mut WindowsInstallerData,
                _table_definitions: &TableDefinitions,
            ) -> bool {
                symbol.kind.name() == "Claimed"
            }
        }

        let mut section = Section::new(SectionType::Package);
        section.add(Symbol::new(SymbolKind::from("Claimed".to_string()), "a"));
        section.add(Symbol::new(SymbolKind::from("Orphan".to_string()), "b"));

        let messaging = Messaging::new();
        let mut extensions: Vec<Box<dyn BinderExtension>> = vec![Box::new(Claims)];
        materialize(&section, 65001, None, &definitions(), &mut extensions, &messaging);

        let diagnostics = messaging.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            Message::UnknownSymbolKind {
                kind: "Orphan".into()
            }
        );
    }

    #[test]
    fn module_actions_keep_their_anchor() {
        let mut section = Section::new(SectionType::Module);
        section.add(
            Symbol::new(SymbolKind::Action, "InstallExecuteSequence/SetDirs")
                .with("SequenceTable", "InstallExecuteSequence")
                .with("Action", "SetDirs")
                .with("After", "CostFinalize")
                .with("Sequence", 1001),
        );

        let messaging = Messaging::new();
        let data = materialize(&section, 65001, Some(".ABC"), &definitions(), &mut [], &messaging);

        let table = data
            .table("ModuleInstallExecuteSequence")
            .expect("module sequence");
        let row = &table.rows[0];
        assert_eq!(row.text(0).as_deref(), Some("SetDirs"));
        assert_eq!(row.get(1), None);
        assert_eq!(row.text(2).as_deref(), Some("CostFinalize"));
        assert_eq!(row.get(3), Some(&Value::Int(1)));
    }
}
