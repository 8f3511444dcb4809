//! Identifier renaming for merge module output.
//!
//! Every identifier of a module is suffixed with `.GUID` (dashes replaced by
//! underscores) so several modules can be merged into one package without
//! collisions. Standard directories, standard actions, public properties and
//! explicitly suppressed identifiers keep their names.

use crate::binder::{
    Result,
    data::{
        ColumnModularizeType, TableDefinitions, Value, WindowsInstallerData,
        definitions::{
            MODULE_IGNORE_TABLE, SEQUENCE_TABLES, STREAMS_TABLE, SUMMARY_INFORMATION_TABLE,
            VALIDATION_TABLE, is_standard_action, is_standard_directory, module_sequence_table,
        },
    },
};
use regex::Regex;
use std::collections::BTreeSet;

/// `[Property]`, `[#File]`, `[!File]` and `[$Component]` references.
const FORMATTED_REFERENCE: &str = r"\[(?P<prefix>[#!$]?)(?P<id>[A-Za-z_][A-Za-z0-9_.]*)\]";

/// Tables whose content is never modularized.
const UNMODULARIZED_TABLES: &[&str] = &[
    SUMMARY_INFORMATION_TABLE,
    VALIDATION_TABLE,
    STREAMS_TABLE,
    MODULE_IGNORE_TABLE,
    "ModuleSignature",
];

/// Public properties are all upper case.
fn is_public_property(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(|c| c.is_ascii_lowercase())
}

struct Modularizer<'a> {
    references: Regex,
    suffix: &'a str,
    suppressed: &'a BTreeSet<String>,
}

fn keeps(id: &str, suppressed: &BTreeSet<String>) -> bool {
    id.is_empty() || suppressed.contains(id) || is_standard_directory(id) || is_standard_action(id)
}

/// Name an identifier takes once the module is modularized with `suffix`.
pub fn modularized_identifier(id: &str, suffix: &str, suppressed: &BTreeSet<String>) -> String {
    if keeps(id, suppressed) {
        id.to_string()
    } else {
        format!("{id}{suffix}")
    }
}

impl Modularizer<'_> {
    fn identifier(&self, id: &str) -> Option<String> {
        (!keeps(id, self.suppressed)).then(|| format!("{id}{}", self.suffix))
    }

    fn property(&self, id: &str) -> Option<String> {
        if is_public_property(id) {
            None
        } else {
            self.identifier(id)
        }
    }

    fn formatted(&self, text: &str) -> Option<String> {
        let rewritten = self.references.replace_all(text, |caps: &regex::Captures<'_>| {
            let prefix = &caps["prefix"];
            let id = &caps["id"];
            let renamed = if prefix.is_empty() {
                self.property(id)
            } else {
                self.identifier(id)
            };
            format!("[{prefix}{}]", renamed.as_deref().unwrap_or(id))
        });
        (rewritten != text).then(|| rewritten.into_owned())
    }

    fn companion_file(&self, text: &str) -> Option<String> {
        let is_version = text.chars().all(|c| c.is_ascii_digit() || c == '.');
        if is_version {
            None
        } else {
            self.identifier(text)
        }
    }

    fn rewrite(&self, modularize: ColumnModularizeType, value: &Value) -> Option<Value> {
        let Value::Str(text) = value else {
            return None;
        };
        match modularize {
            ColumnModularizeType::None => None,
            ColumnModularizeType::Column => self.identifier(text),
            ColumnModularizeType::Property => self.property(text),
            ColumnModularizeType::Condition => self.formatted(text),
            ColumnModularizeType::CompanionFile => self.companion_file(text),
        }
        .map(Value::Str)
    }
}

/// Appends `suffix` to every modularizable identifier in `data`.
pub fn modularize(
    data: &mut WindowsInstallerData,
    suffix: &str,
    suppressed: &BTreeSet<String>,
) -> Result<()> {
    let modularizer = Modularizer {
        references: Regex::new(FORMATTED_REFERENCE)?,
        suffix,
        suppressed,
    };

    for table in data.tables.values_mut() {
        if UNMODULARIZED_TABLES.contains(&table.name.as_str()) {
            continue;
        }
        let columns: Vec<_> = table
            .columns
            .iter()
            .map(|c| c.modularize)
            .enumerate()
            .filter(|(_, m)| *m != ColumnModularizeType::None)
            .collect();

        for row in &mut table.rows {
            for (index, modularize) in &columns {
                let rewritten = row
                    .get(*index)
                    .and_then(|value| modularizer.rewrite(*modularize, value));
                if let Some(value) = rewritten {
                    row.set(*index, Some(value));
                }
            }
        }
    }
    Ok(())
}

/// Ensures every module sequence table exists, even when empty, and lists
/// the added ones in `ModuleIgnoreTable`. Returns the added table names.
pub fn add_back_suppressed_sequence_tables(
    data: &mut WindowsInstallerData,
    table_definitions: &TableDefinitions,
) -> Vec<String> {
    let mut added = Vec::new();
    for table in SEQUENCE_TABLES {
        let name = module_sequence_table(table);
        if data.table(&name).is_some() {
            continue;
        }
        if let Some(definition) = table_definitions.get(&name) {
            data.ensure_table(definition);
            added.push(name);
        }
    }

    if let Some(definition) = table_definitions.get(MODULE_IGNORE_TABLE) {
        let ignore = data.ensure_table(definition);
        for name in &added {
            ignore.create_row(None).set(0, Some(Value::from(name.as_str())));
        }
    }
    added
}
