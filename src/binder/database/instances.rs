//! Instance transforms.
//!
//! Each `InstanceTransforms` symbol becomes a transform sub-storage named
//! after the instance. Applying it installs the package again side by side:
//! the instance property is set, the product code (and optionally name and
//! upgrade code) change, and every instance component gets a new GUID.

use crate::binder::data::{
    OutputType, Row, Section, SubStorage, SymbolKind, Table, TableDefinitions, Value,
    WindowsInstallerData, definitions::SUMMARY_INFORMATION_TABLE,
};
use std::{borrow::Cow, collections::BTreeSet};
use uuid::Uuid;

const PID_CODEPAGE: i64 = 1;
const PID_TEMPLATE: i64 = 7;
const PID_LASTAUTHOR: i64 = 8;
const PID_REVNUMBER: i64 = 9;
const PID_PAGECOUNT: i64 = 14;
const PID_CHARCOUNT: i64 = 16;

/// Suppresses add-existing-row, delete-missing-row, add-existing-table,
/// delete-missing-table and update-missing-row errors.
const TRANSFORM_ERROR_FLAGS: i64 = 0x1F;

fn lookup(data: &WindowsInstallerData, table: &str, key: &str, column: &str) -> Option<String> {
    let table = data.table(table)?;
    table
        .rows
        .iter()
        .find(|row| row.text(0).as_deref() == Some(key))
        .and_then(|row| table.value(row, column))
        .map(|value| value.as_text().into_owned())
}

fn summary_value(data: &WindowsInstallerData, property: i64) -> Option<String> {
    lookup(data, SUMMARY_INFORMATION_TABLE, &property.to_string(), "Value")
}

/// GUID of `component` in `instance`, derived from its package GUID.
pub fn instance_component_guid(guid: &str, instance: &str) -> Option<String> {
    let namespace = Uuid::parse_str(guid.trim_start_matches('{').trim_end_matches('}')).ok()?;
    let uuid = Uuid::new_v5(&namespace, instance.as_bytes());
    Some(format!("{{{}}}", uuid.hyphenated().to_string().to_ascii_uppercase()))
}

fn add_row(table: &mut Table, values: Vec<Option<Value>>) {
    let row = table.create_row(None);
    for (index, value) in values.into_iter().enumerate() {
        row.set(index, value);
    }
}

/// Attaches one transform per `InstanceTransforms` symbol to `data`.
pub fn create_instance_transforms(
    section: &Section,
    data: &mut WindowsInstallerData,
    table_definitions: &TableDefinitions,
) {
    let instances: Vec<_> = section.symbols_of(&SymbolKind::InstanceTransforms).collect();
    if instances.is_empty() {
        return;
    }
    let (Some(properties), Some(components), Some(summary)) = (
        table_definitions.get("Property"),
        table_definitions.get("Component"),
        table_definitions.get(SUMMARY_INFORMATION_TABLE),
    ) else {
        return;
    };

    let instance_components: BTreeSet<String> = section
        .symbols_of(&SymbolKind::InstanceComponent)
        .filter_map(|c| c.text("Component_").map(Cow::into_owned))
        .collect();
    let product_code = lookup(data, "Property", "ProductCode", "Value").unwrap_or_default();
    let product_version = lookup(data, "Property", "ProductVersion", "Value").unwrap_or_default();
    let upgrade_code = lookup(data, "Property", "UpgradeCode", "Value");

    let mut storages = Vec::new();
    for instance in instances {
        let instance_id = instance.id().to_string();
        let mut transform = WindowsInstallerData::new(OutputType::Transform, data.codepage);

        let new_product_code = match instance.text("ProductCode").as_deref() {
            Some("*") | None => {
                format!("{{{}}}", Uuid::new_v4().hyphenated().to_string().to_ascii_uppercase())
            }
            Some(code) => code.to_string(),
        };
        let new_upgrade_code = instance
            .text("UpgradeCode")
            .map(Cow::into_owned)
            .or_else(|| upgrade_code.clone());

        let property_table = transform.ensure_table(properties);
        if let Some(property) = instance.text("PropertyId") {
            add_row(
                property_table,
                vec![Some(Value::from(property.as_ref())), Some(Value::from(instance_id.as_str()))],
            );
        }
        add_row(
            property_table,
            vec![Some(Value::from("ProductCode")), Some(Value::from(new_product_code.as_str()))],
        );
        if let Some(name) = instance.text("ProductName") {
            add_row(
                property_table,
                vec![Some(Value::from("ProductName")), Some(Value::from(name.as_ref()))],
            );
        }
        if let Some(code) = instance.text("UpgradeCode") {
            add_row(
                property_table,
                vec![Some(Value::from("UpgradeCode")), Some(Value::from(code.as_ref()))],
            );
        }

        if let Some(package_components) = data.table("Component") {
            let guid_column = package_components.column_index("ComponentId");
            let rows: Vec<Row> = package_components
                .rows
                .iter()
                .filter(|row| {
                    row.text(0)
                        .is_some_and(|component| instance_components.contains(&component))
                })
                .filter_map(|row| {
                    let index = guid_column?;
                    let guid = instance_component_guid(&row.text(index)?, &instance_id)?;
                    let mut row = row.clone();
                    row.set(index, Some(Value::from(guid)));
                    Some(row)
                })
                .collect();
            if !rows.is_empty() {
                transform.ensure_table(components).rows.extend(rows);
            }
        }

        let template = summary_value(data, PID_TEMPLATE);
        let mut summary_rows = vec![
            (PID_TEMPLATE, template.clone()),
            (PID_LASTAUTHOR, template),
            (
                PID_REVNUMBER,
                Some(format!(
                    "{product_code}{product_version};{new_product_code}{product_version};{}",
                    new_upgrade_code.unwrap_or_default()
                )),
            ),
            (PID_PAGECOUNT, summary_value(data, PID_PAGECOUNT)),
            (PID_CHARCOUNT, Some(TRANSFORM_ERROR_FLAGS.to_string())),
        ];
        if let Some(codepage) = summary_value(data, PID_CODEPAGE) {
            summary_rows.insert(0, (PID_CODEPAGE, Some(codepage)));
        }
        let summary_table = transform.ensure_table(summary);
        for (property, value) in summary_rows {
            if let Some(value) = value {
                add_row(
                    summary_table,
                    vec![Some(Value::Int(property)), Some(Value::Str(value))],
                );
            }
        }

        log::debug!("Created instance transform {instance_id}");
        storages.push(SubStorage {
            name: instance_id,
            data: transform,
        });
    }

    data.sub_storages.extend(storages);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::data::{SectionType, Symbol, definitions::standard_table_definitions};

    fn definitions() -> TableDefinitions {
        let mut definitions = TableDefinitions::new();
        for definition in standard_table_definitions() {
            definitions.add(definition);
        }
        definitions
    }

    fn package_data(definitions: &TableDefinitions) -> WindowsInstallerData {
        let mut data = WindowsInstallerData::new(OutputType::Package, 1252);
        let property = data.ensure_table(definitions.get("Property").expect("property"));
        for (name, value) in [
            ("ProductCode", "{6E0F8A1C-3B2D-4C5E-9F70-1A2B3C4D5E6F}"),
            ("ProductVersion", "1.2.3"),
            ("UpgradeCode", "{11111111-2222-3333-4444-555555555555}"),
        ] {
            add_row(property, vec![Some(Value::from(name)), Some(Value::from(value))]);
        }
        let component = data.ensure_table(definitions.get("Component").expect("component"));
        for (name, guid) in [
            ("Shared", "{0A1B2C3D-4E5F-4A6B-8C7D-9E0F1A2B3C4D}"),
            ("PerInstance", "{1B2C3D4E-5F60-4B7C-8D9E-0F1A2B3C4D5E}"),
        ] {
            add_row(
                component,
                vec![
                    Some(Value::from(name)),
                    Some(Value::from(guid)),
                    Some(Value::from("INSTALLFOLDER")),
                    Some(Value::Int(0)),
                    None,
                    None,
                ],
            );
        }
        let summary = data.ensure_table(definitions.get(SUMMARY_INFORMATION_TABLE).expect("summary"));
        add_row(summary, vec![Some(Value::Int(PID_TEMPLATE)), Some(Value::from("x64;1033"))]);
        data
    }

    fn texts(table: &Table, column: &str) -> Vec<Option<String>> {
        table
            .rows
            .iter()
            .map(|row| table.value(row, column).map(|v| v.as_text().into_owned()))
            .collect()
    }

    #[test]
    fn instances_get_their_own_transform() {
        let definitions = definitions();
        let mut data = package_data(&definitions);
        let mut section = Section::new(SectionType::Package);
        section.add(
            Symbol::new(SymbolKind::InstanceTransforms, "Second")
                .with("PropertyId", "INSTANCEID")
                .with("ProductCode", "{22222222-3333-4444-5555-666666666666}")
                .with("ProductName", "Sample (second)"),
        );
        section.add(Symbol::anonymous(SymbolKind::InstanceComponent).with("Component_", "PerInstance"));

        create_instance_transforms(&section, &mut data, &definitions);

        assert_eq!(data.sub_storages.len(), 1);
        let storage = &data.sub_storages[0];
        assert_eq!(storage.name, "Second");
        assert_eq!(storage.data.output_type, OutputType::Transform);

        let property = storage.data.table("Property").expect("property");
        assert_eq!(
            texts(property, "Value"),
            vec![
                Some("Second".to_string()),
                Some("{22222222-3333-4444-5555-666666666666}".to_string()),
                Some("Sample (second)".to_string()),
            ]
        );

        let component = storage.data.table("Component").expect("component");
        assert_eq!(texts(component, "Component"), vec![Some("PerInstance".to_string())]);
        let guid = instance_component_guid("{1B2C3D4E-5F60-4B7C-8D9E-0F1A2B3C4D5E}", "Second");
        assert_eq!(texts(component, "ComponentId"), vec![guid]);

        let summary = storage.data.table(SUMMARY_INFORMATION_TABLE).expect("summary");
        assert!(texts(summary, "Value").contains(&Some(
            "{6E0F8A1C-3B2D-4C5E-9F70-1A2B3C4D5E6F}1.2.3;{22222222-3333-4444-5555-666666666666}1.2.3;{11111111-2222-3333-4444-555555555555}".to_string()
        )));
    }

    #[test]
    fn instance_guids_differ_per_instance() {
        let guid = "{1B2C3D4E-5F60-4B7C-8D9E-0F1A2B3C4D5E}";
        let first = instance_component_guid(guid, "First").expect("guid");
        assert_eq!(Some(first.clone()), instance_component_guid(guid, "First"));
        assert_ne!(Some(first), instance_component_guid(guid, "Second"));
        assert_eq!(instance_component_guid("not a guid", "First"), None);
    }

    #[test]
    fn packages_without_instances_are_untouched() {
        let definitions = definitions();
        let mut data = package_data(&definitions);
        create_instance_transforms(&Section::new(SectionType::Package), &mut data, &definitions);
        assert!(data.sub_storages.is_empty());
    }
}
