//! Patch transform handling.
//!
//! A patch carries its transforms as named sub-storages. Only transforms
//! whose name starts with `#` carry files.

use crate::binder::data::{
    FacadeOrigin, FileFacade, FileHash, Row, SubStorage, Table, TableDefinitions, Value,
    WindowsInstallerData, definitions::WIX_FILE_TABLE, split_file_name,
};
use std::{collections::HashMap, path::PathBuf};

fn carries_files(storage: &SubStorage) -> bool {
    storage.name.starts_with('#')
}

fn text(table: &Table, row: &Row, column: &str) -> Option<String> {
    table.value(row, column).map(|v| v.as_text().into_owned())
}

/// One facade per `File` row of every file-carrying transform.
pub fn facades_from_transforms(sub_storages: &[SubStorage]) -> Vec<FileFacade> {
    let mut facades = Vec::new();

    for storage in sub_storages.iter().filter(|s| carries_files(s)) {
        let data = &storage.data;
        let Some(files) = data.table("File") else {
            continue;
        };

        let wix_files: HashMap<String, (Option<String>, Option<i64>, Option<i64>)> = data
            .table(WIX_FILE_TABLE)
            .map(|table| {
                table
                    .rows
                    .iter()
                    .filter_map(|row| {
                        Some((
                            text(table, row, "File_")?,
                            (
                                text(table, row, "Source"),
                                table.value(row, "DiskId").and_then(Value::as_int),
                                table.value(row, "PatchGroup").and_then(Value::as_int),
                            ),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let directories: HashMap<String, String> = data
            .table("Component")
            .map(|table| {
                table
                    .rows
                    .iter()
                    .filter_map(|row| {
                        Some((text(table, row, "Component")?, text(table, row, "Directory_")?))
                    })
                    .collect()
            })
            .unwrap_or_default();

        for (index, row) in files.rows.iter().enumerate() {
            let Some(id) = text(files, row, "File") else {
                continue;
            };
            let (source, disk_id, patch_group) = wix_files.get(&id).cloned().unwrap_or_default();
            let component = text(files, row, "Component_").unwrap_or_default();
            let file_name = text(files, row, "FileName").unwrap_or_else(|| id.clone());
            let (name, short_name) = split_file_name(&file_name);
            let disk_id = disk_id.and_then(|d| u32::try_from(d).ok());

            facades.push(FileFacade {
                directory: directories.get(&component).cloned().unwrap_or_default(),
                component,
                name: name.to_string(),
                short_name: short_name.map(str::to_string),
                source_path: PathBuf::from(source.unwrap_or_else(|| id.clone())),
                disk_id,
                assigned_disk_id: disk_id.unwrap_or(1),
                sequence: files
                    .value(row, "Sequence")
                    .and_then(Value::as_int)
                    .and_then(|s| u32::try_from(s).ok())
                    .unwrap_or(0),
                file_size: 0,
                version: text(files, row, "Version"),
                language: text(files, row, "Language"),
                hash: None,
                compressed: None,
                patch_group,
                origin: FacadeOrigin::Transform {
                    storage: storage.name.clone(),
                    row: index,
                },
                source: row.source.clone(),
                id,
            });
        }
    }

    facades
}

/// Copies bound file information back into the transforms' `File` and
/// `MsiFileHash` rows.
pub fn update_transforms_with_facades(
    sub_storages: &mut [SubStorage],
    facades: &[FileFacade],
    table_definitions: &TableDefinitions,
) {
    for facade in facades {
        let FacadeOrigin::Transform { storage, row } = &facade.origin else {
            continue;
        };
        let Some(sub_storage) = sub_storages.iter_mut().find(|s| &s.name == storage) else {
            continue;
        };
        update_file_row(&mut sub_storage.data, *row, facade);
        if let Some(hash) = facade.hash {
            update_hash_row(&mut sub_storage.data, &facade.id, hash, table_definitions);
        }
    }
}

fn update_file_row(data: &mut WindowsInstallerData, index: usize, facade: &FileFacade) {
    let Some(files) = data.table_mut("File") else {
        return;
    };
    let columns = [
        (files.column_index("FileSize"), i64::try_from(facade.file_size).ok().map(Value::Int)),
        (files.column_index("Version"), facade.version.clone().map(Value::Str)),
        (files.column_index("Language"), facade.language.clone().map(Value::Str)),
        (files.column_index("Sequence"), Some(Value::from(facade.sequence))),
    ];
    let Some(row) = files.rows.get_mut(index) else {
        return;
    };
    for (column, value) in columns {
        if let Some(column) = column {
            row.set(column, value);
        }
    }
}

fn update_hash_row(
    data: &mut WindowsInstallerData,
    file: &str,
    hash: FileHash,
    table_definitions: &TableDefinitions,
) {
    let Some(definition) = table_definitions.get("MsiFileHash") else {
        return;
    };
    let table = data.ensure_table(definition);
    let index = table
        .rows
        .iter()
        .position(|r| r.text(0).as_deref() == Some(file));
    let row = match index {
        Some(index) => &mut table.rows[index],
        None => table.create_row(None),
    };
    row.set(0, Some(Value::from(file)));
    row.set(1, Some(Value::Int(0)));
    for (offset, part) in hash.0.into_iter().enumerate() {
        row.set(2 + offset, Some(Value::from(part)));
    }
}

/// Attaches each transform to a patch database as a sub-storage.
pub fn attach_sub_storages(data: &mut WindowsInstallerData, sub_storages: Vec<SubStorage>) {
    data.sub_storages.extend(sub_storages);
}
