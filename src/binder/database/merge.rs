//! Merge module integration.
//!
//! Merge modules are read in two steps. While facades are collected, every
//! `Merge` symbol's module database is opened, its cabinet extracted and its
//! files turned into facades. Once the package's own tables exist, the
//! module tables are folded into them.

use super::generate::load_database;
use crate::binder::{
    cabinet::CabinetCodec,
    data::{
        ColumnModularizeType, ColumnType, FacadeOrigin, FileFacade, FileHash, Row, Section,
        SourceLineNumber, SymbolKind, Table, TableDefinitions, TrackedFileType, TrackedFiles,
        Value, WindowsInstallerData,
        definitions::{
            MERGE_MODULE_CABINET, MODULE_IGNORE_TABLE, SEQUENCE_TABLES, STREAMS_TABLE,
            SUMMARY_INFORMATION_TABLE, VALIDATION_TABLE, is_standard_directory,
            module_sequence_table,
        },
        split_file_name,
    },
    messaging::{Message, Messaging},
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::{Path, PathBuf},
};

/// Module tables that are consumed by the merge rather than copied.
const MODULE_ONLY_TABLES: &[&str] = &[
    "ModuleSignature",
    "ModuleComponents",
    MODULE_IGNORE_TABLE,
    STREAMS_TABLE,
    SUMMARY_INFORMATION_TABLE,
    VALIDATION_TABLE,
];

const TARGETDIR: &str = "TARGETDIR";

/// A merge module opened for integration.
#[derive(Clone, Debug)]
pub struct MergeModule {
    /// Identifier of the `Merge` symbol.
    pub id: String,
    pub source_file: PathBuf,
    /// Package directory the module's `TARGETDIR` is re-rooted to.
    pub directory: String,
    pub feature: Option<String>,
    pub data: WindowsInstallerData,
    pub source: Option<SourceLineNumber>,
}

/// Opens every merge module of `section` and adds a facade for each of its
/// files to `facades`.
pub fn extract_merge_modules(
    section: &Section,
    facades: &mut Vec<FileFacade>,
    intermediate_folder: &Path,
    codec: &dyn CabinetCodec,
    tracked: &mut TrackedFiles,
    messaging: &Messaging,
) -> Vec<MergeModule> {
    let mut claimed: HashSet<String> = facades.iter().map(|f| f.id.clone()).collect();
    let mut modules = Vec::new();

    for merge in section.symbols_of(&SymbolKind::Merge) {
        let Some(source_file) = merge.text("SourceFile") else {
            continue;
        };
        let source_file = tracked.track(Path::new(source_file.as_ref()), TrackedFileType::Input);
        let merge_folder = intermediate_folder.join(merge.id());

        let unreadable = |reason: String| Message::MergeModuleUnreadable {
            path: source_file.clone(),
            reason,
        };

        let data = match load_database(&source_file, &merge_folder.join("streams")) {
            Ok(data) => data,
            Err(e) => {
                messaging.error(merge.source.as_ref(), unreadable(e.to_string()));
                continue;
            }
        };

        let extracted = match module_cabinet(&data) {
            Some(cabinet) => {
                tracked.track(&cabinet, TrackedFileType::Intermediate);
                match codec.extract(&cabinet, &merge_folder.join("files")) {
                    Ok(paths) => paths,
                    Err(e) => {
                        messaging.error(merge.source.as_ref(), unreadable(e.to_string()));
                        continue;
                    }
                }
            }
            None => Vec::new(),
        };
        let extracted: HashMap<String, PathBuf> = extracted
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_string_lossy().into_owned();
                Some((name, path))
            })
            .collect();
        for path in extracted.values() {
            tracked.track(path, TrackedFileType::Intermediate);
        }

        let disk_id = merge.int("DiskId").and_then(|d| u32::try_from(d).ok());
        let directory = merge
            .text("Directory_")
            .map(|d| d.into_owned())
            .unwrap_or_else(|| TARGETDIR.to_string());

        let files = module_facades(
            merge.id(),
            &data,
            &directory,
            disk_id,
            &extracted,
            merge.source.as_ref(),
        );
        for facade in files {
            if !claimed.insert(facade.id.clone()) {
                messaging.error(
                    merge.source.as_ref(),
                    Message::DuplicateFileId {
                        id: facade.id,
                        merge: merge.id().to_string(),
                    },
                );
                continue;
            }
            if !facade.source_path.is_file() {
                messaging.error(
                    merge.source.as_ref(),
                    Message::FileNotFound {
                        file: facade.id.clone(),
                        path: facade.source_path.clone(),
                        reason: "not present in the module cabinet".to_string(),
                    },
                );
            }
            facades.push(facade);
        }

        modules.push(MergeModule {
            id: merge.id().to_string(),
            source_file,
            directory,
            feature: merge.text("Feature").map(|f| f.into_owned()),
            data,
            source: merge.source.clone(),
        });
    }

    modules
}

fn module_cabinet(data: &WindowsInstallerData) -> Option<PathBuf> {
    let streams = data.table(STREAMS_TABLE)?;
    streams
        .rows
        .iter()
        .find(|row| row.text(0).as_deref() == Some(MERGE_MODULE_CABINET))
        .and_then(|row| row.text(1))
        .map(PathBuf::from)
}

fn column_text(table: &Table, row: &Row, column: &str) -> Option<String> {
    table.value(row, column).map(|v| v.as_text().into_owned())
}

fn module_facades(
    merge: &str,
    data: &WindowsInstallerData,
    directory: &str,
    disk_id: Option<u32>,
    extracted: &HashMap<String, PathBuf>,
    source: Option<&SourceLineNumber>,
) -> Vec<FileFacade> {
    let Some(files) = data.table("File") else {
        return Vec::new();
    };

    let component_directories: HashMap<String, String> = data
        .table("Component")
        .map(|components| {
            components
                .rows
                .iter()
                .filter_map(|row| {
                    Some((
                        column_text(components, row, "Component")?,
                        column_text(components, row, "Directory_")?,
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    let hashes: HashMap<String, FileHash> = data
        .table("MsiFileHash")
        .map(|hashes| {
            hashes
                .rows
                .iter()
                .filter_map(|row| {
                    let part = |name: &str| {
                        hashes
                            .value(row, name)
                            .and_then(Value::as_int)
                            .and_then(|v| i32::try_from(v).ok())
                    };
                    Some((
                        column_text(hashes, row, "File_")?,
                        FileHash([
                            part("HashPart1")?,
                            part("HashPart2")?,
                            part("HashPart3")?,
                            part("HashPart4")?,
                        ]),
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    files
        .rows
        .iter()
        .filter_map(|row| {
            let id = column_text(files, row, "File")?;
            let component = column_text(files, row, "Component_").unwrap_or_default();
            let file_name = column_text(files, row, "FileName").unwrap_or_else(|| id.clone());
            let (name, short_name) = split_file_name(&file_name);
            let file_directory = component_directories
                .get(&component)
                .filter(|d| d.as_str() != TARGETDIR)
                .cloned()
                .unwrap_or_else(|| directory.to_string());

            Some(FileFacade {
                source_path: extracted
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| PathBuf::from(&id)),
                component,
                directory: file_directory,
                name: name.to_string(),
                short_name: short_name.map(str::to_string),
                disk_id,
                assigned_disk_id: disk_id.unwrap_or(1),
                sequence: 0,
                file_size: files
                    .value(row, "FileSize")
                    .and_then(Value::as_int)
                    .and_then(|s| u64::try_from(s).ok())
                    .unwrap_or(0),
                version: column_text(files, row, "Version"),
                language: column_text(files, row, "Language"),
                hash: hashes.get(&id).copied(),
                compressed: None,
                patch_group: None,
                origin: FacadeOrigin::MergeModule {
                    merge: merge.to_string(),
                },
                source: source.cloned(),
                id,
            })
        })
        .collect()
}

/// Folds the tables of every module into `data`.
pub fn merge_modules_into(
    data: &mut WindowsInstallerData,
    modules: &[MergeModule],
    facades: &[FileFacade],
    table_definitions: &TableDefinitions,
    messaging: &Messaging,
) {
    let sequences: HashMap<&str, (u32, u64)> = facades
        .iter()
        .filter(|f| f.from_module())
        .map(|f| (f.id.as_str(), (f.sequence, f.file_size)))
        .collect();

    for module in modules {
        log::debug!("Merging module {}", module.id);

        let mut prepared = Vec::new();
        for table in module.data.tables.values() {
            if MODULE_ONLY_TABLES.contains(&table.name.as_str()) {
                continue;
            }
            if let Some(standard) = SEQUENCE_TABLES
                .iter()
                .find(|s| module_sequence_table(s) == table.name)
            {
                merge_sequence_table(data, module, table, standard, table_definitions, messaging);
                continue;
            }
            prepared.push((table, prepare_rows(table, module, &sequences)));
        }

        let renames = plan_renames(data, module, &prepared);
        for (table, mut rows) in prepared {
            apply_renames(table, &mut rows, &renames);
            merge_table(data, module, table, rows, messaging);
        }

        if let Some(feature) = &module.feature {
            add_feature_components(data, module, feature, &renames, table_definitions);
        }
    }
}

/// Module rows as they would land in the package: re-rooted, with file
/// sequences and sizes from the facades.
fn prepare_rows(
    table: &Table,
    module: &MergeModule,
    sequences: &HashMap<&str, (u32, u64)>,
) -> Vec<Row> {
    let mut rows = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let mut row = row.clone();
        if row.source.is_none() {
            row.source = module.source.clone();
        }
        if !rehome(table, &mut row, module) {
            continue;
        }

        if table.name == "File" {
            let id = column_text(table, &row, "File").unwrap_or_default();
            if let Some((sequence, size)) = sequences.get(id.as_str()) {
                if let Some(index) = table.column_index("Sequence") {
                    row.set(index, Some(Value::from(*sequence)));
                }
                if let Some(index) = table.column_index("FileSize") {
                    row.set(index, i64::try_from(*size).ok().map(Value::Int));
                }
            }
        }
        rows.push(row);
    }
    rows
}

/// Renamed row keys per table.
type Renames = HashMap<String, HashMap<String, String>>;

/// Column holding the identifier a row defines, when the table is keyed by
/// a single identifier of its own. Files keep their ids; a colliding file id
/// was already reported while collecting facades.
fn renamable_key(table: &Table) -> Option<usize> {
    if table.name == "File" {
        return None;
    }
    let mut keys = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.primary_key);
    let (index, column) = keys.next()?;
    let defining = column.column_type == ColumnType::String
        && column.modularize == ColumnModularizeType::Column
        && !column.name.ends_with('_');
    (keys.next().is_none() && defining).then_some(index)
}

/// Table a column refers to: its own key, `Directory_Parent`, or a
/// `Table_` foreign key.
fn referenced_table(table: &Table, index: usize) -> Option<String> {
    let column = table.columns.get(index)?;
    if renamable_key(table) == Some(index) {
        return Some(table.name.clone());
    }
    if column.name == "Directory_Parent" {
        return Some("Directory".to_string());
    }
    column.name.strip_suffix('_').map(str::to_string)
}

/// Picks a new key for every module row that collides with a different
/// package row. The new key is the old one suffixed with the merge id; a
/// collision that cannot be renamed that way is left for [`merge_table`] to
/// report.
fn plan_renames(
    data: &WindowsInstallerData,
    module: &MergeModule,
    prepared: &[(&Table, Vec<Row>)],
) -> Renames {
    let mut renames = Renames::new();
    for (table, rows) in prepared {
        let Some(target) = data.table(&table.name) else {
            continue;
        };
        if !target.same_shape(table) || renamable_key(table).is_none() {
            continue;
        }

        let existing: HashMap<String, &Row> = target
            .rows
            .iter()
            .map(|row| (target.primary_key(row), row))
            .collect();
        let module_keys: HashSet<String> = rows.iter().map(|row| table.primary_key(row)).collect();

        for row in rows {
            let key = table.primary_key(row);
            match existing.get(&key) {
                Some(current) if current.fields != row.fields => {}
                _ => continue,
            }
            let renamed = format!("{key}.{}", module.id);
            if existing.contains_key(&renamed) || module_keys.contains(&renamed) {
                continue;
            }
            log::info!(
                "Renaming {} row '{key}' of merge module {} to '{renamed}'",
                table.name,
                module.id
            );
            renames
                .entry(table.name.clone())
                .or_default()
                .insert(key, renamed);
        }
    }
    renames
}

/// Rewrites keys and references of `rows` according to `renames`.
fn apply_renames(table: &Table, rows: &mut [Row], renames: &Renames) {
    let columns: Vec<(usize, &HashMap<String, String>)> = (0..table.columns.len())
        .filter_map(|index| {
            let referenced = referenced_table(table, index)?;
            Some((index, renames.get(&referenced)?))
        })
        .collect();
    if columns.is_empty() {
        return;
    }

    for row in rows {
        for (index, renamed) in &columns {
            if let Some(new) = row.text(*index).and_then(|old| renamed.get(&old)) {
                row.set(*index, Some(Value::from(new.as_str())));
            }
        }
    }
}

fn merge_table(
    data: &mut WindowsInstallerData,
    module: &MergeModule,
    table: &Table,
    rows: Vec<Row>,
    messaging: &Messaging,
) {
    let target = data
        .tables
        .entry(table.name.clone())
        .or_insert_with(|| Table {
            name: table.name.clone(),
            columns: table.columns.clone(),
            rows: Vec::new(),
        });
    if !target.same_shape(table) {
        messaging.error(
            module.source.as_ref(),
            Message::ModuleTableSchemaMismatch {
                table: table.name.clone(),
                merge: module.id.clone(),
            },
        );
        return;
    }

    let existing: BTreeMap<String, usize> = target
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| (target.primary_key(row), i))
        .collect();

    for row in rows {
        let key = target.primary_key(&row);
        match existing.get(&key) {
            Some(&index) if target.rows[index].fields == row.fields => {}
            Some(_) => messaging.error(
                module.source.as_ref(),
                Message::MergeConflict {
                    merge: module.id.clone(),
                    table: table.name.clone(),
                    key,
                },
            ),
            None => target.rows.push(row),
        }
    }
}

/// Re-roots the module's `TARGETDIR` at the merge directory. Returns false
/// for the module's own root row, which the merge directory replaces.
/// Standard directories stay below `TARGETDIR`.
fn rehome(table: &Table, row: &mut Row, module: &MergeModule) -> bool {
    let column = match table.name.as_str() {
        "Directory" if row.text(0).as_deref() == Some(TARGETDIR) => return false,
        "Directory" if row.text(0).is_some_and(|d| is_standard_directory(&d)) => return true,
        "Directory" => "Directory_Parent",
        "Component" => "Directory_",
        _ => return true,
    };
    if let Some(index) = table.column_index(column) {
        if row.text(index).as_deref() == Some(TARGETDIR) {
            row.set(index, Some(Value::from(module.directory.as_str())));
        }
    }
    true
}

fn merge_sequence_table(
    data: &mut WindowsInstallerData,
    module: &MergeModule,
    table: &Table,
    standard: &str,
    table_definitions: &TableDefinitions,
    messaging: &Messaging,
) {
    let Some(definition) = table_definitions.get(standard) else {
        return;
    };
    let target = data.ensure_table(definition);
    let sequence_of = |rows: &[Row], action: &str| {
        rows.iter()
            .find(|r| r.text(0).as_deref() == Some(action))
            .and_then(|r| r.get(2))
            .and_then(Value::as_int)
    };

    for row in &table.rows {
        let Some(action) = column_text(table, row, "Action") else {
            continue;
        };
        if sequence_of(&target.rows, &action).is_some() {
            continue;
        }

        let sequence = match table.value(row, "Sequence").and_then(Value::as_int) {
            Some(sequence) => Some(sequence),
            None => {
                let base = column_text(table, row, "BaseAction").unwrap_or_default();
                let after = table.value(row, "After").and_then(Value::as_int) == Some(1);
                match sequence_of(&target.rows, &base) {
                    Some(anchor) if after => Some(anchor + 1),
                    Some(anchor) => Some(anchor - 1),
                    None => {
                        messaging.error(
                            row.source.as_ref().or(module.source.as_ref()),
                            Message::ActionParentMissing {
                                table: standard.to_string(),
                                action: action.clone(),
                                parent: base,
                            },
                        );
                        None
                    }
                }
            }
        };

        let Some(sequence) = sequence else {
            continue;
        };
        let merged = target.create_row(row.source.clone().or_else(|| module.source.clone()));
        merged.set(0, Some(Value::Str(action)));
        merged.set(1, table.value(row, "Condition").cloned());
        merged.set(2, Some(Value::Int(sequence)));
    }
}

fn add_feature_components(
    data: &mut WindowsInstallerData,
    module: &MergeModule,
    feature: &str,
    renames: &Renames,
    table_definitions: &TableDefinitions,
) {
    let Some(definition) = table_definitions.get("FeatureComponents") else {
        return;
    };
    let renamed = renames.get("Component");
    let components: Vec<String> = module
        .data
        .table("ModuleComponents")
        .or_else(|| module.data.table("Component"))
        .map(|table| table.rows.iter().filter_map(|r| r.text(0)).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
        .map(|component| {
            renamed
                .and_then(|r| r.get(&component).cloned())
                .unwrap_or(component)
        })
        .collect();

    let target = data.ensure_table(definition);
    for component in components {
        let exists = target.rows.iter().any(|r| {
            r.text(0).as_deref() == Some(feature) && r.text(1).as_deref() == Some(component.as_str())
        });
        if !exists {
            let row = target.create_row(module.source.clone());
            row.set(0, Some(Value::from(feature)));
            row.set(1, Some(Value::Str(component)));
        }
    }
}
