//! Database container output.
//!
//! A database is a zip container holding `database.json` (the table model
//! with object columns replaced by stream names) and one `streams/<name>`
//! entry per object value. The debug database holds `intermediate.json` and
//! `data.json`.

use crate::binder::{
    Error, Result,
    data::{
        ColumnType, Intermediate, Row, Table, TableDefinitions, Value, WindowsInstallerData,
        definitions::{STREAMS_TABLE, VALIDATION_TABLE},
    },
    error::{Context, ErrorExt},
    messaging::{Message, Messaging},
};
use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};
use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

const DATABASE_ENTRY: &str = "database.json";
const STREAMS_PREFIX: &str = "streams/";

/// An object value to copy into the container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseStream {
    pub name: String,
    pub path: PathBuf,
}

/// Name of the stream backing an object column of `row`.
pub fn stream_name(table: &Table, row: &Row) -> String {
    let key = table.primary_key(row).replace('/', ".");
    if table.name == STREAMS_TABLE {
        key
    } else {
        format!("{}.{key}", table.name)
    }
}

fn object_columns(table: &Table) -> Vec<usize> {
    table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.column_type == ColumnType::Object)
        .map(|(i, _)| i)
        .collect()
}

/// Every object-column path in `data`.
pub fn object_paths(data: &WindowsInstallerData) -> Vec<(String, PathBuf)> {
    let mut paths = Vec::new();
    for table in data.tables.values() {
        for column in object_columns(table) {
            for row in &table.rows {
                if let Some(value) = row.get(column) {
                    paths.push((table.name.clone(), PathBuf::from(value.as_text().as_ref())));
                }
            }
        }
    }
    paths
}

/// Adds one `_Validation` row per column of every emitted table.
pub fn add_validation_rows(data: &mut WindowsInstallerData, table_definitions: &TableDefinitions) {
    let Some(definition) = table_definitions.get(VALIDATION_TABLE) else {
        return;
    };

    let rows: Vec<[Option<Value>; 5]> = data
        .tables
        .values()
        .filter(|t| t.name != VALIDATION_TABLE)
        .flat_map(|table| {
            table.columns.iter().map(move |column| {
                [
                    Some(Value::from(table.name.as_str())),
                    Some(Value::from(column.name.as_str())),
                    Some(Value::from(if column.nullable { "Y" } else { "N" })),
                    column.primary_key.then(|| Value::from("Y")),
                    column.category.as_deref().map(Value::from),
                ]
            })
        })
        .collect();

    let validation = data.ensure_table(definition);
    for fields in rows {
        let exists = validation.rows.iter().any(|r| {
            r.get(0) == fields[0].as_ref() && r.get(1) == fields[1].as_ref()
        });
        if !exists {
            validation.create_row(None).fields = fields.into();
        }
    }
}

/// Lists the streams of `data`, reporting object values that cannot be read.
pub fn prepare_streams(data: &WindowsInstallerData, messaging: &Messaging) -> Vec<DatabaseStream> {
    let mut streams = Vec::new();
    for table in data.tables.values() {
        let columns = object_columns(table);
        for row in &table.rows {
            for &column in &columns {
                let Some(value) = row.get(column) else {
                    continue;
                };
                let path = PathBuf::from(value.as_text().as_ref());
                match std::fs::metadata(&path) {
                    Ok(metadata) if metadata.is_file() => streams.push(DatabaseStream {
                        name: stream_name(table, row),
                        path,
                    }),
                    Ok(_) => messaging.error(
                        row.source.as_ref(),
                        Message::StreamDataUnreadable {
                            table: table.name.clone(),
                            path,
                            reason: "not a file".to_string(),
                        },
                    ),
                    Err(e) => messaging.error(
                        row.source.as_ref(),
                        Message::StreamDataUnreadable {
                            table: table.name.clone(),
                            path,
                            reason: e.to_string(),
                        },
                    ),
                }
            }
        }
    }
    streams
}

/// Copy of `data` with object values replaced by their stream names.
fn document(data: &WindowsInstallerData) -> WindowsInstallerData {
    let mut document = data.clone();
    for table in document.tables.values_mut() {
        let columns = object_columns(table);
        let names: Vec<String> = table.rows.iter().map(|row| stream_name(table, row)).collect();
        for (row, name) in table.rows.iter_mut().zip(names) {
            for &column in &columns {
                if row.get(column).is_some() {
                    row.set(column, Some(Value::Str(name.clone())));
                }
            }
        }
    }
    document
}

fn file_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
}

/// Writes the database container for `data` to `path`.
pub async fn write_database(
    data: &WindowsInstallerData,
    streams: Vec<DatabaseStream>,
    path: &Path,
) -> Result<()> {
    let json = serde_json::to_vec_pretty(&document(data))?;
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).fs_context("creating database directory", parent)?;
        }
        let file = File::create(&path).fs_context("creating database", &path)?;
        let mut zip = ZipWriter::new(file);

        zip.start_file(DATABASE_ENTRY, file_options())?;
        zip.write_all(&json).fs_context("writing database", &path)?;

        for stream in streams {
            let bytes = std::fs::read(&stream.path).fs_context("reading stream", &stream.path)?;
            zip.start_file(format!("{STREAMS_PREFIX}{}", stream.name), file_options())?;
            zip.write_all(&bytes).fs_context("writing stream", &path)?;
        }

        zip.finish()?;
        Ok(())
    })
    .await?
}

/// Opens a database container, extracting its streams below `streams_dir`.
///
/// Object values of the returned data point at the extracted files.
pub fn load_database(path: &Path, streams_dir: &Path) -> Result<WindowsInstallerData> {
    let file = File::open(path).fs_context("opening database", path)?;
    let mut zip = ZipArchive::new(file)?;

    let mut json = String::new();
    zip.by_name(DATABASE_ENTRY)?
        .read_to_string(&mut json)
        .fs_context("reading database", path)?;
    let mut data: WindowsInstallerData = serde_json::from_str(&json)?;

    std::fs::create_dir_all(streams_dir).fs_context("creating stream directory", streams_dir)?;
    for table in data.tables.values_mut() {
        let columns = object_columns(table);
        for row in &mut table.rows {
            for &column in &columns {
                let Some(name) = row.text(column) else {
                    continue;
                };
                let mut entry = zip
                    .by_name(&format!("{STREAMS_PREFIX}{name}"))
                    .map_err(Error::from)
                    .with_context(|| format!("stream {name} is missing from {}", path.display()))?;
                let target = streams_dir.join(&name);
                let mut out = File::create(&target).fs_context("creating stream file", &target)?;
                std::io::copy(&mut entry, &mut out).fs_context("extracting stream", &target)?;
                row.set(column, Some(Value::Str(target.to_string_lossy().into_owned())));
            }
        }
    }

    Ok(data)
}

/// Writes the debug database: the bound intermediate and the table model.
pub async fn write_pdb(
    intermediate: &Intermediate,
    data: &WindowsInstallerData,
    path: &Path,
) -> Result<()> {
    let intermediate = serde_json::to_vec_pretty(intermediate)?;
    let data = serde_json::to_vec_pretty(data)?;
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).fs_context("creating pdb directory", parent)?;
        }
        let file = File::create(&path).fs_context("creating pdb", &path)?;
        let mut zip = ZipWriter::new(file);
        for (name, bytes) in [("intermediate.json", intermediate), ("data.json", data)] {
            zip.start_file(name, file_options())?;
            zip.write_all(&bytes).fs_context("writing pdb", &path)?;
        }
        zip.finish()?;
        Ok(())
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::data::{OutputType, definitions::standard_table_definitions};

    fn definitions() -> TableDefinitions {
        let mut definitions = TableDefinitions::new();
        for definition in standard_table_definitions() {
            definitions.add(definition);
        }
        definitions
    }

    #[tokio::test]
    async fn streams_round_trip_through_the_container() {
        let dir = tempfile::tempdir().expect("tempdir");
        let icon = dir.path().join("icon.bin");
        std::fs::write(&icon, b"icon bytes").expect("write");

        let definitions = definitions();
        let mut data = WindowsInstallerData::new(OutputType::Package, 65001);
        let binary = data.ensure_table(definitions.get("Binary").expect("binary"));
        let row = binary.create_row(None);
        row.set(0, Some(Value::from("Icon")));
        row.set(1, Some(Value::from(icon.to_string_lossy().as_ref())));

        let messaging = Messaging::new();
        let streams = prepare_streams(&data, &messaging);
        assert!(!messaging.encountered_error());
        assert_eq!(streams[0].name, "Binary.Icon");

        let database = dir.path().join("out").join("product.msi");
        write_database(&data, streams, &database)
            .await
            .expect("write database");

        let loaded = load_database(&database, &dir.path().join("streams")).expect("load");
        let path = loaded.table("Binary").expect("binary").rows[0]
            .text(1)
            .expect("stream path");
        assert_eq!(std::fs::read(path).expect("read stream"), b"icon bytes");
    }

    #[test]
    fn missing_stream_data_is_a_diagnostic() {
        let definitions = definitions();
        let mut data = WindowsInstallerData::new(OutputType::Package, 65001);
        let row = data
            .ensure_table(definitions.get("Binary").expect("binary"))
            .create_row(None);
        row.set(0, Some(Value::from("Missing")));
        row.set(1, Some(Value::from("/does/not/exist.bin")));

        let messaging = Messaging::new();
        assert!(prepare_streams(&data, &messaging).is_empty());
        assert!(messaging.encountered_error());
    }

    #[test]
    fn validation_rows_cover_every_column_once() {
        let definitions = definitions();
        let mut data = WindowsInstallerData::new(OutputType::Package, 65001);
        data.ensure_table(definitions.get("Property").expect("property"));

        add_validation_rows(&mut data, &definitions);
        add_validation_rows(&mut data, &definitions);

        let validation = data.table(VALIDATION_TABLE).expect("validation");
        assert_eq!(validation.rows.len(), 2);
        assert_eq!(validation.rows[0].text(0).as_deref(), Some("Property"));
        assert_eq!(validation.rows[0].text(3).as_deref(), Some("Y"));
    }
}
