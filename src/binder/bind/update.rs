//! File size, version, language and hash.

use super::properties::{VariableCache, cache_file_values};
use crate::binder::{
    data::{FileFacade, FileHash, Section, Symbol, SymbolKind},
    messaging::{Message, Messaging},
    utils::{checksum::calculate_file_hash, version_info::read_version_info},
};
use std::collections::HashMap;

/// Refreshes the facades at `selected` from their source files.
///
/// Size always comes from disk, and so do version and language when none is
/// authored. Versioned files carry no hash; unversioned files are hashed
/// when they have no hash yet or `overwrite_hash` is set.
/// Section files get the values written back to their `File` symbol and an
/// `MsiFileHash` symbol, and every file's version and language land in the
/// variable cache when there is one.
pub async fn update_file_facades(
    section: &mut Section,
    facades: &mut [FileFacade],
    selected: &[usize],
    mut variable_cache: Option<&mut VariableCache>,
    overwrite_hash: bool,
    messaging: &Messaging,
) {
    let mut hashes = hash_symbols(section);
    for &index in selected {
        let Some(facade) = facades.get_mut(index) else {
            continue;
        };

        let metadata = match tokio::fs::metadata(&facade.source_path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                file_not_found(facade, "not a file".to_string(), messaging);
                continue;
            }
            Err(e) => {
                file_not_found(facade, e.to_string(), messaging);
                continue;
            }
        };
        facade.file_size = metadata.len();

        if facade.version.is_none() {
            match read_version_info(&facade.source_path).await {
                Ok(Some(info)) => {
                    facade.version = Some(info.version);
                    if facade.language.is_none() {
                        facade.language = info.language;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    file_not_found(facade, e.to_string(), messaging);
                    continue;
                }
            }
        }

        if facade.version.is_some() {
            facade.hash = None;
        } else if facade.hash.is_none() || overwrite_hash {
            match calculate_file_hash(&facade.source_path).await {
                Ok(hash) => facade.hash = Some(hash),
                Err(e) => {
                    file_not_found(facade, e.to_string(), messaging);
                    continue;
                }
            }
        }

        if let Some(symbol_index) = facade.symbol_index() {
            write_back(section, &mut hashes, symbol_index, facade);
        }

        if let Some(cache) = variable_cache.as_deref_mut() {
            cache_file_values(
                cache,
                &facade.id,
                facade.version.as_deref(),
                facade.language.as_deref(),
            );
        }
    }
}

fn file_not_found(facade: &FileFacade, reason: String, messaging: &Messaging) {
    messaging.error(
        facade.source.as_ref(),
        Message::FileNotFound {
            file: facade.id.clone(),
            path: facade.source_path.clone(),
            reason,
        },
    );
}

/// `MsiFileHash` symbol index by file id.
fn hash_symbols(section: &Section) -> HashMap<String, usize> {
    section
        .symbols
        .iter()
        .enumerate()
        .filter(|(_, s)| s.kind == SymbolKind::MsiFileHash)
        .filter_map(|(index, s)| Some((s.text("File_")?.into_owned(), index)))
        .collect()
}

fn write_back(
    section: &mut Section,
    hashes: &mut HashMap<String, usize>,
    symbol_index: usize,
    facade: &FileFacade,
) {
    let file = &mut section.symbols[symbol_index];
    let size = i64::try_from(facade.file_size).unwrap_or(i64::MAX);
    if file.int("FileSize") != Some(size) {
        file.set("FileSize", size);
    }
    if let Some(version) = &facade.version
        && file.text("Version").as_deref() != Some(version.as_str())
    {
        file.set("Version", version.as_str());
    }
    if let Some(language) = &facade.language
        && file.text("Language").as_deref() != Some(language.as_str())
    {
        file.set("Language", language.as_str());
    }

    match (facade.hash, hashes.get(&facade.id).copied()) {
        (Some(hash), Some(index)) => set_hash_parts(&mut section.symbols[index], hash),
        (Some(hash), None) => {
            let mut symbol = Symbol::anonymous(SymbolKind::MsiFileHash)
                .with("File_", facade.id.as_str())
                .with("Options", 0);
            symbol.source = facade.source.clone();
            set_hash_parts(&mut symbol, hash);
            hashes.insert(facade.id.clone(), section.add(symbol));
        }
        // Symbol indices are facade identity; the materializer drops the
        // stale hash of a versioned file.
        (None, _) => {}
    }
}

fn set_hash_parts(symbol: &mut Symbol, hash: FileHash) {
    for (part, value) in hash.0.iter().enumerate() {
        let name = format!("HashPart{}", part + 1);
        if symbol.int(&name) != Some(i64::from(*value)) {
            symbol.set(&name, *value);
        }
    }
}
