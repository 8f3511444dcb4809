//! Codepage, product version, properties and bind-time variables.

use crate::binder::{
    Result,
    data::{
        Field, Section, SourceLineNumber, Symbol, SymbolKind, TrackedFile, TrackedFileType, TrackedFiles,
        Value,
    },
    messaging::{Message, Messaging},
};
use regex::Regex;
use std::{borrow::Cow, collections::HashMap, path::Path};

/// Bind-time variable cache: `property.Name`, `fileVersion.Id` and
/// `fileLanguage.Id` mapped to their values.
pub type VariableCache = HashMap<String, String>;

/// `!(bind.name)` references inside delayed fields.
const BIND_VARIABLE: &str = r"!\(bind\.([^)]+)\)";

/// Prefix of field values that name a text file to inline.
const TEXT_FILE_PREFIX: &str = "@file:";

const DEFAULT_CODEPAGE: i32 = 65001;

/// Codepages an installer database may use.
const VALID_CODEPAGES: &[i32] = &[
    0, 874, 932, 936, 949, 950, 1250, 1251, 1252, 1253, 1254, 1255, 1256, 1257, 1258, 65001,
];

/// Properties every package must define.
const REQUIRED_PROPERTIES: [&str; 5] = [
    "ProductCode",
    "ProductLanguage",
    "ProductVersion",
    "Manufacturer",
    "ProductName",
];

/// Parses a codepage given as a number, `utf-8` or `windows-NNNN`.
pub fn parse_codepage(value: &str) -> Option<i32> {
    let value = value.trim();
    let number = if value.eq_ignore_ascii_case("utf-8") || value.eq_ignore_ascii_case("utf8") {
        DEFAULT_CODEPAGE
    } else if let Some(rest) = value
        .get(..8)
        .filter(|p| p.eq_ignore_ascii_case("windows-"))
        .and_then(|_| value.get(8..))
    {
        rest.parse().ok()?
    } else {
        value.parse().ok()?
    };
    VALID_CODEPAGES.contains(&number).then_some(number)
}

/// Computes the database codepage from the package-type symbol, falling
/// back to `resolved` and then UTF-8. An empty codepage is written back to
/// the symbol.
pub fn calculate_codepage(
    section: &mut Section,
    package_index: usize,
    resolved: Option<i32>,
    messaging: &Messaging,
) -> i32 {
    let symbol = &mut section.symbols[package_index];
    let authored = symbol.text("Codepage").map(Cow::into_owned);
    let codepage = match authored {
        Some(codepage) => codepage,
        None => {
            let codepage = resolved.unwrap_or(DEFAULT_CODEPAGE).to_string();
            symbol.set("Codepage", codepage.as_str());
            codepage
        }
    };

    match parse_codepage(&codepage) {
        Some(codepage) => codepage,
        None => {
            messaging.error(
                symbol.source.as_ref(),
                Message::InvalidCodepage { value: codepage },
            );
            DEFAULT_CODEPAGE
        }
    }
}

/// Parses a product version.
///
/// Up to four numeric parts are accepted and the version is normalized to
/// `major.minor.build`. A strict parse additionally enforces the installer
/// limits on each part.
pub fn parse_product_version(version: &str, strict: bool) -> Option<String> {
    let parts: Vec<u32> = version
        .trim()
        .split('.')
        .map(|p| p.parse().ok())
        .collect::<Option<_>>()?;
    if parts.is_empty() || parts.len() > 4 {
        return None;
    }
    if strict {
        let limits = [255, 255, 65535];
        if parts.iter().zip(limits).any(|(part, limit)| *part > limit) {
            return None;
        }
    }
    Some(
        parts
            .iter()
            .take(3)
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join("."),
    )
}

/// Normalizes the package version and mirrors it into `ProductVersion`.
///
/// When `validate` is set an unparsable version is an error; otherwise it
/// is left for the second pass, after delayed fields are resolved.
pub fn process_product_version(
    section: &mut Section,
    package_index: usize,
    validate: bool,
    messaging: &Messaging,
) {
    let package = &section.symbols[package_index];
    let Some(authored) = package.text("Version").map(Cow::into_owned) else {
        return;
    };

    match parse_product_version(&authored, validate) {
        Some(version) if version != authored => {
            section.symbols[package_index].set("Version", version.as_str());
            if let Some(property) = section.find_mut(&SymbolKind::Property, "ProductVersion") {
                property.set("Value", version.as_str());
            }
        }
        Some(_) => {}
        None if validate => messaging.error(
            package.source.as_ref(),
            Message::InvalidProductVersion { version: authored },
        ),
        None => {}
    }
}

/// Outcome of [`process_properties`].
#[derive(Clone, Debug, Default)]
pub struct ProcessedProperties {
    /// Only built when the section has delayed fields.
    pub variable_cache: Option<VariableCache>,
    pub product_language: Option<String>,
}

/// Sets `ProductLanguage` and builds the variable cache when needed.
pub fn process_properties(
    section: &mut Section,
    package_index: Option<usize>,
    resolved_lcid: Option<i32>,
    has_delayed_fields: bool,
) -> ProcessedProperties {
    let mut product_language = None;

    if let Some(index) = package_index {
        let language = section.symbols[index]
            .text("Language")
            .map(Cow::into_owned)
            .or_else(|| resolved_lcid.filter(|l| *l != 0).map(|l| l.to_string()));

        if let Some(language) = &language {
            match section.find_mut(&SymbolKind::Property, "ProductLanguage") {
                Some(property) if property.text("Value").is_some() => {}
                Some(property) => property.set("Value", language.as_str()),
                None => {
                    let source = section.symbols[index].source.clone();
                    let mut property = Symbol::new(SymbolKind::Property, "ProductLanguage")
                        .with("Value", language.as_str());
                    property.source = source;
                    section.add(property);
                }
            }
        }
        product_language = section
            .find(&SymbolKind::Property, "ProductLanguage")
            .and_then(|p| p.text("Value"))
            .map(Cow::into_owned)
            .or(language);
    }

    let variable_cache = has_delayed_fields.then(|| {
        section
            .symbols_of(&SymbolKind::Property)
            .filter_map(|p| Some((format!("property.{}", p.id()), p.text("Value")?.into_owned())))
            .collect()
    });

    ProcessedProperties {
        variable_cache,
        product_language,
    }
}

/// Replaces every delayed field with its value from `cache`.
///
/// Fields referencing a variable missing from the cache are reported and
/// stay delayed.
pub fn resolve_delayed_fields(
    section: &mut Section,
    cache: &VariableCache,
    messaging: &Messaging,
) -> Result<()> {
    resolve_selected_delayed_fields(section, cache, messaging, |_, _| true)
}

/// [`resolve_delayed_fields`] restricted to the fields `select` accepts,
/// given the symbol index and the field.
pub fn resolve_selected_delayed_fields(
    section: &mut Section,
    cache: &VariableCache,
    messaging: &Messaging,
    mut select: impl FnMut(usize, &Field) -> bool,
) -> Result<()> {
    let references = Regex::new(BIND_VARIABLE)?;

    for (index, symbol) in section.symbols.iter_mut().enumerate() {
        for (field, expression) in symbol.delayed_fields() {
            if !symbol.field(&field).is_some_and(|f| select(index, f)) {
                continue;
            }
            let mut missing = Vec::new();
            let resolved = references.replace_all(&expression, |caps: &regex::Captures<'_>| {
                match cache.get(&caps[1]) {
                    Some(value) => value.clone(),
                    None => {
                        missing.push(caps[1].to_string());
                        caps[0].to_string()
                    }
                }
            });

            if missing.is_empty() {
                let resolved = resolved.into_owned();
                symbol.set_resolved(&field, resolved);
            } else {
                for variable in missing {
                    messaging.error(
                        symbol.source.as_ref(),
                        Message::UnresolvedBindVariable {
                            symbol: format!("{} '{}'", symbol.kind, symbol.id()),
                            field: field.clone(),
                            variable,
                        },
                    );
                }
            }
        }
    }
    Ok(())
}

/// Inlines `@file:<path>` field values with the file's content.
pub fn update_from_text_files(
    section: &mut Section,
    tracked: &mut TrackedFiles,
    messaging: &Messaging,
) {
    for symbol in section.symbols.iter_mut() {
        let references: Vec<(String, String)> = symbol
            .fields()
            .filter_map(|(name, _)| {
                let path = symbol.text(name)?.strip_prefix(TEXT_FILE_PREFIX)?.to_string();
                Some((name.to_string(), path))
            })
            .collect();

        for (field, path) in references {
            let path = Path::new(&path);
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    tracked.push(
                        TrackedFile::new(path, TrackedFileType::Input)
                            .with_source(symbol.source.clone()),
                    );
                    symbol.set_resolved(&field, content);
                }
                Err(e) => messaging.error(
                    symbol.source.as_ref(),
                    Message::TextFileUnreadable {
                        path: path.to_path_buf(),
                        field,
                        reason: e.to_string(),
                    },
                ),
            }
        }
    }
}

/// Collects `Secure` and `Hidden` properties into `SecureCustomProperties`
/// and `MsiHiddenProperties`.
pub fn create_special_properties(section: &mut Section) {
    let flagged = |flag: &str| -> Vec<String> {
        let mut ids: Vec<String> = section
            .symbols_of(&SymbolKind::Property)
            .filter(|p| p.flag(flag) == Some(true))
            .map(|p| p.id().to_string())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    };
    let secure = flagged("Secure");
    let hidden = flagged("Hidden");

    for (property, ids) in [
        ("SecureCustomProperties", secure),
        ("MsiHiddenProperties", hidden),
    ] {
        if ids.is_empty() {
            continue;
        }
        match section.find_mut(&SymbolKind::Property, property) {
            Some(symbol) => {
                let mut merged: Vec<String> = symbol
                    .text("Value")
                    .map(|v| v.split(';').filter(|p| !p.is_empty()).map(str::to_string).collect())
                    .unwrap_or_default();
                merged.extend(ids);
                merged.sort();
                merged.dedup();
                symbol.set("Value", merged.join(";"));
            }
            None => {
                section.add(Symbol::new(SymbolKind::Property, property).with("Value", ids.join(";")));
            }
        }
    }
}

/// Reports each required property the package does not define.
pub fn validate_product_constraints(
    section: &Section,
    source: Option<&SourceLineNumber>,
    messaging: &Messaging,
) {
    for property in REQUIRED_PROPERTIES {
        let defined = section
            .find(&SymbolKind::Property, property)
            .and_then(|p| p.value("Value"))
            .is_some_and(|v| !v.as_text().is_empty());
        if !defined {
            messaging.error(
                source,
                Message::MissingRequiredProperty {
                    property: property.to_string(),
                },
            );
        }
    }
}

/// Adds `fileVersion.<id>` and `fileLanguage.<id>` entries for a file.
pub fn cache_file_values(
    cache: &mut VariableCache,
    file: &str,
    version: Option<&str>,
    language: Option<&str>,
) {
    cache.insert(
        format!("fileVersion.{file}"),
        version.unwrap_or_default().to_string(),
    );
    cache.insert(
        format!("fileLanguage.{file}"),
        language.unwrap_or_default().to_string(),
    );
}

/// Value of a property, if the section defines one.
pub fn property_value(section: &Section, property: &str) -> Option<Value> {
    section
        .find(&SymbolKind::Property, property)
        .and_then(|p| p.value("Value"))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::data::SectionType;

    #[test]
    fn codepages_accept_numbers_and_names() {
        assert_eq!(parse_codepage("1252"), Some(1252));
        assert_eq!(parse_codepage("utf-8"), Some(65001));
        assert_eq!(parse_codepage("Windows-1251"), Some(1251));
        assert_eq!(parse_codepage("437"), None);
        assert_eq!(parse_codepage("latin"), None);
    }

    #[test]
    fn empty_codepage_is_written_back() {
        let mut section = Section::new(SectionType::Package);
        let package = section.add(Symbol::new(SymbolKind::Package, "Product"));

        let messaging = Messaging::new();
        let codepage = calculate_codepage(&mut section, package, Some(1252), &messaging);

        assert_eq!(codepage, 1252);
        assert_eq!(
            section.symbols[package].text("Codepage").as_deref(),
            Some("1252")
        );
        assert!(!messaging.encountered_error());
    }

    #[test]
    fn product_versions_are_normalized_then_validated() {
        assert_eq!(parse_product_version("1.2.3.4", false).as_deref(), Some("1.2.3"));
        assert_eq!(parse_product_version("300.0.0", false).as_deref(), Some("300.0.0"));
        assert_eq!(parse_product_version("300.0.0", true), None);
        assert_eq!(parse_product_version("1.2.70000", true), None);
        assert_eq!(parse_product_version("1.x", false), None);

        let mut section = Section::new(SectionType::Package);
        let package = section.add(Symbol::new(SymbolKind::Package, "Product").with("Version", "2.0.1.9"));
        section.add(Symbol::new(SymbolKind::Property, "ProductVersion").with("Value", "2.0.1.9"));

        let messaging = Messaging::new();
        process_product_version(&mut section, package, false, &messaging);

        assert_eq!(section.symbols[package].text("Version").as_deref(), Some("2.0.1"));
        assert_eq!(
            property_value(&section, "ProductVersion"),
            Some(Value::from("2.0.1"))
        );
    }

    #[test]
    fn variable_cache_is_only_built_for_delayed_fields() {
        let mut section = Section::new(SectionType::Package);
        let package = section.add(Symbol::new(SymbolKind::Package, "Product").with("Language", "1033"));
        section.add(Symbol::new(SymbolKind::Property, "Manufacturer").with("Value", "Acme"));

        let without = process_properties(&mut section, Some(package), None, false);
        assert!(without.variable_cache.is_none());
        assert_eq!(without.product_language.as_deref(), Some("1033"));

        let with = process_properties(&mut section, Some(package), None, true);
        let cache = with.variable_cache.expect("cache");
        assert_eq!(cache.get("property.Manufacturer").map(String::as_str), Some("Acme"));
        assert_eq!(cache.get("property.ProductLanguage").map(String::as_str), Some("1033"));
    }

    #[test]
    fn delayed_fields_resolve_against_the_cache() {
        let mut section = Section::new(SectionType::Package);
        section.add(
            Symbol::new(SymbolKind::Registry, "reg")
                .with_delayed("Value", "v!(bind.fileVersion.app.exe) by !(bind.property.Manufacturer)"),
        );
        section.add(Symbol::new(SymbolKind::Registry, "bad").with_delayed("Value", "!(bind.property.Nope)"));

        let mut cache = VariableCache::new();
        cache.insert("property.Manufacturer".into(), "Acme".into());
        cache_file_values(&mut cache, "app.exe", Some("1.0.0.0"), None);

        let messaging = Messaging::new();
        resolve_delayed_fields(&mut section, &cache, &messaging).expect("resolve");

        assert_eq!(
            section.symbols[0].text("Value").as_deref(),
            Some("v1.0.0.0 by Acme")
        );
        assert!(section.symbols[1].has_delayed_fields());
        assert_eq!(messaging.error_count(), 1);
    }

    #[test]
    fn text_file_fields_are_inlined_and_tracked() {
        let dir = tempfile::tempdir().expect("tempdir");
        let license = dir.path().join("license.rtf");
        std::fs::write(&license, "terms").expect("write");

        let mut section = Section::new(SectionType::Package);
        section.add(
            Symbol::new(SymbolKind::Property, "LicenseText")
                .with("Value", format!("@file:{}", license.display())),
        );
        section.add(Symbol::new(SymbolKind::Property, "Missing").with("Value", "@file:/no/such/file"));

        let messaging = Messaging::new();
        let mut tracked = TrackedFiles::new();
        update_from_text_files(&mut section, &mut tracked, &messaging);

        assert_eq!(section.symbols[0].text("Value").as_deref(), Some("terms"));
        assert_eq!(tracked.of_type(TrackedFileType::Input).count(), 1);
        assert_eq!(messaging.error_count(), 1);
    }

    #[test]
    fn special_properties_are_sorted_and_idempotent() {
        let mut section = Section::new(SectionType::Package);
        section.add(Symbol::new(SymbolKind::Property, "ZED").with("Secure", "yes"));
        section.add(Symbol::new(SymbolKind::Property, "ALPHA").with("Secure", "yes"));
        section.add(Symbol::new(SymbolKind::Property, "Password").with("Hidden", 1));

        create_special_properties(&mut section);
        create_special_properties(&mut section);

        assert_eq!(
            property_value(&section, "SecureCustomProperties"),
            Some(Value::from("ALPHA;ZED"))
        );
        assert_eq!(
            property_value(&section, "MsiHiddenProperties"),
            Some(Value::from("Password"))
        );
    }

    #[test]
    fn missing_required_properties_are_errors() {
        let mut section = Section::new(SectionType::Package);
        section.add(Symbol::new(SymbolKind::Property, "ProductName").with("Value", "App"));
        section.add(Symbol::new(SymbolKind::Property, "Manufacturer").with("Value", ""));

        let messaging = Messaging::new();
        validate_product_constraints(&section, None, &messaging);

        assert_eq!(messaging.error_count(), 4);
    }
}
