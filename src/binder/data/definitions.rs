//! Built-in table schema.

use super::{
    symbol::SymbolKind,
    table::{ColumnDefinition as C, ColumnModularizeType as M, TableDefinition},
};

/// The five standard sequence tables.
pub const SEQUENCE_TABLES: [&str; 5] = [
    "AdminExecuteSequence",
    "AdminUISequence",
    "AdvtExecuteSequence",
    "InstallExecuteSequence",
    "InstallUISequence",
];

/// Name of the module variant of a sequence table.
pub fn module_sequence_table(table: &str) -> String {
    format!("Module{table}")
}

pub const SUMMARY_INFORMATION_TABLE: &str = "_SummaryInformation";
pub const VALIDATION_TABLE: &str = "_Validation";
pub const STREAMS_TABLE: &str = "_Streams";
pub const WIX_FILE_TABLE: &str = "WixFile";
pub const MODULE_IGNORE_TABLE: &str = "ModuleIgnoreTable";

/// Name of the cabinet embedded in every merge module.
pub const MERGE_MODULE_CABINET: &str = "MergeModule.CABinet";

/// Directories the installer engine defines itself.
pub const STANDARD_DIRECTORIES: &[&str] = &[
    "TARGETDIR",
    "AdminToolsFolder",
    "AppDataFolder",
    "CommonAppDataFolder",
    "CommonFiles64Folder",
    "CommonFilesFolder",
    "DesktopFolder",
    "FavoritesFolder",
    "FontsFolder",
    "LocalAppDataFolder",
    "MyPicturesFolder",
    "NetHoodFolder",
    "PersonalFolder",
    "PrintHoodFolder",
    "ProgramFiles64Folder",
    "ProgramFilesFolder",
    "ProgramMenuFolder",
    "RecentFolder",
    "SendToFolder",
    "StartMenuFolder",
    "StartupFolder",
    "System16Folder",
    "System64Folder",
    "SystemFolder",
    "TempFolder",
    "TemplateFolder",
    "WindowsFolder",
    "WindowsVolume",
];

pub fn is_standard_directory(id: &str) -> bool {
    STANDARD_DIRECTORIES.contains(&id)
}

const EXECUTE_SEQUENCE: &[(&str, i64)] = &[
    ("FindRelatedProducts", 25),
    ("AppSearch", 50),
    ("LaunchConditions", 100),
    ("ValidateProductID", 700),
    ("CostInitialize", 800),
    ("FileCost", 900),
    ("CostFinalize", 1000),
    ("MigrateFeatureStates", 1200),
    ("InstallValidate", 1400),
    ("InstallInitialize", 1500),
    ("ProcessComponents", 1600),
    ("UnpublishFeatures", 1800),
    ("RemoveRegistryValues", 2600),
    ("RemoveFiles", 3500),
    ("RemoveFolders", 3600),
    ("CreateFolders", 3700),
    ("InstallFiles", 4000),
    ("WriteRegistryValues", 5000),
    ("RegisterUser", 6000),
    ("RegisterProduct", 6100),
    ("PublishFeatures", 6300),
    ("PublishProduct", 6400),
    ("InstallFinalize", 6600),
];

const UI_SEQUENCE: &[(&str, i64)] = &[
    ("FindRelatedProducts", 25),
    ("AppSearch", 50),
    ("LaunchConditions", 100),
    ("ValidateProductID", 700),
    ("CostInitialize", 800),
    ("FileCost", 900),
    ("CostFinalize", 1000),
    ("MigrateFeatureStates", 1200),
    ("ExecuteAction", 1300),
];

/// Default position of a standard action in a sequence table.
pub fn standard_action_sequence(table: &str, action: &str) -> Option<i64> {
    let defaults = match table {
        "InstallExecuteSequence" | "AdvtExecuteSequence" | "AdminExecuteSequence" => {
            EXECUTE_SEQUENCE
        }
        "InstallUISequence" | "AdminUISequence" => UI_SEQUENCE,
        _ => return None,
    };
    defaults
        .iter()
        .find(|(name, _)| *name == action)
        .map(|(_, sequence)| *sequence)
}

/// Whether `action` is an action the installer engine implements.
pub fn is_standard_action(action: &str) -> bool {
    EXECUTE_SEQUENCE
        .iter()
        .chain(UI_SEQUENCE)
        .any(|(name, _)| *name == action)
}

/// Standard table definitions.
pub fn standard_table_definitions() -> Vec<TableDefinition> {
    let mut definitions = vec![
        TableDefinition::new(
            "Property",
            Some(SymbolKind::Property),
            vec![
                C::string("Property").key().modularize(M::Property),
                C::string("Value"),
            ],
        ),
        TableDefinition::new(
            "Directory",
            Some(SymbolKind::Directory),
            vec![
                C::string("Directory").key().ident(),
                C::string("Directory_Parent").nullable().ident(),
                C::string("DefaultDir").category("DefaultDir"),
            ],
        ),
        TableDefinition::new(
            "Component",
            Some(SymbolKind::Component),
            vec![
                C::string("Component").key().ident(),
                C::string("ComponentId").nullable().category("Guid"),
                C::string("Directory_").ident(),
                C::number("Attributes"),
                C::string("Condition").nullable().modularize(M::Condition),
                C::string("KeyPath").nullable().ident(),
            ],
        ),
        TableDefinition::new(
            "File",
            Some(SymbolKind::File),
            vec![
                C::string("File").key().ident(),
                C::string("Component_").ident(),
                C::string("FileName").category("Filename"),
                C::number("FileSize"),
                C::string("Version").nullable().modularize(M::CompanionFile),
                C::string("Language").nullable(),
                C::number("Attributes").nullable(),
                C::number("Sequence"),
            ],
        ),
        TableDefinition::new(
            "MsiFileHash",
            Some(SymbolKind::MsiFileHash),
            vec![
                C::string("File_").key().ident(),
                C::number("Options"),
                C::number("HashPart1"),
                C::number("HashPart2"),
                C::number("HashPart3"),
                C::number("HashPart4"),
            ],
        ),
        TableDefinition::new(
            "Media",
            Some(SymbolKind::Media),
            vec![
                C::number("DiskId").key(),
                C::number("LastSequence"),
                C::string("DiskPrompt").nullable(),
                C::string("Cabinet").nullable().category("Cabinet"),
                C::string("VolumeLabel").nullable(),
                C::string("Source").nullable(),
            ],
        ),
        TableDefinition::new(
            "CustomAction",
            Some(SymbolKind::CustomAction),
            vec![
                C::string("Action").key().ident(),
                C::number("Type"),
                C::string("Source").nullable().ident(),
                C::string("Target").nullable().modularize(M::Condition),
            ],
        ),
        TableDefinition::new(
            "Feature",
            Some(SymbolKind::Feature),
            vec![
                C::string("Feature").key(),
                C::string("Feature_Parent").nullable(),
                C::string("Title").nullable(),
                C::string("Description").nullable(),
                C::number("Display").nullable(),
                C::number("Level"),
                C::string("Directory_").nullable().ident(),
                C::number("Attributes"),
            ],
        ),
        TableDefinition::new(
            "FeatureComponents",
            Some(SymbolKind::FeatureComponents),
            vec![C::string("Feature_").key(), C::string("Component_").key().ident()],
        ),
        TableDefinition::new(
            "CreateFolder",
            Some(SymbolKind::CreateFolder),
            vec![
                C::string("Directory_").key().ident(),
                C::string("Component_").key().ident(),
            ],
        ),
        TableDefinition::new(
            "Binary",
            Some(SymbolKind::Binary),
            vec![C::string("Name").key().ident(), C::object("Data")],
        ),
        TableDefinition::new(
            "Registry",
            Some(SymbolKind::Registry),
            vec![
                C::string("Registry").key().ident(),
                C::number("Root"),
                C::string("Key").modularize(M::Condition),
                C::string("Name").nullable().modularize(M::Condition),
                C::string("Value").nullable().modularize(M::Condition),
                C::string("Component_").ident(),
            ],
        ),
        TableDefinition::new(
            "SoftwareIdentificationTag",
            Some(SymbolKind::SoftwareIdentificationTag),
            vec![
                C::string("File_").key().ident(),
                C::string("Regid"),
                C::string("UniqueId"),
                C::string("Type"),
            ],
        ),
        TableDefinition::new(
            "ModuleSignature",
            None,
            vec![
                C::string("ModuleID").key(),
                C::number("Language").key(),
                C::string("Version"),
            ],
        ),
        TableDefinition::new(
            "ModuleComponents",
            None,
            vec![
                C::string("Component").key().ident(),
                C::string("ModuleID").key(),
                C::number("Language").key(),
            ],
        ),
        TableDefinition::new(
            SUMMARY_INFORMATION_TABLE,
            Some(SymbolKind::SummaryInformation),
            vec![C::number("PropertyId").key(), C::string("Value").nullable()],
        ),
        TableDefinition::new(
            VALIDATION_TABLE,
            None,
            vec![
                C::string("Table").key(),
                C::string("Column").key(),
                C::string("Nullable"),
                C::string("KeyColumn").nullable(),
                C::string("Category").nullable(),
            ],
        ),
        TableDefinition::new(
            MODULE_IGNORE_TABLE,
            None,
            vec![C::string("Table").key()],
        ),
        TableDefinition::new(
            STREAMS_TABLE,
            None,
            vec![C::string("Name").key(), C::object("Data")],
        ),
        TableDefinition {
            unreal: true,
            ..TableDefinition::new(
                WIX_FILE_TABLE,
                None,
                vec![
                    C::string("File_").key().ident(),
                    C::string("Source"),
                    C::number("DiskId").nullable(),
                    C::number("PatchGroup").nullable(),
                ],
            )
        },
    ];

    for table in SEQUENCE_TABLES {
        definitions.push(TableDefinition::new(
            table,
            None,
            vec![
                C::string("Action").key().ident(),
                C::string("Condition").nullable().modularize(M::Condition),
                C::number("Sequence").nullable(),
            ],
        ));
        definitions.push(TableDefinition::new(
            &module_sequence_table(table),
            None,
            vec![
                C::string("Action").key().ident(),
                C::number("Sequence").nullable(),
                C::string("BaseAction").nullable().ident(),
                C::number("After").nullable(),
                C::string("Condition").nullable().modularize(M::Condition),
            ],
        ));
    }

    definitions
}
