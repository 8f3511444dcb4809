//! The bind pipeline.

use super::{
    cabinets::build_cabinets,
    collect::{extract_embedded_files, file_facades_from_section, refresh_from_symbol},
    components::{add_create_folders, finalize_component_guids},
    dependencies::process_dependency_references,
    directories::DirectoryResolver,
    layout::layout_uncompressed_files,
    media::{MediaAssignment, assign_media, order_facades, update_media_sequences},
    properties::{
        ProcessedProperties, VariableCache, calculate_codepage, create_special_properties,
        process_product_version, process_properties, resolve_delayed_fields,
        resolve_selected_delayed_fields, update_from_text_files, validate_product_constraints,
    },
    result::{BindResult, FileTransfer},
    schema::load_table_definitions,
    sequence::{add_required_standard_directories, sequence_actions},
    summary::bind_summary_info,
    tags::process_package_software_tags,
    tracking::{track_input_files, write_tracking_file},
    update::update_file_facades,
};
use crate::binder::{
    Result,
    cabinet::{CabinetCodec, TarGzCodec},
    data::{
        FieldMark, FileFacade, Intermediate, LEVEL_FULLY_BOUND, LEVEL_LINKED, LEVEL_RESOLVED,
        Section, SectionType, SubStorage, SymbolKind, TableDefinitions, TrackedFileType,
        TrackedFiles, Value, WindowsInstallerData, definitions::STREAMS_TABLE,
    },
    database::{
        generate::{
            DatabaseStream, add_validation_rows, prepare_streams, write_database, write_pdb,
        },
        instances::create_instance_transforms,
        materialize::materialize,
        merge::{extract_merge_modules, merge_modules_into},
        modularize::{add_back_suppressed_sequence_tables, modularize, modularized_identifier},
        transforms::{attach_sub_storages, facades_from_transforms, update_transforms_with_facades},
    },
    error::Error,
    extension::{BindContext, BinderExtension},
    messaging::{Message, Messaging},
    settings::BindSettings,
    utils::fs,
};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Largest file an installer database can describe.
const MAX_INSTALLER_FILE_SIZE: u64 = i32::MAX as u64;

/// Binds one intermediate into an installer database.
///
/// Problems are reported to [`Binder::messaging`]; the binder stops at the
/// next stage boundary once any error was recorded and returns `Ok(None)`.
/// `Err` is reserved for failures that make further work meaningless, such
/// as an intermediate without exactly one section or an unwritable output.
pub struct Binder {
    settings: BindSettings,
    extensions: Vec<Box<dyn BinderExtension>>,
    codec: Arc<dyn CabinetCodec>,
    messaging: Messaging,
}

impl Binder {
    pub fn new(settings: BindSettings) -> Self {
        Self {
            settings,
            extensions: Vec::new(),
            codec: Arc::new(TarGzCodec),
            messaging: Messaging::new(),
        }
    }

    /// Registers an extension. Extensions are consulted in registration order.
    pub fn with_extension(mut self, extension: impl BinderExtension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn CabinetCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Reports into an existing sink instead of a fresh one.
    pub fn with_messaging(mut self, messaging: Messaging) -> Self {
        self.messaging = messaging;
        self
    }

    pub fn messaging(&self) -> &Messaging {
        &self.messaging
    }

    pub fn settings(&self) -> &BindSettings {
        &self.settings
    }

    fn should_stop(&self, stage: &str) -> bool {
        let stop = self.messaging.encountered_error();
        if stop {
            log::debug!(
                "Stopping after {stage} with {} error(s)",
                self.messaging.error_count()
            );
        }
        stop
    }

    /// Runs the full pipeline.
    ///
    /// `transforms` are the sub-storages of a patch; they are ignored for
    /// other output types.
    pub async fn bind(
        &mut self,
        mut intermediate: Intermediate,
        mut transforms: Vec<SubStorage>,
    ) -> Result<Option<BindResult>> {
        let settings = self.settings.clone();
        let messaging = self.messaging.clone();

        if !intermediate.has_level(LEVEL_LINKED) || !intermediate.has_level(LEVEL_RESOLVED) {
            messaging.error(
                None,
                Message::IntermediatesMustBeResolved {
                    id: intermediate.id.clone(),
                },
            );
        }
        if intermediate.sections.len() != 1 {
            return Err(Error::SingleSectionExpected {
                id: intermediate.id.clone(),
                count: intermediate.sections.len(),
            });
        }
        if settings.output_path().is_dir() {
            crate::bail!(
                "output path {} is a directory",
                settings.output_path().display()
            );
        }

        fs::create_dir_all(settings.intermediate_folder(), false).await?;
        let mut tracked = TrackedFiles::new();

        let section = &mut intermediate.sections[0];
        let section_type = section.section_type;
        let package_kind = match section_type {
            SectionType::Package => SymbolKind::Package,
            SectionType::Module => SymbolKind::Module,
            SectionType::Patch => SymbolKind::Patch,
        };
        let package_index = section.single_index(package_kind)?;
        log::info!(
            "Binding {:?} {} to {}",
            section_type,
            section.symbols[package_index].id(),
            settings.output_path().display()
        );

        let context = BindContext {
            settings: settings.clone(),
            messaging: messaging.clone(),
        };
        for extension in self.extensions.iter_mut() {
            extension.pre_bind(&context);
        }

        let table_definitions = load_table_definitions(section, &self.extensions, &messaging);

        if section_type == SectionType::Package {
            process_product_version(section, package_index, false, &messaging);
        }
        let codepage =
            calculate_codepage(section, package_index, settings.resolved_codepage(), &messaging);

        let has_delayed_fields = section.has_delayed_fields();
        let ProcessedProperties {
            mut variable_cache,
            product_language,
        } = process_properties(
            section,
            (section_type == SectionType::Package).then_some(package_index),
            settings.resolved_lcid(),
            has_delayed_fields,
        );

        let summary = bind_summary_info(
            section,
            package_index,
            codepage,
            settings.resolved_summary_information_codepage(),
            product_language.as_deref(),
        );

        log::info!("Sequencing actions");
        sequence_actions(section, &messaging);
        if section_type != SectionType::Patch {
            add_required_standard_directories(section);
            create_special_properties(section);
        }
        if self.should_stop("sequencing actions") {
            return Ok(None);
        }

        log::info!("Collecting files");
        extract_embedded_files(&intermediate.embedded_files, &mut tracked, &messaging);
        if section_type == SectionType::Package {
            process_package_software_tags(
                section,
                package_index,
                settings.intermediate_folder(),
                &mut tracked,
            )
            .await?;
        }
        let mut facades = match section_type {
            SectionType::Patch => facades_from_transforms(&transforms),
            _ => file_facades_from_section(section),
        };
        let modules = match section_type {
            SectionType::Package => extract_merge_modules(
                section,
                &mut facades,
                settings.intermediate_folder(),
                self.codec.as_ref(),
                &mut tracked,
                &messaging,
            ),
            _ => Vec::new(),
        };
        if self.should_stop("collecting files") {
            return Ok(None);
        }

        log::info!("Updating file information for {} file(s)", facades.len());
        let selected: Vec<usize> = facades
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.from_module())
            .map(|(index, _)| index)
            .collect();
        update_file_facades(
            section,
            &mut facades,
            &selected,
            variable_cache.as_mut(),
            true,
            &messaging,
        )
        .await;
        if self.should_stop("updating file information") {
            return Ok(None);
        }

        if let Some(cache) = &variable_cache {
            resolve_delayed_fields(section, cache, &messaging)?;
        }
        update_from_text_files(section, &mut tracked, &messaging);
        if section_type != SectionType::Patch {
            add_create_folders(section);
        }
        if section_type == SectionType::Package {
            process_product_version(section, package_index, true, &messaging);
        }
        if matches!(section_type, SectionType::Package | SectionType::Module) {
            process_dependency_references(section);
        }

        self.finalize_symbols(section, &mut facades, variable_cache.as_mut(), &messaging)
            .await?;
        if self.should_stop("finalizing symbols") {
            return Ok(None);
        }

        if section_type == SectionType::Package {
            validate_product_constraints(
                section,
                section.symbols[package_index].source.as_ref(),
                &messaging,
            );
            if self.should_stop("validating product constraints") {
                return Ok(None);
            }
        }

        let directories = DirectoryResolver::new(section);
        finalize_component_guids(section, &directories, &messaging);
        if self.should_stop("finalizing component GUIDs") {
            return Ok(None);
        }

        log::info!("Assigning files to media");
        order_facades(&mut facades, &directories);
        let assignment = if section_type == SectionType::Patch && !has_media(section) {
            MediaAssignment::default()
        } else {
            let assignment = assign_media(section, &mut facades, summary.compressed, &messaging);
            update_media_sequences(section, &mut facades, &assignment);
            assignment
        };
        if self.should_stop("assigning media") {
            return Ok(None);
        }

        log::info!("Generating tables");
        let mut data = materialize(
            section,
            codepage,
            summary.modularization_suffix.as_deref(),
            &table_definitions,
            &mut self.extensions,
            &messaging,
        );
        if section_type == SectionType::Module {
            if let Some(suffix) = &summary.modularization_suffix {
                let suppressed = suppressed_modularization(section);
                modularize(&mut data, suffix, &suppressed)?;
                // Cabinet entries are named after the modularized file ids.
                for facade in facades.iter_mut() {
                    facade.id = modularized_identifier(&facade.id, suffix, &suppressed);
                }
            }
            add_back_suppressed_sequence_tables(&mut data, &table_definitions);
        }
        if self.should_stop("generating tables") {
            return Ok(None);
        }

        let mut transfers: Vec<FileTransfer> = Vec::new();
        if !settings.suppress_layout() || section_type == SectionType::Module {
            let output = build_cabinets(
                section,
                &assignment.groups,
                &facades,
                &settings,
                &mut self.extensions,
                Arc::clone(&self.codec),
                &mut tracked,
                &messaging,
            )
            .await;
            for cabinet in &output.embedded {
                add_stream_row(&mut data, &table_definitions, &cabinet.name, &cabinet.path);
            }
            transfers.extend(output.transfers);
        }
        if self.should_stop("creating cabinets") {
            return Ok(None);
        }

        if section_type == SectionType::Patch {
            update_transforms_with_facades(&mut transforms, &facades, &table_definitions);
            attach_sub_storages(&mut data, transforms);
        }
        if !modules.is_empty() {
            log::info!("Merging {} module(s)", modules.len());
            merge_modules_into(&mut data, &modules, &facades, &table_definitions, &messaging);
            if self.should_stop("merging modules") {
                return Ok(None);
            }
        }
        if section_type == SectionType::Package {
            create_instance_transforms(section, &mut data, &table_definitions);
        }

        if !settings.suppress_adding_validation_rows() {
            add_validation_rows(&mut data, &table_definitions);
        }
        let streams = prepare_streams(&data, &messaging);
        if self.should_stop("preparing streams") {
            return Ok(None);
        }

        let database_path = self.write_output(&data, streams, &mut tracked).await?;

        if !settings.suppress_layout() {
            transfers.extend(layout_uncompressed_files(
                section,
                &facades,
                &assignment.uncompressed,
                &directories,
                summary.long_names,
                &settings.layout_directory(),
                &mut self.extensions,
                &mut tracked,
            ));
        }

        self.check_file_sizes(&database_path, &transfers).await;
        track_input_files(&data, &mut tracked);

        intermediate.update_level(LEVEL_FULLY_BOUND);
        let pdb_path = match settings.pdb_path() {
            Some(path) => {
                log::info!("Writing debug database {}", path.display());
                write_pdb(&intermediate, &data, path).await?;
                Some(tracked.track(path, TrackedFileType::BuiltOutput))
            }
            None => None,
        };

        if let Some(path) = settings.tracking_file() {
            write_tracking_file(path, &tracked).await?;
        }

        let result = BindResult {
            data,
            database_path,
            pdb_path,
            tracked_files: tracked,
            file_transfers: transfers,
        };

        for extension in self.extensions.iter_mut() {
            if let Err(err) = extension.post_bind(&result) {
                messaging.warning(
                    None,
                    Message::PostBindFailed {
                        reason: err.to_string(),
                    },
                );
            }
        }

        log::info!(
            "Bound {} with {} pending transfer(s)",
            result.database_path.display(),
            result.file_transfers.len()
        );
        Ok(Some(result))
    }

    /// Settles field marks, runs the `symbols_finalized` hooks and refreshes
    /// every file the hooks touched.
    async fn finalize_symbols(
        &mut self,
        section: &mut Section,
        facades: &mut [FileFacade],
        mut variable_cache: Option<&mut VariableCache>,
        messaging: &Messaging,
    ) -> Result<()> {
        section.settle_marks();
        let existing = section.symbols.len();
        for extension in self.extensions.iter_mut() {
            extension.symbols_finalized(section);
        }

        // Authored delayed fields were resolved (or reported) already.
        if let Some(cache) = variable_cache.as_deref()
            && section.has_delayed_fields()
        {
            resolve_selected_delayed_fields(section, cache, messaging, |index, field| {
                index >= existing || field.mark == FieldMark::Modified
            })?;
        }

        let modified: Vec<usize> = facades
            .iter()
            .enumerate()
            .filter(|(_, facade)| {
                facade
                    .symbol_index()
                    .and_then(|index| section.symbols.get(index))
                    .is_some_and(|symbol| {
                        symbol.kind == SymbolKind::File && symbol.is_modified()
                    })
            })
            .map(|(index, _)| index)
            .collect();

        if !modified.is_empty() {
            log::debug!("Refreshing {} file(s) changed by extensions", modified.len());
            for &index in &modified {
                let facade = &mut facades[index];
                if let Some(symbol) = facade.symbol_index().and_then(|i| section.symbols.get(i)) {
                    refresh_from_symbol(facade, section, symbol);
                }
            }
            update_file_facades(
                section,
                facades,
                &modified,
                variable_cache.as_deref_mut(),
                false,
                messaging,
            )
            .await;
        }

        section.settle_marks();
        Ok(())
    }

    /// Writes the database next to the intermediate folder first and moves
    /// it into place once complete.
    async fn write_output(
        &self,
        data: &WindowsInstallerData,
        streams: Vec<DatabaseStream>,
        tracked: &mut TrackedFiles,
    ) -> Result<PathBuf> {
        let output = self.settings.output_path();
        let file_name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let temporary = self
            .settings
            .intermediate_folder()
            .join(format!("{file_name}.tmp"));

        log::info!("Generating database {}", output.display());
        write_database(data, streams, &temporary).await?;
        fs::move_file(&temporary, output).await?;

        Ok(tracked.track(output, TrackedFileType::BuiltOutput))
    }

    async fn check_file_sizes(&self, database_path: &Path, transfers: &[FileTransfer]) {
        let mut candidates = vec![(database_path.to_path_buf(), "database")];
        candidates.extend(
            transfers
                .iter()
                .filter(|t| t.destination.extension().is_some_and(|e| e == "cab"))
                .map(|t| (t.source.clone(), "cabinet")),
        );

        for (path, kind) in candidates {
            let Ok(metadata) = tokio::fs::metadata(&path).await else {
                continue;
            };
            if metadata.len() > MAX_INSTALLER_FILE_SIZE {
                self.messaging.warning(
                    None,
                    Message::WindowsInstallerFileTooLarge {
                        path,
                        kind: kind.to_string(),
                    },
                );
            }
        }
    }
}

fn has_media(section: &Section) -> bool {
    section.symbols_of(&SymbolKind::Media).next().is_some()
        || section.symbols_of(&SymbolKind::MediaTemplate).next().is_some()
}

/// Identifiers exempt from modularization.
fn suppressed_modularization(section: &Section) -> BTreeSet<String> {
    section
        .symbols_of(&SymbolKind::SuppressModularization)
        .map(|symbol| {
            symbol
                .text("Name")
                .map(|n| n.into_owned())
                .unwrap_or_else(|| symbol.id().to_string())
        })
        .collect()
}

fn add_stream_row(
    data: &mut WindowsInstallerData,
    table_definitions: &TableDefinitions,
    name: &str,
    path: &Path,
) {
    let Some(definition) = table_definitions.get(STREAMS_TABLE) else {
        return;
    };
    let table = data.ensure_table(definition);
    let row = table.create_row(None);
    row.set(0, Some(Value::from(name)));
    row.set(1, Some(Value::from(path.to_string_lossy().into_owned())));
}
