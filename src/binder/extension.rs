//! Binder extension hooks.
//!
//! Extensions are registered on the [`Binder`](super::Binder) in order and
//! every hook is invoked in that order. Hooks that answer a question
//! ([`BinderExtension::resolve_cabinet`], [`BinderExtension::resolve_media`],
//! [`BinderExtension::try_process_symbol`]) stop at the first extension that
//! answers.

use super::{
    Result,
    bind::BindResult,
    data::{FileFacade, Section, Symbol, TableDefinition, TableDefinitions, WindowsInstallerData},
    messaging::Messaging,
    settings::BindSettings,
};
use std::path::{Path, PathBuf};

/// Shared state handed to [`BinderExtension::pre_bind`].
#[derive(Clone, Debug)]
pub struct BindContext {
    pub settings: BindSettings,
    pub messaging: Messaging,
}

/// What to do with a resolved cabinet path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CabinetBuildOption {
    /// Build the cabinet at the resolved path and copy it to the layout.
    BuildAndCopy,
    /// Build the cabinet at the resolved path and move it to the layout.
    BuildAndMove,
    /// The cabinet at the resolved path is current; copy it as-is.
    Copy,
}

/// Answer of [`BinderExtension::resolve_cabinet`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedCabinet {
    pub path: PathBuf,
    pub build_option: CabinetBuildOption,
}

/// Capability interface of a binder extension.
///
/// Every method has a no-op default so an extension implements only the
/// hooks it cares about.
pub trait BinderExtension: Send {
    /// Table definitions contributed by this extension.
    fn table_definitions(&self) -> Vec<TableDefinition> {
        Vec::new()
    }

    fn pre_bind(&mut self, _context: &BindContext) {}

    /// Called once after delayed fields are resolved and before component
    /// GUIDs are finalized. File fields changed here are picked up again.
    fn symbols_finalized(&mut self, _section: &mut Section) {}

    fn resolve_cabinet(
        &mut self,
        _cabinet_path: &Path,
        _files: &[FileFacade],
    ) -> Option<ResolvedCabinet> {
        None
    }

    /// Layout directory for the content of `media`.
    fn resolve_media(
        &mut self,
        _media: &Symbol,
        _media_layout_directory: Option<&str>,
        _layout_directory: &Path,
    ) -> Option<PathBuf> {
        None
    }

    /// Emits `symbol` into `data` if this extension owns its kind.
    fn try_process_symbol(
        &mut self,
        _section: &Section,
        _symbol: &Symbol,
        _data: &mut WindowsInstallerData,
        _table_definitions: &TableDefinitions,
    ) -> bool {
        false
    }

    /// Called once the database and all outputs exist.
    fn post_bind(&mut self, _result: &BindResult) -> Result<()> {
        Ok(())
    }
}
