//! Installer database binder.
//!
//! Turns a linked and resolved [`Intermediate`] into an installer database,
//! its cabinets and the list of files that still need to be laid out.
//!
//! # Architecture
//!
//! - [`data`] - symbols, sections, facades and the table model
//! - [`settings`] - [`BindSettings`] and its builder
//! - [`messaging`] - accumulating diagnostics
//! - [`extension`] - hook points for external collaborators
//! - [`bind`] - the [`Binder`] and its stages
//! - [`cabinet`] - cabinet codec, cache and worker pool
//! - [`database`] - table materialization, modularization, merging and output
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_msi::binder::{Binder, Intermediate, SettingsBuilder};
//!
//! # async fn example() -> kodegen_bundler_msi::binder::Result<()> {
//! let settings = SettingsBuilder::new()
//!     .intermediate_folder("obj")
//!     .output_path("bin/product.msi")
//!     .build()?;
//!
//! let intermediate = Intermediate::load("obj/product.wixipl.json".as_ref())?;
//! let mut binder = Binder::new(settings);
//! match binder.bind(intermediate, Vec::new()).await? {
//!     Some(result) => println!("Built {}", result.database_path.display()),
//!     None => eprintln!("{} error(s)", binder.messaging().error_count()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod bind;
pub mod cabinet;
pub mod data;
pub mod database;
pub mod error;
pub mod extension;
pub mod messaging;
pub mod settings;
pub(crate) mod utils;

pub use bind::{BindResult, Binder, FileTransfer, TrackingReport, read_tracking};
pub use cabinet::{CabinetCodec, TarGzCodec};
pub use data::{
    Intermediate, OutputType, Section, SectionType, SourceLineNumber, SubStorage, Symbol,
    SymbolKind, Value, WindowsInstallerData,
};
pub use error::{Context, Error, ErrorExt, Result};
pub use extension::{BindContext, BinderExtension, CabinetBuildOption, ResolvedCabinet};
pub use messaging::{Diagnostic, Message, Messaging, Severity};
pub use settings::{BindSettings, CompressionLevel, SettingsBuilder};
