//! Configuration structures for bind operations.
//!
//! [`BindSettings`] carries everything a bind needs besides the intermediate
//! itself and is constructed through [`SettingsBuilder`].

mod builder;
mod compression;
mod core;

pub use builder::SettingsBuilder;
pub use compression::CompressionLevel;
pub use core::BindSettings;
