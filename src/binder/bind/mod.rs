//! Bind stages and the [`Binder`] that runs them.
//!
//! Each submodule owns one stage. Stages take the section and a
//! [`Messaging`](crate::binder::Messaging) sink and never stop at the first
//! problem; [`Binder::bind`] checks for errors between stages.

pub mod cabinets;
pub mod collect;
pub mod components;
pub mod dependencies;
pub mod directories;
pub mod layout;
pub mod media;
mod orchestrator;
pub mod properties;
mod result;
pub mod schema;
pub mod sequence;
pub mod summary;
pub mod tags;
pub mod tracking;
pub mod update;

pub use orchestrator::Binder;
pub use result::{BindResult, FileTransfer};
pub use tracking::{TrackedEntry, TrackingReport, read_tracking};
