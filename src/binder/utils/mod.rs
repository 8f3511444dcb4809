//! Shared helpers for binder stages.

pub mod checksum;
pub mod fs;
pub mod version_info;
