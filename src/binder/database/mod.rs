//! Table model production and database output.
//!
//! - [`materialize`] - symbols to table rows
//! - [`modularize`] - module identifier suffixing
//! - [`merge`] - merge module extraction and table folding
//! - [`transforms`] - patch transform facades and updates
//! - [`instances`] - instance transforms of a package
//! - [`generate`] - validation rows, streams, the database and debug database

pub mod generate;
pub mod instances;
pub mod materialize;
pub mod merge;
pub mod modularize;
pub mod transforms;
