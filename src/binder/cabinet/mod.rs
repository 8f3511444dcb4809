//! Cabinet creation.
//!
//! - [`codec`] - the [`CabinetCodec`] contract and the default tar.gz codec
//! - [`pool`] - bounded parallel creation with cache reuse

mod codec;
mod pool;

pub use codec::{CabinetCodec, CabinetMember, TarGzCodec};
pub use pool::{CabinetWorkItem, CreatedCabinet, cabinet_fingerprint, create_cabinets};
