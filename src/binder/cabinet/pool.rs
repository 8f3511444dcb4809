//! Parallel cabinet creation.
//!
//! Each cabinet is an independent unit of work. Work items run on the
//! blocking pool, bounded by a semaphore sized from the configured thread
//! count, and report back through the join set.

use super::{CabinetCodec, CabinetMember};
use crate::binder::{
    Error, Result,
    extension::CabinetBuildOption,
    messaging::{Message, Messaging},
    settings::CompressionLevel,
    utils::checksum::Fingerprint,
};
use std::{path::PathBuf, sync::Arc};
use tokio::{sync::Semaphore, task::JoinSet};

/// A cabinet to produce.
#[derive(Clone, Debug)]
pub struct CabinetWorkItem {
    /// Cabinet name as it appears in the `Media` table, without `#`.
    pub cabinet_name: String,
    pub disk_id: u32,
    /// Where the cabinet is built (or found, for [`CabinetBuildOption::Copy`]).
    pub path: PathBuf,
    pub build_option: CabinetBuildOption,
    pub members: Vec<CabinetMember>,
    pub level: CompressionLevel,
}

/// Outcome of a [`CabinetWorkItem`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedCabinet {
    pub cabinet_name: String,
    pub disk_id: u32,
    pub path: PathBuf,
    pub build_option: CabinetBuildOption,
    /// True when an existing cabinet was used without recompressing.
    pub reused: bool,
}

/// Content fingerprint of a cabinet's member set.
///
/// Covers the compression level and, per member, the entry name, source
/// file name, size, version and the digest of the bytes on disk. Fails when
/// a member cannot be read.
pub fn cabinet_fingerprint(members: &[CabinetMember], level: CompressionLevel) -> Result<String> {
    let mut fingerprint = Fingerprint::new();
    fingerprint.field(level.as_str());
    for member in members {
        fingerprint
            .field(&member.name)
            .field(member.source.file_name().map(|n| n.as_encoded_bytes()).unwrap_or_default())
            .field(member.size.to_le_bytes())
            .field(member.version.as_deref().unwrap_or_default())
            .file(&member.source)?;
    }
    Ok(fingerprint.finish())
}

/// Creates every cabinet in `items`, at most `thread_count` at a time.
///
/// Failures are written to `messaging` as [`Message::CabinetCreationFailed`];
/// only successfully produced cabinets are returned, sorted by disk id.
pub async fn create_cabinets(
    items: Vec<CabinetWorkItem>,
    codec: Arc<dyn CabinetCodec>,
    thread_count: usize,
    messaging: &Messaging,
) -> Vec<CreatedCabinet> {
    let semaphore = Arc::new(Semaphore::new(thread_count.max(1)));
    let mut join_set = JoinSet::new();

    for item in items {
        let codec = Arc::clone(&codec);
        let semaphore = Arc::clone(&semaphore);
        let cabinet_name = item.cabinet_name.clone();

        join_set.spawn(async move {
            let result = create_cabinet(item, codec, semaphore).await;
            (cabinet_name, result)
        });
    }

    let mut created = Vec::new();
    while let Some(join_result) = join_set.join_next().await {
        match join_result {
            Ok((_, Ok(cabinet))) => created.push(cabinet),
            Ok((cabinet, Err(e))) => messaging.error(
                None,
                Message::CabinetCreationFailed {
                    cabinet,
                    reason: e.to_string(),
                },
            ),
            Err(e) => messaging.error(
                None,
                Message::CabinetCreationFailed {
                    cabinet: "<worker>".to_string(),
                    reason: e.to_string(),
                },
            ),
        }
    }

    created.sort_by_key(|c| c.disk_id);
    created
}

async fn create_cabinet(
    item: CabinetWorkItem,
    codec: Arc<dyn CabinetCodec>,
    semaphore: Arc<Semaphore>,
) -> Result<CreatedCabinet> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| Error::GenericError(e.to_string()))?;

    let reused = item.build_option == CabinetBuildOption::Copy && item.path.is_file();
    if reused {
        log::debug!(
            "Reusing cabinet {} from {}",
            item.cabinet_name,
            item.path.display()
        );
    } else {
        log::debug!(
            "Creating cabinet {} with {} file(s)",
            item.cabinet_name,
            item.members.len()
        );
        let path = item.path.clone();
        let members = item.members.clone();
        let level = item.level;
        tokio::task::spawn_blocking(move || {
            // Built under a temporary name, then renamed into place.
            let partial = path.with_extension("partial");
            codec.create(&partial, &members, level)?;
            std::fs::rename(&partial, &path).map_err(Error::IoError)
        })
        .await??;
    }

    Ok(CreatedCabinet {
        cabinet_name: item.cabinet_name,
        disk_id: item.disk_id,
        path: item.path,
        build_option: item.build_option,
        reused,
    })
}
