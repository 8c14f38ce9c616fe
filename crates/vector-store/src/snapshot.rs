//! Durable snapshots of an [`ImageCatalog`].
//!
//! A snapshot is two artifacts: a binary index file holding every vector in position
//! order, and a JSON record file mapping image ids to positions and captions. The index
//! file ends with a SHA-256 digest of its contents; the record file stores the same
//! digest, which ties a record file to the exact index file it was written with.

use crate::catalog::ImageCatalog;
use crate::error::{Result, VectorStoreError};
use crate::flat_index::FlatIndex;
use crate::paths::{tmp_path, SnapshotPaths};
use crate::records::RecordStore;
use crate::snapshot_lock::acquire_snapshot_lock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tokio::io::AsyncWriteExt;

pub const RECORDS_SCHEMA_VERSION: u32 = 1;
pub const INDEX_FORMAT_VERSION: u32 = 1;

const INDEX_MAGIC: &[u8; 4] = b"IFX1";
const HEADER_LEN: usize = 4 + 4 + 4 + 8;
const DIGEST_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecords {
    schema_version: u32,
    dimension: usize,
    index_sha256: String,
    records: BTreeMap<String, PersistedRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecord {
    position: usize,
    #[serde(default)]
    caption: Option<String>,
}

/// Write both artifacts next to their final paths, then move them into place.
///
/// Nothing at the final paths is touched until both temp files are fully written and
/// synced. While the pair is being swapped the previous index is kept as
/// [`SnapshotPaths::index_backup`]; a failed swap puts it back, and a crash mid-swap is
/// recovered by [`load_snapshot`].
pub async fn save_snapshot(catalog: &ImageCatalog, paths: &SnapshotPaths) -> Result<()> {
    log::info!(
        "Saving snapshot ({} images) to {:?}",
        catalog.len(),
        paths.index.parent().unwrap_or_else(|| Path::new("."))
    );
    let _lock = acquire_snapshot_lock(paths.lock_file()).await?;

    for path in [&paths.index, &paths.records] {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let (index_bytes, digest) = encode_index(catalog.index());
    let persisted = PersistedRecords {
        schema_version: RECORDS_SCHEMA_VERSION,
        dimension: catalog.dimension(),
        index_sha256: to_hex(&digest),
        records: catalog
            .records()
            .iter()
            .map(|record| {
                (
                    record.image_id.clone(),
                    PersistedRecord {
                        position: record.position,
                        caption: record.caption.clone(),
                    },
                )
            })
            .collect(),
    };
    let records_bytes = serde_json::to_vec_pretty(&persisted).map_err(std::io::Error::from)?;

    let index_tmp = tmp_path(&paths.index);
    let records_tmp = tmp_path(&paths.records);
    let written = async {
        write_synced(&index_tmp, &index_bytes).await?;
        write_synced(&records_tmp, &records_bytes).await
    }
    .await;
    if let Err(err) = written {
        let _ = tokio::fs::remove_file(&index_tmp).await;
        let _ = tokio::fs::remove_file(&records_tmp).await;
        return Err(err.into());
    }

    let backup = paths.index_backup();
    let had_index = tokio::fs::try_exists(&paths.index).await.unwrap_or(false);
    if had_index {
        if let Err(err) = tokio::fs::rename(&paths.index, &backup).await {
            let _ = tokio::fs::remove_file(&index_tmp).await;
            let _ = tokio::fs::remove_file(&records_tmp).await;
            return Err(err.into());
        }
    }

    let swapped = async {
        tokio::fs::rename(&index_tmp, &paths.index).await?;
        tokio::fs::rename(&records_tmp, &paths.records).await
    }
    .await;
    if let Err(err) = swapped {
        log::error!(
            "Failed to move snapshot into {}: {err}",
            paths.index.parent().unwrap_or_else(|| Path::new(".")).display()
        );
        let _ = tokio::fs::remove_file(&index_tmp).await;
        let _ = tokio::fs::remove_file(&records_tmp).await;
        if had_index {
            tokio::fs::rename(&backup, &paths.index).await?;
        } else {
            let _ = tokio::fs::remove_file(&paths.index).await;
        }
        return Err(err.into());
    }

    if had_index {
        if let Err(err) = tokio::fs::remove_file(&backup).await {
            log::warn!("Failed to remove {}: {err}", backup.display());
        }
    }
    log::info!("Snapshot saved successfully");
    Ok(())
}

/// Load and cross-check both artifacts.
///
/// When the pair does not load and an index backup is present, a save was interrupted
/// after the index moved but before the record file did. The backup still pairs with
/// the record file on disk, so that pair is loaded instead.
pub async fn load_snapshot(paths: &SnapshotPaths) -> Result<ImageCatalog> {
    let err = match load_pair(paths).await {
        Ok(catalog) => return Ok(catalog),
        Err(err) => err,
    };

    let backup = paths.index_backup();
    if !tokio::fs::try_exists(&backup).await.unwrap_or(false) {
        return Err(err);
    }
    let previous = SnapshotPaths {
        index: backup,
        records: paths.records.clone(),
    };
    match load_pair(&previous).await {
        Ok(catalog) => {
            log::warn!(
                "{err}; recovered the snapshot saved before an interrupted save from {}",
                previous.index.display()
            );
            Ok(catalog)
        }
        Err(_) => Err(err),
    }
}

async fn load_pair(paths: &SnapshotPaths) -> Result<ImageCatalog> {
    log::info!("Loading snapshot from {:?}", paths.index);

    let index_bytes = read_artifact(&paths.index).await?;
    let (index, digest) = decode_index(&index_bytes, &paths.index)?;

    let records_bytes = read_artifact(&paths.records).await?;
    let persisted: PersistedRecords = serde_json::from_slice(&records_bytes)
        .map_err(|err| VectorStoreError::corrupt(&paths.records, err.to_string()))?;
    if persisted.schema_version != RECORDS_SCHEMA_VERSION {
        return Err(VectorStoreError::corrupt(
            &paths.records,
            format!(
                "unsupported schema_version {} (expected {RECORDS_SCHEMA_VERSION})",
                persisted.schema_version
            ),
        ));
    }

    if persisted.dimension != index.dimension() {
        return Err(VectorStoreError::DimensionMismatch {
            expected: persisted.dimension,
            actual: index.dimension(),
        });
    }
    if persisted.records.len() != index.count() {
        return Err(VectorStoreError::InconsistentSnapshot(format!(
            "{} records but {} indexed vectors",
            persisted.records.len(),
            index.count()
        )));
    }
    if !persisted.index_sha256.eq_ignore_ascii_case(&to_hex(&digest)) {
        return Err(VectorStoreError::InconsistentSnapshot(format!(
            "{} was not written together with {}",
            paths.records.display(),
            paths.index.display()
        )));
    }

    let records = rebuild_records(persisted, &index, &paths.records)?;
    let catalog = ImageCatalog::from_parts(records, index)?;
    log::info!("Loaded {} images", catalog.len());
    Ok(catalog)
}

fn rebuild_records(
    persisted: PersistedRecords,
    index: &FlatIndex,
    path: &Path,
) -> Result<RecordStore> {
    let count = index.count();
    let mut slots: Vec<Option<(String, Option<String>)>> = vec![None; count];
    for (image_id, record) in persisted.records {
        let Some(slot) = slots.get_mut(record.position) else {
            return Err(VectorStoreError::corrupt(
                path,
                format!(
                    "position {} of '{image_id}' is outside 0..{count}",
                    record.position
                ),
            ));
        };
        if slot.is_some() {
            return Err(VectorStoreError::corrupt(
                path,
                format!("position {} is assigned twice", record.position),
            ));
        }
        *slot = Some((image_id, record.caption));
    }

    let mut records = RecordStore::new(persisted.dimension)?;
    for (position, slot) in slots.into_iter().enumerate() {
        let (image_id, caption) =
            slot.ok_or(VectorStoreError::PositionNotFound(position))?;
        let vector = index
            .vector(position)
            .ok_or(VectorStoreError::PositionNotFound(position))?
            .to_vec();
        records.insert(image_id, vector, caption)?;
    }
    Ok(records)
}

async fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|err| VectorStoreError::corrupt(path, format!("unreadable: {err}")))
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

fn encode_index(index: &FlatIndex) -> (Vec<u8>, [u8; DIGEST_LEN]) {
    let values = index.count() * index.dimension();
    let mut out = Vec::with_capacity(HEADER_LEN + values * 4 + DIGEST_LEN);
    out.extend_from_slice(INDEX_MAGIC);
    out.extend_from_slice(&INDEX_FORMAT_VERSION.to_le_bytes());
    #[allow(clippy::cast_possible_truncation)]
    let dim = index.dimension() as u32;
    out.extend_from_slice(&dim.to_le_bytes());
    out.extend_from_slice(&(index.count() as u64).to_le_bytes());
    for value in index.values() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    let digest: [u8; DIGEST_LEN] = Sha256::digest(&out).into();
    out.extend_from_slice(&digest);
    (out, digest)
}

fn decode_index(bytes: &[u8], path: &Path) -> Result<(FlatIndex, [u8; DIGEST_LEN])> {
    let corrupt = |reason: &str| VectorStoreError::corrupt(path, reason);

    if bytes.len() < HEADER_LEN + DIGEST_LEN {
        return Err(corrupt("truncated index artifact"));
    }
    let (body, trailer) = bytes.split_at(bytes.len() - DIGEST_LEN);
    let digest: [u8; DIGEST_LEN] = Sha256::digest(body).into();
    if digest.as_slice() != trailer {
        return Err(corrupt("checksum mismatch"));
    }
    if &body[0..4] != INDEX_MAGIC {
        return Err(corrupt("bad magic"));
    }

    let version = read_u32(&body[4..8]);
    if version != INDEX_FORMAT_VERSION {
        return Err(VectorStoreError::corrupt(
            path,
            format!("unsupported format version {version} (expected {INDEX_FORMAT_VERSION})"),
        ));
    }
    let dimension = read_u32(&body[8..12]) as usize;
    if dimension == 0 {
        return Err(corrupt("zero dimension"));
    }
    let count = usize::try_from(read_u64(&body[12..20]))
        .map_err(|_| corrupt("vector count does not fit in memory"))?;

    let expected_len = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| n.checked_add(HEADER_LEN))
        .ok_or_else(|| corrupt("vector count overflows"))?;
    if body.len() != expected_len {
        return Err(VectorStoreError::corrupt(
            path,
            format!(
                "expected {expected_len} bytes for {count} vectors of dimension {dimension}, found {}",
                body.len()
            ),
        ));
    }

    let values: Vec<f32> = body[HEADER_LEN..]
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    let index = FlatIndex::from_flat(dimension, values)
        .map_err(|err| VectorStoreError::corrupt(path, err.to_string()))?;
    Ok((index, digest))
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
