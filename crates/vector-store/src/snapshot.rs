//! On-disk snapshot of an [`Index`].
//!
//! A snapshot is a directory holding two artifacts written together:
//!
//! - `vectors.bin`: `RCV1` magic, `u32` format version, `u8` metric tag,
//!   `u32` dimension, `u64` count, then `count * dimension` little-endian `f32`.
//! - `metadata.json`: schema version, metric, dimension, count and the records.
//!
//! Both carry the metric, dimension and count so a mismatched pair is
//! rejected instead of misread.

use crate::error::{Result, VectorStoreError};
use crate::index::Index;
use crate::ledger::{MetadataLedger, MetadataRecord};
use crate::metric::Metric;
use crate::store::VectorStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

const VECTORS_MAGIC: &[u8; 4] = b"RCV1";
const VECTORS_FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 1 + 4 + 8;

pub const VECTORS_FILE_NAME: &str = "vectors.bin";
pub const METADATA_FILE_NAME: &str = "metadata.json";

#[derive(Debug, Serialize)]
struct PersistedMetadataRef<'a> {
    schema_version: u32,
    metric: Metric,
    dimension: usize,
    count: usize,
    records: &'a [MetadataRecord],
}

#[derive(Debug, Deserialize)]
struct PersistedMetadata {
    schema_version: u32,
    metric: Metric,
    dimension: usize,
    count: usize,
    records: Vec<MetadataRecord>,
}

#[must_use]
pub fn vectors_path(dir: &Path) -> PathBuf {
    dir.join(VECTORS_FILE_NAME)
}

#[must_use]
pub fn metadata_path(dir: &Path) -> PathBuf {
    dir.join(METADATA_FILE_NAME)
}

/// True when either artifact is present. A half-written snapshot still
/// counts so that loading it reports corruption rather than "missing".
#[must_use]
pub fn snapshot_exists(dir: &Path) -> bool {
    vectors_path(dir).exists() || metadata_path(dir).exists()
}

impl Index {
    /// Writes both artifacts to `dir`, each through a temp file and rename.
    pub async fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let vectors = encode_vectors(self.store())?;
        let metadata = serde_json::to_vec_pretty(&PersistedMetadataRef {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            metric: self.metric(),
            dimension: self.dimension(),
            count: self.len(),
            records: self.ledger().records(),
        })?;

        let vectors_path = vectors_path(dir);
        let metadata_path = metadata_path(dir);
        let vectors_tmp = vectors_path.with_extension("bin.tmp");
        let metadata_tmp = metadata_path.with_extension("json.tmp");

        tokio::fs::write(&vectors_tmp, &vectors).await?;
        tokio::fs::write(&metadata_tmp, &metadata).await?;
        tokio::fs::rename(&vectors_tmp, &vectors_path).await?;
        tokio::fs::rename(&metadata_tmp, &metadata_path).await?;

        log::debug!(
            "Wrote snapshot to {} ({} vectors, {} bytes)",
            dir.display(),
            self.len(),
            vectors.len()
        );
        Ok(())
    }

    /// Reads a snapshot written by [`Index::save`].
    ///
    /// A missing directory surfaces as `IoError(NotFound)`; every structural
    /// problem surfaces as `CorruptSnapshot`.
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let vector_bytes = tokio::fs::read(vectors_path(dir)).await?;
        let metadata_bytes = tokio::fs::read(metadata_path(dir)).await?;

        let decoded = decode_vectors(&vector_bytes)?;
        let persisted: PersistedMetadata = serde_json::from_slice(&metadata_bytes)
            .map_err(|err| VectorStoreError::CorruptSnapshot(format!("metadata: {err}")))?;

        if persisted.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(VectorStoreError::CorruptSnapshot(format!(
                "Unsupported snapshot schema_version {} (expected {SNAPSHOT_SCHEMA_VERSION})",
                persisted.schema_version
            )));
        }
        if persisted.metric != decoded.metric
            || persisted.dimension != decoded.dimension
            || persisted.count != decoded.count
        {
            return Err(VectorStoreError::CorruptSnapshot(format!(
                "metadata header ({}, dim {}, {} entries) disagrees with vectors ({}, dim {}, {} entries)",
                persisted.metric,
                persisted.dimension,
                persisted.count,
                decoded.metric,
                decoded.dimension,
                decoded.count
            )));
        }

        let store = VectorStore::from_raw(
            decoded.dimension,
            decoded.metric,
            decoded.count,
            decoded.data,
        )?;
        Self::from_parts(store, MetadataLedger::from_records(persisted.records))
    }
}

struct DecodedVectors {
    metric: Metric,
    dimension: usize,
    count: usize,
    data: Vec<f32>,
}

fn encode_vectors(store: &VectorStore) -> Result<Vec<u8>> {
    let dimension = u32::try_from(store.dimension()).map_err(|_| {
        VectorStoreError::CorruptSnapshot(format!("dimension {} too large", store.dimension()))
    })?;
    let count = store.len() as u64;
    let data = store.as_slice();

    let mut out = Vec::with_capacity(HEADER_LEN + data.len() * 4);
    out.extend_from_slice(VECTORS_MAGIC);
    out.extend_from_slice(&VECTORS_FORMAT_VERSION.to_le_bytes());
    out.push(store.metric().tag());
    out.extend_from_slice(&dimension.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    for v in data {
        out.extend_from_slice(&v.to_le_bytes());
    }
    Ok(out)
}

fn decode_vectors(bytes: &[u8]) -> Result<DecodedVectors> {
    let corrupt = VectorStoreError::CorruptSnapshot;

    if bytes.len() < HEADER_LEN {
        return Err(corrupt(format!(
            "vector blob too short ({} bytes)",
            bytes.len()
        )));
    }
    if &bytes[0..4] != VECTORS_MAGIC {
        return Err(corrupt("bad vector blob magic".to_string()));
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != VECTORS_FORMAT_VERSION {
        return Err(corrupt(format!(
            "Unsupported vector blob version {version} (expected {VECTORS_FORMAT_VERSION})"
        )));
    }
    let metric = Metric::from_tag(bytes[8])
        .ok_or_else(|| corrupt(format!("unknown metric tag {}", bytes[8])))?;
    let dimension = u32::from_le_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]) as usize;
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&bytes[13..21]);
    let count = usize::try_from(u64::from_le_bytes(count_bytes))
        .map_err(|_| corrupt("vector count does not fit in memory".to_string()))?;

    let expected_len = count
        .checked_mul(dimension)
        .and_then(|floats| floats.checked_mul(4))
        .and_then(|body| body.checked_add(HEADER_LEN))
        .ok_or_else(|| corrupt(format!("{count} x {dimension} overflows")))?;
    if bytes.len() != expected_len {
        return Err(corrupt(format!(
            "vector blob is {} bytes, expected {expected_len}",
            bytes.len()
        )));
    }

    let data = bytes[HEADER_LEN..]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(DecodedVectors {
        metric,
        dimension,
        count,
        data,
    })
}
