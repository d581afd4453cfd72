use crate::config::ManagerConfig;
use crate::dedup::DedupGuard;
use crate::error::{IndexError, Result, Stage, UpstreamError};
use crate::types::{
    AddResult, CheckpointOutcome, ListEntry, SearchHit, SearchResult, SkipReason, Stats,
};
use crate::upstream::{Describer, Embedder};
use async_trait::async_trait;
use bytes::Bytes;
use recall_vector_store::{
    metadata_path, normalize, snapshot_exists, vectors_path, Index, MetadataRecord, Metric,
    VectorStoreError,
};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

const REJECTED_SUFFIX: &str = "rejected";

/// Owns the index and is the only way to read or change it.
///
/// `add` and `search` hold the index lock for their whole duration, so a
/// reader never sees the vector store and the ledger at different lengths.
pub struct IndexManager {
    config: ManagerConfig,
    describer: Arc<dyn Describer>,
    embedder: Arc<dyn Embedder>,
    index: Mutex<Index>,
    read_only: bool,
}

/// Collaborator of a read-only manager; never called.
struct Detached;

#[async_trait]
impl Describer for Detached {
    async fn describe(&self, _image: &[u8], _variation: u8) -> UpstreamResult<String> {
        Err(UpstreamError::Config("no describer attached".to_string()))
    }
}

#[async_trait]
impl Embedder for Detached {
    fn dimension(&self) -> usize {
        0
    }

    async fn embed(&self, _text: &str) -> UpstreamResult<Vec<f32>> {
        Err(UpstreamError::Config("no embedder attached".to_string()))
    }
}

struct Variant {
    variant: u8,
    text: String,
    vector: Vec<f32>,
}

impl IndexManager {
    /// Restores the snapshot under `config.snapshot_dir`, or starts empty.
    ///
    /// A snapshot keeps the metric it was built with; a differing
    /// `config.metric` is logged and ignored. A snapshot that cannot be read,
    /// or whose dimension differs from the embedder's, is renamed to
    /// `*.rejected` and replaced by an empty index.
    pub async fn open(
        mut config: ManagerConfig,
        describer: Arc<dyn Describer>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        config.validate()?;
        let dimension = embedder.dimension();
        if dimension == 0 {
            return Err(IndexError::InvalidConfig(
                "embedder reports dimension 0".to_string(),
            ));
        }

        let index = load_or_create(&config.snapshot_dir, config.metric, dimension).await?;
        config.metric = index.metric();
        Ok(Self {
            config,
            describer,
            embedder,
            index: Mutex::new(index),
            read_only: false,
        })
    }

    /// Opens the snapshot for `stats` and `list` without upstream backends.
    ///
    /// Metric and dimension come from the snapshot. Without one the index is
    /// empty with `config.metric` and `dimension` (0 when unknown). Nothing is
    /// renamed or written; `add`, `search`, `describe` and `checkpoint` fail
    /// with [`IndexError::ReadOnly`].
    pub async fn open_read_only(
        mut config: ManagerConfig,
        dimension: Option<usize>,
    ) -> Result<Self> {
        config.validate()?;
        let dir = config.snapshot_dir.clone();
        let index = if snapshot_exists(&dir) {
            match Index::load(&dir).await {
                Ok(index) => index,
                Err(err) => {
                    log::warn!("Error loading index from {}: {err}", dir.display());
                    Index::new(dimension.unwrap_or(0), config.metric)
                }
            }
        } else {
            Index::new(dimension.unwrap_or(0), config.metric)
        };
        config.metric = index.metric();
        Ok(Self {
            config,
            describer: Arc::new(Detached),
            embedder: Arc::new(Detached),
            index: Mutex::new(index),
            read_only: true,
        })
    }

    fn ensure_writable(&self, operation: &'static str) -> Result<()> {
        if self.read_only {
            return Err(IndexError::ReadOnly(operation));
        }
        Ok(())
    }

    #[must_use]
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Describes, embeds and indexes every variant of one image.
    ///
    /// Either all variants land in the index or none do.
    pub async fn add(&self, image: Bytes, label: &str) -> Result<AddResult> {
        self.ensure_writable("add")?;
        let mut index = self.index.lock().await;

        let source_identity = DedupGuard::extract_identity(label);
        if let Some(existing_identity) = source_identity {
            if DedupGuard::is_duplicate(label, index.ledger()) {
                log::info!("Skipping '{label}': source {existing_identity} already indexed");
                return Ok(AddResult::Duplicate {
                    added: false,
                    source_label: label.to_string(),
                    reason: SkipReason::Duplicate,
                    existing_identity,
                    index_size: index.len(),
                });
            }
        }

        log::info!(
            "Indexing '{label}' ({} bytes, {} variants)",
            image.len(),
            self.config.variants_per_item
        );
        let variants = self.generate_variants(&image, index.metric()).await?;

        let entries = variants
            .into_iter()
            .map(|v| {
                (
                    v.vector,
                    MetadataRecord {
                        source_identity,
                        source_label: label.to_string(),
                        text: v.text,
                        variant: v.variant,
                    },
                )
            })
            .collect();
        let added = index.append_item(entries)?;

        log::info!(
            "Indexed '{label}': {} variants, index size {}",
            added.len(),
            index.len()
        );
        Ok(AddResult::Added {
            added: true,
            source_label: label.to_string(),
            source_identity,
            variants_added: added.len(),
            index_size: index.len(),
        })
    }

    /// Runs the per-variant describe/embed pipelines concurrently.
    /// The first failure aborts the rest; results come back in variant order.
    async fn generate_variants(&self, image: &Bytes, metric: Metric) -> Result<Vec<Variant>> {
        let count = self.config.variants_per_item;
        let timeout = self.config.upstream_timeout;

        let mut tasks = JoinSet::new();
        for variant in 1..=count {
            let describer = Arc::clone(&self.describer);
            let embedder = Arc::clone(&self.embedder);
            let image = image.clone();
            tasks.spawn(async move {
                let (text, vector) = describe_and_embed(
                    describer.as_ref(),
                    embedder.as_ref(),
                    &image,
                    variant,
                    timeout,
                    metric,
                )
                .await?;
                Ok::<_, IndexError>(Variant {
                    variant,
                    text,
                    vector,
                })
            });
        }

        let mut variants = Vec::with_capacity(usize::from(count));
        while let Some(joined) = tasks.join_next().await {
            let variant = joined.map_err(|e| {
                IndexError::Internal(format!("variant task did not complete: {e}"))
            })??;
            log::debug!("Variant {}: {}", variant.variant, variant.text);
            variants.push(variant);
        }
        variants.sort_by_key(|v| v.variant);
        Ok(variants)
    }

    /// Ranks indexed variants against a fresh description of `image`.
    pub async fn search(&self, image: &[u8], k: usize) -> Result<SearchResult> {
        self.ensure_writable("search")?;
        let index = self.index.lock().await;
        if index.is_empty() {
            return Err(IndexError::EmptyIndex);
        }

        let metric = index.metric();
        let (query_description, vector) = describe_and_embed(
            self.describer.as_ref(),
            self.embedder.as_ref(),
            image,
            0,
            self.config.upstream_timeout,
            metric,
        )
        .await?;

        let neighbors = index.store().search(&vector, k)?;
        let mut results = Vec::with_capacity(neighbors.len());
        for (i, (position, score)) in neighbors.into_iter().enumerate() {
            let record = index.ledger().get(position)?;
            results.push(SearchHit {
                rank: i + 1,
                position,
                source_label: record.source_label.clone(),
                source_identity: record.source_identity,
                variant: record.variant,
                text: record.text.clone(),
                similarity_percentage: metric.similarity_percentage(score),
                raw_score: score,
            });
        }

        log::debug!(
            "Search returned {} of {} vectors (k={k})",
            results.len(),
            index.len()
        );
        Ok(SearchResult {
            query_description,
            metric,
            results,
        })
    }

    /// Neutral description of `image`; the index is not touched.
    pub async fn describe(&self, image: &[u8]) -> Result<String> {
        self.ensure_writable("describe")?;
        with_timeout(
            Stage::Describer,
            self.config.upstream_timeout,
            self.describer.describe(image, 0),
        )
        .await?
        .map_err(|err| IndexError::DescriberFailure(err.to_string()))
    }

    pub async fn stats(&self) -> Stats {
        let index = self.index.lock().await;
        Stats {
            size: index.len(),
            metadata_count: index.ledger().len(),
            dimension: index.dimension(),
            metric: index.metric(),
            sources: DedupGuard::known_identities(index.ledger()).len(),
        }
    }

    pub async fn list(&self) -> Vec<ListEntry> {
        let index = self.index.lock().await;
        index
            .ledger()
            .iter()
            .map(|(position, record)| ListEntry {
                position,
                source_label: record.source_label.clone(),
                source_identity: record.source_identity,
                variant: record.variant,
                text: record.text.clone(),
            })
            .collect()
    }

    /// Writes the snapshot unless the index is empty.
    pub async fn checkpoint(&self) -> Result<CheckpointOutcome> {
        self.ensure_writable("checkpoint")?;
        let index = self.index.lock().await;
        if index.is_empty() {
            log::debug!("Index is empty, skipping snapshot");
            return Ok(CheckpointOutcome::SkippedEmpty);
        }

        index.save(&self.config.snapshot_dir).await?;
        log::info!(
            "Saved index with {} vectors to {}",
            index.len(),
            self.config.snapshot_dir.display()
        );
        Ok(CheckpointOutcome::Saved {
            size: index.len(),
            path: self.config.snapshot_dir.clone(),
        })
    }

    /// Final checkpoint. A failed save is logged, never returned.
    pub async fn shutdown(&self) {
        if self.read_only {
            return;
        }
        if let Err(err) = self.checkpoint().await {
            log::error!("Error saving index: {err}");
        }
    }
}

async fn load_or_create(dir: &Path, metric: Metric, dimension: usize) -> Result<Index> {
    if !snapshot_exists(dir) {
        log::info!("Created new {metric} index (dimension {dimension})");
        return Ok(Index::new(dimension, metric));
    }

    match Index::load(dir).await {
        Ok(index) if index.dimension() == dimension => {
            if index.metric() != metric {
                log::warn!(
                    "Keeping {} metric of snapshot at {}, configured {metric} ignored",
                    index.metric(),
                    dir.display()
                );
            }
            log::info!(
                "Loaded index with {} vectors from {}",
                index.len(),
                dir.display()
            );
            Ok(index)
        }
        Ok(index) => {
            log::warn!(
                "Snapshot at {} has dimension {}, embedder produces {dimension}. Setting it aside.",
                dir.display(),
                index.dimension()
            );
            set_aside(dir).await?;
            Ok(Index::new(dimension, metric))
        }
        Err(err) => {
            log::warn!(
                "Error loading index from {}: {err}. Setting it aside and creating new index.",
                dir.display()
            );
            set_aside(dir).await?;
            Ok(Index::new(dimension, metric))
        }
    }
}

/// Renames the snapshot files to `<name>.rejected` so a later save cannot
/// overwrite them.
async fn set_aside(dir: &Path) -> Result<()> {
    for path in [vectors_path(dir), metadata_path(dir)] {
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            continue;
        }
        let mut rejected = path.clone().into_os_string();
        rejected.push(format!(".{REJECTED_SUFFIX}"));
        tokio::fs::rename(&path, &rejected)
            .await
            .map_err(VectorStoreError::from)?;
        log::warn!("Moved {} to {}", path.display(), rejected.to_string_lossy());
    }
    Ok(())
}

async fn describe_and_embed(
    describer: &dyn Describer,
    embedder: &dyn Embedder,
    image: &[u8],
    variation: u8,
    timeout: Duration,
    metric: Metric,
) -> Result<(String, Vec<f32>)> {
    let text = with_timeout(
        Stage::Describer,
        timeout,
        describer.describe(image, variation),
    )
    .await?
    .map_err(|err| IndexError::DescriberFailure(err.to_string()))?;

    let mut vector = with_timeout(Stage::Embedder, timeout, embedder.embed(&text))
        .await?
        .map_err(|err| IndexError::EmbedderFailure(err.to_string()))?;
    if metric.requires_normalized() {
        normalize(&mut vector);
    }
    Ok((text, vector))
}

async fn with_timeout<T>(
    stage: Stage,
    timeout: Duration,
    fut: impl Future<Output = T>,
) -> Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| IndexError::UpstreamTimeout {
            stage,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })
}
