//! Image description index: dedup, multi-variant ingestion, ranked search,
//! and the snapshot lifecycle around a [`recall_vector_store::Index`].

mod config;
mod dedup;
mod error;
mod manager;
mod types;
mod upstream;

pub use config::{
    ManagerConfig, DEFAULT_SNAPSHOT_DIR, DEFAULT_TOP_K, DEFAULT_UPSTREAM_TIMEOUT,
    DEFAULT_VARIANTS_PER_ITEM, MAX_VARIANTS_PER_ITEM,
};
pub use dedup::DedupGuard;
pub use error::{IndexError, Result, Stage, UpstreamError};
pub use manager::IndexManager;
pub use types::{
    AddResult, CheckpointOutcome, ListEntry, SearchHit, SearchResult, SkipReason, Stats,
};
pub use upstream::{Describer, Embedder};

// Re-export store types for convenience
pub use recall_vector_store::{MetadataRecord, Metric};
