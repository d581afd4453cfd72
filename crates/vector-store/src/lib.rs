//! # Recall Vector Store
//!
//! Exact vector storage and similarity search for image-description embeddings.
//!
//! ## Features
//!
//! - **Exact top-k search** by brute-force scan with bounded-heap selection
//! - **Two metrics** (squared Euclidean, inner product on unit vectors) behind one [`Metric`] enum
//! - **Positional metadata** kept in step with the vectors by [`Index`]
//! - **Persistent snapshots** as a binary vector blob plus a JSON metadata file
//!
//! ## Architecture
//!
//! ```text
//! Index
//!   │
//!   ├──> VectorStore      (row-major f32 buffer, position = row)
//!   │      └─> search(query, k) -> [(position, score)]
//!   │
//!   ├──> MetadataLedger   (record at the same position)
//!   │
//!   └──> Snapshot
//!          └─> vectors.bin + metadata.json
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use recall_vector_store::{Index, MetadataRecord, Metric};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut index = Index::new(3, Metric::Euclidean);
//!     index.append_item(vec![(
//!         vec![0.1, 0.2, 0.3],
//!         MetadataRecord {
//!             source_identity: Some(1),
//!             source_label: "1_pasta.jpg".to_string(),
//!             text: "a plate of pasta".to_string(),
//!             variant: 1,
//!         },
//!     )])?;
//!
//!     for (position, score) in index.store().search(&[0.1, 0.2, 0.25], 5)? {
//!         let record = index.ledger().get(position)?;
//!         println!("{}: {:.3}", record.source_label, score);
//!     }
//!
//!     index.save(".recall").await?;
//!     Ok(())
//! }
//! ```

mod error;
mod index;
mod ledger;
mod metric;
mod snapshot;
mod store;

pub use error::{Result, VectorStoreError};
pub use index::Index;
pub use ledger::{MetadataLedger, MetadataRecord};
pub use metric::{normalize, Metric};
pub use snapshot::{
    metadata_path, snapshot_exists, vectors_path, METADATA_FILE_NAME, SNAPSHOT_SCHEMA_VERSION,
    VECTORS_FILE_NAME,
};
pub use store::{Position, VectorStore};
