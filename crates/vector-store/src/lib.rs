//! # imgfind vector store
//!
//! Exact nearest-neighbor storage for image embeddings.
//!
//! ## Architecture
//!
//! ```text
//! (image_id, vector, caption)
//!     │
//!     ├──> RecordStore
//!     │      └─> position ⇄ image_id, caption
//!     │
//!     ├──> FlatIndex
//!     │      └─> vectors in position order, squared-L2 top-N
//!     │
//!     └──> Snapshot
//!            └─> index.bin + records.json
//! ```
//!
//! [`ImageCatalog`] keeps the record store and the index in lockstep, and
//! [`SharedCatalog`] puts that pair behind a single reader/writer lock.
//!
//! ## Example
//!
//! ```no_run
//! use imgfind_vector_store::{SharedCatalog, SnapshotPaths};
//!
//! #[tokio::main]
//! async fn main() -> imgfind_vector_store::Result<()> {
//!     let catalog = SharedCatalog::empty(3)?;
//!     catalog.ingest("a.jpg", vec![0.0, 0.0, 0.0], None).await?;
//!     catalog.ingest("b.jpg", vec![1.0, 0.0, 0.0], Some("a dog".into())).await?;
//!
//!     let paths = SnapshotPaths::in_dir(std::path::Path::new(".imgfind"));
//!     catalog.save(&paths).await?;
//!
//!     let hits = catalog.read().await.search(&[1.0, 0.0, 0.0], 2)?;
//!     println!("{hits:?}");
//!     Ok(())
//! }
//! ```

mod catalog;
mod error;
mod flat_index;
mod paths;
mod providers;
mod records;
mod snapshot;
mod snapshot_lock;
mod types;

pub use catalog::{ImageCatalog, SharedCatalog};
pub use error::{Result, VectorStoreError};
pub use flat_index::FlatIndex;
pub use paths::{SnapshotPaths, INDEX_FILE_NAME, RECORDS_FILE_NAME, SNAPSHOT_DIR_NAME};
pub use providers::{stub_embed, Captioner, ImageEmbedder, StubProvider, TextEmbedder};
pub use records::RecordStore;
pub use snapshot::{load_snapshot, save_snapshot, INDEX_FORMAT_VERSION, RECORDS_SCHEMA_VERSION};
pub use types::{EmbeddingRecord, Neighbor, RetrievedImage};
