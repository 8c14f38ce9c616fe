//! # imgfind indexer
//!
//! Batch ingestion of an image folder into a shared catalog.
//!
//! ## Pipeline
//!
//! ```text
//! Image folder
//!     │
//!     ├──> ImageScanner (extension filter, name order, limit)
//!     │      └─> image files
//!     │
//!     ├──> ImageEmbedder + Captioner (per image, timed out)
//!     │      └─> vector, optional caption
//!     │
//!     └──> SharedCatalog::ingest (one paired insert per image)
//!            └─> optional checkpoint snapshots
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use imgfind_indexer::{ImageIngestor, IngestConfig};
//! use imgfind_vector_store::{SharedCatalog, StubProvider};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = SharedCatalog::empty(1024)?;
//!     let provider = Arc::new(StubProvider::new(1024)?);
//!     let ingestor = ImageIngestor::new(catalog, provider.clone(), provider, IngestConfig::default());
//!     let stats = ingestor.ingest_folder("downloaded_images").await?;
//!
//!     println!("Added {} images, {} failed", stats.added, stats.failed);
//!     Ok(())
//! }
//! ```

mod error;
mod ingest;
mod scanner;
mod stats;

pub use error::{IndexerError, Result};
pub use ingest::{ImageIngestor, IngestConfig, IngestOutcome};
pub use scanner::{ImageScanner, ScanOptions, DEFAULT_EXTENSIONS};
pub use stats::IngestStats;
