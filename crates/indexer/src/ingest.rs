use crate::scanner::{ImageScanner, ScanOptions};
use crate::{IndexerError, IngestStats, Result};
use imgfind_vector_store::{
    Captioner, ImageEmbedder, SharedCatalog, SnapshotPaths, VectorStoreError,
};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub scan: ScanOptions,
    /// Upper bound for each provider call; a call that runs past it is abandoned.
    pub provider_timeout: Duration,
    /// Pause between images that needed provider calls (rate-limited services).
    pub request_interval: Duration,
    /// Save a snapshot after every `n` added images.
    pub checkpoint: Option<(SnapshotPaths, usize)>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            scan: ScanOptions::default(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            request_interval: Duration::ZERO,
            checkpoint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Added { position: usize, captioned: bool },
    AlreadyIndexed,
}

/// Embeds images and adds them to a shared catalog, one image at a time.
pub struct ImageIngestor {
    catalog: SharedCatalog,
    embedder: Arc<dyn ImageEmbedder>,
    captioner: Arc<dyn Captioner>,
    config: IngestConfig,
}

impl ImageIngestor {
    pub fn new(
        catalog: SharedCatalog,
        embedder: Arc<dyn ImageEmbedder>,
        captioner: Arc<dyn Captioner>,
        config: IngestConfig,
    ) -> Self {
        Self {
            catalog,
            embedder,
            captioner,
            config,
        }
    }

    #[must_use]
    pub const fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    /// Ingest every image the scanner finds in `folder`.
    ///
    /// A provider failure or unreadable file skips that image and is recorded in the
    /// returned stats. Structural errors (dimension mismatch, duplicate positions) abort
    /// the run.
    pub async fn ingest_folder(&self, folder: impl AsRef<Path>) -> Result<IngestStats> {
        let folder = folder.as_ref();
        if !folder.is_dir() {
            return Err(IndexerError::InvalidPath(folder.display().to_string()));
        }

        self.check_provider_dimension().await?;

        let start = Instant::now();
        let mut stats = IngestStats::new();
        let images = ImageScanner::new(folder, self.config.scan.clone()).scan();
        stats.scanned = images.len();
        log::info!("Ingesting {} images from {}", images.len(), folder.display());

        let mut since_checkpoint = 0usize;
        let mut called_provider = false;
        for path in &images {
            if called_provider && !self.config.request_interval.is_zero() {
                tokio::time::sleep(self.config.request_interval).await;
            }
            called_provider = false;

            match self.ingest_file(path).await {
                Ok(IngestOutcome::Added {
                    position,
                    captioned,
                }) => {
                    called_provider = true;
                    log::debug!("Added {} at position {position}", path.display());
                    stats.add_image(captioned);
                    since_checkpoint += 1;
                }
                Ok(IngestOutcome::AlreadyIndexed) => {
                    log::debug!("Skipping already indexed {}", path.display());
                    stats.already_indexed += 1;
                }
                Err(err) if is_per_image_failure(&err) => {
                    called_provider = true;
                    log::warn!("Skipping {}: {err}", path.display());
                    stats.add_error(format!("{}: {err}", path.display()));
                }
                Err(err) => return Err(err),
            }

            if let Some((paths, every)) = &self.config.checkpoint {
                if *every > 0 && since_checkpoint >= *every {
                    self.catalog.save(paths).await?;
                    since_checkpoint = 0;
                }
            }
        }

        stats.time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!(
            "Ingestion finished: {} added, {} already indexed, {} failed in {}ms",
            stats.added,
            stats.already_indexed,
            stats.failed,
            stats.time_ms
        );
        Ok(stats)
    }

    /// Ingest a single image file, keyed by its file name.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestOutcome> {
        let image_id = image_id_for(path)?;
        if self.catalog.contains(&image_id).await {
            return Ok(IngestOutcome::AlreadyIndexed);
        }

        let bytes = tokio::fs::read(path).await?;
        self.ingest_bytes(&image_id, &bytes).await
    }

    /// Embed and caption `bytes`, then add them under `image_id`.
    ///
    /// Provider calls run without holding the catalog lock; only the final paired
    /// insert takes it.
    pub async fn ingest_bytes(&self, image_id: &str, bytes: &[u8]) -> Result<IngestOutcome> {
        if self.catalog.contains(image_id).await {
            return Ok(IngestOutcome::AlreadyIndexed);
        }
        self.check_provider_dimension().await?;

        let vector = self
            .with_timeout(image_id, self.embedder.embed_image(image_id, bytes))
            .await?;

        let caption = match self
            .with_timeout(image_id, self.captioner.caption(image_id, bytes))
            .await
        {
            Ok(caption) => caption,
            Err(err) => {
                log::warn!("No caption for {image_id}: {err}");
                None
            }
        };

        let captioned = caption.is_some();
        let position = self.catalog.ingest(image_id, vector, caption).await?;
        Ok(IngestOutcome::Added {
            position,
            captioned,
        })
    }

    /// A provider producing vectors of the wrong size is a configuration error, caught
    /// before any image is sent to it.
    async fn check_provider_dimension(&self) -> Result<()> {
        let expected = self.catalog.dimension().await;
        let actual = self.embedder.dimension();
        if actual != expected {
            return Err(VectorStoreError::DimensionMismatch { expected, actual }.into());
        }
        Ok(())
    }

    async fn with_timeout<T>(
        &self,
        subject: &str,
        call: impl Future<Output = imgfind_vector_store::Result<T>>,
    ) -> imgfind_vector_store::Result<T> {
        match tokio::time::timeout(self.config.provider_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(VectorStoreError::provider(
                subject,
                format!("timed out after {:?}", self.config.provider_timeout),
            )),
        }
    }
}

fn image_id_for(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| IndexerError::InvalidPath(path.display().to_string()))
}

fn is_per_image_failure(err: &IndexerError) -> bool {
    match err {
        IndexerError::IoError(_) | IndexerError::InvalidPath(_) => true,
        IndexerError::VectorStoreError(inner) => {
            matches!(inner, VectorStoreError::ProviderFailure { .. })
        }
    }
}
