use crate::error::{Result, VectorStoreError};
use crate::flat_index::FlatIndex;
use crate::paths::SnapshotPaths;
use crate::records::RecordStore;
use crate::snapshot::{load_snapshot, save_snapshot};
use crate::types::{EmbeddingRecord, Neighbor};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};

/// Record store and flat index, mutated together or not at all.
#[derive(Debug, Clone)]
pub struct ImageCatalog {
    records: RecordStore,
    index: FlatIndex,
}

impl ImageCatalog {
    pub fn new(dimension: usize) -> Result<Self> {
        Ok(Self {
            records: RecordStore::new(dimension)?,
            index: FlatIndex::new(dimension)?,
        })
    }

    /// Pair an already-validated store and index. Used by snapshot loading.
    pub(crate) fn from_parts(records: RecordStore, index: FlatIndex) -> Result<Self> {
        if records.dimension() != index.dimension() {
            return Err(VectorStoreError::DimensionMismatch {
                expected: records.dimension(),
                actual: index.dimension(),
            });
        }
        if records.size() != index.count() {
            return Err(VectorStoreError::InconsistentSnapshot(format!(
                "{} records but {} indexed vectors",
                records.size(),
                index.count()
            )));
        }
        Ok(Self { records, index })
    }

    /// Add one image to both structures.
    ///
    /// Every failure mode is checked before the first write; after that the record
    /// insert and the index append cannot fail, so positions stay in lockstep.
    pub fn ingest(
        &mut self,
        image_id: impl Into<String>,
        vector: Vec<f32>,
        caption: Option<String>,
    ) -> Result<usize> {
        let image_id = image_id.into();
        self.records.check_insert(&image_id, &vector)?;

        let indexed_at = self.index.append(&vector)?;
        let position = self.records.insert(image_id, vector, caption)?;
        debug_assert_eq!(indexed_at, position);
        Ok(position)
    }

    pub fn search(&self, query: &[f32], top_n: usize) -> Result<Vec<Neighbor>> {
        self.index.search(query, top_n)
    }

    pub fn lookup_by_position(&self, position: usize) -> Result<&EmbeddingRecord> {
        self.records.lookup_by_position(position)
    }

    pub fn lookup_by_id(&self, image_id: &str) -> Result<&EmbeddingRecord> {
        self.records.lookup_by_id(image_id)
    }

    #[must_use]
    pub fn contains(&self, image_id: &str) -> bool {
        self.records.contains(image_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.index.dimension()
    }

    #[must_use]
    pub const fn records(&self) -> &RecordStore {
        &self.records
    }

    #[must_use]
    pub const fn index(&self) -> &FlatIndex {
        &self.index
    }
}

/// Catalog shared between ingestion, search and checkpointing.
///
/// Ingestion takes the write lock; searches and saves take read locks. A save therefore
/// never observes a half-applied ingest, and no ingest starts while a save is writing.
#[derive(Debug, Clone)]
pub struct SharedCatalog {
    inner: Arc<RwLock<ImageCatalog>>,
}

impl SharedCatalog {
    #[must_use]
    pub fn new(catalog: ImageCatalog) -> Self {
        Self {
            inner: Arc::new(RwLock::new(catalog)),
        }
    }

    pub fn empty(dimension: usize) -> Result<Self> {
        Ok(Self::new(ImageCatalog::new(dimension)?))
    }

    pub async fn open(paths: &SnapshotPaths) -> Result<Self> {
        Ok(Self::new(load_snapshot(paths).await?))
    }

    pub async fn ingest(
        &self,
        image_id: impl Into<String>,
        vector: Vec<f32>,
        caption: Option<String>,
    ) -> Result<usize> {
        self.inner.write().await.ingest(image_id, vector, caption)
    }

    /// Read access for a multi-step operation that must see one consistent state.
    pub async fn read(&self) -> RwLockReadGuard<'_, ImageCatalog> {
        self.inner.read().await
    }

    pub async fn contains(&self, image_id: &str) -> bool {
        self.inner.read().await.contains(image_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn dimension(&self) -> usize {
        self.inner.read().await.dimension()
    }

    /// Checkpoint to disk. Holds the read lock for the whole write.
    pub async fn save(&self, paths: &SnapshotPaths) -> Result<()> {
        let guard = self.inner.read().await;
        save_snapshot(&guard, paths).await
    }

    /// Replace the in-memory catalog with the snapshot at `paths`.
    ///
    /// The snapshot is loaded and validated before the lock is taken; on failure the
    /// current catalog is left as it was.
    pub async fn reload(&self, paths: &SnapshotPaths) -> Result<()> {
        let loaded = load_snapshot(paths).await?;
        *self.inner.write().await = loaded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_catalog() -> ImageCatalog {
        let mut catalog = ImageCatalog::new(3).unwrap();
        catalog.ingest("a", vec![0.0, 0.0, 0.0], None).unwrap();
        catalog.ingest("b", vec![1.0, 0.0, 0.0], None).unwrap();
        catalog.ingest("c", vec![3.0, 0.0, 0.0], None).unwrap();
        catalog
    }

    fn assert_consistent(catalog: &ImageCatalog) {
        assert_eq!(catalog.records().size(), catalog.index().count());
        for position in 0..catalog.len() {
            let record = catalog.lookup_by_position(position).unwrap();
            assert_eq!(record.position, position);
            assert_eq!(
                catalog.index().vector(position),
                Some(record.vector.as_slice())
            );
        }
    }

    #[test]
    fn ingest_keeps_store_and_index_in_lockstep() {
        let catalog = scenario_catalog();
        assert_eq!(catalog.len(), 3);
        assert_consistent(&catalog);
    }

    #[test]
    fn rejected_ingest_changes_nothing() {
        let mut catalog = scenario_catalog();

        let err = catalog.ingest("a", vec![0.0, 0.0, 0.0], None).unwrap_err();
        assert!(matches!(err, VectorStoreError::DuplicateImage(_)));

        let err = catalog.ingest("d", vec![0.0, 0.0], None).unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));

        assert_eq!(catalog.len(), 3);
        assert_consistent(&catalog);

        // The next successful ingest still gets the next dense position.
        assert_eq!(catalog.ingest("d", vec![9.0, 0.0, 0.0], None).unwrap(), 3);
        assert_consistent(&catalog);
    }

    #[test]
    fn from_parts_cross_checks_sizes() {
        let mut records = RecordStore::new(2).unwrap();
        records.insert("a", vec![0.0, 0.0], None).unwrap();
        let index = FlatIndex::new(2).unwrap();
        assert!(matches!(
            ImageCatalog::from_parts(records, index),
            Err(VectorStoreError::InconsistentSnapshot(_))
        ));

        let records = RecordStore::new(2).unwrap();
        let index = FlatIndex::new(3).unwrap();
        assert!(matches!(
            ImageCatalog::from_parts(records, index),
            Err(VectorStoreError::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_ingests_assign_unique_dense_positions() {
        let shared = SharedCatalog::empty(2).unwrap();
        let mut tasks = Vec::new();
        for i in 0..32u8 {
            let shared = shared.clone();
            tasks.push(tokio::spawn(async move {
                shared
                    .ingest(format!("img-{i}.jpg"), vec![f32::from(i), 0.0], None)
                    .await
            }));
        }

        let mut positions = Vec::new();
        for task in tasks {
            positions.push(task.await.unwrap().unwrap());
        }
        positions.sort_unstable();
        assert_eq!(positions, (0..32).collect::<Vec<_>>());

        let catalog = shared.read().await;
        assert_consistent(&catalog);
    }
}
