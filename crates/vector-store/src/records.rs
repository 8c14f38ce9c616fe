use crate::error::{Result, VectorStoreError};
use crate::types::EmbeddingRecord;
use std::collections::HashMap;

/// Per-image metadata keyed both by position and by image id.
///
/// Records live in a `Vec` whose index is the record's position, so position lookups on
/// the query path are a plain slice access. `by_id` maps an image id back to that slot.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dimension: usize,
    records: Vec<EmbeddingRecord>,
    by_id: HashMap<String, usize>,
}

impl RecordStore {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "record dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            records: Vec::new(),
            by_id: HashMap::new(),
        })
    }

    /// Store a record at the next free position and return that position.
    ///
    /// Both checks run before anything is written, so a rejected insert leaves the
    /// store unchanged.
    pub fn insert(
        &mut self,
        image_id: impl Into<String>,
        vector: Vec<f32>,
        caption: Option<String>,
    ) -> Result<usize> {
        let image_id = image_id.into();
        self.check_insert(&image_id, &vector)?;

        let position = self.records.len();
        self.by_id.insert(image_id.clone(), position);
        self.records.push(EmbeddingRecord {
            image_id,
            position,
            vector,
            caption,
        });
        Ok(position)
    }

    pub(crate) fn check_insert(&self, image_id: &str, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if self.by_id.contains_key(image_id) {
            return Err(VectorStoreError::DuplicateImage(image_id.to_string()));
        }
        Ok(())
    }

    pub fn lookup_by_position(&self, position: usize) -> Result<&EmbeddingRecord> {
        self.records
            .get(position)
            .ok_or(VectorStoreError::PositionNotFound(position))
    }

    pub fn lookup_by_id(&self, image_id: &str) -> Result<&EmbeddingRecord> {
        self.by_id
            .get(image_id)
            .and_then(|&position| self.records.get(position))
            .ok_or_else(|| VectorStoreError::ImageNotFound(image_id.to_string()))
    }

    #[must_use]
    pub fn contains(&self, image_id: &str) -> bool {
        self.by_id.contains_key(image_id)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Records in position order.
    pub fn iter(&self) -> impl Iterator<Item = &EmbeddingRecord> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn positions_are_dense_and_resolve_both_ways() {
        let mut store = RecordStore::new(2).unwrap();
        assert_eq!(store.insert("a.jpg", vec![0.0, 0.0], None).unwrap(), 0);
        assert_eq!(
            store
                .insert("b.jpg", vec![1.0, 0.0], Some("a dog".into()))
                .unwrap(),
            1
        );
        assert_eq!(store.insert("c.jpg", vec![2.0, 0.0], None).unwrap(), 2);

        for position in 0..store.size() {
            let record = store.lookup_by_position(position).unwrap();
            assert_eq!(record.position, position);
            assert_eq!(store.lookup_by_id(&record.image_id).unwrap(), record);
        }
        assert_eq!(
            store.lookup_by_id("b.jpg").unwrap().caption.as_deref(),
            Some("a dog")
        );
    }

    #[test]
    fn duplicate_image_is_rejected_without_side_effects() {
        let mut store = RecordStore::new(3).unwrap();
        store.insert("a", vec![0.0, 0.0, 0.0], None).unwrap();

        let err = store.insert("a", vec![0.0, 0.0, 0.0], None).unwrap_err();
        assert!(matches!(err, VectorStoreError::DuplicateImage(id) if id == "a"));
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn wrong_dimension_is_rejected_without_side_effects() {
        let mut store = RecordStore::new(3).unwrap();
        let err = store.insert("a", vec![0.0, 0.0], None).unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(store.is_empty());
        assert!(!store.contains("a"));
    }

    #[test]
    fn missing_lookups_report_what_was_asked() {
        let store = RecordStore::new(1).unwrap();
        assert!(matches!(
            store.lookup_by_position(0),
            Err(VectorStoreError::PositionNotFound(0))
        ));
        assert!(matches!(
            store.lookup_by_id("nope"),
            Err(VectorStoreError::ImageNotFound(id)) if id == "nope"
        ));
    }
}
