use crate::error::{Result, VectorStoreError};
use crate::types::Neighbor;
use ndarray::{Array2, ArrayView1, Axis};
use std::cmp::Ordering;

/// Exact nearest-neighbor index over fixed-dimension vectors.
///
/// Vectors are stored row-major in append order, so the row number is the position
/// the record store hands out. Distances are squared Euclidean: ranking is the same as
/// with the true L2 distance and the square root is never needed.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Array2<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "index dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            vectors: Array2::zeros((0, dimension)),
        })
    }

    /// Rebuild an index from `count * dimension` values laid out in position order.
    pub(crate) fn from_flat(dimension: usize, values: Vec<f32>) -> Result<Self> {
        if dimension == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "index dimension must be greater than zero".to_string(),
            ));
        }
        if values.len() % dimension != 0 {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                actual: values.len() % dimension,
            });
        }
        let rows = values.len() / dimension;
        let vectors = Array2::from_shape_vec((rows, dimension), values)
            .map_err(|err| VectorStoreError::InvalidConfig(format!("index shape: {err}")))?;
        Ok(Self { dimension, vectors })
    }

    /// Append a vector at position `count()`.
    pub fn append(&mut self, vector: &[f32]) -> Result<usize> {
        self.check_dimension(vector)?;
        let position = self.count();
        self.vectors
            .push_row(ArrayView1::from(vector))
            .map_err(|err| VectorStoreError::InvalidConfig(format!("index append: {err}")))?;
        Ok(position)
    }

    /// Top `top_n` nearest positions, nearest first, ties broken by lower position.
    ///
    /// Asking for more results than stored vectors returns every vector.
    pub fn search(&self, query: &[f32], top_n: usize) -> Result<Vec<Neighbor>> {
        self.check_dimension(query)?;
        if self.count() == 0 {
            return Err(VectorStoreError::EmptyIndex);
        }

        let query = ArrayView1::from(query);
        let mut scored: Vec<Neighbor> = self
            .vectors
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_l2(&row, &query),
            })
            .collect();

        if top_n < scored.len() {
            if top_n == 0 {
                return Ok(Vec::new());
            }
            scored.select_nth_unstable_by(top_n - 1, rank_order);
            scored.truncate(top_n);
        }
        scored.sort_by(rank_order);
        Ok(scored)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.vectors.nrows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.count() {
            return None;
        }
        self.vectors.row(position).to_slice()
    }

    /// All stored values in position order.
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.vectors.iter().copied()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn squared_l2(a: &ArrayView1<f32>, b: &ArrayView1<f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn rank_order(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.position.cmp(&b.position))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(hits: &[Neighbor]) -> Vec<usize> {
        hits.iter().map(|hit| hit.position).collect()
    }

    #[test]
    fn test_append_and_search() {
        let mut index = FlatIndex::new(3).unwrap();

        assert_eq!(index.append(&[0.0, 0.0, 0.0]).unwrap(), 0);
        assert_eq!(index.append(&[1.0, 0.0, 0.0]).unwrap(), 1);
        assert_eq!(index.append(&[3.0, 0.0, 0.0]).unwrap(), 2);
        assert_eq!(index.count(), 3);

        let results = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(
            results,
            vec![
                Neighbor {
                    position: 1,
                    distance: 0.0
                },
                Neighbor {
                    position: 0,
                    distance: 1.0
                },
            ]
        );
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = FlatIndex::new(3).unwrap();
        let result = index.append(&[1.0, 0.0]);
        assert!(matches!(
            result,
            Err(VectorStoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert_eq!(index.count(), 0);

        index.append(&[1.0, 0.0, 0.0]).unwrap();
        let result = index.search(&[1.0, 0.0], 1);
        assert!(matches!(
            result,
            Err(VectorStoreError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn empty_index_rejects_search() {
        let index = FlatIndex::new(2).unwrap();
        assert!(matches!(
            index.search(&[0.0, 0.0], 1),
            Err(VectorStoreError::EmptyIndex)
        ));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(matches!(
            FlatIndex::new(0),
            Err(VectorStoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn top_n_larger_than_count_returns_everything() {
        let mut index = FlatIndex::new(2).unwrap();
        index.append(&[0.0, 0.0]).unwrap();
        index.append(&[5.0, 5.0]).unwrap();
        index.append(&[1.0, 1.0]).unwrap();

        let results = index.search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(positions(&results), vec![0, 2, 1]);
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn ties_prefer_lower_position_and_repeat_exactly() {
        let mut index = FlatIndex::new(2).unwrap();
        // Every vector is at distance 1 from the origin.
        for vector in [[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0], [0.0, -1.0], [0.0, 1.0]] {
            index.append(&vector).unwrap();
        }

        let first = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(positions(&first), vec![0, 1, 2]);

        let second = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(first, second);

        let all = index.search(&[0.0, 0.0], 5).unwrap();
        assert_eq!(positions(&all), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn from_flat_keeps_position_order() {
        let index = FlatIndex::from_flat(2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(index.count(), 2);
        assert_eq!(index.vector(1), Some(&[3.0, 4.0][..]));
        assert_eq!(index.vector(2), None);
        assert_eq!(index.values().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0, 4.0]);

        assert!(FlatIndex::from_flat(2, vec![1.0, 2.0, 3.0]).is_err());
    }
}
