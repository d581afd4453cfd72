use crate::error::{Result, VectorStoreError};
use crate::metric::Metric;
use ndarray::{ArrayView1, ArrayView2};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Zero-based slot of a vector, shared with its metadata record.
pub type Position = usize;

/// Append-only, contiguous store of fixed-dimension vectors with exact search.
///
/// Vectors are kept row-major in a single buffer. Search is a brute-force
/// scan followed by a bounded-heap top-k selection, which is plenty for a few
/// thousand rows.
#[derive(Debug, Clone)]
pub struct VectorStore {
    dimension: usize,
    metric: Metric,
    len: usize,
    data: Vec<f32>,
}

impl VectorStore {
    #[must_use]
    pub const fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            dimension,
            metric,
            len: 0,
            data: Vec::new(),
        }
    }

    pub(crate) fn from_raw(
        dimension: usize,
        metric: Metric,
        len: usize,
        data: Vec<f32>,
    ) -> Result<Self> {
        let expected = len.checked_mul(dimension).ok_or_else(|| {
            VectorStoreError::CorruptSnapshot(format!("{len} x {dimension} overflows"))
        })?;
        if data.len() != expected {
            return Err(VectorStoreError::CorruptSnapshot(format!(
                "vector buffer holds {} floats, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            dimension,
            metric,
            len,
            data,
        })
    }

    /// Fails with `InvalidDimension` unless `vector` has exactly `dimension` entries.
    pub const fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Add vector to the end of the store and return its position.
    pub fn append(&mut self, vector: &[f32]) -> Result<Position> {
        self.check_dimension(vector)?;
        let position = self.len;
        self.data.extend_from_slice(vector);
        self.len += 1;
        Ok(position)
    }

    /// Drops every vector at or after `len`. Used to undo a rejected batch.
    pub(crate) fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        self.data.truncate(len * self.dimension);
        self.len = len;
    }

    #[must_use]
    pub fn get(&self, position: Position) -> Option<&[f32]> {
        if position >= self.len {
            return None;
        }
        let start = position * self.dimension;
        self.data.get(start..start + self.dimension)
    }

    /// Exact k-nearest-neighbour search.
    ///
    /// Returns at most `min(k, len)` `(position, score)` pairs, best first.
    /// Euclidean scores are squared distances (ascending); cosine scores are
    /// inner products (descending). Ties go to the lower position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(Position, f32)>> {
        self.check_dimension(query)?;
        if k == 0 || self.len == 0 {
            return Ok(Vec::new());
        }

        let scores = self.scores(query)?;
        let k = k.min(self.len);
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        for (position, score) in scores.into_iter().enumerate() {
            let candidate = Candidate {
                position,
                score,
                metric: self.metric,
            };
            if heap.len() < k {
                heap.push(candidate);
                continue;
            }
            if heap.peek().is_some_and(|worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| (c.position, c.score))
            .collect())
    }

    fn scores(&self, query: &[f32]) -> Result<Vec<f32>> {
        let matrix = ArrayView2::from_shape((self.len, self.dimension), &self.data).map_err(
            |_| VectorStoreError::InvalidDimension {
                expected: self.len * self.dimension,
                actual: self.data.len(),
            },
        )?;
        let query = ArrayView1::from(query);
        let scores = match self.metric {
            Metric::Cosine => matrix.dot(&query).to_vec(),
            Metric::Euclidean => matrix
                .rows()
                .into_iter()
                .map(|row| {
                    row.iter()
                        .zip(query.iter())
                        .map(|(a, b)| {
                            let d = a - b;
                            d * d
                        })
                        .sum::<f32>()
                })
                .collect(),
        };
        Ok(scores)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub const fn metric(&self) -> Metric {
        self.metric
    }

    pub(crate) fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Heap entry ordered so that the worse match compares greater.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    position: Position,
    score: f32,
    metric: Metric,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.metric
            .rank(self.score, other.score)
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::normalize;
    use proptest::prelude::*;

    #[test]
    fn test_append_assigns_sequential_positions() {
        let mut store = VectorStore::new(3, Metric::Euclidean);
        assert_eq!(store.append(&[1.0, 0.0, 0.0]).unwrap(), 0);
        assert_eq!(store.append(&[0.0, 1.0, 0.0]).unwrap(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1), Some(&[0.0, 1.0, 0.0][..]));
        assert_eq!(store.get(2), None);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut store = VectorStore::new(3, Metric::Euclidean);
        let result = store.append(&[1.0, 0.0]); // Wrong dimension
        assert!(matches!(
            result,
            Err(VectorStoreError::InvalidDimension {
                expected: 3,
                actual: 2
            })
        ));
        assert!(store.is_empty());

        store.append(&[1.0, 0.0, 0.0]).unwrap();
        let result = store.search(&[1.0, 0.0], 1); // Wrong query dimension
        assert!(result.is_err());
    }

    #[test]
    fn test_euclidean_search_ascending() {
        let mut store = VectorStore::new(2, Metric::Euclidean);
        store.append(&[5.0, 5.0]).unwrap();
        store.append(&[1.0, 0.0]).unwrap();
        store.append(&[0.0, 2.0]).unwrap();

        let results = store.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(results, vec![(1, 1.0), (2, 4.0), (0, 50.0)]);
    }

    #[test]
    fn test_cosine_search_descending() {
        let mut store = VectorStore::new(3, Metric::Cosine);
        for raw in [[1.0, 0.0, 0.0], [0.9, 0.1, 0.0], [0.0, 1.0, 0.0]] {
            let mut v = raw.to_vec();
            normalize(&mut v);
            store.append(&v).unwrap();
        }

        let results = store.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 0);
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(results[1].0, 1);
        assert!(results[1].1 > 0.9);
    }

    #[test]
    fn test_ties_break_by_position() {
        let mut store = VectorStore::new(2, Metric::Euclidean);
        store.append(&[1.0, 0.0]).unwrap();
        store.append(&[0.0, 1.0]).unwrap();
        store.append(&[-1.0, 0.0]).unwrap();

        let results = store.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(results, vec![(0, 1.0), (1, 1.0)]);
    }

    #[test]
    fn test_k_bounds() {
        let mut store = VectorStore::new(2, Metric::Euclidean);
        assert!(store.search(&[0.0, 0.0], 5).unwrap().is_empty());

        store.append(&[1.0, 0.0]).unwrap();
        store.append(&[0.0, 1.0]).unwrap();
        store.append(&[1.0, 1.0]).unwrap();
        assert!(store.search(&[0.0, 0.0], 0).unwrap().is_empty());
        assert_eq!(store.search(&[0.0, 0.0], 100).unwrap().len(), 3);
    }

    #[test]
    fn test_truncate_discards_tail() {
        let mut store = VectorStore::new(2, Metric::Euclidean);
        store.append(&[1.0, 0.0]).unwrap();
        store.append(&[0.0, 1.0]).unwrap();
        store.truncate(1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.as_slice(), &[1.0, 0.0]);
        assert_eq!(store.append(&[2.0, 2.0]).unwrap(), 1);
    }

    fn vectors(dim: usize) -> impl Strategy<Value = Vec<Vec<f32>>> {
        prop::collection::vec(prop::collection::vec(-10.0f32..10.0, dim), 1..40)
    }

    proptest! {
        #[test]
        fn proptest_euclidean_results_non_decreasing(rows in vectors(4), k in 0usize..50) {
            let mut store = VectorStore::new(4, Metric::Euclidean);
            for row in &rows {
                store.append(row).unwrap();
            }
            let results = store.search(&[0.5, -0.5, 1.0, 0.0], k).unwrap();
            prop_assert_eq!(results.len(), k.min(rows.len()));
            for pair in results.windows(2) {
                prop_assert!(pair[0].1 <= pair[1].1);
            }
        }

        #[test]
        fn proptest_cosine_results_non_increasing(rows in vectors(4), k in 1usize..50) {
            let mut store = VectorStore::new(4, Metric::Cosine);
            for row in &rows {
                let mut v = row.clone();
                normalize(&mut v);
                store.append(&v).unwrap();
            }
            let mut query = vec![1.0, 2.0, -1.0, 0.5];
            normalize(&mut query);
            let results = store.search(&query, k).unwrap();
            prop_assert_eq!(results.len(), k.min(rows.len()));
            for pair in results.windows(2) {
                prop_assert!(pair[0].1 >= pair[1].1);
            }
        }

        #[test]
        fn proptest_top_k_matches_full_sort(rows in vectors(3), k in 1usize..50) {
            let mut store = VectorStore::new(3, Metric::Euclidean);
            for row in &rows {
                store.append(row).unwrap();
            }
            let query = [0.0, 1.0, 2.0];
            let all = store.search(&query, rows.len()).unwrap();
            let top = store.search(&query, k).unwrap();
            prop_assert_eq!(&all[..top.len()], &top[..]);
        }
    }
}
