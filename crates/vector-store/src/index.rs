use crate::error::{Result, VectorStoreError};
use crate::ledger::{MetadataLedger, MetadataRecord};
use crate::metric::Metric;
use crate::store::{Position, VectorStore};
use std::ops::Range;

/// A vector store and its metadata ledger, kept the same length.
#[derive(Debug, Clone)]
pub struct Index {
    store: VectorStore,
    ledger: MetadataLedger,
}

impl Index {
    #[must_use]
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            store: VectorStore::new(dimension, metric),
            ledger: MetadataLedger::new(),
        }
    }

    pub(crate) fn from_parts(store: VectorStore, ledger: MetadataLedger) -> Result<Self> {
        if store.len() != ledger.len() {
            return Err(VectorStoreError::CorruptSnapshot(format!(
                "{} vectors but {} metadata records",
                store.len(),
                ledger.len()
            )));
        }
        Ok(Self { store, ledger })
    }

    /// Appends every `(vector, record)` pair or none of them.
    ///
    /// All dimensions are checked before the first append; if an append still
    /// fails, both sides are truncated back to their previous length.
    pub fn append_item(
        &mut self,
        entries: Vec<(Vec<f32>, MetadataRecord)>,
    ) -> Result<Range<Position>> {
        for (vector, _) in &entries {
            self.store.check_dimension(vector)?;
        }

        let start = self.len();
        for (vector, record) in entries {
            if let Err(err) = self.store.append(&vector) {
                self.rollback(start);
                return Err(err);
            }
            self.ledger.append(record);
        }
        Ok(start..self.len())
    }

    fn rollback(&mut self, len: usize) {
        log::warn!(
            "Rolling back index from {} to {len} entries",
            self.store.len()
        );
        self.store.truncate(len);
        self.ledger.truncate(len);
    }

    #[must_use]
    pub const fn store(&self) -> &VectorStore {
        &self.store
    }

    #[must_use]
    pub const fn ledger(&self) -> &MetadataLedger {
        &self.ledger
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.store.dimension()
    }

    #[must_use]
    pub const fn metric(&self) -> Metric {
        self.store.metric()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(vector: Vec<f32>, variant: u8) -> (Vec<f32>, MetadataRecord) {
        (
            vector,
            MetadataRecord {
                source_identity: Some(7),
                source_label: "7_foo.jpg".to_string(),
                text: format!("variant {variant}"),
                variant,
            },
        )
    }

    #[test]
    fn append_item_keeps_sides_in_step() {
        let mut index = Index::new(2, Metric::Euclidean);
        let range = index
            .append_item(vec![entry(vec![1.0, 0.0], 1), entry(vec![0.0, 1.0], 2)])
            .unwrap();
        assert_eq!(range, 0..2);
        assert_eq!(index.store().len(), index.ledger().len());
        assert_eq!(index.ledger().get(1).unwrap().text, "variant 2");
    }

    #[test]
    fn append_item_rejects_whole_batch_on_bad_dimension() {
        let mut index = Index::new(2, Metric::Euclidean);
        index.append_item(vec![entry(vec![1.0, 0.0], 1)]).unwrap();

        let err = index
            .append_item(vec![
                entry(vec![1.0, 1.0], 1),
                entry(vec![1.0, 1.0, 1.0], 2),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::InvalidDimension {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(index.len(), 1);
        assert_eq!(index.ledger().len(), 1);
    }

    #[test]
    fn rollback_restores_previous_length() {
        let mut index = Index::new(2, Metric::Cosine);
        index
            .append_item(vec![entry(vec![1.0, 0.0], 1), entry(vec![0.0, 1.0], 2)])
            .unwrap();
        index.rollback(1);
        assert_eq!(index.len(), 1);
        assert_eq!(index.ledger().len(), 1);
    }

    #[test]
    fn from_parts_rejects_length_mismatch() {
        let mut store = VectorStore::new(2, Metric::Euclidean);
        store.append(&[1.0, 0.0]).unwrap();
        let err = Index::from_parts(store, MetadataLedger::new()).unwrap_err();
        assert!(matches!(err, VectorStoreError::CorruptSnapshot(_)));
    }
}
