use crate::error::{Result, VectorStoreError};
use crate::store::Position;
use serde::{Deserialize, Serialize};

/// Provenance of one stored vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub source_identity: Option<i64>,
    pub source_label: String,
    pub text: String,
    pub variant: u8,
}

/// Append-only record sequence. Record `i` describes vector `i` of the
/// paired [`crate::VectorStore`]; keeping the two in step is the caller's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataLedger {
    records: Vec<MetadataRecord>,
}

impl MetadataLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) const fn from_records(records: Vec<MetadataRecord>) -> Self {
        Self { records }
    }

    pub fn append(&mut self, record: MetadataRecord) -> Position {
        self.records.push(record);
        self.records.len() - 1
    }

    pub fn get(&self, position: Position) -> Result<&MetadataRecord> {
        self.records
            .get(position)
            .ok_or_else(|| VectorStoreError::OutOfRange {
                position,
                len: self.records.len(),
            })
    }

    /// Iterates from position 0 on every call.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &MetadataRecord)> + '_ {
        self.records.iter().enumerate()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    pub(crate) fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
