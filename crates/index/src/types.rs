use recall_vector_store::{Metric, Position};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AddResult {
    Added {
        added: bool,
        source_label: String,
        source_identity: Option<i64>,
        variants_added: usize,
        index_size: usize,
    },
    Duplicate {
        added: bool,
        source_label: String,
        reason: SkipReason,
        existing_identity: i64,
        index_size: usize,
    },
}

/// Why an add did not touch the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Duplicate,
}

impl SkipReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
        }
    }
}

impl AddResult {
    #[must_use]
    pub const fn added(&self) -> bool {
        matches!(self, Self::Added { .. })
    }

    #[must_use]
    pub const fn reason(&self) -> Option<&'static str> {
        match self {
            Self::Added { .. } => None,
            Self::Duplicate { reason, .. } => Some(reason.as_str()),
        }
    }

    #[must_use]
    pub const fn index_size(&self) -> usize {
        match self {
            Self::Added { index_size, .. } | Self::Duplicate { index_size, .. } => *index_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// 1-based.
    pub rank: usize,
    pub position: Position,
    pub source_label: String,
    pub source_identity: Option<i64>,
    pub variant: u8,
    pub text: String,
    pub similarity_percentage: f64,
    pub raw_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query_description: String,
    pub metric: Metric,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub size: usize,
    pub metadata_count: usize,
    pub dimension: usize,
    pub metric: Metric,
    /// Distinct source identities.
    pub sources: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub position: Position,
    pub source_label: String,
    pub source_identity: Option<i64>,
    pub variant: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckpointOutcome {
    Saved { size: usize, path: PathBuf },
    SkippedEmpty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_serializes_status_and_reason() {
        let result = AddResult::Duplicate {
            added: false,
            source_label: "7_foo.jpg".to_string(),
            reason: SkipReason::Duplicate,
            existing_identity: 7,
            index_size: 5,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "duplicate");
        assert_eq!(value["reason"], "duplicate");
        assert_eq!(value["added"], false);
        assert_eq!(value["existing_identity"], 7);
        assert_eq!(result.reason(), Some("duplicate"));
        assert!(!result.added());
    }

    #[test]
    fn added_serializes_flag() {
        let result = AddResult::Added {
            added: true,
            source_label: "1_a.jpg".to_string(),
            source_identity: Some(1),
            variants_added: 5,
            index_size: 5,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "added");
        assert_eq!(value["added"], true);
        assert!(result.added());
        assert_eq!(result.reason(), None);
    }
}
