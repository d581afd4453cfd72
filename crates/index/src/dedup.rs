use recall_vector_store::MetadataLedger;
use std::collections::HashSet;

/// Rejects re-indexing of a source whose identity is already in the ledger.
///
/// The identity is the integer before the first `_` of a label, so
/// `"7_foo.jpg"` and `"7_bar.png"` name the same source. Labels without one
/// are never treated as duplicates.
pub struct DedupGuard;

impl DedupGuard {
    #[must_use]
    pub fn extract_identity(label: &str) -> Option<i64> {
        let (prefix, _) = label.split_once('_')?;
        prefix.parse().ok()
    }

    /// Recomputed from the ledger on every call.
    #[must_use]
    pub fn known_identities(ledger: &MetadataLedger) -> HashSet<i64> {
        ledger
            .iter()
            .filter_map(|(_, record)| record.source_identity)
            .collect()
    }

    #[must_use]
    pub fn is_duplicate(label: &str, ledger: &MetadataLedger) -> bool {
        Self::extract_identity(label)
            .is_some_and(|identity| Self::known_identities(ledger).contains(&identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_vector_store::MetadataRecord;

    fn ledger_with(labels: &[&str]) -> MetadataLedger {
        let mut ledger = MetadataLedger::new();
        for label in labels {
            ledger.append(MetadataRecord {
                source_identity: DedupGuard::extract_identity(label),
                source_label: (*label).to_string(),
                text: String::new(),
                variant: 1,
            });
        }
        ledger
    }

    #[test]
    fn extracts_leading_integer() {
        assert_eq!(DedupGuard::extract_identity("7_foo.jpg"), Some(7));
        assert_eq!(DedupGuard::extract_identity("12_a_b.jpg"), Some(12));
        assert_eq!(DedupGuard::extract_identity("-3_x.png"), Some(-3));
    }

    #[test]
    fn missing_or_bad_prefix_has_no_identity() {
        assert_eq!(DedupGuard::extract_identity("foo.jpg"), None);
        assert_eq!(DedupGuard::extract_identity("7foo.jpg"), None);
        assert_eq!(DedupGuard::extract_identity("x7_foo.jpg"), None);
        assert_eq!(DedupGuard::extract_identity("_foo.jpg"), None);
        assert_eq!(DedupGuard::extract_identity("photos/7_foo.jpg"), None);
    }

    #[test]
    fn known_identities_skips_absent() {
        let ledger = ledger_with(&["1_a.jpg", "uploaded", "2_b.jpg", "1_c.jpg"]);
        let known = DedupGuard::known_identities(&ledger);
        assert_eq!(known, HashSet::from([1, 2]));
    }

    #[test]
    fn duplicate_requires_known_identity() {
        let ledger = ledger_with(&["1_a.jpg", "uploaded"]);
        assert!(DedupGuard::is_duplicate("1_other.jpg", &ledger));
        assert!(!DedupGuard::is_duplicate("2_b.jpg", &ledger));
        assert!(!DedupGuard::is_duplicate("uploaded", &ledger));
    }
}
