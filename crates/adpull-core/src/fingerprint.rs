//! Cross-batch record deduplication.
//!
//! Two records with the same fingerprint are duplicates regardless of their
//! metric values: the digest covers entity ids, date bounds, account id,
//! attribution window and the breakdown dimension only.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Mutex;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::{EntityId, NormalizedRecord};

/// Deterministic identity hash of one normalized record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordFingerprint(String);

impl RecordFingerprint {
    /// Computes the fingerprint over the identity subset of the record.
    ///
    /// Fields are serialized through a key-sorted map, so the digest is
    /// independent of declaration or insertion order and stable across runs.
    pub fn of(record: &NormalizedRecord) -> Self {
        let mut identity = BTreeMap::new();
        identity.insert("ad_id", id_value(record.ad_id.as_ref()));
        identity.insert("adgroup_id", id_value(record.adgroup_id.as_ref()));
        identity.insert("account_id", id_value(record.account_id.as_ref()));
        identity.insert("date_start", text_value(record.date_start.as_deref()));
        identity.insert("date_stop", text_value(record.date_stop.as_deref()));
        identity.insert(
            "attribution_window",
            text_value(record.attribution_window.as_deref()),
        );
        identity.insert("country", text_value(record.country.as_deref()));

        let encoded = serde_json::to_string(&identity)
            .expect("fingerprint identity map always serializes");

        let mut hasher = Sha256::new();
        hasher.update(encoded.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn id_value(id: Option<&EntityId>) -> Value {
    match id {
        Some(EntityId::Number(n)) => Value::from(*n),
        Some(EntityId::Text(s)) => Value::from(s.clone()),
        None => Value::Null,
    }
}

fn text_value(text: Option<&str>) -> Value {
    text.map(Value::from).unwrap_or(Value::Null)
}

/// Run-wide seen-set over record fingerprints.
///
/// One instance is shared by every concurrently running account worker, so
/// check-and-insert is a single atomic operation behind a mutex: two workers
/// racing on the same fingerprint admit exactly one record.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<RecordFingerprint>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when an equivalent record was already admitted.
    /// A novel record is inserted and reported as not duplicate.
    pub fn is_duplicate(&self, record: &NormalizedRecord) -> bool {
        let fingerprint = RecordFingerprint::of(record);
        let mut seen = self
            .seen
            .lock()
            .expect("dedup seen-set lock is not poisoned");
        !seen.insert(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .expect("dedup seen-set lock is not poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntityId;

    fn sample() -> NormalizedRecord {
        let mut record = NormalizedRecord::empty();
        record.ad_id = Some(EntityId::Number(11));
        record.adgroup_id = Some(EntityId::Number(22));
        record.account_id = Some(EntityId::Number(33));
        record.date_start = Some(String::from("2024-01-01T00:00:00Z"));
        record.date_stop = Some(String::from("2024-01-01T00:00:00Z"));
        record.attribution_window = Some(String::from("7d_click"));
        record.country = Some(String::from("US"));
        record.spend = Some(10.5);
        record
    }

    #[test]
    fn metric_changes_do_not_change_the_fingerprint() {
        let base = sample();
        let mut other = sample();
        other.spend = Some(999.0);
        other.impressions = Some(123);
        other.campaign_name = Some(String::from("renamed"));

        assert_eq!(RecordFingerprint::of(&base), RecordFingerprint::of(&other));
    }

    #[test]
    fn breakdown_dimension_changes_the_fingerprint() {
        let base = sample();
        let mut other = sample();
        other.country = Some(String::from("DE"));

        assert_ne!(RecordFingerprint::of(&base), RecordFingerprint::of(&other));
    }

    #[test]
    fn admits_each_identity_exactly_once() {
        let dedup = Deduplicator::new();
        assert!(!dedup.is_duplicate(&sample()));
        assert!(dedup.is_duplicate(&sample()));
        assert!(dedup.is_duplicate(&sample()));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn concurrent_workers_never_double_admit() {
        use std::sync::Arc;

        let dedup = Arc::new(Deduplicator::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let dedup = Arc::clone(&dedup);
            handles.push(std::thread::spawn(move || {
                let mut admitted = 0usize;
                for _ in 0..100 {
                    if !dedup.is_duplicate(&sample()) {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }

        let total: usize = handles
            .into_iter()
            .map(|handle| handle.join().expect("worker thread completes"))
            .sum();

        assert_eq!(total, 1);
        assert_eq!(dedup.len(), 1);
    }
}
