//! Exact-duplicate removal over candidate records.

use std::collections::HashSet;

use tracing::debug;

use crate::record::CandidateRecord;

/// Drop records that are field-wise equal to an earlier one, keeping first
/// occurrences in order. Records differing in any field, including the
/// note, are distinct.
pub fn dedup_records(records: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
    let before = records.len();
    let mut seen = HashSet::with_capacity(records.len());
    let kept: Vec<CandidateRecord> = records
        .into_iter()
        .filter(|rec| seen.insert(rec.identity_key()))
        .collect();
    if kept.len() < before {
        debug!(before, after = kept.len(), "removed duplicate records");
    }
    kept
}
