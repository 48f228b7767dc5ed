//! Shared record types for the reconciliation engine.
//!
//! A [`CandidateRecord`] is one unvalidated fact proposed by an extraction
//! pass; immutable once produced and discarded after reconciliation. A
//! [`CanonicalFact`] is the persisted, merge-reconciled row it becomes.

use serde::{Deserialize, Serialize};

/// A duty rate: either a numeric ad-valorem percentage or a non-numeric
/// sentinel such as "minimum import price".
///
/// Deserializes from a JSON number (percentage) or string (sentinel; numeric
/// strings like `"5.5%"` are coerced to `Percent` by the normalizer, not
/// here). Persisted as text; `Percent` renders as the bare number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DutyRate {
    Percent(f64),
    Sentinel(String),
}

impl DutyRate {
    /// Parse a stored text value back into a rate.
    pub fn from_stored(s: &str) -> Self {
        match s.parse::<f64>() {
            Ok(v) => Self::Percent(v),
            Err(_) => Self::Sentinel(s.to_string()),
        }
    }

    pub fn as_percent(&self) -> Option<f64> {
        match self {
            Self::Percent(v) => Some(*v),
            Self::Sentinel(_) => None,
        }
    }
}

impl std::fmt::Display for DutyRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Percent(v) => write!(f, "{v}"),
            Self::Sentinel(s) => f.write_str(s),
        }
    }
}

/// One extraction-service output unit.
///
/// Wire names follow the inference contract (`tariff_type`, `tariff_rate`,
/// `effective_date_from`, ...); unknown keys in a payload are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Target country the duty applies to (not the issuing jurisdiction).
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub hs_code: Option<String>,
    /// Antidumping, Countervailing, or Safeguard.
    #[serde(default, rename = "tariff_type")]
    pub duty_type: Option<String>,
    #[serde(default, rename = "tariff_rate")]
    pub duty_rate: Option<DutyRate>,
    #[serde(default, rename = "effective_date_from")]
    pub effective_from: Option<String>,
    #[serde(default, rename = "effective_date_to")]
    pub effective_to: Option<String>,
    #[serde(default, rename = "investigation_period_from")]
    pub period_from: Option<String>,
    #[serde(default, rename = "investigation_period_to")]
    pub period_to: Option<String>,
    #[serde(default)]
    pub basis_law: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub case_number: Option<String>,
    #[serde(default)]
    pub product_description: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl CandidateRecord {
    /// Field-wise identity key over the full field set, used by the
    /// deduplicator. Serde field order is fixed, so equal records produce
    /// equal keys.
    pub fn identity_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A persisted canonical fact: one (country, company, code, case) tariff
/// ruling owned by one document.
///
/// Non-null fields are never overwritten by later merges; only null →
/// non-null transitions are permitted. Rows are deleted only on explicit
/// full reprocessing of the owning document.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalFact {
    pub fact_id: i64,
    pub doc_id: i64,
    /// Resolved at the document level, not per-record.
    pub issuing_jurisdiction: Option<String>,
    pub country: Option<String>,
    pub hs_code: Option<String>,
    pub duty_type: Option<String>,
    pub duty_rate: Option<DutyRate>,
    pub effective_from: Option<String>,
    pub effective_to: Option<String>,
    pub period_from: Option<String>,
    pub period_to: Option<String>,
    pub basis_law: Option<String>,
    pub company: Option<String>,
    pub case_number: Option<String>,
    pub product_description: Option<String>,
    pub note: Option<String>,
}

impl CanonicalFact {
    /// Identity-tuple equality against an incoming record, scoped to one
    /// document: (country, company, hs_code, case_number), treating
    /// both-null as equal on a given position.
    pub fn identity_matches(&self, rec: &CandidateRecord) -> bool {
        self.country == rec.country
            && self.company == rec.company
            && self.hs_code == rec.hs_code
            && self.case_number == rec.case_number
    }
}

/// Merge result for one incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No identity match existed; a new fact was created.
    Inserted,
    /// An existing fact had null fields filled from the record.
    Merged,
    /// An existing fact already carried every value the record offered.
    Unchanged,
    /// The storage layer rejected the insert/update; the batch continues.
    Error,
}

impl MergeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Merged => "merged",
            Self::Unchanged => "unchanged",
            Self::Error => "error",
        }
    }
}

/// Per-document merge statistics, exposed for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: usize,
    pub merged: usize,
    pub unchanged: usize,
    pub errors: usize,
}

impl MergeStats {
    pub fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Merged => self.merged += 1,
            MergeOutcome::Unchanged => self.unchanged += 1,
            MergeOutcome::Error => self.errors += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.merged + self.unchanged + self.errors
    }
}

/// Staged null → non-null fills for one persisted fact.
///
/// `None` means "leave the column alone"; the store only touches columns
/// that are `Some`. There is no way to express overwriting or clearing a
/// value, which is what makes merge conflicts unrepresentable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactPatch {
    pub country: Option<String>,
    pub company: Option<String>,
    pub hs_code: Option<String>,
    pub case_number: Option<String>,
    pub duty_type: Option<String>,
    pub duty_rate: Option<DutyRate>,
    pub effective_from: Option<String>,
    pub effective_to: Option<String>,
    pub period_from: Option<String>,
    pub period_to: Option<String>,
    pub basis_law: Option<String>,
    pub product_description: Option<String>,
    pub note: Option<String>,
}

impl FactPatch {
    pub fn is_empty(&self) -> bool {
        self.country.is_none()
            && self.company.is_none()
            && self.hs_code.is_none()
            && self.case_number.is_none()
            && self.duty_type.is_none()
            && self.duty_rate.is_none()
            && self.effective_from.is_none()
            && self.effective_to.is_none()
            && self.period_from.is_none()
            && self.period_to.is_none()
            && self.basis_law.is_none()
            && self.product_description.is_none()
            && self.note.is_none()
    }
}

/// Document metadata recorded alongside its facts.
#[derive(Debug, Clone, Default)]
pub struct DocumentMeta {
    pub file_name: String,
    pub file_path: String,
    pub issuing_jurisdiction: Option<String>,
    pub total_pages: Option<i64>,
    pub file_size: Option<i64>,
    pub processing_mode: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_deserializes_wire_names() {
        let json = r#"{
            "country": "Korea",
            "hs_code": "7210.49.11",
            "tariff_type": "Antidumping",
            "tariff_rate": 5.5,
            "effective_date_from": "2023-01-15",
            "company": "Acme Steel",
            "case_number": "A-580-881"
        }"#;
        let rec: CandidateRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.country.as_deref(), Some("Korea"));
        assert_eq!(rec.duty_type.as_deref(), Some("Antidumping"));
        assert_eq!(rec.duty_rate, Some(DutyRate::Percent(5.5)));
        assert_eq!(rec.effective_from.as_deref(), Some("2023-01-15"));
        assert!(rec.note.is_none());
    }

    #[test]
    fn candidate_ignores_unknown_keys() {
        let json = r#"{"country": "Brazil", "confidence": 0.9, "page": 3}"#;
        let rec: CandidateRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.country.as_deref(), Some("Brazil"));
    }

    #[test]
    fn rate_accepts_number_or_string() {
        let rec: CandidateRecord = serde_json::from_str(r#"{"tariff_rate": 7.33}"#).unwrap();
        assert_eq!(rec.duty_rate, Some(DutyRate::Percent(7.33)));

        let rec: CandidateRecord =
            serde_json::from_str(r#"{"tariff_rate": "minimum import price"}"#).unwrap();
        assert_eq!(
            rec.duty_rate,
            Some(DutyRate::Sentinel("minimum import price".into()))
        );

        let rec: CandidateRecord = serde_json::from_str(r#"{"tariff_rate": null}"#).unwrap();
        assert!(rec.duty_rate.is_none());
    }

    #[test]
    fn rate_display_and_from_stored() {
        assert_eq!(DutyRate::Percent(5.5).to_string(), "5.5");
        assert_eq!(DutyRate::from_stored("5.5"), DutyRate::Percent(5.5));
        assert_eq!(
            DutyRate::from_stored("minimum import price"),
            DutyRate::Sentinel("minimum import price".into())
        );
    }

    #[test]
    fn identity_matches_treats_both_null_as_equal() {
        let fact = CanonicalFact {
            fact_id: 1,
            doc_id: 1,
            issuing_jurisdiction: Some("United States".into()),
            country: Some("South Korea".into()),
            hs_code: None,
            duty_type: None,
            duty_rate: None,
            effective_from: None,
            effective_to: None,
            period_from: None,
            period_to: None,
            basis_law: None,
            company: Some("Acme Steel".into()),
            case_number: Some("A-580-881".into()),
            product_description: None,
            note: None,
        };

        let mut rec = CandidateRecord {
            country: Some("South Korea".into()),
            company: Some("Acme Steel".into()),
            case_number: Some("A-580-881".into()),
            ..Default::default()
        };
        assert!(fact.identity_matches(&rec));

        rec.hs_code = Some("7210.49.11".into());
        assert!(!fact.identity_matches(&rec));
    }

    #[test]
    fn merge_stats_counts_outcomes() {
        let mut stats = MergeStats::default();
        stats.record(MergeOutcome::Inserted);
        stats.record(MergeOutcome::Inserted);
        stats.record(MergeOutcome::Merged);
        stats.record(MergeOutcome::Unchanged);
        stats.record(MergeOutcome::Error);
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.merged, 1);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.total(), 5);
    }

    #[test]
    fn identity_key_equal_for_equal_records() {
        let a = CandidateRecord {
            country: Some("Vietnam".into()),
            duty_rate: Some(DutyRate::Percent(12.0)),
            ..Default::default()
        };
        let b = a.clone();
        assert_eq!(a.identity_key(), b.identity_key());

        let c = CandidateRecord {
            note: Some("prelim".into()),
            ..a.clone()
        };
        assert_ne!(a.identity_key(), c.identity_key());
    }
}
