//! Combinatorial expansion of rate templates across discovered codes.
//!
//! Some authorities publish product-code coverage and per-company rates in
//! separate sections of one notice, so a batch of extracted records must be
//! crossed with the full code list scanned from the document text.

use std::collections::HashSet;

use tracing::debug;

use crate::record::CandidateRecord;

/// Cross `codes` with the unique rate templates found in `records`.
///
/// A template is one distinct (country, company, rate) triple, kept in first
/// occurrence order; other fields ride along from the template's first
/// representative. Output order is codes outer, templates inner. With no
/// codes the records pass through untouched.
pub fn expand(codes: &[String], records: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
    if codes.is_empty() || records.is_empty() {
        return records;
    }

    let mut seen = HashSet::new();
    let mut templates: Vec<CandidateRecord> = Vec::new();
    for rec in records {
        let key = format!(
            "{}|{}|{}",
            rec.country.as_deref().unwrap_or(""),
            rec.company.as_deref().unwrap_or(""),
            rec.duty_rate.as_ref().map(ToString::to_string).unwrap_or_default(),
        );
        if seen.insert(key) {
            templates.push(rec);
        }
    }

    let mut out = Vec::with_capacity(codes.len() * templates.len());
    for code in codes {
        for template in &templates {
            let mut rec = template.clone();
            rec.hs_code = Some(code.clone());
            out.push(rec);
        }
    }
    debug!(
        codes = codes.len(),
        templates = templates.len(),
        expanded = out.len(),
        "expanded rate templates across scanned codes"
    );
    out
}
