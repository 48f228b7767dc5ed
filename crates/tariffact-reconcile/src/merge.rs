//! Null-fill merging of candidate records into persisted facts.
//!
//! Identity within a document is the tuple (country, company, hs_code,
//! case_number), with both-null equal on a position. A record that matches
//! an existing fact may only fill that fact's null fields; non-null values
//! are never overwritten, so replaying the same document cannot change a
//! stable table.

use tracing::{debug, warn};

use tariffact_core::record::{CandidateRecord, CanonicalFact, DutyRate, FactPatch, MergeOutcome};
use tariffact_store::{FactStore, StoreError};

/// Fields `rec` can contribute to `fact`: present on the record, null on
/// the fact. Identity fields are staged too; a fact may acquire an identity
/// value it lacked, since matching treats both-null positions as equal.
pub fn diff_patch(fact: &CanonicalFact, rec: &CandidateRecord) -> FactPatch {
    let fill = |have: &Option<String>, offer: &Option<String>| -> Option<String> {
        if have.is_none() { offer.clone() } else { None }
    };
    FactPatch {
        country: fill(&fact.country, &rec.country),
        company: fill(&fact.company, &rec.company),
        hs_code: fill(&fact.hs_code, &rec.hs_code),
        case_number: fill(&fact.case_number, &rec.case_number),
        duty_type: fill(&fact.duty_type, &rec.duty_type),
        duty_rate: if fact.duty_rate.is_none() {
            rec.duty_rate.clone()
        } else {
            None
        },
        effective_from: fill(&fact.effective_from, &rec.effective_from),
        effective_to: fill(&fact.effective_to, &rec.effective_to),
        period_from: fill(&fact.period_from, &rec.period_from),
        period_to: fill(&fact.period_to, &rec.period_to),
        basis_law: fill(&fact.basis_law, &rec.basis_law),
        product_description: fill(&fact.product_description, &rec.product_description),
        note: fill(&fact.note, &rec.note),
    }
}

fn apply_patch(fact: &mut CanonicalFact, patch: &FactPatch) {
    let take = |have: &mut Option<String>, fill: &Option<String>| {
        if let Some(v) = fill {
            *have = Some(v.clone());
        }
    };
    take(&mut fact.duty_type, &patch.duty_type);
    if let Some(rate) = &patch.duty_rate {
        fact.duty_rate = Some(rate.clone());
    }
    take(&mut fact.effective_from, &patch.effective_from);
    take(&mut fact.effective_to, &patch.effective_to);
    take(&mut fact.period_from, &patch.period_from);
    take(&mut fact.period_to, &patch.period_to);
    take(&mut fact.basis_law, &patch.basis_law);
    take(&mut fact.product_description, &patch.product_description);
    take(&mut fact.note, &patch.note);
    take(&mut fact.hs_code, &patch.hs_code);
    take(&mut fact.country, &patch.country);
    take(&mut fact.company, &patch.company);
    take(&mut fact.case_number, &patch.case_number);
}

/// Merge one record against the document's existing facts.
///
/// `existing` mirrors the persisted rows for this document and is kept in
/// sync so later records in the same batch see earlier inserts and fills.
/// Storage failures degrade to [`MergeOutcome::Error`] so one bad row never
/// voids the batch.
pub fn merge_record(
    store: &FactStore,
    doc_id: i64,
    issuing_jurisdiction: Option<&str>,
    existing: &mut Vec<CanonicalFact>,
    rec: &CandidateRecord,
) -> MergeOutcome {
    let Some(fact) = existing.iter_mut().find(|f| f.identity_matches(rec)) else {
        return match store.insert_fact(doc_id, issuing_jurisdiction, rec) {
            Ok(fact_id) => {
                existing.push(CanonicalFact {
                    fact_id,
                    doc_id,
                    issuing_jurisdiction: issuing_jurisdiction.map(str::to_string),
                    country: rec.country.clone(),
                    hs_code: rec.hs_code.clone(),
                    duty_type: rec.duty_type.clone(),
                    duty_rate: rec.duty_rate.clone(),
                    effective_from: rec.effective_from.clone(),
                    effective_to: rec.effective_to.clone(),
                    period_from: rec.period_from.clone(),
                    period_to: rec.period_to.clone(),
                    basis_law: rec.basis_law.clone(),
                    company: rec.company.clone(),
                    case_number: rec.case_number.clone(),
                    product_description: rec.product_description.clone(),
                    note: rec.note.clone(),
                });
                MergeOutcome::Inserted
            }
            Err(err) => {
                warn!(doc_id, %err, "fact insert failed");
                MergeOutcome::Error
            }
        };
    };

    let patch = diff_patch(fact, rec);
    if patch.is_empty() {
        return MergeOutcome::Unchanged;
    }
    match store.update_fact_fields(fact.fact_id, &patch) {
        Ok(()) => {
            apply_patch(fact, &patch);
            MergeOutcome::Merged
        }
        Err(err) => {
            warn!(fact_id = fact.fact_id, %err, "fact update failed");
            MergeOutcome::Error
        }
    }
}

/// Fill null fields across every fact of one case, spanning documents.
///
/// Donor priority for each null field: a sibling fact with the value for
/// the same company and country, then the same company, then any sibling.
/// The priority order matters empirically (a review notice should inherit
/// its own company's code, not the first one seen) and is kept exact.
///
/// A null product code inherits the donor tier's full distinct code list,
/// not one value: the first code fills the row and each remaining code
/// becomes a sibling row, so a notice that never cites codes still ends up
/// with one atomic fact per (code, company) pair. Returns how many rows
/// were filled or inserted.
pub fn backfill_case(store: &FactStore, case_number: &str) -> Result<usize, StoreError> {
    let facts = store.facts_for_case(case_number)?;
    if facts.len() < 2 {
        return Ok(0);
    }

    let mut filled = 0usize;
    for fact in &facts {
        let donate = |get: &dyn Fn(&CanonicalFact) -> Option<String>| -> Option<String> {
            let siblings = || facts.iter().filter(|d| d.fact_id != fact.fact_id);
            siblings()
                .filter(|d| d.company == fact.company && d.country == fact.country)
                .find_map(|d| get(d))
                .or_else(|| {
                    siblings()
                        .filter(|d| d.company == fact.company)
                        .find_map(|d| get(d))
                })
                .or_else(|| siblings().find_map(|d| get(d)))
        };
        let fill = |have: &Option<String>, get: &dyn Fn(&CanonicalFact) -> Option<String>| {
            if have.is_none() { donate(get) } else { None }
        };

        let codes = if fact.hs_code.is_none() {
            donor_codes(&facts, fact)
        } else {
            Vec::new()
        };

        let patch = FactPatch {
            country: fill(&fact.country, &|d| d.country.clone()),
            hs_code: codes.first().cloned(),
            duty_type: fill(&fact.duty_type, &|d| d.duty_type.clone()),
            duty_rate: if fact.duty_rate.is_none() {
                donate(&|d| d.duty_rate.as_ref().map(ToString::to_string))
                    .as_deref()
                    .map(DutyRate::from_stored)
            } else {
                None
            },
            effective_from: fill(&fact.effective_from, &|d| d.effective_from.clone()),
            effective_to: fill(&fact.effective_to, &|d| d.effective_to.clone()),
            period_from: fill(&fact.period_from, &|d| d.period_from.clone()),
            period_to: fill(&fact.period_to, &|d| d.period_to.clone()),
            basis_law: fill(&fact.basis_law, &|d| d.basis_law.clone()),
            product_description: fill(&fact.product_description, &|d| {
                d.product_description.clone()
            }),
            ..Default::default()
        };
        if !patch.is_empty() {
            store.update_fact_fields(fact.fact_id, &patch)?;
            filled += 1;
        }

        for code in codes.iter().skip(1) {
            let exists = facts.iter().any(|d| {
                d.doc_id == fact.doc_id
                    && d.country == fact.country
                    && d.company == fact.company
                    && d.hs_code.as_deref() == Some(code)
                    && d.case_number == fact.case_number
            });
            if exists {
                continue;
            }
            let rec = sibling_record(fact, &patch, code);
            store.insert_fact(fact.doc_id, fact.issuing_jurisdiction.as_deref(), &rec)?;
            filled += 1;
        }
    }
    if filled > 0 {
        debug!(case_number, filled, "back-filled null fields within case");
    }
    Ok(filled)
}

/// Distinct codes the target may inherit, from the closest donor tier that
/// has any, in sibling order.
fn donor_codes(facts: &[CanonicalFact], target: &CanonicalFact) -> Vec<String> {
    let collect = |pred: &dyn Fn(&CanonicalFact) -> bool| -> Vec<String> {
        let mut codes: Vec<String> = Vec::new();
        for d in facts {
            if d.fact_id == target.fact_id || !pred(d) {
                continue;
            }
            if let Some(code) = &d.hs_code
                && !codes.contains(code)
            {
                codes.push(code.clone());
            }
        }
        codes
    };
    let tier = collect(&|d| d.company == target.company && d.country == target.country);
    if !tier.is_empty() {
        return tier;
    }
    let tier = collect(&|d| d.company == target.company);
    if !tier.is_empty() {
        return tier;
    }
    collect(&|_| true)
}

/// The target fact, with its back-fill patch applied and one inherited
/// code substituted, as an insertable record.
fn sibling_record(fact: &CanonicalFact, patch: &FactPatch, code: &str) -> CandidateRecord {
    let pick = |patched: &Option<String>, own: &Option<String>| -> Option<String> {
        patched.clone().or_else(|| own.clone())
    };
    CandidateRecord {
        country: pick(&patch.country, &fact.country),
        hs_code: Some(code.to_string()),
        duty_type: pick(&patch.duty_type, &fact.duty_type),
        duty_rate: patch.duty_rate.clone().or_else(|| fact.duty_rate.clone()),
        effective_from: pick(&patch.effective_from, &fact.effective_from),
        effective_to: pick(&patch.effective_to, &fact.effective_to),
        period_from: pick(&patch.period_from, &fact.period_from),
        period_to: pick(&patch.period_to, &fact.period_to),
        basis_law: pick(&patch.basis_law, &fact.basis_law),
        company: fact.company.clone(),
        case_number: fact.case_number.clone(),
        product_description: pick(&patch.product_description, &fact.product_description),
        note: fact.note.clone(),
    }
}
