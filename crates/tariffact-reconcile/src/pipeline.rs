//! Per-document ingest pipeline: recover, normalize, expand, dedup, merge,
//! back-fill.

use tracing::{info, warn};

use tariffact_core::record::{CandidateRecord, DocumentMeta, MergeStats};
use tariffact_core::recover::ParseQuality;
use tariffact_core::{dedup_records, expand, jurisdiction, normalize_record, recover_items};
use tariffact_store::FactStore;

use crate::error::ReconcileError;
use crate::merge::{backfill_case, merge_record};

/// Per-document ingest options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Delete the document's existing facts before merging. Without this,
    /// re-ingesting merges into the surviving rows.
    pub reprocess: bool,
}

/// What one document ingest did, for reporting.
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub doc_id: i64,
    /// Records recovered across all payload batches, pre-expansion.
    pub recovered: usize,
    /// Records after code expansion and deduplication.
    pub merged_input: usize,
    pub stats: MergeStats,
    pub backfilled: usize,
    /// Worst parse quality seen across the document's batches.
    pub worst_quality: ParseQuality,
}

/// Ingest one document's extraction payloads into the fact table.
///
/// `payloads` holds one raw extraction response per page batch;
/// `document_text` is the full source text, scanned for product codes when
/// the jurisdiction expands them. Fails only when every batch comes back
/// empty; per-record problems degrade to nulls or error counts.
pub fn process_document(
    store: &FactStore,
    meta: &DocumentMeta,
    document_text: &str,
    payloads: &[String],
    options: ProcessOptions,
) -> Result<DocumentReport, ReconcileError> {
    let strategy = jurisdiction::detect(&meta.file_name);
    let filename_case = jurisdiction::case_number_from_filename(&meta.file_name);

    let doc_id = store.upsert_document(meta)?;
    if options.reprocess {
        store.delete_facts_for_document(doc_id)?;
    }

    let mut records: Vec<CandidateRecord> = Vec::new();
    let mut worst_quality = ParseQuality::Clean;
    for (batch, payload) in payloads.iter().enumerate() {
        let (items, quality) = recover_items(payload);
        if matches!(quality, ParseQuality::Repaired | ParseQuality::Salvaged)
            || (matches!(quality, ParseQuality::Empty) && !payload.trim().is_empty())
        {
            warn!(
                file = %meta.file_name,
                batch,
                quality = quality.as_str(),
                recovered = items.len(),
                "extraction payload needed recovery"
            );
        }
        worst_quality = worse(worst_quality, quality);
        records.extend(items);
    }
    if records.is_empty() {
        return Err(ReconcileError::EmptyExtraction(meta.file_name.clone()));
    }
    let recovered = records.len();

    for rec in &mut records {
        if rec.case_number.is_none() {
            rec.case_number = filename_case.clone();
        }
        let report = normalize_record(rec, strategy);
        if !report.is_clean() {
            warn!(
                file = %meta.file_name,
                rejected_codes = report.rejected_codes.len(),
                rejected_cases = report.rejected_case_numbers.len(),
                rejected_countries = report.rejected_countries.len(),
                "rejected unusable field values"
            );
        }
    }

    if strategy.expands_codes() {
        let codes = strategy.scan_codes(document_text);
        records = expand(&codes, records);
    }
    let records = dedup_records(records);
    let merged_input = records.len();

    let mut existing = store.facts_for_document(doc_id)?;
    let mut stats = MergeStats::default();
    let issuing = meta.issuing_jurisdiction.as_deref();
    for rec in &records {
        stats.record(merge_record(store, doc_id, issuing, &mut existing, rec));
    }

    let mut cases: Vec<String> = records
        .iter()
        .filter_map(|r| r.case_number.clone())
        .collect();
    cases.sort();
    cases.dedup();
    let mut backfilled = 0usize;
    for case in &cases {
        backfilled += backfill_case(store, case)?;
    }

    info!(
        file = %meta.file_name,
        doc_id,
        recovered,
        merged_input,
        inserted = stats.inserted,
        merged = stats.merged,
        unchanged = stats.unchanged,
        errors = stats.errors,
        backfilled,
        quality = worst_quality.as_str(),
        "document ingested"
    );

    Ok(DocumentReport {
        doc_id,
        recovered,
        merged_input,
        stats,
        backfilled,
        worst_quality,
    })
}

fn worse(a: ParseQuality, b: ParseQuality) -> ParseQuality {
    fn rank(q: ParseQuality) -> u8 {
        match q {
            ParseQuality::Clean => 0,
            ParseQuality::Repaired => 1,
            ParseQuality::Salvaged => 2,
            ParseQuality::Empty => 3,
        }
    }
    if rank(b) > rank(a) { b } else { a }
}
