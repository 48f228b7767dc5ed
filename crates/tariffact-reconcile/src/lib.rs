//! Reconciliation layer: merges candidate records into canonical facts and
//! drives the per-document ingest pipeline.

mod error;
pub use error::ReconcileError;

mod merge;
pub use merge::{backfill_case, diff_patch, merge_record};

mod pipeline;
pub use pipeline::{DocumentReport, ProcessOptions, process_document};
