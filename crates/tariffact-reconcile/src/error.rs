use thiserror::Error;

use tariffact_store::StoreError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// No extraction batch for the document yielded a single usable record.
    #[error("no records extracted from document: {0}")]
    EmptyExtraction(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
