use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("fact {0} not found")]
    FactNotFound(i64),

    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),
}
