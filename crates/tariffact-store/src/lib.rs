//! Storage layer: DuckDB-backed canonical fact and document tables.

mod error;
pub use error::StoreError;

mod duck;
pub use duck::FactStore;
