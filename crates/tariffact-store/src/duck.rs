//! DuckDB storage for documents and canonical tariff facts.

use std::path::Path;

// RecordBatch must come from the arrow build duckdb bundles, or query_arrow
// results would not unify with the caller's type.
use duckdb::arrow::record_batch::RecordBatch;
use duckdb::types::ToSql;
use duckdb::{Connection, Row, params, params_from_iter};
use tracing::info;

use tariffact_core::record::{CandidateRecord, CanonicalFact, DocumentMeta, DutyRate, FactPatch};

use crate::StoreError;

/// DuckDB store holding one `documents` row per source file and one
/// `tariff_facts` row per reconciled fact.
///
/// Facts belong to exactly one document and are only ever deleted through
/// [`delete_facts_for_document`](Self::delete_facts_for_document). Merge
/// semantics (null-fill only) live in the reconciliation layer; the store
/// exposes the matching primitive, [`update_fact_fields`](Self::update_fact_fields),
/// which can set columns but never clear them.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
pub struct FactStore {
    conn: Connection,
}

const FACT_COLUMNS: &str = "fact_id, doc_id, issuing_jurisdiction, country, hs_code, duty_type, \
     duty_rate, effective_from, effective_to, period_from, period_to, basis_law, company, \
     case_number, product_description, note";

impl FactStore {
    /// Open an in-memory DuckDB database with tables created.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE SEQUENCE IF NOT EXISTS doc_id_seq;
             CREATE SEQUENCE IF NOT EXISTS fact_id_seq;
             CREATE TABLE IF NOT EXISTS documents (
                 doc_id BIGINT PRIMARY KEY DEFAULT nextval('doc_id_seq'),
                 file_name VARCHAR NOT NULL UNIQUE,
                 file_path VARCHAR NOT NULL,
                 issuing_jurisdiction VARCHAR,
                 total_pages BIGINT,
                 file_size BIGINT,
                 processing_mode VARCHAR,
                 processed_at TIMESTAMP DEFAULT current_timestamp
             );
             CREATE TABLE IF NOT EXISTS tariff_facts (
                 fact_id BIGINT PRIMARY KEY DEFAULT nextval('fact_id_seq'),
                 doc_id BIGINT NOT NULL,
                 issuing_jurisdiction VARCHAR,
                 country VARCHAR,
                 hs_code VARCHAR,
                 duty_type VARCHAR,
                 duty_rate VARCHAR,
                 effective_from VARCHAR,
                 effective_to VARCHAR,
                 period_from VARCHAR,
                 period_to VARCHAR,
                 basis_law VARCHAR,
                 company VARCHAR,
                 case_number VARCHAR,
                 product_description VARCHAR,
                 note VARCHAR
             );
             CREATE INDEX IF NOT EXISTS idx_facts_doc ON tariff_facts (doc_id);
             CREATE INDEX IF NOT EXISTS idx_facts_case ON tariff_facts (case_number);",
        )?;
        Ok(())
    }

    // ── Documents ──

    /// Insert or refresh the document row for a file, returning its id.
    /// File name is the stable key; re-ingesting updates the metadata in
    /// place and keeps the id.
    pub fn upsert_document(&self, meta: &DocumentMeta) -> Result<i64, StoreError> {
        let doc_id: i64 = self.conn.query_row(
            "INSERT INTO documents
                 (file_name, file_path, issuing_jurisdiction, total_pages, file_size, processing_mode)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (file_name) DO UPDATE SET
                 file_path = excluded.file_path,
                 issuing_jurisdiction = excluded.issuing_jurisdiction,
                 total_pages = excluded.total_pages,
                 file_size = excluded.file_size,
                 processing_mode = excluded.processing_mode,
                 processed_at = now()
             RETURNING doc_id",
            params![
                meta.file_name,
                meta.file_path,
                meta.issuing_jurisdiction,
                meta.total_pages,
                meta.file_size,
                meta.processing_mode,
            ],
            |row| row.get(0),
        )?;
        Ok(doc_id)
    }

    /// Number of rows in the `documents` table.
    pub fn document_count(&self) -> Result<usize, StoreError> {
        self.count_table("documents")
    }

    // ── Facts ──

    /// Insert a new fact row for a document, returning its id.
    pub fn insert_fact(
        &self,
        doc_id: i64,
        issuing_jurisdiction: Option<&str>,
        rec: &CandidateRecord,
    ) -> Result<i64, StoreError> {
        let fact_id: i64 = self.conn.query_row(
            "INSERT INTO tariff_facts
                 (doc_id, issuing_jurisdiction, country, hs_code, duty_type, duty_rate,
                  effective_from, effective_to, period_from, period_to, basis_law, company,
                  case_number, product_description, note)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING fact_id",
            params![
                doc_id,
                issuing_jurisdiction,
                rec.country,
                rec.hs_code,
                rec.duty_type,
                rec.duty_rate.as_ref().map(ToString::to_string),
                rec.effective_from,
                rec.effective_to,
                rec.period_from,
                rec.period_to,
                rec.basis_law,
                rec.company,
                rec.case_number,
                rec.product_description,
                rec.note,
            ],
            |row| row.get(0),
        )?;
        Ok(fact_id)
    }

    /// All facts owned by a document, in insertion order.
    pub fn facts_for_document(&self, doc_id: i64) -> Result<Vec<CanonicalFact>, StoreError> {
        let sql =
            format!("SELECT {FACT_COLUMNS} FROM tariff_facts WHERE doc_id = ? ORDER BY fact_id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([doc_id], fact_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// All facts carrying a given case identifier, across documents.
    pub fn facts_for_case(&self, case_number: &str) -> Result<Vec<CanonicalFact>, StoreError> {
        let sql = format!(
            "SELECT {FACT_COLUMNS} FROM tariff_facts WHERE case_number = ? ORDER BY fact_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([case_number], fact_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Apply a null-fill patch to one fact. Only columns present in the
    /// patch are touched; an empty patch is a no-op.
    pub fn update_fact_fields(&self, fact_id: i64, patch: &FactPatch) -> Result<(), StoreError> {
        let mut sets: Vec<&'static str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        let mut push = |col: &'static str, v: Option<String>| {
            if let Some(v) = v {
                sets.push(col);
                values.push(Box::new(v));
            }
        };
        push("country = ?", patch.country.clone());
        push("company = ?", patch.company.clone());
        push("hs_code = ?", patch.hs_code.clone());
        push("case_number = ?", patch.case_number.clone());
        push("duty_type = ?", patch.duty_type.clone());
        push("duty_rate = ?", patch.duty_rate.as_ref().map(ToString::to_string));
        push("effective_from = ?", patch.effective_from.clone());
        push("effective_to = ?", patch.effective_to.clone());
        push("period_from = ?", patch.period_from.clone());
        push("period_to = ?", patch.period_to.clone());
        push("basis_law = ?", patch.basis_law.clone());
        push("product_description = ?", patch.product_description.clone());
        push("note = ?", patch.note.clone());

        if sets.is_empty() {
            return Ok(());
        }
        values.push(Box::new(fact_id));
        let sql = format!(
            "UPDATE tariff_facts SET {} WHERE fact_id = ?",
            sets.join(", ")
        );
        let updated = self
            .conn
            .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))?;
        if updated == 0 {
            return Err(StoreError::FactNotFound(fact_id));
        }
        Ok(())
    }

    /// Delete every fact owned by a document, returning how many went.
    /// Used only for explicit full reprocessing.
    pub fn delete_facts_for_document(&self, doc_id: i64) -> Result<usize, StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM tariff_facts WHERE doc_id = ?", [doc_id])?;
        if deleted > 0 {
            info!(doc_id, deleted, "cleared facts for reprocessing");
        }
        Ok(deleted)
    }

    /// Number of rows in the `tariff_facts` table.
    pub fn fact_count(&self) -> Result<usize, StoreError> {
        self.count_table("tariff_facts")
    }

    /// Fact counts grouped by issuing jurisdiction, descending.
    pub fn stats_by_jurisdiction(&self) -> Result<Vec<(String, usize)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT coalesce(issuing_jurisdiction, 'unknown'), count(*)::BIGINT
             FROM tariff_facts
             GROUP BY 1
             ORDER BY 2 DESC, 1",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn count_table(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT FROM {table}");
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ── Escape hatch ──

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }

    /// Access the underlying DuckDB connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn fact_from_row(row: &Row<'_>) -> duckdb::Result<CanonicalFact> {
    Ok(CanonicalFact {
        fact_id: row.get(0)?,
        doc_id: row.get(1)?,
        issuing_jurisdiction: row.get(2)?,
        country: row.get(3)?,
        hs_code: row.get(4)?,
        duty_type: row.get(5)?,
        duty_rate: row
            .get::<_, Option<String>>(6)?
            .map(|s| DutyRate::from_stored(&s)),
        effective_from: row.get(7)?,
        effective_to: row.get(8)?,
        period_from: row.get(9)?,
        period_to: row.get(10)?,
        basis_law: row.get(11)?,
        company: row.get(12)?,
        case_number: row.get(13)?,
        product_description: row.get(14)?,
        note: row.get(15)?,
    })
}
