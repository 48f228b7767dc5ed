use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use tariffact_core::jurisdiction;
use tariffact_core::record::DocumentMeta;
use tariffact_extract::ExtractClient;
use tariffact_reconcile::{ProcessOptions, process_document};
use tariffact_store::FactStore;

#[derive(Parser)]
#[command(name = "tariffact", version, about = "Trade-remedy tariff fact extraction and reconciliation")]
struct Cli {
    /// Path to the DuckDB database file; omit for an in-memory dry run.
    #[arg(long, env = "TARIFFACT_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract and reconcile one document, or every .txt file in a directory.
    Ingest {
        /// Document file or directory of documents.
        path: PathBuf,

        /// Base URL of the inference service.
        #[arg(long, env = "TARIFFACT_INFERENCE_URL", default_value = "http://localhost:8000")]
        inference_url: String,

        /// Model name passed to the inference service.
        #[arg(long, env = "TARIFFACT_MODEL", default_value = "extractor-v1")]
        model: String,

        /// Pages per extraction request.
        #[arg(long, default_value_t = 3)]
        pages_per_batch: usize,

        /// Treat each input file as a pre-extracted payload instead of
        /// calling the inference service.
        #[arg(long)]
        payload: bool,

        /// Delete the document's existing facts before re-ingesting.
        #[arg(long)]
        reprocess: bool,
    },
    /// Print fact and document counts.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let store = match &cli.db {
        Some(path) => FactStore::open_persistent(path)
            .with_context(|| format!("opening database {}", path.display()))?,
        None => FactStore::open().context("opening in-memory database")?,
    };

    match cli.command {
        Command::Ingest {
            path,
            inference_url,
            model,
            pages_per_batch,
            payload,
            reprocess,
        } => {
            let client = ExtractClient::new(inference_url, model);
            let options = ProcessOptions { reprocess };
            let files = collect_files(&path)?;
            anyhow::ensure!(!files.is_empty(), "no documents under {}", path.display());

            let mut failed = 0usize;
            for file in &files {
                let result = if payload {
                    ingest_payload_file(&store, file, options)
                } else {
                    ingest_file(&store, &client, file, pages_per_batch, options).await
                };
                if let Err(err) = result {
                    error!(file = %file.display(), %err, "ingest failed");
                    failed += 1;
                }
            }
            info!(total = files.len(), failed, "ingest run complete");
            anyhow::ensure!(failed == 0, "{failed} of {} documents failed", files.len());
        }
        Command::Stats => {
            println!("documents: {}", store.document_count()?);
            println!("facts:     {}", store.fact_count()?);
            for (jurisdiction, count) in store.stats_by_jurisdiction()? {
                println!("  {jurisdiction:<16} {count}");
            }
        }
    }
    Ok(())
}

fn collect_files(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(path)
        .with_context(|| format!("reading directory {}", path.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt" || ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

async fn ingest_file(
    store: &FactStore,
    client: &ExtractClient,
    file: &Path,
    pages_per_batch: usize,
    options: ProcessOptions,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let strategy = jurisdiction::detect(&file_name);

    let pages = split_pages(&text);
    let meta = DocumentMeta {
        file_name: file_name.clone(),
        file_path: file.display().to_string(),
        issuing_jurisdiction: jurisdiction::issuing_jurisdiction(&file_name).map(str::to_string),
        total_pages: Some(pages.len() as i64),
        file_size: std::fs::metadata(file).ok().map(|m| m.len() as i64),
        processing_mode: Some("text".into()),
    };
    info!(
        file = %file_name,
        jurisdiction = strategy.name(),
        pages = pages.len(),
        "ingesting document"
    );

    let mut payloads = Vec::new();
    for batch in pages.chunks(pages_per_batch.max(1)) {
        let payload = client.extract_batch(strategy, &batch.join("\n")).await?;
        payloads.push(payload);
    }

    let report = process_document(store, &meta, &text, &payloads, options)?;
    info!(
        file = %file_name,
        inserted = report.stats.inserted,
        merged = report.stats.merged,
        unchanged = report.stats.unchanged,
        errors = report.stats.errors,
        backfilled = report.backfilled,
        quality = report.worst_quality.as_str(),
        "document done"
    );
    Ok(())
}

/// Ingest a file whose content already is an extraction payload. There is
/// no document text to scan, so no code expansion happens here.
fn ingest_payload_file(
    store: &FactStore,
    file: &Path,
    options: ProcessOptions,
) -> anyhow::Result<()> {
    let payload = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let meta = DocumentMeta {
        file_name: file_name.clone(),
        file_path: file.display().to_string(),
        issuing_jurisdiction: jurisdiction::issuing_jurisdiction(&file_name).map(str::to_string),
        total_pages: None,
        file_size: std::fs::metadata(file).ok().map(|m| m.len() as i64),
        processing_mode: Some("payload".into()),
    };

    let report = process_document(store, &meta, "", &[payload], options)?;
    info!(
        file = %file_name,
        inserted = report.stats.inserted,
        merged = report.stats.merged,
        unchanged = report.stats.unchanged,
        errors = report.stats.errors,
        quality = report.worst_quality.as_str(),
        "payload ingested"
    );
    Ok(())
}

/// Split document text on form-feed page breaks; a document without them is
/// one page.
fn split_pages(text: &str) -> Vec<String> {
    text.split('\u{000C}').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_pages_on_form_feed() {
        let pages = split_pages("page one\u{000C}page two\u{000C}page three");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1], "page two");
    }

    #[test]
    fn document_without_breaks_is_one_page() {
        assert_eq!(split_pages("just text").len(), 1);
    }
}
