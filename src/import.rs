//! Import pipeline orchestration.
//!
//! Coordinates the full flow for one table: read the export file → decode
//! each line → apply fixups → fetch the remote identifier snapshot → drop
//! rows already present → upload in chunks with per-record fallback.
//!
//! Decode failures are skipped and counted. Rejected records are counted
//! and the first few reported. Only configuration problems, unreadable
//! input and (with `on_pagination_error = "abort"`) an unreadable snapshot
//! stop the run.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{Config, TableConfig};
use crate::decode::StatementDecoder;
use crate::existing::fetch_existing_ids;
use crate::fixup;
use crate::models::Record;
use crate::progress::{ImportProgressReporter, ProgressMode};
use crate::remote::{RemoteStore, RestClient};
use crate::upload::{filter_new, upload, RecordFailure, UploadOptions};

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Read this file instead of the table's configured `input`.
    pub file: Option<PathBuf>,
    pub chunk_size: Option<usize>,
    /// Maximum number of decoded records to consider.
    pub limit: Option<usize>,
    pub dry_run: bool,
    /// Print a warning for every line that does not decode.
    pub verbose: bool,
}

/// Records decoded from one export file.
#[derive(Debug, Default)]
pub struct DecodedFile {
    pub records: Vec<Record>,
    pub lines_read: u64,
    pub skipped: u64,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub table: String,
    pub lines_read: u64,
    pub decoded: u64,
    pub skipped: u64,
    pub already_present: u64,
    /// Rows that would be written; only meaningful for dry runs.
    pub pending: u64,
    pub inserted: u64,
    pub failed: u64,
    pub failures: Vec<RecordFailure>,
    pub snapshot_incomplete: Option<String>,
    pub dry_run: bool,
}

impl ImportReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.snapshot_incomplete.is_none()
    }
}

/// Decode every line of `path` that is an INSERT into `table`, with fixups applied.
pub fn decode_file(
    path: &Path,
    table: &str,
    table_config: &TableConfig,
    verbose: bool,
) -> Result<DecodedFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    let decoder = StatementDecoder::new(table)?;

    let mut decoded = DecodedFile::default();
    for (n, line) in content.lines().enumerate() {
        decoded.lines_read += 1;
        match decoder.decode_statement(line) {
            Ok(mut record) => {
                fixup::apply_all(&table_config.fixups, &mut record);
                decoded.records.push(record);
            }
            Err(e) => {
                decoded.skipped += 1;
                if verbose && !line.trim().is_empty() {
                    eprintln!("Warning: {}:{} skipped: {}", path.display(), n + 1, e);
                }
            }
        }
    }

    Ok(decoded)
}

/// Input path for a table, honoring an override.
pub fn input_path(table_config: &TableConfig, file: Option<&Path>) -> PathBuf {
    file.map(Path::to_path_buf)
        .unwrap_or_else(|| table_config.input.clone())
}

/// Run an import against the configured remote and print the summary.
pub async fn run_import(
    config: &Config,
    table: &str,
    options: &ImportOptions,
    progress: ProgressMode,
) -> Result<()> {
    let remote = RestClient::from_config(&config.remote)?;
    let reporter = progress.reporter();
    let report =
        run_import_with_remote(config, table, options, &remote, reporter.as_ref()).await?;
    print_report(&report);
    Ok(())
}

/// Run an import against any [`RemoteStore`].
///
/// This is the entry point for tests and embedders that bring their own
/// destination.
pub async fn run_import_with_remote(
    config: &Config,
    table: &str,
    options: &ImportOptions,
    remote: &dyn RemoteStore,
    progress: &dyn ImportProgressReporter,
) -> Result<ImportReport> {
    if options.chunk_size == Some(0) {
        bail!("chunk size must be > 0");
    }

    let table_config = config.table(table)?;
    let resource = table_config.resource(table);
    let path = input_path(table_config, options.file.as_deref());

    let mut decoded = decode_file(&path, table, table_config, options.verbose)?;
    if let Some(limit) = options.limit {
        decoded.records.truncate(limit);
    }

    let snapshot = fetch_existing_ids(
        remote,
        table,
        resource,
        &table_config.id_column,
        config.upload.page_size,
        config.upload.on_pagination_error,
        progress,
    )
    .await?;
    if let Some(reason) = &snapshot.incomplete {
        eprintln!(
            "Warning: existing ids of '{}' are incomplete ({} fetched, {}); \
             already-imported rows may be retried",
            resource,
            snapshot.len(),
            reason
        );
    }

    if snapshot.unreadable > 0 {
        eprintln!(
            "Warning: {} remote rows of '{}' have no usable '{}' value",
            snapshot.unreadable, resource, table_config.id_column
        );
    }

    let mut report = ImportReport {
        table: table.to_string(),
        lines_read: decoded.lines_read,
        decoded: decoded.records.len() as u64,
        skipped: decoded.skipped,
        snapshot_incomplete: snapshot.incomplete.clone(),
        dry_run: options.dry_run,
        ..Default::default()
    };

    if options.dry_run {
        let (fresh, already_present) =
            filter_new(decoded.records, &snapshot, &table_config.id_column);
        report.already_present = already_present;
        report.pending = fresh.len() as u64;
        return Ok(report);
    }

    let upload_options = UploadOptions {
        chunk_size: options
            .chunk_size
            .or(table_config.chunk_size)
            .unwrap_or(config.upload.chunk_size),
        max_reported_failures: config.upload.max_reported_failures,
        error_detail_chars: config.upload.error_detail_chars,
        progress_every: config.upload.progress_every,
    };

    let summary = upload(
        remote,
        table,
        resource,
        &table_config.id_column,
        decoded.records,
        &snapshot,
        &upload_options,
        progress,
    )
    .await;

    report.already_present = summary.already_present;
    report.inserted = summary.succeeded;
    report.failed = summary.failed;
    report.failures = summary.failures;
    Ok(report)
}

pub fn print_report(report: &ImportReport) {
    if report.dry_run {
        println!("import {} (dry-run)", report.table);
    } else {
        println!("import {}", report.table);
    }
    println!("  lines read: {}", report.lines_read);
    println!("  decoded: {}", report.decoded);
    println!("  skipped (not decodable): {}", report.skipped);
    println!("  already present: {}", report.already_present);
    if report.dry_run {
        println!("  would insert: {}", report.pending);
        return;
    }
    println!("  inserted: {}", report.inserted);
    println!("  failed: {}", report.failed);
    for failure in &report.failures {
        let id = failure
            .id
            .as_ref()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "(no id)".to_string());
        println!("    record {}: {}", id, failure.detail);
    }
    if report.is_complete() {
        println!("ok");
    } else {
        println!("partial");
    }
}
