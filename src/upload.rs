//! Reconciling batch uploader.
//!
//! Records whose identifier is already in the remote snapshot are dropped
//! first. The rest go out in order, in chunks of at most `chunk_size`, one
//! request at a time. When a chunk write fails for any reason the chunk is
//! replayed one record per request, so a single bad row only costs itself.
//! Records that also fail alone are counted; the first few are kept with a
//! truncated error detail.

use crate::existing::IdSnapshot;
use crate::models::{Record, RecordKey};
use crate::progress::{ImportProgressEvent, ImportProgressReporter};
use crate::remote::RemoteStore;

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub chunk_size: usize,
    pub max_reported_failures: usize,
    pub error_detail_chars: usize,
    pub progress_every: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            max_reported_failures: 20,
            error_detail_chars: 150,
            progress_every: 10,
        }
    }
}

/// A record that failed both as part of its chunk and on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    pub id: Option<RecordKey>,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct UploadSummary {
    /// Dropped before upload because the destination already has them.
    pub already_present: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub batches: u64,
    /// Chunks that were replayed record by record.
    pub fallback_batches: u64,
    /// The first `max_reported_failures` failures.
    pub failures: Vec<RecordFailure>,
}

/// Split `records` into those not yet present remotely and a count of the rest.
///
/// Records without a usable identifier are always kept.
pub fn filter_new(
    records: Vec<Record>,
    existing: &IdSnapshot,
    id_column: &str,
) -> (Vec<Record>, u64) {
    let before = records.len();
    let fresh: Vec<Record> = records
        .into_iter()
        .filter(|r| match r.key(id_column) {
            Some(key) => !existing.contains(&key),
            None => true,
        })
        .collect();
    let dropped = (before - fresh.len()) as u64;
    (fresh, dropped)
}

/// Filter against `existing`, then upload what is left.
#[allow(clippy::too_many_arguments)]
pub async fn upload(
    remote: &dyn RemoteStore,
    table: &str,
    resource: &str,
    id_column: &str,
    records: Vec<Record>,
    existing: &IdSnapshot,
    options: &UploadOptions,
    progress: &dyn ImportProgressReporter,
) -> UploadSummary {
    let (fresh, already_present) = filter_new(records, existing, id_column);
    let mut summary =
        upload_records(remote, table, resource, id_column, fresh, options, progress).await;
    summary.already_present = already_present;
    summary
}

/// Upload `records` in chunks with per-record fallback.
pub async fn upload_records(
    remote: &dyn RemoteStore,
    table: &str,
    resource: &str,
    id_column: &str,
    records: Vec<Record>,
    options: &UploadOptions,
    progress: &dyn ImportProgressReporter,
) -> UploadSummary {
    let mut summary = UploadSummary::default();
    if records.is_empty() {
        return summary;
    }

    let chunk_size = options.chunk_size.max(1);
    let every = options.progress_every.max(1) as u64;
    let total_batches = records.len().div_ceil(chunk_size) as u64;

    for (index, chunk) in records.chunks(chunk_size).enumerate() {
        let batch = index as u64 + 1;
        summary.batches += 1;

        let fell_back = match remote.insert(resource, chunk).await {
            Ok(()) => {
                summary.succeeded += chunk.len() as u64;
                false
            }
            Err(_) => {
                summary.fallback_batches += 1;
                for record in chunk {
                    match remote.insert(resource, std::slice::from_ref(record)).await {
                        Ok(()) => summary.succeeded += 1,
                        Err(e) => {
                            summary.failed += 1;
                            if summary.failures.len() < options.max_reported_failures {
                                let failure = RecordFailure {
                                    id: record.key(id_column),
                                    detail: truncate_chars(
                                        &e.to_string(),
                                        options.error_detail_chars,
                                    ),
                                };
                                progress.report(ImportProgressEvent::RecordFailed {
                                    table: table.to_string(),
                                    id: failure
                                        .id
                                        .as_ref()
                                        .map(|k| k.to_string())
                                        .unwrap_or_else(|| "(no id)".to_string()),
                                    detail: failure.detail.clone(),
                                });
                                summary.failures.push(failure);
                            }
                        }
                    }
                }
                true
            }
        };

        if batch == 1 || batch % every == 0 || batch == total_batches || fell_back {
            progress.report(ImportProgressEvent::Batch {
                table: table.to_string(),
                batch,
                total_batches,
                fell_back,
                inserted: summary.succeeded,
            });
        }
    }

    summary
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
