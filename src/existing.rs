//! Snapshot of identifiers already present at the destination.
//!
//! The snapshot is fetched page by page at increasing offsets and is read
//! once per run, before anything is written. The loop stops at the first
//! page shorter than the page size (or an empty page), so a table of
//! exactly `k * page_size` rows costs one extra, empty request. Page length
//! is the number of rows returned, counted before unusable identifiers are
//! dropped.

use anyhow::{bail, Result};
use std::collections::HashSet;

use crate::config::PaginationFailure;
use crate::models::RecordKey;
use crate::progress::{ImportProgressEvent, ImportProgressReporter};
use crate::remote::RemoteStore;

/// Identifiers present remotely. Used only as a membership test.
#[derive(Debug, Default)]
pub struct IdSnapshot {
    pub ids: HashSet<RecordKey>,
    /// Pages requested, including the terminal one.
    pub pages: usize,
    /// Set when a page failed and the snapshot kept what it had.
    pub incomplete: Option<String>,
    /// Remote rows whose identifier could not be used as a key.
    pub unreadable: usize,
}

impl IdSnapshot {
    pub fn contains(&self, key: &RecordKey) -> bool {
        self.ids.contains(key)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub async fn fetch_existing_ids(
    remote: &dyn RemoteStore,
    table: &str,
    resource: &str,
    id_column: &str,
    page_size: usize,
    on_failure: PaginationFailure,
    progress: &dyn ImportProgressReporter,
) -> Result<IdSnapshot> {
    if page_size == 0 {
        bail!("page size must be > 0");
    }

    let mut snapshot = IdSnapshot::default();
    let mut offset = 0;

    loop {
        snapshot.pages += 1;
        let page = match remote.fetch_ids(resource, id_column, offset, page_size).await {
            Ok(page) => page,
            Err(e) => match on_failure {
                PaginationFailure::Abort => bail!(
                    "failed to read existing ids of '{}' at offset {}: {}",
                    resource,
                    offset,
                    e
                ),
                PaginationFailure::Partial => {
                    snapshot.incomplete =
                        Some(format!("page at offset {} failed: {}", offset, e));
                    break;
                }
            },
        };

        let rows = page.rows;
        snapshot.unreadable += page.unreadable();
        snapshot.ids.extend(page.keys);
        progress.report(ImportProgressEvent::FetchingIds {
            table: table.to_string(),
            fetched: snapshot.ids.len() as u64,
        });

        if rows < page_size {
            break;
        }
        offset += page_size;
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use crate::progress::NoProgress;
    use crate::remote::{IdPage, RemoteError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves `total` sequential ids; fails the page starting at `fail_at`.
    /// Rows listed in `null_ids` come back without a usable id.
    struct PagedIds {
        total: usize,
        fail_at: Option<usize>,
        null_ids: Vec<usize>,
        requests: Mutex<Vec<(usize, usize)>>,
    }

    impl PagedIds {
        fn new(total: usize, fail_at: Option<usize>) -> Self {
            Self {
                total,
                fail_at,
                null_ids: Vec::new(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<(usize, usize)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteStore for PagedIds {
        async fn fetch_ids(
            &self,
            _resource: &str,
            _id_column: &str,
            offset: usize,
            limit: usize,
        ) -> Result<IdPage, RemoteError> {
            self.requests.lock().unwrap().push((offset, limit));
            if self.fail_at == Some(offset) {
                return Err(RemoteError::Rejected {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            let end = (offset + limit).min(self.total);
            Ok(IdPage {
                rows: end.saturating_sub(offset),
                keys: (offset..end)
                    .filter(|i| !self.null_ids.contains(i))
                    .map(|i| RecordKey::Int(i as i64 + 1))
                    .collect(),
            })
        }

        async fn insert(&self, _resource: &str, _records: &[Record]) -> Result<(), RemoteError> {
            unreachable!("snapshot never writes")
        }
    }

    async fn fetch(remote: &PagedIds, policy: PaginationFailure) -> Result<IdSnapshot> {
        fetch_existing_ids(remote, "t", "t", "id", 10, policy, &NoProgress).await
    }

    #[tokio::test]
    async fn stops_after_short_page_without_extra_request() {
        let remote = PagedIds::new(25, None);
        let snapshot = fetch(&remote, PaginationFailure::Partial).await.unwrap();

        assert_eq!(snapshot.len(), 25);
        assert_eq!(remote.requests(), vec![(0, 10), (10, 10), (20, 10)]);
        assert!(snapshot.incomplete.is_none());
    }

    #[tokio::test]
    async fn exact_multiple_ends_on_empty_page() {
        let remote = PagedIds::new(20, None);
        let snapshot = fetch(&remote, PaginationFailure::Partial).await.unwrap();

        assert_eq!(snapshot.len(), 20);
        assert_eq!(snapshot.pages, 3);
    }

    #[tokio::test]
    async fn empty_table_costs_one_request() {
        let remote = PagedIds::new(0, None);
        let snapshot = fetch(&remote, PaginationFailure::Partial).await.unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(remote.requests().len(), 1);
    }

    #[tokio::test]
    async fn partial_policy_keeps_accumulated_ids() {
        let remote = PagedIds::new(35, Some(20));
        let snapshot = fetch(&remote, PaginationFailure::Partial).await.unwrap();

        assert_eq!(snapshot.len(), 20);
        assert!(snapshot.contains(&RecordKey::Int(20)));
        assert!(!snapshot.contains(&RecordKey::Int(21)));
        assert!(snapshot.incomplete.as_deref().unwrap().contains("offset 20"));
    }

    #[tokio::test]
    async fn abort_policy_fails() {
        let remote = PagedIds::new(35, Some(10));
        let err = fetch(&remote, PaginationFailure::Abort).await.unwrap_err();
        assert!(err.to_string().contains("offset 10"), "{}", err);
    }

    #[tokio::test]
    async fn unusable_id_in_full_page_does_not_end_paging() {
        let mut remote = PagedIds::new(25, None);
        remote.null_ids = vec![1];
        let snapshot = fetch(&remote, PaginationFailure::Partial).await.unwrap();

        assert_eq!(remote.requests(), vec![(0, 10), (10, 10), (20, 10)]);
        assert_eq!(snapshot.len(), 24);
        assert_eq!(snapshot.unreadable, 1);
        assert!(snapshot.contains(&RecordKey::Int(25)));
        assert!(!snapshot.contains(&RecordKey::Int(2)));
        assert!(snapshot.incomplete.is_none());
    }
}
