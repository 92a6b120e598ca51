// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Folder-level operations over an [`ObjectStore`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::traits::{ObjectStore, StorageOp};
use crate::error::{Error, Result};

/// Counts from a folder copy or delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Keys returned by listing.
    pub listed: usize,
    /// Objects copied or deleted.
    pub processed: usize,
    /// Folder placeholders (keys ending in `/`) left alone.
    pub skipped: usize,
    /// Objects whose copy or delete failed.
    pub failed: usize,
}

impl SyncSummary {
    /// True when no object failed.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Folder-scoped copy, delete and list.
///
/// Listing errors abort the operation. Per-object errors are logged, counted
/// in [`SyncSummary::failed`], and the walk continues.
#[derive(Clone)]
pub struct StorageGateway {
    store: Arc<dyn ObjectStore>,
}

impl StorageGateway {
    /// Wrap a store.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Copy every object under `source_prefix` to `dest_prefix`, keeping the
    /// relative key structure.
    pub async fn copy_folder(&self, source_prefix: &str, dest_prefix: &str) -> Result<SyncSummary> {
        let dest_root = dest_prefix.trim_end_matches('/');
        let mut summary = SyncSummary::default();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .store
                .list_page(source_prefix, token.as_deref())
                .await
                .map_err(|e| Error::storage(StorageOp::List, source_prefix, e))?;
            summary.listed += page.keys.len();

            for key in &page.keys {
                if key.ends_with('/') {
                    summary.skipped += 1;
                    continue;
                }
                let relative = key
                    .strip_prefix(source_prefix)
                    .unwrap_or(key)
                    .trim_start_matches('/');
                let dest = if dest_root.is_empty() {
                    relative.to_string()
                } else {
                    format!("{}/{}", dest_root, relative)
                };

                match self.store.copy_object(key, &dest).await {
                    Ok(()) => {
                        debug!(source = %key, dest = %dest, "Copied object");
                        summary.processed += 1;
                    }
                    Err(e) => {
                        warn!(source = %key, dest = %dest, error = %e, "Failed to copy object");
                        summary.failed += 1;
                    }
                }
            }

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        info!(
            source = %source_prefix,
            dest = %dest_prefix,
            copied = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Folder copy finished"
        );
        Ok(summary)
    }

    /// Delete every object under `prefix`, placeholders included.
    pub async fn delete_folder(&self, prefix: &str) -> Result<SyncSummary> {
        let mut summary = SyncSummary::default();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .store
                .list_page(prefix, token.as_deref())
                .await
                .map_err(|e| Error::storage(StorageOp::List, prefix, e))?;

            if page.keys.is_empty() && token.is_none() {
                debug!(prefix = %prefix, "Nothing to delete");
                return Ok(summary);
            }
            summary.listed += page.keys.len();

            for key in &page.keys {
                match self.store.delete_object(key).await {
                    Ok(()) => summary.processed += 1,
                    Err(e) => {
                        warn!(key = %key, error = %e, "Failed to delete object");
                        summary.failed += 1;
                    }
                }
            }

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        info!(
            prefix = %prefix,
            deleted = summary.processed,
            failed = summary.failed,
            "Folder delete finished"
        );
        Ok(summary)
    }

    /// Keys under `prefix`.
    ///
    /// Reads a single listing page, so very large folders are truncated at
    /// the backend's page size.
    pub async fn list_folder(&self, prefix: &str) -> Result<Vec<String>> {
        let page = self
            .store
            .list_page(prefix, None)
            .await
            .map_err(|e| Error::storage(StorageOp::List, prefix, e))?;
        if page.next_token.is_some() {
            debug!(prefix = %prefix, returned = page.keys.len(), "Folder listing truncated");
        }
        Ok(page.keys)
    }

    /// Bucket reachability.
    pub async fn ping(&self) -> Result<()> {
        self.store
            .head_bucket()
            .await
            .map_err(|e| Error::storage(StorageOp::Head, self.store.store_type(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockObjectStore;

    #[tokio::test]
    async fn test_copy_preserves_relative_structure() {
        let store = MockObjectStore::with_objects([
            ("base/node/", ""),
            ("base/node/index.js", "console.log(1)"),
            ("base/node/src/", ""),
            ("base/node/src/lib.js", "module.exports = {}"),
            ("base/python/main.py", "print(1)"),
        ]);
        let gateway = StorageGateway::new(Arc::new(store.clone()));

        let summary = gateway
            .copy_folder("base/node/", "repl/u1/abc123/")
            .await
            .unwrap();

        assert_eq!(
            summary,
            SyncSummary {
                listed: 4,
                processed: 2,
                skipped: 2,
                failed: 0
            }
        );
        assert_eq!(
            store.keys_under("repl/u1/abc123/").await,
            ["repl/u1/abc123/index.js", "repl/u1/abc123/src/lib.js"]
        );
        assert_eq!(
            store.get("repl/u1/abc123/src/lib.js").await.as_deref(),
            Some("module.exports = {}")
        );
    }

    #[tokio::test]
    async fn test_copy_continues_past_failures() {
        let store = MockObjectStore::with_objects([("a/1", "1"), ("a/2", "2"), ("a/3", "3")]);
        store.fail_key("a/2").await;
        let gateway = StorageGateway::new(Arc::new(store.clone()));

        let summary = gateway.copy_folder("a/", "b/").await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_complete());
        assert_eq!(store.keys_under("b/").await, ["b/1", "b/3"]);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts() {
        let store = MockObjectStore::with_objects([("a/1", "1")]);
        store.fail_listing().await;
        let gateway = StorageGateway::new(Arc::new(store.clone()));

        let err = gateway.copy_folder("a/", "b/").await.unwrap_err();

        assert!(matches!(
            err,
            Error::Storage {
                op: StorageOp::List,
                ..
            }
        ));
        assert!(store.copies().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_empty_folder_is_noop() {
        let store = MockObjectStore::with_objects([("other/1", "1")]);
        let gateway = StorageGateway::new(Arc::new(store.clone()));

        let summary = gateway.delete_folder("repl/u1/abc123/").await.unwrap();

        assert_eq!(summary, SyncSummary::default());
        assert_eq!(store.list_calls().await, 1);
        assert_eq!(store.keys().await, ["other/1"]);
    }

    #[tokio::test]
    async fn test_list_folder_single_page() {
        let store = MockObjectStore::with_objects([("a/1", ""), ("a/2", ""), ("a/3", "")]);
        store.set_page_size(2).await;
        let gateway = StorageGateway::new(Arc::new(store.clone()));

        let keys = gateway.list_folder("a/").await.unwrap();

        assert_eq!(keys, ["a/1", "a/2"]);
        assert_eq!(store.list_calls().await, 1);
    }

    #[tokio::test]
    async fn test_ping() {
        let store = MockObjectStore::new();
        let gateway = StorageGateway::new(Arc::new(store.clone()));
        gateway.ping().await.unwrap();

        store.set_unreachable().await;
        assert!(matches!(
            gateway.ping().await,
            Err(Error::Storage {
                op: StorageOp::Head,
                ..
            })
        ));
    }
}
