// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock object store for testing.
//!
//! Keeps objects in a sorted map and pages listings with a configurable page
//! size. Continuation tokens are the last key of the previous page.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::*;

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug)]
struct MockStoreState {
    objects: BTreeMap<String, String>,
    page_size: usize,
    failing_keys: HashSet<String>,
    listing_fails: bool,
    reachable: bool,
    list_calls: usize,
    copies: Vec<(String, String)>,
    deletes: Vec<String>,
}

/// Mock object store for testing.
#[derive(Clone)]
pub struct MockObjectStore {
    state: Arc<Mutex<MockStoreState>>,
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockObjectStore {
    /// Create an empty bucket.
    pub fn new() -> Self {
        Self::with_objects(std::iter::empty::<(String, String)>())
    }

    /// Create a bucket holding `(key, body)` pairs.
    pub fn with_objects<K, V>(objects: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            state: Arc::new(Mutex::new(MockStoreState {
                objects: objects
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
                page_size: DEFAULT_PAGE_SIZE,
                failing_keys: HashSet::new(),
                listing_fails: false,
                reachable: true,
                list_calls: 0,
                copies: Vec::new(),
                deletes: Vec::new(),
            })),
        }
    }

    /// Set the maximum keys per listing page.
    pub async fn set_page_size(&self, page_size: usize) {
        self.state.lock().await.page_size = page_size.max(1);
    }

    /// Make copies from, and deletes of, `key` fail.
    pub async fn fail_key(&self, key: impl Into<String>) {
        self.state.lock().await.failing_keys.insert(key.into());
    }

    /// Make every listing fail.
    pub async fn fail_listing(&self) {
        self.state.lock().await.listing_fails = true;
    }

    /// Make `head_bucket` fail.
    pub async fn set_unreachable(&self) {
        self.state.lock().await.reachable = false;
    }

    /// Every key currently stored, sorted.
    pub async fn keys(&self) -> Vec<String> {
        self.state.lock().await.objects.keys().cloned().collect()
    }

    /// Keys currently stored under `prefix`, sorted.
    pub async fn keys_under(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Body stored at `key`.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.state.lock().await.objects.get(key).cloned()
    }

    /// Number of `list_page` calls made.
    pub async fn list_calls(&self) -> usize {
        self.state.lock().await.list_calls
    }

    /// Successful and failed copy attempts, in order.
    pub async fn copies(&self) -> Vec<(String, String)> {
        self.state.lock().await.copies.clone()
    }

    /// Delete attempts, in order.
    pub async fn deletes(&self) -> Vec<String> {
        self.state.lock().await.deletes.clone()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    fn store_type(&self) -> &'static str {
        "mock"
    }

    async fn list_page(&self, prefix: &str, token: Option<&str>) -> Result<ObjectPage> {
        let mut state = self.state.lock().await;
        state.list_calls += 1;
        if state.listing_fails {
            return Err(StoreError::Request("listing unavailable".to_string()));
        }

        let start = match token {
            Some(after) => Bound::Excluded(after.to_string()),
            None => Bound::Included(prefix.to_string()),
        };
        let mut matching = state
            .objects
            .range((start, Bound::Unbounded))
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix));

        let keys: Vec<String> = matching.by_ref().take(state.page_size).cloned().collect();
        let next_token = match (matching.next(), keys.last()) {
            (Some(_), Some(last)) => Some(last.clone()),
            _ => None,
        };

        Ok(ObjectPage { keys, next_token })
    }

    async fn copy_object(&self, source: &str, dest: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.copies.push((source.to_string(), dest.to_string()));
        if state.failing_keys.contains(source) {
            return Err(StoreError::Request(format!("copy of {} rejected", source)));
        }
        let body = state
            .objects
            .get(source)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(source.to_string()))?;
        state.objects.insert(dest.to_string(), body);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.deletes.push(key.to_string());
        if state.failing_keys.contains(key) {
            return Err(StoreError::Request(format!("delete of {} rejected", key)));
        }
        // S3 deletes are idempotent.
        state.objects.remove(key);
        Ok(())
    }

    async fn head_bucket(&self) -> Result<()> {
        if self.state.lock().await.reachable {
            Ok(())
        } else {
            Err(StoreError::Client("endpoint unreachable".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_paging_tokens() {
        let store = MockObjectStore::with_objects([
            ("a/1", ""),
            ("a/2", ""),
            ("a/3", ""),
            ("b/1", ""),
        ]);
        store.set_page_size(2).await;

        let first = store.list_page("a/", None).await.unwrap();
        assert_eq!(first.keys, ["a/1", "a/2"]);
        assert_eq!(first.next_token.as_deref(), Some("a/2"));

        let second = store.list_page("a/", first.next_token.as_deref()).await.unwrap();
        assert_eq!(second.keys, ["a/3"]);
        assert_eq!(second.next_token, None);
    }

    #[tokio::test]
    async fn test_exact_page_has_no_token() {
        let store = MockObjectStore::with_objects([("a/1", ""), ("a/2", "")]);
        store.set_page_size(2).await;

        let page = store.list_page("a/", None).await.unwrap();
        assert_eq!(page.keys.len(), 2);
        assert_eq!(page.next_token, None);
    }

    #[tokio::test]
    async fn test_copy_and_failures() {
        let store = MockObjectStore::with_objects([("a/1", "one"), ("a/2", "two")]);
        store.fail_key("a/2").await;

        store.copy_object("a/1", "b/1").await.unwrap();
        assert!(store.copy_object("a/2", "b/2").await.is_err());

        assert_eq!(store.get("b/1").await.as_deref(), Some("one"));
        assert_eq!(store.get("b/2").await, None);
        assert_eq!(store.copies().await.len(), 2);
    }
}
