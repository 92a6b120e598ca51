// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Object store trait definitions.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    /// Full keys, in listing order.
    pub keys: Vec<String>,
    /// Token for the next page; `None` on the last page.
    pub next_token: Option<String>,
}

/// Storage verbs, for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    /// List a prefix.
    List,
    /// Server-side copy.
    Copy,
    /// Delete one object.
    Delete,
    /// Bucket reachability check.
    Head,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::List => "list",
            Self::Copy => "copy",
            Self::Delete => "delete",
            Self::Head => "head",
        };
        f.write_str(verb)
    }
}

/// Errors from object store calls.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request reached the endpoint and failed.
    #[error("Request failed: {0}")]
    Request(String),

    /// The key or bucket does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The client could not be built or could not reach the endpoint.
    #[error("Client error: {0}")]
    Client(String),
}

/// Result type for object store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Raw S3-style operations on a single bucket.
///
/// Folder semantics (pagination, placeholder skipping, partial failure) live
/// in [`super::StorageGateway`]; implementations only translate calls.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend identifier (e.g. "s3", "mock").
    fn store_type(&self) -> &'static str;

    /// List up to one page of keys under `prefix`, resuming from `token`.
    async fn list_page(&self, prefix: &str, token: Option<&str>) -> Result<ObjectPage>;

    /// Copy `source` to `dest` within the bucket.
    async fn copy_object(&self, source: &str, dest: &str) -> Result<()>;

    /// Delete one key.
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Check the bucket exists and is reachable.
    async fn head_bucket(&self) -> Result<()>;
}
