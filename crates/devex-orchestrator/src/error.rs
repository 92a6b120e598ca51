// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for devex-orchestrator.

use std::time::Duration;

use thiserror::Error;

use crate::platform::{PlatformError, PlatformOp, ResourceKind};
use crate::storage::{StorageOp, StoreError};

/// Orchestrator errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Input rejected before any external call was made.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A Kubernetes API call failed.
    #[error("Failed to {op} {kind} {name}: {source}")]
    Platform {
        /// Operation that failed.
        op: PlatformOp,
        /// Resource kind the operation targeted.
        kind: ResourceKind,
        /// Resource name (or label selector for list calls).
        name: String,
        /// Underlying client error.
        #[source]
        source: PlatformError,
    },

    /// An object storage call failed.
    #[error("Storage {op} failed for {target}: {source}")]
    Storage {
        /// Operation that failed.
        op: StorageOp,
        /// Key or prefix involved.
        target: String,
        /// Underlying client error.
        #[source]
        source: StoreError,
    },

    /// A polling loop hit its deadline.
    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout {
        /// What was being waited on.
        what: String,
        /// Configured deadline.
        after: Duration,
    },

    /// The ephemeral uploader exited non-zero.
    #[error("Workspace upload in pod {pod} exited with code {exit_code}")]
    FlushFailed {
        /// Pod the uploader ran in.
        pod: String,
        /// Exit code reported by the kubelet.
        exit_code: i32,
    },

    /// The outbound HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// A referenced resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Wrap a platform error with the call that produced it.
    pub fn platform(
        op: PlatformOp,
        kind: ResourceKind,
        name: impl Into<String>,
        source: PlatformError,
    ) -> Self {
        Self::Platform {
            op,
            kind,
            name: name.into(),
            source,
        }
    }

    /// Wrap a storage error with the call that produced it.
    pub fn storage(op: StorageOp, target: impl Into<String>, source: StoreError) -> Self {
        Self::Storage {
            op,
            target: target.into(),
            source,
        }
    }

    /// True when the platform refused a create because the resource exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::Platform {
                source: PlatformError::AlreadyExists { .. },
                ..
            }
        )
    }
}

/// Result type using the orchestrator [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_error_names_step() {
        let err = Error::platform(
            PlatformOp::Create,
            ResourceKind::Service,
            "abc123",
            PlatformError::Api("connection refused".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("create"));
        assert!(msg.contains("Service"));
        assert!(msg.contains("abc123"));
        assert!(msg.contains("connection refused"));
        assert!(!err.is_already_exists());
    }

    #[test]
    fn test_already_exists() {
        let err = Error::platform(
            PlatformOp::Create,
            ResourceKind::Deployment,
            "abc123",
            PlatformError::AlreadyExists {
                kind: ResourceKind::Deployment,
                name: "abc123".to_string(),
            },
        );
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_storage_error_names_target() {
        let err = Error::storage(
            StorageOp::List,
            "repl/u1/abc123/",
            StoreError::Request("503".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("list"));
        assert!(msg.contains("repl/u1/abc123/"));
    }
}
