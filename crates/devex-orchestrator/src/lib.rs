// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Devex Orchestrator - Repl Lifecycle Management
//!
//! This crate provisions and tears down per-user, per-session ephemeral
//! environments ("repls") on Kubernetes, with each workspace persisted in
//! S3-compatible object storage.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        HTTP API (axum)                           │
//! └──────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         ReplService                              │
//! │  ┌──────────────┐   ┌─────────────────────┐   ┌──────────────┐   │
//! │  │   Storage    │   │ LifecycleController │   │  Readiness   │   │
//! │  │   Gateway    │   │  (ResourceBuilder)  │   │    Prober    │   │
//! │  └──────────────┘   └─────────────────────┘   └──────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//!          │                      │                      │
//!          ▼                      ▼                      ▼
//!   ┌─────────────┐      ┌─────────────────┐     ┌───────────────┐
//!   │ S3 / R2 /   │      │  Kubernetes API │     │ runner /ping  │
//!   │ MinIO       │      │                 │     │ (public host) │
//!   └─────────────┘      └─────────────────┘     └───────────────┘
//! ```
//!
//! # Session resources
//!
//! | Resource | Name |
//! |----------|------|
//! | Deployment | `{session_id}` |
//! | Service | `{session_id}` |
//! | Ingress | `{session_id}-ingress` |
//! | Traefik Middleware | `{session_id}-stripprefix` |
//! | Workspace folder | `repl/{owner_id}/{session_id}/` |
//!
//! # Lifecycle
//!
//! Activation creates Deployment, Service, Middleware and Ingress in that
//! order and stops at the first failure. The Deployment's init container
//! restores the workspace from storage before the runner starts.
//!
//! Deactivation injects an `s3-uploader` ephemeral container into the running
//! pod, waits for it to exit, then deletes routing, service and workload.
//! Every deletion is attempted even if an earlier step failed; the outcome of
//! each step is returned in a [`controller::TeardownReport`].
//!
//! Deleting a repl tears the environment down without the upload, then purges
//! the workspace folder.
//!
//! # Configuration
//!
//! See [`config::Config::from_env`] for the environment variables.

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Resource creation and teardown against the platform.
pub mod controller;

/// Error types.
pub mod error;

/// Kubernetes resource templates.
pub mod manifest;

/// Orchestration platform backends.
pub mod platform;

/// Bounded polling loop.
pub mod poll;

/// Runner readiness probing.
pub mod readiness;

/// Repl operations composed from storage, controller and prober.
pub mod repl;

/// HTTP API.
pub mod server;

/// Session identity and derived names.
pub mod session;

/// Workspace folders in object storage.
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use repl::ReplService;
pub use session::Session;
