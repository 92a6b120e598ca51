// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Platform trait definitions.
//!
//! Defines the slice of the Kubernetes API the lifecycle controller needs.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::DynamicObject;
use serde::Serialize;
use thiserror::Error;

/// Kinds of resource the orchestrator touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ResourceKind {
    /// Compute workload.
    Deployment,
    /// Internal network service.
    Service,
    /// Traefik path-rewrite middleware.
    Middleware,
    /// External routing rule.
    Ingress,
    /// Running workload instance.
    Pod,
    /// Cluster node (health checks only).
    Node,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deployment => "Deployment",
            Self::Service => "Service",
            Self::Middleware => "Middleware",
            Self::Ingress => "Ingress",
            Self::Pod => "Pod",
            Self::Node => "Node",
        };
        f.write_str(name)
    }
}

/// Verbs the orchestrator issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PlatformOp {
    /// Create a resource.
    Create,
    /// Delete a resource.
    Delete,
    /// List resources.
    List,
    /// Read a resource.
    Get,
    /// Replace a subresource.
    Update,
}

impl fmt::Display for PlatformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Get => "get",
            Self::Update => "update",
        };
        f.write_str(verb)
    }
}

/// Errors from platform calls.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlatformError {
    /// Create refused because the name is taken.
    #[error("{kind} {name} already exists")]
    AlreadyExists {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource name.
        name: String,
    },

    /// The named resource does not exist.
    #[error("{kind} {name} not found")]
    NotFound {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource name.
        name: String,
    },

    /// API server rejected or failed the request.
    #[error("API error: {0}")]
    Api(String),

    /// Client could not be configured or reach the cluster.
    #[error("Client error: {0}")]
    Client(String),

    /// Request body could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Kubernetes operations used by the lifecycle controller.
///
/// Implementations only translate calls; ordering, aggregation and retries
/// are the controller's concern. All names are namespace-relative.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Platform type identifier (e.g. "kubernetes", "mock").
    fn platform_type(&self) -> &'static str;

    /// Create the session workload.
    async fn create_deployment(&self, deployment: &Deployment) -> Result<()>;

    /// Create the session's internal service.
    async fn create_service(&self, service: &Service) -> Result<()>;

    /// Create a Traefik middleware custom resource.
    async fn create_middleware(&self, middleware: &DynamicObject) -> Result<()>;

    /// Create the session's ingress.
    async fn create_ingress(&self, ingress: &Ingress) -> Result<()>;

    /// Delete a resource by kind and name.
    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<()>;

    /// List pods matching a label selector.
    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>>;

    /// Read a pod, including status.
    async fn get_pod(&self, name: &str) -> Result<Pod>;

    /// Submit `pod`'s ephemeral container list through the
    /// `ephemeralcontainers` subresource.
    async fn update_ephemeral_containers(&self, pod: &Pod) -> Result<()>;

    /// Cheap reachability check against the API server.
    async fn check_status(&self) -> Result<()>;
}
