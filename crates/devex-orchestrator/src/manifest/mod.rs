// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource templates for one repl session.
//!
//! [`ResourceBuilder`] turns a validated [`Session`] into the Kubernetes
//! objects that make up its environment. Building is pure: nothing here talks
//! to the cluster or to storage, so the same inputs always produce the same
//! objects.
//!
//! | Object | Name |
//! |--------|------|
//! | Deployment | `{session_id}` |
//! | Service | `{session_id}` |
//! | Middleware (strip-prefix routing only) | `{session_id}-stripprefix` |
//! | Ingress | `{session_id}-ingress` |

mod routing;
mod service;
mod workload;

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    EnvVar, EnvVarSource, EphemeralContainer, SecretKeySelector, Service, VolumeMount,
};
use k8s_openapi::api::networking::v1::Ingress;
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};

pub use routing::{
    RewriteRouting, RoutingContext, RoutingSpec, RoutingStrategy, StripPrefixRouting, strategy_for,
};

use crate::config::{Config, TemplateProfile};
use crate::error::{Error, Result};
use crate::session::{Session, storage_prefix};

/// Shared scratch volume name.
pub const WORKSPACE_VOLUME: &str = "workspace-vol";
/// Where the scratch volume is mounted in every container.
pub const WORKSPACE_MOUNT: &str = "/workspaces";
/// Main runner container.
pub const RUNNER_CONTAINER: &str = "runner";
/// Optional MCP sidecar container.
pub const SIDECAR_CONTAINER: &str = "mcp-server";
/// Init container that restores the workspace.
pub const DOWNLOADER_CONTAINER: &str = "s3-downloader";
/// Ephemeral container that saves the workspace before teardown.
pub const UPLOADER_CONTAINER: &str = "s3-uploader";

/// API resource for Traefik's `Middleware` CRD.
pub fn middleware_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("traefik.io", "v1alpha1", "Middleware"))
}

/// Everything created for one session, in creation order.
#[derive(Debug, Clone)]
pub struct ResourceSet {
    /// Compute workload.
    pub deployment: Deployment,
    /// Internal service in front of the workload.
    pub service: Service,
    /// Path-rewrite middleware, when the routing strategy needs one.
    pub middleware: Option<DynamicObject>,
    /// External routing rule.
    pub ingress: Ingress,
}

/// Builds per-session resources from the process configuration.
pub struct ResourceBuilder {
    config: Arc<Config>,
    routing: Box<dyn RoutingStrategy>,
}

impl ResourceBuilder {
    /// Create a builder using the routing strategy selected in `config`.
    pub fn new(config: Arc<Config>) -> Self {
        let routing = strategy_for(config.routing);
        Self { config, routing }
    }

    /// The active routing strategy.
    pub fn routing(&self) -> &dyn RoutingStrategy {
        self.routing.as_ref()
    }

    /// Resolve the session's template or reject it.
    pub fn profile(&self, session: &Session) -> Result<&TemplateProfile> {
        self.config.templates.get(session.template()).ok_or_else(|| {
            Error::Validation(format!(
                "Unsupported template: {:?} (known: {})",
                session.template(),
                self.config.templates.names().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    /// Build the full resource set for `session`.
    pub fn build(&self, session: &Session) -> Result<ResourceSet> {
        let profile = self.profile(session)?;
        let config = self.config.as_ref();

        let routing = self.routing.build(&RoutingContext {
            session,
            app_port: profile.port,
            sidecar: config.sidecar_enabled,
            cluster: &config.cluster,
        });

        Ok(ResourceSet {
            deployment: workload::deployment(session, profile, config),
            service: service::service(session, profile, config.sidecar_enabled),
            middleware: routing.middleware,
            ingress: routing.ingress,
        })
    }

    /// The ephemeral container that copies `/workspaces` back to the
    /// session's storage folder.
    ///
    /// Takes ids rather than a [`Session`] because teardown does not know the
    /// template. Callers validate both ids first.
    pub fn flush_container(&self, owner_id: &str, session_id: &str) -> EphemeralContainer {
        let storage = &self.config.storage;
        let command = format!(
            "aws s3 cp {} s3://{}/{} --recursive --endpoint-url {} --region {}",
            WORKSPACE_MOUNT,
            storage.bucket,
            storage_prefix(owner_id, session_id),
            storage.endpoint,
            storage.region,
        );

        EphemeralContainer {
            name: UPLOADER_CONTAINER.to_string(),
            image: Some(self.config.images.aws_cli.clone()),
            command: Some(vec!["sh".to_string(), "-c".to_string()]),
            args: Some(vec![command]),
            volume_mounts: Some(vec![workspace_mount()]),
            env: Some(credential_env(&self.config.cluster.credentials_secret)),
            ..Default::default()
        }
    }
}

/// Labels shared by the workload, its pods and the service selector.
pub(crate) fn session_labels(session: &Session) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), session.session_id().to_string()),
        ("template".to_string(), session.template().to_string()),
    ])
}

pub(crate) fn workspace_mount() -> VolumeMount {
    VolumeMount {
        name: WORKSPACE_VOLUME.to_string(),
        mount_path: WORKSPACE_MOUNT.to_string(),
        ..Default::default()
    }
}

/// aws-cli credentials pulled from the cluster secret.
pub(crate) fn credential_env(secret: &str) -> Vec<EnvVar> {
    [
        ("AWS_ACCESS_KEY_ID", "access_key"),
        ("AWS_SECRET_ACCESS_KEY", "secret_key"),
    ]
    .into_iter()
    .map(|(name, key)| EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
    .collect()
}
