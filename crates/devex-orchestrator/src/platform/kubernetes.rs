// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kubernetes platform backed by kube-rs.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Node, Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::traits::*;
use crate::config::ClusterConfig;
use crate::manifest::middleware_resource;

/// [`Platform`] talking to a real API server.
pub struct KubePlatform {
    client: Client,
    namespace: String,
}

impl KubePlatform {
    /// Wrap an existing client.
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// Build a client from the configured kubeconfig, or from the usual
    /// in-cluster / `$KUBECONFIG` discovery when none is set.
    pub async fn connect(cluster: &ClusterConfig) -> Result<Self> {
        let config = match &cluster.kubeconfig {
            Some(path) => {
                info!(path = %path.display(), "Loading kubeconfig");
                let kubeconfig = Kubeconfig::read_from(path)
                    .map_err(|e| PlatformError::Client(e.to_string()))?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| PlatformError::Client(e.to_string()))?
            }
            None => kube::Config::infer()
                .await
                .map_err(|e| PlatformError::Client(e.to_string()))?,
        };

        let client = Client::try_from(config).map_err(|e| PlatformError::Client(e.to_string()))?;
        Ok(Self::new(client, cluster.namespace.clone()))
    }

    fn namespaced<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn middlewares(&self) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &self.namespace, &middleware_resource())
    }

    async fn delete_from<K>(&self, api: Api<K>, kind: ResourceKind, name: &str) -> Result<()>
    where
        K: Clone + DeserializeOwned + Debug,
    {
        api.delete(name, &DeleteParams::background())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(kind, name, e))
    }
}

#[async_trait]
impl Platform for KubePlatform {
    fn platform_type(&self) -> &'static str {
        "kubernetes"
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<()> {
        let name = deployment.name_any();
        debug!(name = %name, "Creating deployment");
        self.namespaced::<Deployment>()
            .create(&PostParams::default(), deployment)
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(ResourceKind::Deployment, &name, e))
    }

    async fn create_service(&self, service: &Service) -> Result<()> {
        let name = service.name_any();
        debug!(name = %name, "Creating service");
        self.namespaced::<Service>()
            .create(&PostParams::default(), service)
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(ResourceKind::Service, &name, e))
    }

    async fn create_middleware(&self, middleware: &DynamicObject) -> Result<()> {
        let name = middleware.name_any();
        debug!(name = %name, "Creating middleware");
        self.middlewares()
            .create(&PostParams::default(), middleware)
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(ResourceKind::Middleware, &name, e))
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<()> {
        let name = ingress.name_any();
        debug!(name = %name, "Creating ingress");
        self.namespaced::<Ingress>()
            .create(&PostParams::default(), ingress)
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(ResourceKind::Ingress, &name, e))
    }

    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<()> {
        debug!(kind = %kind, name = %name, "Deleting resource");
        match kind {
            ResourceKind::Deployment => {
                self.delete_from(self.namespaced::<Deployment>(), kind, name)
                    .await
            }
            ResourceKind::Service => {
                self.delete_from(self.namespaced::<Service>(), kind, name)
                    .await
            }
            ResourceKind::Ingress => {
                self.delete_from(self.namespaced::<Ingress>(), kind, name)
                    .await
            }
            ResourceKind::Pod => self.delete_from(self.namespaced::<Pod>(), kind, name).await,
            ResourceKind::Middleware => self.delete_from(self.middlewares(), kind, name).await,
            ResourceKind::Node => Err(PlatformError::Client(format!(
                "refusing to delete cluster node {}",
                name
            ))),
        }
    }

    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>> {
        self.namespaced::<Pod>()
            .list(&ListParams::default().labels(label_selector))
            .await
            .map(|list| list.items)
            .map_err(|e| map_kube_error(ResourceKind::Pod, label_selector, e))
    }

    async fn get_pod(&self, name: &str) -> Result<Pod> {
        self.namespaced::<Pod>()
            .get(name)
            .await
            .map_err(|e| map_kube_error(ResourceKind::Pod, name, e))
    }

    async fn update_ephemeral_containers(&self, pod: &Pod) -> Result<()> {
        let name = pod.name_any();
        let body = serde_json::to_vec(pod)?;
        self.namespaced::<Pod>()
            .replace_subresource("ephemeralcontainers", &name, &PostParams::default(), body)
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(ResourceKind::Pod, &name, e))
    }

    async fn check_status(&self) -> Result<()> {
        Api::<Node>::all(self.client.clone())
            .list(&ListParams::default().limit(1))
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(ResourceKind::Node, "*", e))
    }
}

fn map_kube_error(kind: ResourceKind, name: &str, err: kube::Error) -> PlatformError {
    match err {
        kube::Error::Api(resp) if resp.code == 409 => PlatformError::AlreadyExists {
            kind,
            name: name.to_string(),
        },
        kube::Error::Api(resp) if resp.code == 404 => PlatformError::NotFound {
            kind,
            name: name.to_string(),
        },
        kube::Error::Api(resp) => {
            PlatformError::Api(format!("{} ({}, {})", resp.message, resp.reason, resp.code))
        }
        other => PlatformError::Api(other.to_string()),
    }
}
