// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock platform for testing.
//!
//! An in-memory stand-in for the API server that records every call, keeps
//! created objects by name, and simulates the ephemeral uploader's lifecycle.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateRunning, ContainerStateTerminated, ContainerStatus, Pod,
    PodStatus, Service,
};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::api::DynamicObject;
use kube::ResourceExt;
use serde::Serialize;
use tokio::sync::Mutex;

use super::traits::*;

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    /// `create_*`.
    Create(ResourceKind, String),
    /// `delete`.
    Delete(ResourceKind, String),
    /// `list_pods` with its selector.
    ListPods(String),
    /// `get_pod`.
    GetPod(String),
    /// `update_ephemeral_containers`.
    UpdateEphemeral(String),
    /// `check_status`.
    CheckStatus,
}

/// How injected ephemeral containers behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploaderBehaviour {
    /// Report `Terminated { exit_code }` once the pod has been read
    /// `after_polls` times since injection.
    Exit {
        /// Reads before the container terminates.
        after_polls: u32,
        /// Exit code to report.
        exit_code: i32,
    },
    /// Stay running forever.
    NeverFinishes,
}

#[derive(Debug)]
struct MockState {
    calls: Vec<PlatformCall>,
    objects: BTreeMap<(ResourceKind, String), serde_json::Value>,
    pods: BTreeMap<String, Pod>,
    failures: HashSet<(PlatformOp, ResourceKind)>,
    uploader: UploaderBehaviour,
    polls_since_inject: BTreeMap<String, u32>,
    reachable: bool,
}

/// Mock platform for testing.
#[derive(Clone)]
pub struct MockPlatform {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    /// Create an empty mock cluster whose uploaders succeed on the first read.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                calls: Vec::new(),
                objects: BTreeMap::new(),
                pods: BTreeMap::new(),
                failures: HashSet::new(),
                uploader: UploaderBehaviour::Exit {
                    after_polls: 1,
                    exit_code: 0,
                },
                polls_since_inject: BTreeMap::new(),
                reachable: true,
            })),
        }
    }

    /// Make every `op` against `kind` fail with an API error.
    pub async fn fail_on(&self, op: PlatformOp, kind: ResourceKind) {
        self.state.lock().await.failures.insert((op, kind));
    }

    /// Stop injecting failures.
    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }

    /// Set how injected ephemeral containers behave.
    pub async fn set_uploader(&self, behaviour: UploaderBehaviour) {
        self.state.lock().await.uploader = behaviour;
    }

    /// Make `check_status` fail.
    pub async fn set_unreachable(&self) {
        self.state.lock().await.reachable = false;
    }

    /// Register a running pod labelled `app={session_id}`.
    pub async fn add_running_pod(&self, session_id: &str) -> String {
        let name = format!("{}-5d8f7c9b4-x2k7q", session_id);
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                labels: Some(BTreeMap::from([("app".to_string(), session_id.to_string())])),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.state.lock().await.pods.insert(name.clone(), pod);
        name
    }

    /// Override a registered pod's phase.
    pub async fn set_pod_phase(&self, name: &str, phase: &str) {
        if let Some(pod) = self.state.lock().await.pods.get_mut(name) {
            pod.status.get_or_insert_with(PodStatus::default).phase = Some(phase.to_string());
        }
    }

    /// Mark a registered pod as terminating.
    pub async fn mark_terminating(&self, name: &str) {
        if let Some(pod) = self.state.lock().await.pods.get_mut(name) {
            pod.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        }
    }

    /// Every call made so far, in order.
    pub async fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().await.calls.clone()
    }

    /// Number of calls made so far.
    pub async fn call_count(&self) -> usize {
        self.state.lock().await.calls.len()
    }

    /// Whether an object of `kind` named `name` currently exists.
    pub async fn exists(&self, kind: ResourceKind, name: &str) -> bool {
        let state = self.state.lock().await;
        match kind {
            ResourceKind::Pod => state.pods.contains_key(name),
            _ => state.objects.contains_key(&(kind, name.to_string())),
        }
    }

    /// The stored JSON form of a created object.
    pub async fn object(&self, kind: ResourceKind, name: &str) -> Option<serde_json::Value> {
        self.state
            .lock()
            .await
            .objects
            .get(&(kind, name.to_string()))
            .cloned()
    }

    /// Current copy of a registered pod.
    pub async fn pod(&self, name: &str) -> Option<Pod> {
        self.state.lock().await.pods.get(name).cloned()
    }

    async fn create<T: Serialize>(&self, kind: ResourceKind, name: String, obj: &T) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(PlatformCall::Create(kind, name.clone()));
        if state.failures.contains(&(PlatformOp::Create, kind)) {
            return Err(PlatformError::Api(format!("mock create {} failure", kind)));
        }
        let key = (kind, name.clone());
        if state.objects.contains_key(&key) {
            return Err(PlatformError::AlreadyExists { kind, name });
        }
        state.objects.insert(key, serde_json::to_value(obj)?);
        Ok(())
    }
}

fn matches_selector(pod: &Pod, selector: &str) -> bool {
    let labels = pod.labels();
    selector
        .split(',')
        .filter_map(|term| term.split_once('='))
        .all(|(k, v)| labels.get(k.trim()).map(String::as_str) == Some(v.trim()))
}

fn uploader_status(name: &str, state: ContainerState) -> ContainerStatus {
    ContainerStatus {
        name: name.to_string(),
        image: "amazon/aws-cli".to_string(),
        image_id: String::new(),
        ready: false,
        restart_count: 0,
        state: Some(state),
        ..Default::default()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn platform_type(&self) -> &'static str {
        "mock"
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<()> {
        self.create(ResourceKind::Deployment, deployment.name_any(), deployment)
            .await
    }

    async fn create_service(&self, service: &Service) -> Result<()> {
        self.create(ResourceKind::Service, service.name_any(), service)
            .await
    }

    async fn create_middleware(&self, middleware: &DynamicObject) -> Result<()> {
        self.create(ResourceKind::Middleware, middleware.name_any(), middleware)
            .await
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<()> {
        self.create(ResourceKind::Ingress, ingress.name_any(), ingress)
            .await
    }

    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(PlatformCall::Delete(kind, name.to_string()));
        if state.failures.contains(&(PlatformOp::Delete, kind)) {
            return Err(PlatformError::Api(format!("mock delete {} failure", kind)));
        }

        let removed = match kind {
            ResourceKind::Pod => state.pods.remove(name).is_some(),
            _ => state.objects.remove(&(kind, name.to_string())).is_some(),
        };
        if !removed {
            return Err(PlatformError::NotFound {
                kind,
                name: name.to_string(),
            });
        }

        // Deleting the workload takes its pods with it.
        if kind == ResourceKind::Deployment {
            let selector = crate::session::label_selector(name);
            state.pods.retain(|_, pod| !matches_selector(pod, &selector));
        }
        Ok(())
    }

    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>> {
        let mut state = self.state.lock().await;
        state
            .calls
            .push(PlatformCall::ListPods(label_selector.to_string()));
        if state.failures.contains(&(PlatformOp::List, ResourceKind::Pod)) {
            return Err(PlatformError::Api("mock list pods failure".to_string()));
        }
        Ok(state
            .pods
            .values()
            .filter(|pod| matches_selector(pod, label_selector))
            .cloned()
            .collect())
    }

    async fn get_pod(&self, name: &str) -> Result<Pod> {
        let mut state = self.state.lock().await;
        state.calls.push(PlatformCall::GetPod(name.to_string()));
        if state.failures.contains(&(PlatformOp::Get, ResourceKind::Pod)) {
            return Err(PlatformError::Api("mock get pod failure".to_string()));
        }

        let uploader = state.uploader;
        let polls = match state.polls_since_inject.get_mut(name) {
            Some(polls) => {
                *polls += 1;
                Some(*polls)
            }
            None => None,
        };

        let pod = state
            .pods
            .get_mut(name)
            .ok_or_else(|| PlatformError::NotFound {
                kind: ResourceKind::Pod,
                name: name.to_string(),
            })?;

        if let Some(polls) = polls {
            let container_state = match uploader {
                UploaderBehaviour::Exit {
                    after_polls,
                    exit_code,
                } if polls >= after_polls => ContainerState {
                    terminated: Some(ContainerStateTerminated {
                        exit_code,
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                _ => ContainerState {
                    running: Some(ContainerStateRunning::default()),
                    ..Default::default()
                },
            };
            let statuses = pod
                .spec
                .as_ref()
                .and_then(|spec| spec.ephemeral_containers.as_ref())
                .map(|containers| {
                    containers
                        .iter()
                        .map(|c| uploader_status(&c.name, container_state.clone()))
                        .collect()
                });
            pod.status
                .get_or_insert_with(PodStatus::default)
                .ephemeral_container_statuses = statuses;
        }

        Ok(pod.clone())
    }

    async fn update_ephemeral_containers(&self, pod: &Pod) -> Result<()> {
        let name = pod.name_any();
        let mut state = self.state.lock().await;
        state.calls.push(PlatformCall::UpdateEphemeral(name.clone()));
        if state.failures.contains(&(PlatformOp::Update, ResourceKind::Pod)) {
            return Err(PlatformError::Api("mock ephemeral update failure".to_string()));
        }
        let mut seen = HashSet::new();
        let duplicate = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.ephemeral_containers.as_ref())
            .into_iter()
            .flatten()
            .find(|c| !seen.insert(c.name.as_str()));
        if let Some(container) = duplicate {
            return Err(PlatformError::Api(format!(
                "Pod {} is invalid: ephemeralContainers name: Duplicate value: {}",
                name, container.name
            )));
        }

        let stored = state
            .pods
            .get_mut(&name)
            .ok_or_else(|| PlatformError::NotFound {
                kind: ResourceKind::Pod,
                name: name.clone(),
            })?;
        stored.spec = pod.spec.clone();
        state.polls_since_inject.insert(name, 0);
        Ok(())
    }

    async fn check_status(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(PlatformCall::CheckStatus);
        if state.reachable {
            Ok(())
        } else {
            Err(PlatformError::Client("mock cluster unreachable".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let platform = MockPlatform::new();

        platform.create_service(&service("abc123")).await.unwrap();
        let err = platform.create_service(&service("abc123")).await.unwrap_err();

        assert!(matches!(err, PlatformError::AlreadyExists { .. }));
        assert!(platform.exists(ResourceKind::Service, "abc123").await);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let platform = MockPlatform::new();

        let err = platform
            .delete(ResourceKind::Ingress, "abc123-ingress")
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::NotFound { .. }));
        assert_eq!(
            platform.calls().await,
            vec![PlatformCall::Delete(
                ResourceKind::Ingress,
                "abc123-ingress".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_list_pods_by_label() {
        let platform = MockPlatform::new();
        platform.add_running_pod("abc123").await;
        platform.add_running_pod("other").await;

        let pods = platform.list_pods("app=abc123").await.unwrap();

        assert_eq!(pods.len(), 1);
        assert!(pods[0].name_any().starts_with("abc123-"));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let platform = MockPlatform::new();
        platform
            .fail_on(PlatformOp::Create, ResourceKind::Service)
            .await;

        assert!(platform.create_service(&service("abc123")).await.is_err());
        assert!(!platform.exists(ResourceKind::Service, "abc123").await);
    }

    #[tokio::test]
    async fn test_duplicate_ephemeral_name_rejected() {
        let platform = MockPlatform::new();
        let name = platform.add_running_pod("abc123").await;
        let mut pod = platform.pod(&name).await.unwrap();
        let uploader = k8s_openapi::api::core::v1::EphemeralContainer {
            name: "s3-uploader".to_string(),
            ..Default::default()
        };
        pod.spec = Some(k8s_openapi::api::core::v1::PodSpec {
            ephemeral_containers: Some(vec![uploader.clone(), uploader]),
            ..Default::default()
        });

        let err = platform.update_ephemeral_containers(&pod).await.unwrap_err();

        assert!(err.to_string().contains("Duplicate value"));
        assert!(platform.pod(&name).await.unwrap().spec.is_none());
    }
}
