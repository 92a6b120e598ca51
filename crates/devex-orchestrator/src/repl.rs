// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Repl service.
//!
//! Composes storage, the lifecycle controller and the readiness prober into
//! the operations the HTTP API exposes:
//!
//! - create: seed `repl/{owner}/{id}/` from `base/{template}/`
//! - activate: create the environment and wait for it to answer
//! - deactivate: flush the workspace and delete the environment
//! - delete: tear down without flushing, then purge the workspace folder

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::controller::{LifecycleController, TeardownReport};
use crate::error::{Error, Result};
use crate::readiness::ReadinessProber;
use crate::session::{self, Session};
use crate::storage::{StorageGateway, SyncSummary};

/// A repl as seen by API callers.
#[derive(Debug, Clone, Serialize)]
pub struct ReplInfo {
    /// Owner identifier.
    pub owner_id: String,
    /// Session identifier.
    pub session_id: String,
    /// Template name.
    pub template: String,
    /// Public URL, once active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Seeding result, on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeded: Option<SyncSummary>,
    /// Readiness probes made, on activate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probes: Option<u32>,
}

/// Result of deleting a repl.
#[derive(Debug, Serialize)]
pub struct ReplDeletion {
    /// Environment teardown.
    pub teardown: TeardownReport,
    /// Workspace folder purge.
    pub storage: SyncSummary,
}

/// Health of one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    /// Whether the check passed.
    pub ok: bool,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<()>> for ComponentHealth {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self {
                ok: true,
                error: None,
            },
            Err(e) => Self {
                ok: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Cluster and storage health, checked independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Kubernetes API.
    pub cluster: ComponentHealth,
    /// Object storage.
    pub storage: ComponentHealth,
}

impl HealthReport {
    /// True when every component is healthy.
    pub fn is_healthy(&self) -> bool {
        self.cluster.ok && self.storage.ok
    }
}

/// Repl operations.
pub struct ReplService {
    config: Arc<Config>,
    controller: LifecycleController,
    storage: StorageGateway,
    prober: ReadinessProber,
}

impl ReplService {
    /// Create a service.
    pub fn new(
        config: Arc<Config>,
        controller: LifecycleController,
        storage: StorageGateway,
        prober: ReadinessProber,
    ) -> Self {
        Self {
            config,
            controller,
            storage,
            prober,
        }
    }

    /// Allocate a session id and seed its workspace from the template.
    pub async fn create_repl(&self, owner_id: &str, template: &str) -> Result<ReplInfo> {
        session::validate_owner_id(owner_id)?;
        if self.config.templates.get(template).is_none() {
            return Err(Error::Validation(format!(
                "Unsupported template: {:?}",
                template
            )));
        }

        let session = Session::new(owner_id, Session::generate_id(), template)?;
        let source = session::template_prefix(template);
        let dest = session.storage_prefix();

        let summary = self.storage.copy_folder(&source, &dest).await?;
        if summary.listed == 0 {
            warn!(template = %template, source = %source, "Template folder is empty");
        }
        info!(
            session_id = %session.session_id(),
            owner_id = %owner_id,
            copied = summary.processed,
            "Repl created"
        );

        Ok(ReplInfo {
            owner_id: owner_id.to_string(),
            session_id: session.session_id().to_string(),
            template: template.to_string(),
            url: None,
            seeded: Some(summary),
            probes: None,
        })
    }

    /// Create the environment and wait until it answers.
    pub async fn activate(
        &self,
        owner_id: &str,
        session_id: &str,
        template: &str,
    ) -> Result<ReplInfo> {
        let session = Session::new(owner_id, session_id, template)?;
        self.controller.create(&session).await?;

        let ping_url = format!("{}/{}/ping", self.config.readiness_base_url, session_id);
        let probes = self
            .prober
            .await_ready(&ping_url, self.config.readiness)
            .await?;

        Ok(ReplInfo {
            owner_id: owner_id.to_string(),
            session_id: session_id.to_string(),
            template: template.to_string(),
            url: Some(self.public_url(session_id)),
            seeded: None,
            probes: Some(probes),
        })
    }

    /// Flush the workspace and delete the environment.
    pub async fn deactivate(&self, owner_id: &str, session_id: &str) -> Result<TeardownReport> {
        self.controller.delete(owner_id, session_id).await
    }

    /// Tear down the environment, then delete the workspace folder.
    ///
    /// The flush is skipped: an uploader that outlived its deadline would
    /// keep writing into the folder being purged.
    pub async fn delete_repl(&self, owner_id: &str, session_id: &str) -> Result<ReplDeletion> {
        let teardown = self.controller.discard(owner_id, session_id).await?;
        let storage = self
            .storage
            .delete_folder(&session::storage_prefix(owner_id, session_id))
            .await?;
        info!(session_id = %session_id, deleted = storage.processed, "Repl deleted");
        Ok(ReplDeletion { teardown, storage })
    }

    /// Keys in the session's workspace folder (first page only).
    pub async fn files(&self, owner_id: &str, session_id: &str) -> Result<Vec<String>> {
        session::validate_owner_id(owner_id)?;
        session::validate_session_id(session_id)?;
        self.storage
            .list_folder(&session::storage_prefix(owner_id, session_id))
            .await
    }

    /// Check cluster and storage.
    pub async fn health(&self) -> HealthReport {
        let (cluster, storage) = tokio::join!(self.controller.check_status(), self.storage.ping());
        HealthReport {
            cluster: cluster.into(),
            storage: storage.into(),
        }
    }

    /// `https://{public_host}/{session_id}/`.
    pub fn public_url(&self, session_id: &str) -> String {
        format!("https://{}/{}/", self.config.cluster.public_host, session_id)
    }
}
