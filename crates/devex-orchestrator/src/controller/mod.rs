// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lifecycle controller.
//!
//! Submits a session's resources to the platform and tears them down.
//!
//! Creation is fail-fast and does not compensate: the first failed call is
//! returned and whatever was already created stays in the cluster.
//!
//! Teardown is result-collecting. Every step after the flush runs whether or
//! not earlier steps failed, and each outcome is recorded in a
//! [`TeardownReport`]. Resources are removed in reverse dependency order so
//! traffic stops reaching the workload before the workload goes away.

mod flush;
mod report;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

pub use report::{FlushOutcome, StepOutcome, TeardownReport, TeardownStep};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::manifest::ResourceBuilder;
use crate::platform::{Platform, PlatformError, PlatformOp, ResourceKind};
use crate::session::{Session, validate_owner_id, validate_session_id};

/// Creates and deletes per-session resources.
pub struct LifecycleController {
    config: Arc<Config>,
    builder: ResourceBuilder,
    platform: Arc<dyn Platform>,
}

impl LifecycleController {
    /// Create a controller for `platform`.
    pub fn new(config: Arc<Config>, platform: Arc<dyn Platform>) -> Self {
        let builder = ResourceBuilder::new(config.clone());
        Self {
            config,
            builder,
            platform,
        }
    }

    /// Create Deployment, Service, Middleware (if any) and Ingress, in that
    /// order, stopping at the first failure.
    pub async fn create(&self, session: &Session) -> Result<()> {
        let resources = self.builder.build(session)?;
        let id = session.session_id();

        info!(
            session_id = %id,
            owner_id = %session.owner_id(),
            template = %session.template(),
            routing = self.builder.routing().name(),
            "Creating environment"
        );

        self.platform
            .create_deployment(&resources.deployment)
            .await
            .map_err(|e| Error::platform(PlatformOp::Create, ResourceKind::Deployment, id, e))?;
        debug!(session_id = %id, "Deployment created");

        self.platform
            .create_service(&resources.service)
            .await
            .map_err(|e| Error::platform(PlatformOp::Create, ResourceKind::Service, id, e))?;
        debug!(session_id = %id, "Service created");

        if let Some(middleware) = &resources.middleware {
            let name = session.middleware_name();
            self.platform
                .create_middleware(middleware)
                .await
                .map_err(|e| {
                    Error::platform(PlatformOp::Create, ResourceKind::Middleware, &name, e)
                })?;
            debug!(session_id = %id, "Middleware created");
        }

        let ingress_name = session.ingress_name();
        self.platform
            .create_ingress(&resources.ingress)
            .await
            .map_err(|e| {
                Error::platform(PlatformOp::Create, ResourceKind::Ingress, &ingress_name, e)
            })?;

        info!(session_id = %id, "Environment created");
        Ok(())
    }

    /// Flush the workspace, then delete routing, service and workload.
    ///
    /// Only invalid ids return `Err`; every platform failure is recorded in
    /// the report instead.
    pub async fn delete(&self, owner_id: &str, session_id: &str) -> Result<TeardownReport> {
        self.teardown(owner_id, session_id, true).await
    }

    /// Delete routing, service and workload without flushing the workspace.
    ///
    /// For sessions whose storage folder is purged right after, where an
    /// uploader could still be writing into the folder being deleted.
    pub async fn discard(&self, owner_id: &str, session_id: &str) -> Result<TeardownReport> {
        self.teardown(owner_id, session_id, false).await
    }

    async fn teardown(
        &self,
        owner_id: &str,
        session_id: &str,
        flush_workspace: bool,
    ) -> Result<TeardownReport> {
        validate_owner_id(owner_id)?;
        validate_session_id(session_id)?;

        let started_at = Utc::now();
        info!(session_id = %session_id, owner_id = %owner_id, "Tearing down environment");

        let mut steps = Vec::with_capacity(TeardownStep::ALL.len());

        let flushed = if flush_workspace {
            let uploader = self.builder.flush_container(owner_id, session_id);
            flush::flush_workspace(self.platform.as_ref(), session_id, uploader, self.config.flush)
                .await
        } else {
            debug!(session_id = %session_id, "Discarding workspace, flush not attempted");
            Ok(FlushOutcome::Discarded)
        };
        let flush = match flushed {
            Ok(outcome) => {
                steps.push(StepOutcome {
                    step: TeardownStep::FlushWorkspace,
                    error: None,
                });
                Some(outcome)
            }
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    error = %e,
                    "Workspace flush failed, continuing teardown"
                );
                steps.push(StepOutcome {
                    step: TeardownStep::FlushWorkspace,
                    error: Some(e),
                });
                None
            }
        };

        let routing = self.delete_routing(session_id).await;
        steps.push(self.outcome(session_id, TeardownStep::DeleteRouting, routing));

        let service = self.delete_one(ResourceKind::Service, session_id).await;
        steps.push(self.outcome(session_id, TeardownStep::DeleteService, service));

        let workload = self.delete_one(ResourceKind::Deployment, session_id).await;
        steps.push(self.outcome(session_id, TeardownStep::DeleteWorkload, workload));

        let report = TeardownReport {
            session_id: session_id.to_string(),
            flush,
            steps,
            started_at,
            finished_at: Utc::now(),
        };

        if report.is_clean() {
            info!(session_id = %session_id, "Environment torn down");
        } else {
            warn!(
                session_id = %session_id,
                failed_steps = ?report.failed_steps(),
                "Environment torn down with errors"
            );
        }
        Ok(report)
    }

    /// Cluster reachability.
    pub async fn check_status(&self) -> Result<()> {
        self.platform
            .check_status()
            .await
            .map_err(|e| Error::platform(PlatformOp::List, ResourceKind::Node, "*", e))
    }

    /// Delete the ingress and, under strip-prefix routing, the middleware.
    /// Both are attempted; the first error wins.
    async fn delete_routing(&self, session_id: &str) -> Result<()> {
        let ingress = self
            .delete_one(ResourceKind::Ingress, &format!("{}-ingress", session_id))
            .await;

        let middleware = if self.builder.routing().uses_middleware() {
            self.delete_one(ResourceKind::Middleware, &format!("{}-stripprefix", session_id))
                .await
        } else {
            Ok(())
        };

        ingress.and(middleware)
    }

    /// Delete one resource. A resource that is already gone counts as deleted.
    async fn delete_one(&self, kind: ResourceKind, name: &str) -> Result<()> {
        match self.platform.delete(kind, name).await {
            Ok(()) => Ok(()),
            Err(PlatformError::NotFound { .. }) => {
                debug!(kind = %kind, name = %name, "Already deleted");
                Ok(())
            }
            Err(e) => Err(Error::platform(PlatformOp::Delete, kind, name, e)),
        }
    }

    fn outcome(&self, session_id: &str, step: TeardownStep, result: Result<()>) -> StepOutcome {
        if let Err(e) = &result {
            warn!(session_id = %session_id, step = %step, error = %e, "Teardown step failed");
        }
        StepOutcome {
            step,
            error: result.err(),
        }
    }
}
