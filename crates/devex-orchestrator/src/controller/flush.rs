// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pre-teardown workspace flush.
//!
//! Inject the uploader as an ephemeral container into the session's running
//! pod, then poll the pod until the uploader terminates. The uploader is never
//! re-injected: ephemeral containers cannot be removed and names must be
//! unique, so a pod that already carries one (from an earlier teardown that
//! left the pod alive) is polled as-is.

use k8s_openapi::api::core::v1::{EphemeralContainer, Pod};
use kube::ResourceExt;
use tracing::{debug, info, warn};

use super::report::FlushOutcome;
use crate::error::{Error, Result};
use crate::manifest::UPLOADER_CONTAINER;
use crate::platform::{Platform, PlatformOp, ResourceKind};
use crate::poll::{Poll, PollError, PollPolicy, poll_until};
use crate::session::label_selector;

pub(super) async fn flush_workspace(
    platform: &dyn Platform,
    session_id: &str,
    uploader: EphemeralContainer,
    policy: PollPolicy,
) -> Result<FlushOutcome> {
    let mut pod = match running_pod(platform, session_id).await {
        Ok(pod) => pod,
        Err(Error::NotFound(what)) => {
            info!(session_id = %session_id, %what, "No running pod, skipping workspace flush");
            return Ok(FlushOutcome::Skipped);
        }
        Err(e) => return Err(e),
    };
    let pod_name = pod.name_any();

    if has_uploader(&pod) {
        info!(session_id = %session_id, pod = %pod_name, "Uploader already injected, polling it");
    } else {
        let spec = pod.spec.get_or_insert_with(Default::default);
        spec.ephemeral_containers
            .get_or_insert_with(Vec::new)
            .push(uploader);

        platform
            .update_ephemeral_containers(&pod)
            .await
            .map_err(|e| Error::platform(PlatformOp::Update, ResourceKind::Pod, &pod_name, e))?;
        info!(session_id = %session_id, pod = %pod_name, "Injected workspace uploader");
    }

    let result = poll_until(policy, |attempt| {
        let pod_name = pod_name.as_str();
        async move {
            let pod = platform
                .get_pod(pod_name)
                .await
                .map_err(|e| Error::platform(PlatformOp::Get, ResourceKind::Pod, pod_name, e))?;
            match uploader_exit_code(&pod) {
                Some(code) => Ok(Poll::Ready(code)),
                None => {
                    debug!(pod = %pod_name, attempt, "Uploader still running");
                    Ok(Poll::Pending)
                }
            }
        }
    })
    .await;

    match result {
        Ok(0) => {
            info!(session_id = %session_id, pod = %pod_name, "Workspace flushed");
            Ok(FlushOutcome::Uploaded { pod: pod_name })
        }
        Ok(exit_code) => {
            warn!(session_id = %session_id, pod = %pod_name, exit_code, "Uploader failed");
            Err(Error::FlushFailed {
                pod: pod_name,
                exit_code,
            })
        }
        Err(PollError::TimedOut { attempts }) => {
            warn!(session_id = %session_id, pod = %pod_name, attempts, "Uploader timed out");
            Err(Error::Timeout {
                what: format!("workspace upload in pod {}", pod_name),
                after: policy.timeout,
            })
        }
        Err(PollError::Aborted(e)) => Err(e),
    }
}

/// The session's pod that is `Running` and not being deleted.
async fn running_pod(platform: &dyn Platform, session_id: &str) -> Result<Pod> {
    let selector = label_selector(session_id);
    let pods = platform
        .list_pods(&selector)
        .await
        .map_err(|e| Error::platform(PlatformOp::List, ResourceKind::Pod, &selector, e))?;

    pods.into_iter()
        .find(is_running)
        .ok_or_else(|| Error::NotFound(format!("running pod for {}", selector)))
}

fn is_running(pod: &Pod) -> bool {
    let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
    phase == Some("Running") && pod.metadata.deletion_timestamp.is_none()
}

fn has_uploader(pod: &Pod) -> bool {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.ephemeral_containers.as_ref())
        .is_some_and(|containers| containers.iter().any(|c| c.name == UPLOADER_CONTAINER))
}

/// Exit code of the uploader, once it has terminated.
fn uploader_exit_code(pod: &Pod) -> Option<i32> {
    pod.status
        .as_ref()?
        .ephemeral_container_statuses
        .as_ref()?
        .iter()
        .find(|status| status.name == UPLOADER_CONTAINER)?
        .state
        .as_ref()?
        .terminated
        .as_ref()
        .map(|terminated| terminated.exit_code)
}
