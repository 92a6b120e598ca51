// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Teardown results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::Error;

/// Teardown steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownStep {
    /// Copy the live workspace to storage.
    FlushWorkspace,
    /// Delete the ingress (and middleware, when used).
    DeleteRouting,
    /// Delete the service.
    DeleteService,
    /// Delete the deployment.
    DeleteWorkload,
}

impl TeardownStep {
    /// Every step, in order.
    pub const ALL: [TeardownStep; 4] = [
        Self::FlushWorkspace,
        Self::DeleteRouting,
        Self::DeleteService,
        Self::DeleteWorkload,
    ];
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FlushWorkspace => "flush_workspace",
            Self::DeleteRouting => "delete_routing",
            Self::DeleteService => "delete_service",
            Self::DeleteWorkload => "delete_workload",
        };
        f.write_str(name)
    }
}

/// What the flush step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FlushOutcome {
    /// The uploader ran in `pod` and exited 0.
    Uploaded {
        /// Pod the uploader was injected into.
        pod: String,
    },
    /// No running pod, so nothing to flush.
    Skipped,
    /// Flush not attempted because the workspace is being deleted.
    Discarded,
}

/// Result of one teardown step.
#[derive(Debug, Serialize)]
pub struct StepOutcome {
    /// Which step.
    pub step: TeardownStep,
    /// The step's error, if it failed.
    #[serde(serialize_with = "error_message")]
    pub error: Option<Error>,
}

impl StepOutcome {
    /// True when the step succeeded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

fn error_message<S: Serializer>(error: &Option<Error>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Outcome of every teardown step for one session.
#[derive(Debug, Serialize)]
pub struct TeardownReport {
    /// Session that was torn down.
    pub session_id: String,
    /// Flush result, or `None` if the flush step failed.
    pub flush: Option<FlushOutcome>,
    /// One entry per step, in execution order.
    pub steps: Vec<StepOutcome>,
    /// When teardown began.
    pub started_at: DateTime<Utc>,
    /// When the last step finished.
    pub finished_at: DateTime<Utc>,
}

impl TeardownReport {
    /// True when every step succeeded.
    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(StepOutcome::is_ok)
    }

    /// Steps that reported an error.
    pub fn failed_steps(&self) -> Vec<TeardownStep> {
        self.steps
            .iter()
            .filter(|s| !s.is_ok())
            .map(|s| s.step)
            .collect()
    }

    /// The recorded outcome of `step`.
    pub fn step(&self, step: TeardownStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_serializes_errors_as_messages() {
        let report = TeardownReport {
            session_id: "abc123".to_string(),
            flush: Some(FlushOutcome::Skipped),
            steps: vec![
                StepOutcome {
                    step: TeardownStep::FlushWorkspace,
                    error: None,
                },
                StepOutcome {
                    step: TeardownStep::DeleteService,
                    error: Some(Error::NotFound("abc123".to_string())),
                },
            ],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["flush"], json!({"status": "skipped"}));
        assert_eq!(value["steps"][0], json!({"step": "flush_workspace", "error": null}));
        assert_eq!(value["steps"][1]["error"], json!("Not found: abc123"));
        assert_eq!(report.failed_steps(), [TeardownStep::DeleteService]);
        assert!(!report.is_clean());
    }
}
