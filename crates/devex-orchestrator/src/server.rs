// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP API.
//!
//! | Method | Path | Success |
//! |--------|------|---------|
//! | POST | `/repls` | 201 |
//! | POST | `/repls/{owner}/{id}/activate` | 200 |
//! | POST | `/repls/{owner}/{id}/deactivate` | 200 |
//! | DELETE | `/repls/{owner}/{id}` | 200 |
//! | GET | `/repls/{owner}/{id}/files` | 200 |
//! | GET | `/health` | 200, or 503 when a dependency is down |

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::controller::TeardownReport;
use crate::error::Error;
use crate::platform::PlatformError;
use crate::repl::{HealthReport, ReplDeletion, ReplInfo, ReplService};

/// Build the API router.
pub fn router(service: Arc<ReplService>) -> Router {
    Router::new()
        .route("/repls", post(create_repl))
        .route("/repls/{owner}/{id}", axum::routing::delete(delete_repl))
        .route("/repls/{owner}/{id}/activate", post(activate))
        .route("/repls/{owner}/{id}/deactivate", post(deactivate))
        .route("/repls/{owner}/{id}/files", get(files))
        .route("/health", get(health))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
struct CreateReplRequest {
    owner_id: String,
    template: String,
}

#[derive(Debug, Deserialize)]
struct ActivateRequest {
    template: String,
}

#[derive(Debug, Serialize)]
struct FilesResponse {
    files: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// An [`Error`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
            Error::Platform {
                source: PlatformError::AlreadyExists { .. },
                ..
            } => (StatusCode::CONFLICT, "already_exists"),
            Error::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "not_ready"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Platform { .. } | Error::Storage { .. } | Error::FlushFailed { .. } => {
                (StatusCode::BAD_GATEWAY, "upstream_failure")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        if status.is_server_error() {
            error!(status = %status, error = %self.0, "Request failed");
        }
        let (message, detail) = match &self.0 {
            Error::Timeout { .. } => (
                "environment did not become ready".to_string(),
                Some(self.0.to_string()),
            ),
            other => (other.to_string(), None),
        };
        let body = ErrorEnvelope {
            error: ErrorBody {
                code,
                message,
                detail,
            },
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn create_repl(
    State(service): State<Arc<ReplService>>,
    Json(req): Json<CreateReplRequest>,
) -> ApiResult<(StatusCode, Json<ReplInfo>)> {
    let info = service.create_repl(&req.owner_id, &req.template).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

async fn activate(
    State(service): State<Arc<ReplService>>,
    Path((owner, id)): Path<(String, String)>,
    Json(req): Json<ActivateRequest>,
) -> ApiResult<Json<ReplInfo>> {
    Ok(Json(service.activate(&owner, &id, &req.template).await?))
}

async fn deactivate(
    State(service): State<Arc<ReplService>>,
    Path((owner, id)): Path<(String, String)>,
) -> ApiResult<Json<TeardownReport>> {
    Ok(Json(service.deactivate(&owner, &id).await?))
}

async fn delete_repl(
    State(service): State<Arc<ReplService>>,
    Path((owner, id)): Path<(String, String)>,
) -> ApiResult<Json<ReplDeletion>> {
    Ok(Json(service.delete_repl(&owner, &id).await?))
}

async fn files(
    State(service): State<Arc<ReplService>>,
    Path((owner, id)): Path<(String, String)>,
) -> ApiResult<Json<FilesResponse>> {
    let files = service.files(&owner, &id).await?;
    Ok(Json(FilesResponse { files }))
}

async fn health(State(service): State<Arc<ReplService>>) -> (StatusCode, Json<HealthReport>) {
    let report = service.health().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
