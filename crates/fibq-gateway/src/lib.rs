// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! fibq Gateway - HTTP API
//!
//! Routes:
//! - `GET /` - liveness text
//! - `GET /health` - status and version
//! - `POST /values` - submit an index
//! - `GET /values/all` - every submitted index, in order
//! - `GET /values/current` - snapshot of the result cache

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use fibq_core::cache::CacheSnapshot;
use fibq_core::persistence::DurableRecord;
use fibq_core::{CoreError, Gateway};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    gateway: Arc<Gateway>,
}

/// Build the HTTP router around `gateway`.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/values", post(submit_value))
        .route("/values/all", get(all_values))
        .route("/values/current", get(current_values))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { gateway })
}

/// Body of `POST /values`.
#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    #[serde(default)]
    index: Option<IndexField>,
}

/// Clients send the index either as a JSON number or as a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IndexField {
    Number(i64),
    Text(String),
}

impl IndexField {
    fn into_raw(self) -> String {
        match self {
            IndexField::Number(n) => n.to_string(),
            IndexField::Text(s) => s,
        }
    }
}

/// Response of `POST /values`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Working {
    /// Always `true` once the submission is accepted.
    pub working: bool,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn root() -> &'static str {
    "Hi"
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn submit_value(
    State(state): State<AppState>,
    body: Result<Json<SubmitBody>, JsonRejection>,
) -> Result<Json<Working>, ApiError> {
    let Json(body) = body.map_err(ApiError::from)?;
    let raw = body.index.map(IndexField::into_raw);

    state.gateway.submit(raw.as_deref()).await?;
    Ok(Json(Working { working: true }))
}

async fn all_values(State(state): State<AppState>) -> Result<Json<Vec<DurableRecord>>, ApiError> {
    Ok(Json(state.gateway.list_all().await?))
}

async fn current_values(State(state): State<AppState>) -> Result<Json<CacheSnapshot>, ApiError> {
    Ok(Json(state.gateway.current_values().await?))
}

/// Error returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The request body could not be read as a submission.
    Rejected(String),
    /// A pipeline operation failed.
    Core(CoreError),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Core(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Rejected(message) => {
                return (StatusCode::UNPROCESSABLE_ENTITY, message).into_response();
            }
            ApiError::Core(err) => err,
        };

        let status = match &err {
            CoreError::Validation { message, .. } => {
                return (StatusCode::UNPROCESSABLE_ENTITY, message.clone()).into_response();
            }
            CoreError::CacheWrite { .. } | CoreError::Cache { .. } | CoreError::Dispatch { .. } => {
                warn!(error = %err, "Backend unavailable");
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => {
                error!(error = %err, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            error: err.to_string(),
            code: err.error_code(),
        };
        (status, Json(body)).into_response()
    }
}
