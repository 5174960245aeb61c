//! REST handlers for the discovery surface: submit, status, results.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use pavescout_common::error::DiscoveryError;
use pavescout_common::types::{DiscoveryFilters, GeoPoint};

use crate::AppState;

const MAX_OWNER_ID_LEN: usize = 128;

#[derive(Deserialize)]
pub struct DiscoverRequest {
    #[serde(default = "default_owner")]
    pub owner_id: String,
    pub area: Vec<GeoPoint>,
    #[serde(default)]
    pub filters: DiscoveryFilters,
}

fn default_owner() -> String {
    "anonymous".to_string()
}

pub async fn api_submit_discovery(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DiscoverRequest>,
) -> impl IntoResponse {
    let owner_id = body.owner_id.trim();
    if owner_id.is_empty() || owner_id.len() > MAX_OWNER_ID_LEN {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("owner_id must be 1-{MAX_OWNER_ID_LEN} characters")
            })),
        )
            .into_response();
    }

    match state.service.start(owner_id, body.area, body.filters).await {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "job_id": job_id.to_string() })),
        )
            .into_response(),
        Err(e @ DiscoveryError::Validation(_)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to start discovery job");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.service.get_status(id).await {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(DiscoveryError::JobNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "job not found" })),
        )
            .into_response(),
        Err(e) => {
            error!(job_id = %id, error = %e, "Status lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_job_results(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.service.get_results(id).await {
        Ok(results) => (StatusCode::OK, Json(results)).into_response(),
        Err(DiscoveryError::JobNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "job not found" })),
        )
            .into_response(),
        Err(DiscoveryError::NotReady { status }) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": "job is not complete",
                "status": status,
            })),
        )
            .into_response(),
        Err(e) => {
            error!(job_id = %id, error = %e, "Results lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
