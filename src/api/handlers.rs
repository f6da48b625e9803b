use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use super::static_files::serve_page;
use crate::models::{NewVisit, Visit};
use crate::storage::{Storage, StorageError};
use crate::tracking::{classify, extract_client_ip, GeoService};

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub geo: Arc<GeoService>,
    pub static_dir: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackResponse {
    pub message: String,
    pub visit: Visit,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    /// Page size; every visit is returned when absent
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: i64,
}

const MAX_PAGE_SIZE: i64 = 1000;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal_error(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

/// Readiness page
pub async fn index(State(state): State<Arc<AppState>>) -> Response {
    serve_page("index.html", state.static_dir.as_deref(), "Visitor tracker is running").await
}

/// Admin page shell; the key is only checked by `/logs`
pub async fn admin_page(State(state): State<Arc<AppState>>) -> Response {
    serve_page("admin.html", state.static_dir.as_deref(), "Admin page unavailable").await
}

/// Record a visit from the caller
pub async fn track(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<TrackResponse>, ApiError> {
    let ip = extract_client_ip(&headers, addr.ip());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let mut visit = NewVisit::new(ip);
    visit.location = state.geo.locate(&visit.ip).await;

    let agent = classify(user_agent);
    visit.browser = agent.browser;
    visit.os = agent.os;
    visit.device = agent.device;

    // Geolocation may have taken a while; the sort key is insertion time
    visit.stamp_now();

    match state.storage.insert(&visit).await {
        Ok(visit) => {
            info!(id = visit.id, ip = %visit.ip, device = %visit.device, "Visit tracked");
            Ok(Json(TrackResponse {
                message: "Visit tracked".to_string(),
                visit,
            }))
        }
        Err(StorageError::Invalid(reason)) => {
            error!(ip = %visit.ip, reason, "Refused to store visit");
            Err(internal_error("Failed to record visit"))
        }
        Err(e) => {
            error!(error = %e, "Failed to store visit");
            Err(internal_error("Failed to record visit"))
        }
    }
}

/// Visit history, newest first
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<Visit>>, ApiError> {
    let result = match query.limit {
        Some(limit) => {
            let limit = limit.clamp(1, MAX_PAGE_SIZE);
            state.storage.list(limit, query.offset.max(0)).await
        }
        None => state.storage.list_all().await,
    };

    match result {
        Ok(visits) => Ok(Json(visits)),
        Err(e) => {
            error!(error = %e, "Failed to list visits");
            Err(internal_error("Failed to retrieve logs"))
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
