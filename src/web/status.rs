//! Health and status handlers.

use axum::extract::State;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::trace;

use crate::cache::CacheStatus;
use crate::state::{AppState, ServiceStatus};
use crate::web::routes::cache;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    status: ServiceStatus,
    since_secs: u64,
}

#[derive(Serialize)]
pub struct StatusResponse {
    status: ServiceStatus,
    version: String,
    commit: String,
    services: BTreeMap<String, ServiceInfo>,
    cache: CacheStatus,
}

/// Health check endpoint
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Service states plus cache refresh bookkeeping.
pub(super) async fn status(State(state): State<AppState>) -> Response {
    let services: BTreeMap<String, ServiceInfo> = state
        .service_statuses
        .all()
        .into_iter()
        .map(|(name, status, since_secs)| (name, ServiceInfo { status, since_secs }))
        .collect();

    let overall = if services
        .values()
        .any(|s| matches!(s.status, ServiceStatus::Error))
    {
        ServiceStatus::Error
    } else if services
        .values()
        .any(|s| matches!(s.status, ServiceStatus::Starting))
    {
        ServiceStatus::Starting
    } else {
        ServiceStatus::Active
    };

    let mut response = Json(StatusResponse {
        status: overall,
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_HASH").to_string(),
        services,
        cache: state.cache.status(),
    })
    .into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache::NO_STORE),
    );
    response
}
