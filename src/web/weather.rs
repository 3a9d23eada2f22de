//! `/` handlers: serve the cached record, trigger a refresh.

use axum::extract::State;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::state::AppState;
use crate::store::LOCATION_KEY;
use crate::web::error::{ApiError, refresh_error, store_error};
use crate::web::routes::cache;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub message: String,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// `GET /`: the cached weather document, byte-for-byte as fetched.
pub(super) async fn get_weather(State(state): State<AppState>) -> Result<Response, ApiError> {
    let payload = state
        .cache
        .get_current(LOCATION_KEY)
        .await
        .map_err(|e| store_error("Weather lookup", e))?;

    let mut response = payload.into_bytes().into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache::WEATHER),
    );
    Ok(response)
}

/// `POST /`: refresh synchronously and report the outcome.
#[instrument(skip_all)]
pub(super) async fn refresh_weather(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, ApiError> {
    info!("Manual weather refresh requested");
    state
        .cache
        .refresh()
        .await
        .map_err(|e| refresh_error("Manual weather refresh", e))?;

    Ok(Json(RefreshResponse {
        message: "weather refreshed".to_string(),
        refreshed_at: state.cache.status().last_refreshed_at,
    }))
}
