//! JSON error responses for the web API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, error};

use crate::cache::RefreshError;
use crate::store::StoreError;

/// Machine-readable error codes returned in the `code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    NotFound,
    StoreUnavailable,
    RefreshFailed,
}

impl ApiErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::StoreUnavailable | ApiErrorCode::RefreshFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

/// Map a store read failure. A missing record is an expected state before the
/// first refresh, so it is not logged as a server error.
pub fn store_error(context: &str, e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound { key } => {
            debug!(key = %key, "{context}: no record cached yet");
            ApiError::new(ApiErrorCode::NotFound, "no weather data cached yet")
        }
        StoreError::Backend(source) => {
            error!(error = ?source, "{context} failed");
            ApiError::new(ApiErrorCode::StoreUnavailable, "could not read weather data")
        }
    }
}

pub fn refresh_error(context: &str, e: RefreshError) -> ApiError {
    error!(stage = e.stage(), error = ?e, "{context} failed");
    ApiError::new(ApiErrorCode::RefreshFailed, "could not fetch weather data")
}
