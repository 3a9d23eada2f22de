//! Web router construction and shared response settings.

use axum::Router;
use axum::http::{Method, StatusCode};
use axum::routing::get;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::state::AppState;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{status, weather};

/// Cache-Control presets.
pub mod cache {
    /// Cached weather document; short enough that clients follow refreshes.
    pub const WEATHER: &str = "public, max-age=60, stale-while-revalidate=60";
    /// Status and health -- never cache.
    pub const NO_STORE: &str = "no-store";
}

/// Floor for the per-request timeout.
pub const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Headroom a `POST /` gets over the upstream fetch timeout.
const REFRESH_HEADROOM: Duration = Duration::from_secs(5);

/// Per-request timeout that never cuts off a refresh before the upstream
/// client's own timeout fires.
pub fn request_timeout(upstream_timeout: Duration) -> Duration {
    upstream_timeout
        .saturating_add(REFRESH_HEADROOM)
        .max(MIN_REQUEST_TIMEOUT)
}

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let timeout = app_state.request_timeout;
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .with_state(app_state.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/", get(weather::get_weather).post(weather::refresh_weather))
        .nest("/api", api_router)
        .with_state(app_state)
        .layer((
            // Outermost: per-request ID span + severity-proportional response logging.
            RequestIdLayer,
            cors,
            TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_timeout_outlasts_upstream_timeout() {
        assert_eq!(request_timeout(Duration::from_secs(10)), MIN_REQUEST_TIMEOUT);
        assert_eq!(
            request_timeout(Duration::from_secs(60)),
            Duration::from_secs(65)
        );
        assert_eq!(request_timeout(Duration::MAX), Duration::MAX);
    }
}
