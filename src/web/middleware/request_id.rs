//! Per-request tracing spans with caller-supplied request IDs.
//!
//! Honors an incoming `X-Request-Id` (set by a load balancer or the caller)
//! so logs correlate across hops; otherwise generates a ULID. The resolved ID
//! is echoed in the `X-Request-Id` response header.

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::Response;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Longest caller-supplied ID we will trust; anything else gets a fresh ULID.
const MAX_INCOMING_ID_LEN: usize = 128;

#[derive(Clone)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

fn resolve_request_id(req: &Request) -> String {
    req.headers()
        .get(&REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_INCOMING_ID_LEN)
        .map(String::from)
        .unwrap_or_else(|| ulid::Ulid::new().to_string())
}

impl<S, B> Service<Request> for RequestIdService<S>
where
    S: Service<Request, Response = Response<B>> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::fmt::Debug,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let req_id = resolve_request_id(&req);
        let echo = HeaderValue::from_str(&req_id).ok();
        let span = tracing::info_span!("request", req_id = %req_id);
        let access = AccessLog::begin(&req);
        let response = self.inner.call(req);

        Box::pin(
            async move {
                let mut response = response.await;
                match response.as_mut() {
                    Ok(res) => {
                        access.finish(res.status());
                        if let Some(value) = echo {
                            res.headers_mut().insert(REQUEST_ID, value);
                        }
                    }
                    Err(e) => access.failed(&*e),
                }
                response
            }
            .instrument(span),
        )
    }
}

/// Method, path, and start time of one request, logged when it completes.
struct AccessLog {
    method: Method,
    path: String,
    start: Instant,
}

impl AccessLog {
    fn begin(req: &Request) -> Self {
        Self {
            method: req.method().clone(),
            path: req.uri().path().to_owned(),
            start: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Quiet for success, louder as the status gets worse. 404 on `/` is the
    /// normal pre-warm state, so client errors stay at `info`.
    fn finish(&self, status: StatusCode) {
        let (method, path, duration_ms) = (&self.method, self.path.as_str(), self.elapsed_ms());
        let status = status.as_u16();
        match status {
            200..=399 => tracing::debug!(%method, path, status, duration_ms, "Response"),
            400..=499 => tracing::info!(%method, path, status, duration_ms, "Response"),
            _ => tracing::warn!(%method, path, status, duration_ms, "Response"),
        }
    }

    fn failed(&self, error: &impl std::fmt::Debug) {
        tracing::error!(
            method = %self.method,
            path = %self.path,
            ?error,
            duration_ms = self.elapsed_ms(),
            "Request failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(RequestIdLayer)
    }

    #[tokio::test]
    async fn echoes_incoming_request_id() {
        let req = axum::http::Request::builder()
            .uri("/")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let res = app().oneshot(req).await.unwrap();
        assert_eq!(res.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn generates_ulid_when_absent_or_oversized() {
        let req = axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        let res = app().oneshot(req).await.unwrap();
        let id = res.headers()["x-request-id"].to_str().unwrap().to_string();
        assert!(ulid::Ulid::from_string(&id).is_ok(), "not a ULID: {id}");

        let req = axum::http::Request::builder()
            .uri("/")
            .header("x-request-id", "x".repeat(MAX_INCOMING_ID_LEN + 1))
            .body(Body::empty())
            .unwrap();
        let res = app().oneshot(req).await.unwrap();
        assert_eq!(res.headers()["x-request-id"].len(), 26);
    }
}
