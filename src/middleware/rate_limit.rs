use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_governor::{governor::GovernorConfigBuilder, GovernorError, GovernorLayer};

/// Type alias for IP-keyed governor layers
pub type GlobalGovernorLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    Body,
>;

/// Outermost per-IP limiter, applied before authentication. Refills one
/// token every 60ms with room for a burst of 1000.
pub fn create_global_governor() -> GlobalGovernorLayer {
    let config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(60)
            .burst_size(1000)
            .finish()
            .expect("valid governor configuration"),
    );

    GovernorLayer::new(config).error_handler(rate_limit_error_handler)
}

/// Stricter per-IP limiter for the login endpoint: 10 attempts, refilled one
/// every 6 seconds.
pub fn create_public_governor() -> GlobalGovernorLayer {
    let config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(6)
            .burst_size(10)
            .finish()
            .expect("valid governor configuration"),
    );

    GovernorLayer::new(config).error_handler(rate_limit_error_handler)
}

/// Render governor rejections in the same JSON shape as `AppError`.
pub fn rate_limit_error_handler(err: GovernorError) -> Response<Body> {
    match err {
        GovernorError::TooManyRequests { wait_time, .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "RATE_LIMITED",
                "message": format!("Too many requests, retry in {} seconds", wait_time),
            })),
        )
            .into_response(),
        GovernorError::UnableToExtractKey => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "UNAUTHORIZED",
                "message": "Unable to identify caller",
            })),
        )
            .into_response(),
        GovernorError::Other { code, msg, .. } => (
            code,
            Json(serde_json::json!({
                "error": "RATE_LIMITER",
                "message": msg.unwrap_or_default(),
            })),
        )
            .into_response(),
    }
}

/// Access log: one line per request with peer address, status and latency.
/// Throttled and failed requests are raised to `warn`, server errors to `error`.
pub async fn log_request(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            tracing::warn!(peer = %peer.ip(), %method, %path, "Throttled by rate limiter");
        }
        s if s.is_server_error() => {
            tracing::error!(peer = %peer.ip(), %method, %path, status = s.as_u16(), elapsed_ms, "Request errored");
        }
        s if s.is_client_error() => {
            tracing::warn!(peer = %peer.ip(), %method, %path, status = s.as_u16(), elapsed_ms, "Request rejected");
        }
        s => {
            tracing::debug!(peer = %peer.ip(), %method, %path, status = s.as_u16(), elapsed_ms, "Request served");
        }
    }

    response
}
