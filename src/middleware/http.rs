//! HTTP-level middleware (cross-cutting concerns).
//!
//! Responsibility:
//! - Request-Id generation + propagation (X-Request-Id)
//! - Access logging / request tracing (TraceLayer), with credentials marked sensitive
//! - Body size limits
//! - Global timeouts
//!
//! Notes:
//! - The request timeout has to outlast a validation endpoint call plus its one retry,
//!   see [`request_timeout`].

use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::{StatusCode, header, header::HeaderName};
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

use crate::services::auth::options::EndpointOptions;

const BODY_LIMIT_BYTES: usize = 1024 * 1024;
const BASE_TIMEOUT: Duration = Duration::from_secs(30);

/// Apply HTTP-level middleware to the given Router.
///
/// Defaults:
/// - Request-Id header: `x-request-id`
/// - Body limit: 1 MiB
pub fn apply(router: Router, timeout: Duration) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    let layers = ServiceBuilder::new()
        // Make the service error `Infallible` by converting errors into responses.
        .layer(HandleErrorLayer::new(|err: BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                StatusCode::REQUEST_TIMEOUT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }))
        // Bearer tokens must not reach the access log.
        .layer(SetSensitiveRequestHeadersLayer::new([header::AUTHORIZATION]))
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http());

    router.layer(layers)
}

/// Whole-request timeout: the base timeout, raised when endpoint validation
/// (two attempts and a backoff) could take longer.
pub fn request_timeout(endpoint: Option<&EndpointOptions>) -> Duration {
    let Some(endpoint) = endpoint else {
        return BASE_TIMEOUT;
    };
    let worst_case = endpoint
        .timeout
        .saturating_mul(2)
        .saturating_add(endpoint.retry_backoff)
        .saturating_add(Duration::from_secs(5));
    BASE_TIMEOUT.max(worst_case)
}
