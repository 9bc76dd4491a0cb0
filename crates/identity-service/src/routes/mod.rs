//! HTTP routes for the relying service.

use crate::handlers;
use crate::middleware::{
    http_metrics_middleware, require_activated, require_auth, set_request_deadline, AuthState,
};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Default end-to-end request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across routes.
#[derive(Clone)]
pub struct AppState {
    /// Authentication middleware state.
    pub auth: Arc<AuthState>,

    /// Request timeout; also the deadline handed to identity resolution.
    pub request_timeout: Duration,
}

/// Build the application routes.
///
/// - `/health` - Liveness probe, public
/// - `/metrics` - Prometheus metrics, public
/// - `/v1/identity/me` - Caller's identity, requires an activated account
/// - TraceLayer for request logging
/// - Request timeout, mirrored into a [`crate::middleware::RequestDeadline`]
/// - HTTP metrics middleware (outermost)
pub fn build_routes(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // route_layer order: the last added runs first
    let protected_routes = Router::new()
        .route("/v1/identity/me", get(handlers::get_me))
        .route_layer(middleware::from_fn(require_activated))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.auth),
            require_auth,
        ));

    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(
            state.request_timeout,
            set_request_deadline,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(middleware::from_fn(http_metrics_middleware))
}
