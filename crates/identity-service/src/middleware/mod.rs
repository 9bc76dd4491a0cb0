//! HTTP middleware.
//!
//! - `auth` - token verification, identity resolution, activation gate
//! - `http_metrics` - request metrics

pub mod auth;
pub mod http_metrics;

pub use auth::{
    require_activated, require_auth, set_request_deadline, AuthState, AuthenticatedIdentity,
    RequestDeadline,
};
pub use http_metrics::http_metrics_middleware;
