//! Authentication middleware for protected routes.
//!
//! - `require_auth` - verifies the Bearer token, resolves the caller's
//!   identity record (through the cache) and injects an
//!   [`AuthenticatedIdentity`] into request extensions
//! - `require_activated` - rejects callers whose account is not activated;
//!   must run after `require_auth`
//! - `set_request_deadline` - stamps the request with a [`RequestDeadline`]
//!   so identity resolution never outlives the request

use crate::auth::{TokenValidator, VerifiedIdentity};
use crate::errors::AuthError;
use crate::lookup::IdentityLookup;
use crate::models::IdentityRecord;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Offline token verifier.
    pub validator: Arc<TokenValidator>,

    /// Cache-backed identity resolution.
    pub lookup: IdentityLookup,
}

/// Point in time by which the request must be answered.
#[derive(Debug, Clone, Copy)]
pub struct RequestDeadline(pub Instant);

/// The authenticated caller, available to handlers via `Extension`.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity {
    /// What the token proved.
    pub token: VerifiedIdentity,

    /// The caller's current identity record.
    pub record: IdentityRecord,
}

/// Extract Bearer token from the Authorization header.
fn extract_bearer_token(req: &Request) -> Result<&str, AuthError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "identity.middleware.auth", "Missing Authorization header");
            AuthError::InvalidToken("Missing Authorization header".to_string())
        })?;

    auth_header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "identity.middleware.auth", "Invalid Authorization header format");
            AuthError::InvalidToken("Invalid Authorization header format".to_string())
        })
}

/// Authentication middleware.
///
/// # Response
///
/// - 401 Unauthorized if the token is missing or fails verification
/// - 503 Service Unavailable if the identity service cannot be reached
/// - 502 Bad Gateway if the identity service answers unexpectedly
/// - Otherwise continues with [`AuthenticatedIdentity`] in extensions
#[instrument(skip_all, name = "identity.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let token = extract_bearer_token(&req)?;
    let verified = state.validator.verify(token)?;

    let deadline = req.extensions().get::<RequestDeadline>().map(|d| d.0);
    let record = state
        .lookup
        .lookup(verified.identity_id(), deadline)
        .await?;

    req.extensions_mut().insert(AuthenticatedIdentity {
        token: verified,
        record,
    });

    Ok(next.run(req).await)
}

/// Activation gate. Apply inside `require_auth`.
///
/// # Response
///
/// - 403 Forbidden if the account is not activated
/// - 500 Internal Server Error if `require_auth` did not run first
#[instrument(skip_all, name = "identity.middleware.activated")]
pub async fn require_activated(req: Request, next: Next) -> Result<impl IntoResponse, AuthError> {
    let identity = req
        .extensions()
        .get::<AuthenticatedIdentity>()
        .ok_or_else(|| {
            tracing::error!(target: "identity.middleware.auth", "require_activated used without require_auth");
            AuthError::Internal
        })?;

    if !identity.record.activated {
        return Err(AuthError::Forbidden(
            "Your account must be activated to access this resource".to_string(),
        ));
    }

    Ok(next.run(req).await)
}

/// Stamp the request with a deadline `timeout` from now.
pub async fn set_request_deadline(
    State(timeout): State<Duration>,
    mut req: Request,
    next: Next,
) -> impl IntoResponse {
    req.extensions_mut()
        .insert(RequestDeadline(Instant::now() + timeout));
    next.run(req).await
}
