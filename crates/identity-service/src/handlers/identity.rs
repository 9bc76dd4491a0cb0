//! Current identity handler.

use crate::middleware::AuthenticatedIdentity;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

/// Response for `/v1/identity/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub activated: bool,

    /// When the presented token expires.
    pub token_expires_at: DateTime<Utc>,
}

/// Handler for GET /v1/identity/me
///
/// Returns the caller's identity record. Requires `require_auth` and
/// `require_activated`.
///
/// ```json
/// {
///   "id": 42,
///   "email": "ada@example.com",
///   "name": "Ada",
///   "activated": true,
///   "token_expires_at": "2026-01-01T00:00:00Z"
/// }
/// ```
#[instrument(skip_all, name = "identity.handlers.me")]
pub async fn get_me(Extension(identity): Extension<AuthenticatedIdentity>) -> Json<MeResponse> {
    let record = identity.record;

    Json(MeResponse {
        id: record.id.get(),
        email: record.email,
        name: record.name,
        activated: record.activated,
        token_expires_at: identity.token.expires_at(),
    })
}
