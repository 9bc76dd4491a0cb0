//! Error types for the identity subsystem.
//!
//! Each component has its own error enum so callers can match on exactly the
//! failures that component can produce:
//!
//! - [`KeyFormatError`] - key loading (fatal at startup)
//! - [`SigningError`] - token issuance (fatal at startup / issuer only)
//! - [`TokenError`] - token verification (per request, never retried)
//! - [`ResolveError`] - identity resolution (per request, retryable upstream)
//!
//! [`AuthError`] is the HTTP-boundary error. Its `IntoResponse` impl maps to
//! status codes and returns intentionally generic messages; the underlying
//! cause is logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Generic message returned to clients for every token failure.
pub const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// Key material could not be loaded.
#[derive(Debug, Error)]
pub enum KeyFormatError {
    #[error("Failed to read key file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Key file {path} does not contain a PEM block")]
    NotPem { path: String },

    #[error("Key file {path} is not a P-256 elliptic-curve {kind} key in a supported encoding")]
    UnsupportedKey { path: String, kind: &'static str },

    #[error("Private key does not match the configured public key")]
    MismatchedPair,
}

/// A token could not be issued.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Invalid claim set: {0}")]
    InvalidClaims(String),

    #[error("Token signing operation failed: {0}")]
    Crypto(String),
}

/// A token failed verification.
///
/// The `Display` text of every variant is descriptive for logs; clients only
/// ever see [`INVALID_TOKEN_MESSAGE`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is malformed")]
    Malformed,

    #[error("Token signature or algorithm is invalid")]
    Signature,

    #[error("Token issuer does not match")]
    IssuerMismatch,

    #[error("Token audience does not match")]
    AudienceMismatch,

    #[error("Token has expired")]
    Expired,

    #[error("Token is not yet valid")]
    NotYetValid,

    #[error("Token subject is not a valid identity id")]
    InvalidSubject,
}

impl TokenError {
    /// Bounded label for metrics.
    #[must_use]
    pub fn category(self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::Signature => "signature",
            TokenError::IssuerMismatch => "issuer",
            TokenError::AudienceMismatch => "audience",
            TokenError::Expired => "expired",
            TokenError::NotYetValid => "not_yet_valid",
            TokenError::InvalidSubject => "subject",
        }
    }
}

/// Why the identity issuer could not be reached.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    #[error("request timed out")]
    Timeout,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("connection failed")]
    Connect,

    #[error("request failed")]
    Request,
}

impl UnavailableReason {
    /// True when the call ran out of time rather than failing outright.
    #[must_use]
    pub fn is_timeout(self) -> bool {
        matches!(self, Self::Timeout | Self::DeadlineExceeded)
    }
}

/// The identity issuer could not produce an identity record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Identity service unavailable: {0}")]
    UpstreamUnavailable(UnavailableReason),

    #[error("Identity service returned status {0}")]
    UpstreamStatus(u16),

    #[error("Invalid identity service response: {0}")]
    Decode(String),
}

impl ResolveError {
    /// Bounded label for metrics.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            ResolveError::UpstreamUnavailable(_) => "unavailable",
            ResolveError::UpstreamStatus(_) => "status",
            ResolveError::Decode(_) => "decode",
        }
    }
}

/// HTTP-boundary error for authenticated routes.
///
/// Maps to:
/// - InvalidToken: 401 Unauthorized (with `WWW-Authenticate`)
/// - Forbidden: 403 Forbidden
/// - BadGateway: 502 Bad Gateway
/// - ServiceUnavailable: 503 Service Unavailable
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl AuthError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidToken(_) => 401,
            AuthError::Forbidden(_) => 403,
            AuthError::Internal => 500,
            AuthError::BadGateway(_) => 502,
            AuthError::ServiceUnavailable(_) => 503,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        tracing::debug!(target: "identity.errors", error = %err, "Token rejected");
        AuthError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
    }
}

impl From<ResolveError> for AuthError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::UpstreamUnavailable(reason) => {
                AuthError::ServiceUnavailable(reason.to_string())
            }
            other => AuthError::BadGateway(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            AuthError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            AuthError::BadGateway(reason) => {
                tracing::warn!(target: "identity.availability", reason = %reason, "Identity service misbehaved");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "Identity service returned an unexpected response".to_string(),
                )
            }
            AuthError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "identity.availability", reason = %reason, "Identity service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            AuthError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"storefront\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
