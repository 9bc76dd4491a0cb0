//! JWT utilities shared across storefront services.
//!
//! This module provides the token-format plumbing that does not depend on any
//! key material:
//! - Size limits for DoS prevention
//! - Clock skew constants for temporal claim validation
//! - Structural decoding of a compact token (header, claims, signature)
//! - Audience claim deserialization (string or array)
//! - `NumericDate` claim deserialization (integer or fractional seconds)
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - [`decode_unverified`] performs NO signature verification; its output is
//!   only used to select the verification primitive and to check shape
//! - Generic error messages prevent information leakage

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any base64 decoding or
/// cryptographic operations.
///
/// - Typical identity tokens are 300-500 bytes (`ES256` sig, six claims)
/// - 8KB leaves room for long audience lists
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default clock skew tolerance applied to `exp`, `nbf` and `iat`.
///
/// Zero: relying services see the issuer's validity window exactly unless the
/// deployment opts in to a tolerance.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::ZERO;

/// Maximum allowed clock skew tolerance (10 minutes).
///
/// Prevents misconfiguration that would keep expired tokens alive for long.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Latest timestamp a `NumericDate` claim may carry: 9999-12-31T23:59:59Z.
///
/// Every value in `0..=MAX_NUMERIC_DATE` converts to a calendar date.
pub const MAX_NUMERIC_DATE: i64 = 253_402_300_799;

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while structurally decoding a token.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,
}

// =============================================================================
// Structural decoding
// =============================================================================

/// A compact token split into its parts, with header and claims decoded but
/// NOT verified.
#[derive(Debug, Clone)]
pub struct UnverifiedToken<'a> {
    /// The `alg` header value exactly as the token declares it.
    pub alg: String,

    /// Decoded claims JSON bytes.
    pub claims_json: Vec<u8>,

    /// `header.payload`, the bytes covered by the signature.
    pub signing_input: &'a str,

    /// The base64url signature segment.
    pub signature: &'a str,
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Split and decode a compact token without verifying it.
///
/// Checks, in order: size limit, exactly three non-empty dot-separated
/// segments, base64url decoding of all three, header is a JSON object with a
/// string `alg`, claims segment is a JSON object.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Any structural check fails
pub fn decode_unverified(token: &str) -> Result<UnverifiedToken<'_>, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: not three segments");
        return Err(JwtValidationError::MalformedToken);
    };

    if header_b64.is_empty() || claims_b64.is_empty() || signature.is_empty() {
        tracing::debug!(target: "common.jwt", "Token rejected: empty segment");
        return Err(JwtValidationError::MalformedToken);
    }

    let header_bytes = decode_segment(header_b64, "header")?;
    let claims_json = decode_segment(claims_b64, "claims")?;
    decode_segment(signature, "signature")?;

    let header: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let claims_value: serde_json::Value = serde_json::from_slice(&claims_json).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT claims JSON");
        JwtValidationError::MalformedToken
    })?;
    if !claims_value.is_object() {
        tracing::debug!(target: "common.jwt", "JWT claims are not a JSON object");
        return Err(JwtValidationError::MalformedToken);
    }

    // header_b64.len() + '.' + claims_b64.len() is always a char boundary
    let signing_input = token
        .get(..header_b64.len() + 1 + claims_b64.len())
        .ok_or(JwtValidationError::MalformedToken)?;

    Ok(UnverifiedToken {
        alg: header.alg,
        claims_json,
        signing_input,
        signature,
    })
}

fn decode_segment(segment: &str, name: &'static str) -> Result<Vec<u8>, JwtValidationError> {
    URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = name, error = %e, "Failed to decode JWT base64");
        JwtValidationError::MalformedToken
    })
}

// =============================================================================
// Claim helpers
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Deserialize the `aud` claim, which RFC 7519 allows to be either a single
/// string or an array of strings.
///
/// # Errors
///
/// Fails if the value is neither a string nor an array of strings.
pub fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(aud) => vec![aud],
        OneOrMany::Many(auds) => auds,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrFloat {
    Int(i64),
    Float(f64),
}

/// Deserialize a `NumericDate` claim (`iat`, `exp`, `nbf`) as whole seconds.
///
/// RFC 7519 allows fractional seconds; they are floored.
///
/// # Errors
///
/// Fails if the value is not a number or lies outside `0..=MAX_NUMERIC_DATE`.
#[allow(clippy::cast_possible_truncation)]
pub fn deserialize_numeric_date<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = match IntOrFloat::deserialize(deserializer)? {
        IntOrFloat::Int(secs) => Some(secs),
        // Bounded before the cast; exact range check below
        IntOrFloat::Float(secs) if (0.0..1e12).contains(&secs) => Some(secs.floor() as i64),
        IntOrFloat::Float(_) => None,
    };

    seconds
        .filter(|secs| (0..=MAX_NUMERIC_DATE).contains(secs))
        .ok_or_else(|| serde::de::Error::custom("NumericDate out of range"))
}

// =============================================================================
// Tests
// =============================================================================
