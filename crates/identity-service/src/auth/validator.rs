//! Offline token verification.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. Structure: size limit, three segments, base64url, JSON header with
//!    `alg`, claims segment is a JSON object
//! 2. Algorithm and signature: header must declare `ES256`, and the
//!    signature must verify against the configured public key
//! 3. Claim shape: `iat` and `exp` present, every timestamp a `NumericDate`
//!    in range
//! 4. Issuer (when configured)
//! 5. Audience (when configured)
//! 6. Temporal: `exp`, `nbf`, `iat` with the configured leeway
//! 7. Subject: must be a string holding a positive integer identity id
//!
//! Nothing in the claims is interpreted until the signature has verified, so
//! a token from another key is always a signature failure whatever it
//! carries. The header algorithm is never trusted to pick the verification
//! primitive; anything other than `ES256` (including `none`) is a signature
//! failure.

use crate::errors::TokenError;
use crate::keys::EcPublicKey;
use crate::observability::metrics::record_token_validation;
use chrono::{DateTime, Utc};
use common::jwt::{decode_unverified, deserialize_audience, deserialize_numeric_date};
use common::types::IdentityId;
use jsonwebtoken::{crypto, Algorithm, DecodingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::instrument;

/// The only algorithm accepted by this validator.
const EXPECTED_ALGORITHM: Algorithm = Algorithm::ES256;

/// What a token must satisfy beyond a valid signature.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Expected `iss`. Empty disables the check.
    pub issuer: String,

    /// Audience that must be listed in `aud`. Empty disables the check.
    pub audience: String,

    /// Clock skew tolerance for `exp`, `nbf` and `iat`.
    pub leeway: Duration,
}

/// Claims read from a token whose signature has verified.
///
/// `sub` stays untyped so a missing or non-string subject surfaces as
/// `InvalidSubject` after the temporal checks instead of as `Malformed`.
#[derive(Deserialize)]
struct SignedClaims {
    #[serde(default)]
    sub: Option<serde_json::Value>,

    #[serde(default)]
    iss: String,

    #[serde(default, deserialize_with = "deserialize_audience")]
    aud: Vec<String>,

    #[serde(deserialize_with = "deserialize_numeric_date")]
    iat: i64,

    #[serde(deserialize_with = "deserialize_numeric_date")]
    exp: i64,

    #[serde(default, deserialize_with = "deserialize_numeric_date")]
    nbf: i64,
}

/// Caller identity extracted from a verified token.
///
/// Only [`TokenValidator`] constructs this type.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    identity_id: IdentityId,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl VerifiedIdentity {
    #[must_use]
    pub fn identity_id(&self) -> IdentityId {
        self.identity_id
    }

    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl fmt::Debug for VerifiedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedIdentity")
            .field("identity_id", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Verifies identity tokens with a fixed public key.
///
/// Immutable after construction; share it behind an `Arc`.
pub struct TokenValidator {
    decoding_key: DecodingKey,
    options: ValidationOptions,
}

impl TokenValidator {
    /// Create a validator for tokens signed by the holder of `public_key`.
    #[must_use]
    pub fn new(public_key: &EcPublicKey, options: ValidationOptions) -> Self {
        // jsonwebtoken verifies EC signatures against the uncompressed SEC1 point
        let point = public_key.key().to_encoded_point(false);

        Self {
            decoding_key: DecodingKey::from_ec_der(point.as_bytes()),
            options,
        }
    }

    /// Verify `token` against the current time.
    ///
    /// # Errors
    ///
    /// Returns the first `TokenError` encountered, in the order documented
    /// at the module level.
    #[instrument(skip_all)]
    pub fn verify(&self, token: &str) -> Result<VerifiedIdentity, TokenError> {
        let result = self.verify_at(token, Utc::now().timestamp());

        match &result {
            Ok(_) => record_token_validation("success", None),
            Err(e) => {
                tracing::debug!(target: "identity.jwt", error = %e, "Token verification failed");
                record_token_validation("error", Some(e.category()));
            }
        }

        result
    }

    /// Verify `token` as if the current Unix time were `now`.
    pub(crate) fn verify_at(&self, token: &str, now: i64) -> Result<VerifiedIdentity, TokenError> {
        let unverified = decode_unverified(token).map_err(|_| TokenError::Malformed)?;

        match Algorithm::from_str(&unverified.alg) {
            Ok(alg) if alg == EXPECTED_ALGORITHM => {}
            _ => {
                tracing::debug!(target: "identity.jwt", alg = %unverified.alg, "Token algorithm rejected");
                return Err(TokenError::Signature);
            }
        }

        match crypto::verify(
            unverified.signature,
            unverified.signing_input.as_bytes(),
            &self.decoding_key,
            EXPECTED_ALGORITHM,
        ) {
            Ok(true) => {}
            Ok(false) => return Err(TokenError::Signature),
            Err(e) => {
                tracing::debug!(target: "identity.jwt", error = %e, "Signature verification error");
                return Err(TokenError::Signature);
            }
        }

        let claims: SignedClaims =
            serde_json::from_slice(&unverified.claims_json).map_err(|e| {
                tracing::debug!(target: "identity.jwt", error = %e, "Token claims missing or mistyped");
                TokenError::Malformed
            })?;

        if !self.options.issuer.is_empty() && claims.iss != self.options.issuer {
            return Err(TokenError::IssuerMismatch);
        }

        if !self.options.audience.is_empty()
            && !claims.aud.iter().any(|aud| *aud == self.options.audience)
        {
            return Err(TokenError::AudienceMismatch);
        }

        let leeway = i64::try_from(self.options.leeway.as_secs()).unwrap_or(i64::MAX);

        if now > claims.exp.saturating_add(leeway) {
            return Err(TokenError::Expired);
        }
        let latest_acceptable = now.saturating_add(leeway);
        if claims.nbf > latest_acceptable || claims.iat > latest_acceptable {
            return Err(TokenError::NotYetValid);
        }

        let identity_id = match &claims.sub {
            Some(serde_json::Value::String(sub)) => IdentityId::from_str(sub).ok(),
            _ => None,
        }
        .ok_or(TokenError::InvalidSubject)?;

        let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(TokenError::Malformed)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::Malformed)?;

        Ok(VerifiedIdentity {
            identity_id,
            issued_at,
            expires_at,
        })
    }
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("algorithm", &EXPECTED_ALGORITHM)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
