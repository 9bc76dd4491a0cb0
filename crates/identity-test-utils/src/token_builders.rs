//! Builder patterns and raw token helpers for tests
//!
//! Claims are plain JSON so tests can produce shapes the service's own
//! `Claims` type would never serialize: missing fields, wrong types,
//! unsigned tokens and substituted algorithms.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use thiserror::Error;

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Malformed token fixture: {0}")]
    Malformed(String),
}

/// Builder for identity token claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new()
///     .for_identity(42)
///     .issued_by("svcA")
///     .for_audience("svcB")
///     .expires_in(3600)
///     .build();
/// let token = sign_claims_es256(&claims, &pair.pkcs8_der)?;
/// ```
pub struct TestTokenBuilder {
    sub: String,
    iss: Option<String>,
    aud: Vec<String>,
    iat: i64,
    exp: i64,
    nbf: Option<i64>,
}

impl TestTokenBuilder {
    /// Defaults: subject "1", no issuer, no audience, valid for one hour.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "1".to_string(),
            iss: None,
            aud: Vec::new(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            nbf: Some(now.timestamp()),
        }
    }

    /// Set the subject to a numeric identity id
    pub fn for_identity(mut self, id: i64) -> Self {
        self.sub = id.to_string();
        self
    }

    /// Set the raw subject string
    pub fn with_subject(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Set the issuer
    pub fn issued_by(mut self, issuer: &str) -> Self {
        self.iss = Some(issuer.to_string());
        self
    }

    /// Add an audience entry
    pub fn for_audience(mut self, audience: &str) -> Self {
        self.aud.push(audience.to_string());
        self
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(mut self, seconds: i64) -> Self {
        self.nbf = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> serde_json::Value {
        let mut claims = json!({
            "sub": self.sub,
            "iat": self.iat,
            "exp": self.exp,
        });
        if let Some(iss) = self.iss {
            claims["iss"] = json!(iss);
        }
        if !self.aud.is_empty() {
            claims["aud"] = json!(self.aud);
        }
        if let Some(nbf) = self.nbf {
            claims["nbf"] = json!(nbf);
        }
        claims
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sign arbitrary JSON claims with ES256 using a PKCS#8 DER private key.
pub fn sign_claims_es256(
    claims: &serde_json::Value,
    pkcs8_der: &[u8],
) -> Result<String, FixtureError> {
    encode(
        &Header::new(Algorithm::ES256),
        claims,
        &EncodingKey::from_ec_der(pkcs8_der),
    )
    .map_err(|e| FixtureError::Signing(e.to_string()))
}

/// Assemble a token from raw header and payload JSON with a junk signature.
///
/// Used for algorithm-substitution and structural tests; never verifies.
pub fn forge_token(header: &serde_json::Value, payload: &serde_json::Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload.to_string()),
        URL_SAFE_NO_PAD.encode(b"forged-signature")
    )
}

/// Replace the payload of a signed token, keeping its header and signature.
pub fn tamper_payload(token: &str, payload: &serde_json::Value) -> Result<String, FixtureError> {
    let mut parts = token.split('.');
    let (Some(header), Some(_), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(FixtureError::Malformed("expected three segments".to_string()));
    };

    Ok(format!(
        "{}.{}.{}",
        header,
        URL_SAFE_NO_PAD.encode(payload.to_string()),
        signature
    ))
}
