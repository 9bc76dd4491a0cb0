//! Token claim set.

use chrono::{DateTime, Utc};
use common::jwt::{deserialize_audience, deserialize_numeric_date, MAX_NUMERIC_DATE};
use common::types::IdentityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Claims carried by an identity token.
///
/// `sub`, `iat` and `exp` are required on the wire. `iss`, `aud` and `nbf`
/// default to empty / zero when absent, which the validator treats as
/// "unchecked" only when its own expectation is also empty. Timestamps accept
/// fractional seconds on the wire and must fall in `0..=MAX_NUMERIC_DATE`.
///
/// The `sub` field identifies an end user and is redacted in Debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: decimal identity id.
    pub sub: String,

    /// Issuer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub iss: String,

    /// Audience. Accepts a single string or an array on the wire.
    #[serde(
        default,
        deserialize_with = "deserialize_audience",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub aud: Vec<String>,

    /// Issued at (Unix seconds).
    #[serde(deserialize_with = "deserialize_numeric_date")]
    pub iat: i64,

    /// Expiration (Unix seconds).
    #[serde(deserialize_with = "deserialize_numeric_date")]
    pub exp: i64,

    /// Not before (Unix seconds).
    #[serde(default, deserialize_with = "deserialize_numeric_date")]
    pub nbf: i64,
}

impl Claims {
    /// Build a claim set for `subject` valid from now for `lifetime`.
    ///
    /// `iat` and `nbf` are stamped with the current time.
    #[must_use]
    pub fn new(subject: IdentityId, issuer: &str, audience: &[&str], lifetime: Duration) -> Self {
        Self::issued_at(subject, issuer, audience, Utc::now(), lifetime)
    }

    /// Build a claim set issued at an explicit instant.
    ///
    /// `exp` is capped at `MAX_NUMERIC_DATE`.
    #[must_use]
    pub fn issued_at(
        subject: IdentityId,
        issuer: &str,
        audience: &[&str],
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        let iat = now.timestamp();
        let lifetime_secs = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);

        Self {
            sub: subject.to_string(),
            iss: issuer.to_string(),
            aud: audience.iter().map(|a| (*a).to_string()).collect(),
            iat,
            exp: iat.saturating_add(lifetime_secs).min(MAX_NUMERIC_DATE),
            nbf: iat,
        }
    }
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .finish()
    }
}
