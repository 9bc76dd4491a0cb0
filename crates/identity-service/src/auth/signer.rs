//! Token issuance.
//!
//! Only the identity issuer holds a private key. Signing is exposed through
//! the [`TokenSigner`] capability so call sites do not depend on the curve
//! or key encoding.

use crate::auth::claims::Claims;
use crate::errors::SigningError;
use crate::keys::{EcPrivateKey, EcPublicKey};
use common::jwt::MAX_NUMERIC_DATE;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::fmt;
use tracing::instrument;

/// Capability to mint signed tokens.
pub trait TokenSigner: Send + Sync {
    /// Algorithm written into the token header.
    fn algorithm(&self) -> Algorithm;

    /// Serialize and sign `claims` into a compact token.
    ///
    /// # Errors
    ///
    /// Returns `SigningError::InvalidClaims` for a structurally invalid claim
    /// set, or `SigningError::Crypto` if the signing primitive fails.
    fn sign(&self, claims: &Claims) -> Result<String, SigningError>;

    /// Public half of the signing key, for distribution to relying services.
    fn public_key(&self) -> &EcPublicKey;
}

/// ECDSA P-256 / SHA-256 (`ES256`) signer.
pub struct EcdsaSigner {
    encoding_key: EncodingKey,
    public_key: EcPublicKey,
}

impl EcdsaSigner {
    /// Create a signer that owns `private_key`.
    #[must_use]
    pub fn new(private_key: &EcPrivateKey) -> Self {
        Self {
            encoding_key: EncodingKey::from_ec_der(private_key.pkcs8_der()),
            public_key: private_key.public_key().clone(),
        }
    }
}

impl fmt::Debug for EcdsaSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaSigner")
            .field("algorithm", &Algorithm::ES256)
            .field("encoding_key", &"[REDACTED]")
            .finish()
    }
}

fn check_claims(claims: &Claims) -> Result<(), SigningError> {
    if claims.sub.is_empty() {
        return Err(SigningError::InvalidClaims("subject is empty".to_string()));
    }
    for (name, value) in [
        ("issued-at", claims.iat),
        ("expiry", claims.exp),
        ("not-before", claims.nbf),
    ] {
        if !(0..=MAX_NUMERIC_DATE).contains(&value) {
            return Err(SigningError::InvalidClaims(format!(
                "{name} is outside the representable range"
            )));
        }
    }
    if claims.exp <= claims.iat {
        return Err(SigningError::InvalidClaims(
            "expiry must be after issued-at".to_string(),
        ));
    }
    if claims.nbf > claims.exp {
        return Err(SigningError::InvalidClaims(
            "not-before must not be after expiry".to_string(),
        ));
    }
    Ok(())
}

impl TokenSigner for EcdsaSigner {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ES256
    }

    #[instrument(skip_all)]
    fn sign(&self, claims: &Claims) -> Result<String, SigningError> {
        check_claims(claims)?;

        // Header::new sets typ "JWT"
        let header = Header::new(self.algorithm());

        encode(&header, claims, &self.encoding_key).map_err(|e| {
            tracing::error!(target: "identity.jwt", error = %e, "Token signing failed");
            SigningError::Crypto(e.to_string())
        })
    }

    fn public_key(&self) -> &EcPublicKey {
        &self.public_key
    }
}
