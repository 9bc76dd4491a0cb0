//! Elliptic-curve key loading.
//!
//! Tokens are signed with ECDSA over NIST P-256. Key files are PEM encoded:
//!
//! - Private keys: PKCS#8 (`BEGIN PRIVATE KEY`), falling back to legacy SEC1
//!   (`BEGIN EC PRIVATE KEY`)
//! - Public keys: SubjectPublicKeyInfo (`BEGIN PUBLIC KEY`)
//!
//! Nothing else is accepted: no raw DER, no encrypted PKCS#8, no RSA or
//! Ed25519 keys even when wrapped in a valid PEM block. Every failure is a
//! [`KeyFormatError`] and is fatal at startup.

use crate::errors::KeyFormatError;
use common::secret::{ExposeSecret, SecretBox};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use p256::{PublicKey, SecretKey};
use std::fmt;
use std::path::Path;
use tracing::instrument;

/// P-256 public key used for token verification.
#[derive(Clone, PartialEq, Eq)]
pub struct EcPublicKey {
    key: PublicKey,
    pem: String,
}

impl EcPublicKey {
    fn from_key(source: &str, key: PublicKey) -> Result<Self, KeyFormatError> {
        let pem = key.to_public_key_pem(LineEnding::LF).map_err(|e| {
            tracing::error!(target: "identity.keys", error = %e, "Failed to encode public key");
            KeyFormatError::UnsupportedKey {
                path: source.to_string(),
                kind: "public",
            }
        })?;
        Ok(Self { key, pem })
    }

    /// Parse a SubjectPublicKeyInfo PEM document.
    ///
    /// # Errors
    ///
    /// Returns `KeyFormatError` if the text is not PEM or is not a P-256 key.
    pub fn from_pem(source: &str, pem: &str) -> Result<Self, KeyFormatError> {
        ensure_pem(source, pem)?;
        let key = PublicKey::from_public_key_pem(pem).map_err(|e| {
            tracing::debug!(target: "identity.keys", path = %source, error = %e, "Public key is not P-256 SPKI");
            KeyFormatError::UnsupportedKey {
                path: source.to_string(),
                kind: "public",
            }
        })?;
        Self::from_key(source, key)
    }

    /// The underlying curve point.
    #[must_use]
    pub fn key(&self) -> &PublicKey {
        &self.key
    }

    /// Canonical SPKI PEM encoding of this key.
    #[must_use]
    pub fn to_pem(&self) -> &str {
        &self.pem
    }
}

impl fmt::Debug for EcPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcPublicKey")
            .field("curve", &"P-256")
            .finish_non_exhaustive()
    }
}

/// P-256 private key, held as PKCS#8 DER regardless of the file encoding.
pub struct EcPrivateKey {
    der: SecretBox<Vec<u8>>,
    public: EcPublicKey,
}

impl EcPrivateKey {
    /// Parse a PKCS#8 or SEC1 PEM private key.
    ///
    /// # Errors
    ///
    /// Returns `KeyFormatError` if the text is not PEM, or the PEM block is
    /// neither a PKCS#8 nor a SEC1 P-256 private key.
    pub fn from_pem(source: &str, pem: &str) -> Result<Self, KeyFormatError> {
        ensure_pem(source, pem)?;

        let secret = match SecretKey::from_pkcs8_pem(pem) {
            Ok(secret) => secret,
            Err(pkcs8_err) => SecretKey::from_sec1_pem(pem).map_err(|sec1_err| {
                tracing::debug!(
                    target: "identity.keys",
                    path = %source,
                    pkcs8_error = %pkcs8_err,
                    sec1_error = %sec1_err,
                    "Private key is neither PKCS#8 nor SEC1 P-256"
                );
                KeyFormatError::UnsupportedKey {
                    path: source.to_string(),
                    kind: "private",
                }
            })?,
        };

        let der = secret.to_pkcs8_der().map_err(|e| {
            tracing::error!(target: "identity.keys", error = %e, "Failed to re-encode private key");
            KeyFormatError::UnsupportedKey {
                path: source.to_string(),
                kind: "private",
            }
        })?;

        Ok(Self {
            der: SecretBox::new(Box::new(der.as_bytes().to_vec())),
            public: EcPublicKey::from_key(source, secret.public_key())?,
        })
    }

    /// PKCS#8 DER encoding, for handing to the signing primitive.
    #[must_use]
    pub fn pkcs8_der(&self) -> &[u8] {
        self.der.expose_secret()
    }

    /// The public half of this key.
    #[must_use]
    pub fn public_key(&self) -> &EcPublicKey {
        &self.public
    }
}

impl fmt::Debug for EcPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcPrivateKey")
            .field("der", &"[REDACTED]")
            .field("public", &self.public)
            .finish()
    }
}

fn ensure_pem(source: &str, text: &str) -> Result<(), KeyFormatError> {
    if text.contains("-----BEGIN ") {
        Ok(())
    } else {
        tracing::debug!(target: "identity.keys", path = %source, "Key file has no PEM block");
        Err(KeyFormatError::NotPem {
            path: source.to_string(),
        })
    }
}

fn read_key_file(path: &Path) -> Result<String, KeyFormatError> {
    std::fs::read_to_string(path).map_err(|e| KeyFormatError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Load a private key from a PEM file.
///
/// # Errors
///
/// Returns `KeyFormatError` if the file cannot be read or does not hold a
/// supported P-256 private key.
#[instrument(skip_all)]
pub fn load_private_key(path: &Path) -> Result<EcPrivateKey, KeyFormatError> {
    let pem = read_key_file(path)?;
    let key = EcPrivateKey::from_pem(&path.display().to_string(), &pem)?;
    tracing::info!(target: "identity.keys", path = %path.display(), "Loaded private key");
    Ok(key)
}

/// Load a public key from a PEM file.
///
/// # Errors
///
/// Returns `KeyFormatError` if the file cannot be read or does not hold a
/// P-256 SubjectPublicKeyInfo key.
#[instrument(skip_all)]
pub fn load_public_key(path: &Path) -> Result<EcPublicKey, KeyFormatError> {
    let pem = read_key_file(path)?;
    let key = EcPublicKey::from_pem(&path.display().to_string(), &pem)?;
    tracing::info!(target: "identity.keys", path = %path.display(), "Loaded public key");
    Ok(key)
}

/// Load a private key and the public key distributed to relying services,
/// rejecting the pair unless the public key derives from the private key.
///
/// # Errors
///
/// Returns `KeyFormatError::MismatchedPair` for an unrelated pair, or any
/// error from loading either file.
pub fn load_key_pair(
    private_path: &Path,
    public_path: &Path,
) -> Result<EcPrivateKey, KeyFormatError> {
    let private = load_private_key(private_path)?;
    let public = load_public_key(public_path)?;

    if private.public_key().key() != public.key() {
        tracing::error!(target: "identity.keys", "Configured key pair does not match");
        return Err(KeyFormatError::MismatchedPair);
    }

    Ok(private)
}
