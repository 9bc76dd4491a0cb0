//! Token issuance and verification.
//!
//! - [`signer`] - ES256 token minting (identity issuer only)
//! - [`validator`] - Offline verification for relying services
//! - [`claims`] - The claim set both sides agree on

pub mod claims;
pub mod signer;
pub mod validator;

pub use claims::Claims;
pub use signer::{EcdsaSigner, TokenSigner};
pub use validator::{TokenValidator, ValidationOptions, VerifiedIdentity};
