//! # Identity Test Utilities
//!
//! Shared test utilities for the identity subsystem.
//!
//! This crate provides:
//! - Deterministic P-256 key fixtures in PKCS#8, SEC1 and SPKI PEM
//! - Keys of the wrong algorithm family for negative tests
//! - Token builders, raw token forging and payload tampering
//! - Mock identity issuer endpoints (wiremock)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use identity_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let pair = TestKeyPair::from_seed(1);
//!     let token = sign_claims_es256(
//!         &TestTokenBuilder::new().for_identity(42).build(),
//!         &pair.pkcs8_der,
//!     )?;
//!
//!     let server = MockServer::start().await;
//!     mount_identity(&server, 42, "ada@example.com", "Ada", true).await;
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_issuer;
pub mod token_builders;

pub use crypto_fixtures::*;
pub use mock_issuer::*;
pub use token_builders::*;
