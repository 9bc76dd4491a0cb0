//! Secret wrappers for key material and bearer tokens.
//!
//! Re-exports the [`secrecy`] types. Anything holding a private key or a raw
//! token should store it in one of these so that a derived `Debug` (and
//! therefore `tracing` field capture via `?value`) prints a redaction marker
//! instead of the bytes. Contents are zeroized on drop.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretBox};
//!
//! #[derive(Debug)]
//! struct SigningMaterial {
//!     key_id: String,
//!     pkcs8_der: SecretBox<Vec<u8>>,
//! }
//!
//! let material = SigningMaterial {
//!     key_id: "issuer-2026-01".to_string(),
//!     pkcs8_der: SecretBox::new(Box::new(vec![0x30, 0x81])),
//! };
//!
//! assert!(!format!("{material:?}").contains("48"));
//! assert_eq!(material.pkcs8_der.expose_secret().len(), 2);
//! ```

pub use secrecy::{ExposeSecret, SecretBox};
