//! Common utilities and types shared across storefront services.

#![warn(clippy::pedantic)]

/// Module for common data types
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (structural decoding, claims helpers, constants)
pub mod jwt;
