//! Storefront identity verification and caching.
//!
//! The identity issuer mints ES256 tokens; every other service verifies them
//! offline and turns the token subject into a full identity record through
//! a network call to the issuer, amortized by an expiring read-through cache.
//!
//! # Flow
//!
//! ```text
//! Bearer token -> TokenValidator -> IdentityLookup -> IdentityCache
//!                                                  \-> IdentityResolver (miss)
//! ```
//!
//! # Modules
//!
//! - `keys` - PEM key loading (PKCS#8 / SEC1 private, SPKI public)
//! - `auth` - Token claims, signer and validator
//! - `resolver` - HTTP identity resolution with bounded timeouts
//! - `cache` - Concurrent TTL cache with a background janitor
//! - `lookup` - Read-through composition of cache and resolver
//! - `middleware` - Axum authentication middleware
//! - `config` - Configuration from environment
//! - `errors` - Error taxonomy and HTTP status mapping

pub mod auth;
pub mod cache;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod keys;
pub mod lookup;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod resolver;
pub mod routes;
