//! Observability for the identity subsystem.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
