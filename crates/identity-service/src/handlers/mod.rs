//! HTTP request handlers.

pub mod health;
pub mod identity;
pub mod metrics;

pub use health::health_check;
pub use identity::get_me;
pub use metrics::metrics_handler;
