//! Metrics definitions for the identity subsystem.
//!
//! All metrics follow Prometheus naming conventions:
//! - `identity_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `endpoint`: the three routes plus `other`
//! - `status`: success, error, timeout
//! - `error_category`: one value per `TokenError` / `ResolveError` variant
//! - `result`: hit, miss
//!
//! Identity ids never appear as label values.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by the
/// `/metrics` handler.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("identity_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 3.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Resolver calls are bounded by a 3s timeout by default
        .set_buckets_for_metric(
            Matcher::Prefix("identity_resolver_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 3.000,
            ],
        )
        .map_err(|e| format!("Failed to set resolver buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `identity_http_requests_total`, `identity_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("identity_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("identity_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/v1/identity/me" => "/v1/identity/me",
        _ => "other",
    }
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=399 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record a token verification outcome.
///
/// Metric: `identity_token_validations_total`
/// Labels: `status` (success, error), `error_category`
pub fn record_token_validation(status: &str, error_category: Option<&str>) {
    counter!("identity_token_validations_total",
        "status" => status.to_string(),
        "error_category" => error_category.unwrap_or("none").to_string()
    )
    .increment(1);
}

// ============================================================================
// Resolver Metrics
// ============================================================================

/// Record one identity resolution against the issuer.
///
/// Metric: `identity_resolver_request_duration_seconds`, `identity_resolver_requests_total`
/// Labels: `status`, `error_category`
pub fn record_resolver_request(status: &str, error_category: Option<&str>, duration: Duration) {
    histogram!("identity_resolver_request_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("identity_resolver_requests_total",
        "status" => status.to_string(),
        "error_category" => error_category.unwrap_or("none").to_string()
    )
    .increment(1);
}

// ============================================================================
// Cache Metrics
// ============================================================================

/// Record a cache lookup.
///
/// Metric: `identity_cache_lookups_total`
/// Labels: `result` (hit, miss)
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("identity_cache_lookups_total", "result" => result).increment(1);
}

/// Set the current number of cached identities.
///
/// Metric: `identity_cache_entries`
#[allow(clippy::cast_precision_loss)]
pub fn set_cache_size(size: usize) {
    gauge!("identity_cache_entries").set(size as f64);
}

/// Record entries removed by the janitor.
///
/// Metric: `identity_cache_evictions_total`
pub fn record_cache_evictions(count: usize) {
    counter!("identity_cache_evictions_total").increment(count as u64);
}

// ============================================================================
// Tests
// ============================================================================
