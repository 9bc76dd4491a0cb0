//! Identity resolution against the identity issuer.
//!
//! Given a verified subject id, fetch the full identity record with
//! `GET {base_url}/identities/{id}`. Every call is bounded by a timeout; there
//! is no caching and no retry at this layer.

use crate::errors::{ResolveError, UnavailableReason};
use crate::models::IdentityRecord;
use crate::observability::metrics::record_resolver_request;
use async_trait::async_trait;
use common::types::IdentityId;
use std::time::Duration;
use tokio::time::Instant;
use tracing::instrument;

/// Default bound for a single resolution.
pub const DEFAULT_RESOLVER_TIMEOUT: Duration = Duration::from_secs(3);

/// Connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Source of identity records.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve `id`, giving up at `deadline` if one is set.
    ///
    /// # Errors
    ///
    /// - `UpstreamUnavailable` - network failure, timeout, or deadline passed
    /// - `UpstreamStatus` - the issuer answered with a non-200 status
    /// - `Decode` - the body is not a valid record for `id`
    async fn resolve_within(
        &self,
        id: IdentityId,
        deadline: Option<Instant>,
    ) -> Result<IdentityRecord, ResolveError>;

    /// Resolve `id` bounded only by the resolver's own timeout.
    ///
    /// # Errors
    ///
    /// See [`IdentityResolver::resolve_within`].
    async fn resolve(&self, id: IdentityId) -> Result<IdentityRecord, ResolveError> {
        self.resolve_within(id, None).await
    }
}

/// HTTP implementation of [`IdentityResolver`].
#[derive(Debug, Clone)]
pub struct HttpIdentityResolver {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpIdentityResolver {
    /// Create a resolver for the issuer at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns the client construction error if the TLS backend cannot be
    /// initialized.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn effective_timeout(&self, deadline: Option<Instant>) -> Option<Duration> {
        let Some(deadline) = deadline else {
            return Some(self.timeout);
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        (!remaining.is_zero()).then(|| remaining.min(self.timeout))
    }

    async fn fetch(&self, id: IdentityId, timeout: Duration) -> Result<IdentityRecord, ResolveError> {
        let url = format!("{}/identities/{}", self.base_url, id);

        let response = self
            .http_client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(target: "identity.resolver", error = %e, "Identity request failed");
                ResolveError::UpstreamUnavailable(classify_transport_error(&e))
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::warn!(target: "identity.resolver", status = %status, "Identity service returned non-200");
            return Err(ResolveError::UpstreamStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::debug!(target: "identity.resolver", error = %e, "Failed to read identity response body");
            ResolveError::UpstreamUnavailable(classify_transport_error(&e))
        })?;

        let record: IdentityRecord = serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(target: "identity.resolver", error = %e, "Failed to parse identity response");
            ResolveError::Decode(e.to_string())
        })?;

        if record.id != id {
            tracing::warn!(target: "identity.resolver", "Identity service returned a different identity");
            return Err(ResolveError::Decode(
                "response id does not match requested id".to_string(),
            ));
        }

        Ok(record)
    }
}

fn classify_transport_error(e: &reqwest::Error) -> UnavailableReason {
    if e.is_timeout() {
        UnavailableReason::Timeout
    } else if e.is_connect() {
        UnavailableReason::Connect
    } else {
        UnavailableReason::Request
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    #[instrument(skip_all)]
    async fn resolve_within(
        &self,
        id: IdentityId,
        deadline: Option<Instant>,
    ) -> Result<IdentityRecord, ResolveError> {
        let Some(timeout) = self.effective_timeout(deadline) else {
            record_resolver_request("timeout", Some("unavailable"), Duration::ZERO);
            return Err(ResolveError::UpstreamUnavailable(
                UnavailableReason::DeadlineExceeded,
            ));
        };

        let start = std::time::Instant::now();
        let result = self.fetch(id, timeout).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::debug!(target: "identity.resolver", duration_ms = duration.as_millis(), "Identity resolved");
                record_resolver_request("success", None, duration);
            }
            Err(ResolveError::UpstreamUnavailable(reason)) if reason.is_timeout() => {
                record_resolver_request("timeout", Some("unavailable"), duration);
            }
            Err(e) => record_resolver_request("error", Some(e.category()), duration),
        }

        result
    }
}
