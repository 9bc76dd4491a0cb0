//! Read-through identity lookup: cache first, resolver on miss.

use crate::cache::IdentityCache;
use crate::errors::ResolveError;
use crate::models::IdentityRecord;
use crate::resolver::IdentityResolver;
use common::types::IdentityId;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::instrument;

/// Composes an [`IdentityCache`] with an [`IdentityResolver`].
///
/// Concurrent misses for the same id may each call the resolver; the last
/// write wins and every caller receives a correct record.
#[derive(Clone)]
pub struct IdentityLookup {
    cache: Arc<IdentityCache>,
    resolver: Arc<dyn IdentityResolver>,
}

impl IdentityLookup {
    #[must_use]
    pub fn new(cache: Arc<IdentityCache>, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { cache, resolver }
    }

    /// Return the cached record for `id`, resolving and caching it on a miss.
    ///
    /// Resolver failures are returned unchanged and nothing is cached.
    ///
    /// # Errors
    ///
    /// Any `ResolveError` from the resolver.
    #[instrument(skip_all)]
    pub async fn lookup(
        &self,
        id: IdentityId,
        deadline: Option<Instant>,
    ) -> Result<IdentityRecord, ResolveError> {
        if let Some(record) = self.cache.get(id).await {
            tracing::debug!(target: "identity.cache", "Identity cache hit");
            return Ok(record);
        }

        tracing::debug!(target: "identity.cache", "Identity cache miss");
        let record = self.resolver.resolve_within(id, deadline).await?;
        self.cache.set(id, record.clone()).await;
        Ok(record)
    }

    /// Drop the cached record for `id`.
    pub async fn invalidate(&self, id: IdentityId) {
        self.cache.invalidate(id).await;
    }

    /// The underlying cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }
}
