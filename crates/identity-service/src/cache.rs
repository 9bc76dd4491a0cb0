//! Expiring in-memory identity cache.
//!
//! Maps identity id to a copy of the identity record plus an expiry instant.
//! Reads take the read lock; writes, invalidation and the janitor sweep take
//! the write lock. Entries are replaced whole, never mutated in place.
//!
//! # Janitor
//!
//! Construction spawns one background task that periodically removes
//! expired entries. [`IdentityCache::shutdown`] cancels it and waits for it
//! to exit; dropping the cache cancels it without waiting.
//!
//! Expired entries that the janitor has not yet removed are never returned
//! by [`IdentityCache::get`].

use crate::models::IdentityRecord;
use crate::observability::metrics::{record_cache_evictions, record_cache_lookup, set_cache_size};
use common::types::IdentityId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default time-to-live for cached records (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default interval between janitor sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Smallest accepted sweep interval; `tokio::time::interval` rejects zero.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Upper bound on any entry TTL, keeps expiry arithmetic in range.
const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Clone)]
struct CachedIdentity {
    record: IdentityRecord,
    expires_at: Instant,
}

impl CachedIdentity {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

type Entries = Arc<RwLock<HashMap<IdentityId, CachedIdentity>>>;

/// Concurrent TTL cache of identity records.
///
/// Create once at startup and share behind an `Arc`.
pub struct IdentityCache {
    entries: Entries,
    default_ttl: Duration,
    cancel_token: CancellationToken,
    janitor: Mutex<Option<JoinHandle<()>>>,
}

impl IdentityCache {
    /// Create a cache with the default sweep interval.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_sweep_interval(default_ttl, DEFAULT_SWEEP_INTERVAL)
    }

    /// Create a cache whose janitor runs every `sweep_interval`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn with_sweep_interval(default_ttl: Duration, sweep_interval: Duration) -> Self {
        let entries: Entries = Arc::new(RwLock::new(HashMap::new()));
        let cancel_token = CancellationToken::new();

        let janitor = tokio::spawn(run_janitor(
            Arc::clone(&entries),
            sweep_interval,
            cancel_token.clone(),
        ));

        Self {
            entries,
            default_ttl: default_ttl.min(MAX_TTL),
            cancel_token,
            janitor: Mutex::new(Some(janitor)),
        }
    }

    /// Look up a live record.
    ///
    /// Returns `None` for absent and for expired entries.
    pub async fn get(&self, id: IdentityId) -> Option<IdentityRecord> {
        let now = Instant::now();
        let entries = self.entries.read().await;

        let found = entries
            .get(&id)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.record.clone());

        record_cache_lookup(found.is_some());
        found
    }

    /// Insert or replace the record for `id` with the default TTL.
    pub async fn set(&self, id: IdentityId, record: IdentityRecord) {
        self.set_with_ttl(id, record, self.default_ttl).await;
    }

    /// Insert or replace the record for `id`, live for `ttl` from now.
    pub async fn set_with_ttl(&self, id: IdentityId, record: IdentityRecord, ttl: Duration) {
        let expires_at = Instant::now() + ttl.min(MAX_TTL);

        let mut entries = self.entries.write().await;
        entries.insert(id, CachedIdentity { record, expires_at });
        set_cache_size(entries.len());
    }

    /// Remove the record for `id`, if any.
    ///
    /// Call this whenever the identity changes at the issuer.
    pub async fn invalidate(&self, id: IdentityId) {
        let mut entries = self.entries.write().await;
        if entries.remove(&id).is_some() {
            debug!(target: "identity.cache", "Identity invalidated");
        }
        set_cache_size(entries.len());
    }

    /// Remove every record.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
        set_cache_size(0);
    }

    /// Number of stored entries, including expired entries not yet swept.
    pub async fn size(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Remove every expired entry now, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        purge_expired(&self.entries).await
    }

    /// Stop the janitor and wait for it to exit.
    ///
    /// Safe to call more than once. The cache stays usable for reads and
    /// writes afterwards, but expired entries are no longer swept.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();

        let handle = self.janitor.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(target: "identity.cache", error = %e, "Cache janitor ended abnormally");
            }
        }
    }
}

impl Drop for IdentityCache {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn purge_expired(entries: &RwLock<HashMap<IdentityId, CachedIdentity>>) -> usize {
    let now = Instant::now();
    let mut entries = entries.write().await;

    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    let removed = before - entries.len();

    set_cache_size(entries.len());
    removed
}

async fn run_janitor(entries: Entries, sweep_interval: Duration, cancel_token: CancellationToken) {
    info!(
        target: "identity.cache",
        sweep_interval_secs = sweep_interval.as_secs(),
        "Starting identity cache janitor"
    );

    let mut interval = tokio::time::interval(sweep_interval.max(MIN_SWEEP_INTERVAL));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = purge_expired(&entries).await;
                if removed > 0 {
                    debug!(target: "identity.cache", removed, "Purged expired identities");
                    record_cache_evictions(removed);
                }
            }
            () = cancel_token.cancelled() => {
                break;
            }
        }
    }

    info!(target: "identity.cache", "Identity cache janitor stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn id(n: i64) -> IdentityId {
        IdentityId::new(n).unwrap()
    }

    /// Cache whose janitor has already run its immediate first sweep.
    async fn cache_with_idle_janitor() -> IdentityCache {
        let cache = IdentityCache::with_sweep_interval(DEFAULT_TTL, Duration::from_secs(3600));
        tokio::task::yield_now().await;
        cache
    }

    fn record(n: i64, name: &str) -> IdentityRecord {
        IdentityRecord {
            id: id(n),
            email: format!("user{n}@example.com"),
            name: name.to_string(),
            activated: true,
        }
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = IdentityCache::new(DEFAULT_TTL);

        cache.set(id(1), record(1, "Ada")).await;

        assert_eq!(cache.get(id(1)).await, Some(record(1, "Ada")));
        assert_eq!(cache.get(id(2)).await, None);
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let cache = IdentityCache::new(DEFAULT_TTL);

        cache.set(id(1), record(1, "Ada")).await;
        cache.set(id(1), record(1, "Ada Lovelace")).await;

        assert_eq!(cache.get(id(1)).await.unwrap().name, "Ada Lovelace");
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_ttl_expires() {
        let cache = cache_with_idle_janitor().await;

        cache
            .set_with_ttl(id(1), record(1, "Ada"), Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(cache.get(id(1)).await, None);
        // Still stored until the janitor runs
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_live_until_ttl_boundary() {
        let cache = IdentityCache::new(Duration::from_secs(10));
        cache.set(id(1), record(1, "Ada")).await;

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cache.get(id(1)).await.is_some());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get(id(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = IdentityCache::new(DEFAULT_TTL);
        cache.set(id(1), record(1, "Ada")).await;
        cache.set(id(2), record(2, "Grace")).await;

        cache.invalidate(id(1)).await;
        cache.invalidate(id(99)).await;

        assert_eq!(cache.get(id(1)).await, None);
        assert!(cache.get(id(2)).await.is_some());
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = IdentityCache::new(DEFAULT_TTL);
        for n in 1..=5 {
            cache.set(id(n), record(n, "User")).await;
        }

        cache.clear().await;

        assert_eq!(cache.size().await, 0);
    }

    #[tokio::test]
    async fn test_returned_record_is_a_copy() {
        let cache = IdentityCache::new(DEFAULT_TTL);
        cache.set(id(1), record(1, "Ada")).await;

        let mut copy = cache.get(id(1)).await.unwrap();
        copy.name = "Mallory".to_string();

        assert_eq!(cache.get(id(1)).await.unwrap().name, "Ada");
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_keeps_live_entries() {
        let cache = cache_with_idle_janitor().await;
        cache
            .set_with_ttl(id(1), record(1, "Ada"), Duration::from_millis(1))
            .await;
        cache.set(id(2), record(2, "Grace")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.size().await, 1);
        assert!(cache.get(id(2)).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_sweeps_expired_entries() {
        let cache = IdentityCache::with_sweep_interval(Duration::from_secs(5), Duration::from_secs(60));
        cache.set(id(1), record(1, "Ada")).await;
        cache
            .set_with_ttl(id(2), record(2, "Grace"), Duration::from_secs(600))
            .await;

        // Auto-advance runs the janitor tick at 60s before waking us at 61s
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(cache.size().await, 1);
        assert!(cache.get(id(2)).await.is_some());

        cache.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_janitor() {
        let cache = IdentityCache::with_sweep_interval(Duration::from_secs(1), Duration::from_secs(10));

        cache.shutdown().await;
        // Second call is a no-op
        cache.shutdown().await;

        cache.set(id(1), record(1, "Ada")).await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        // Expired but never swept
        assert_eq!(cache.size().await, 1);
        assert!(cache.get(id(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_drop_cancels_janitor() {
        let cache = IdentityCache::new(DEFAULT_TTL);
        let token = cache.cancel_token.clone();

        drop(cache);

        assert!(token.is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(IdentityCache::new(DEFAULT_TTL));

        let mut handles = Vec::new();
        for task in 0..8_i64 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                for n in 1..=50_i64 {
                    let key = (task * 50) + n;
                    cache.set(id(key), record(key, "User")).await;
                    assert_eq!(cache.get(id(key)).await.unwrap().id, id(key));
                    if n % 10 == 0 {
                        cache.invalidate(id(key)).await;
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.size().await, 8 * 45);
        cache.shutdown().await;
    }
}
