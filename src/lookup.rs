//! Campus Admin Lookup
//!
//! Read-through cache over the record store answering "who administers
//! campus X". Store failures propagate to the caller and are never cached.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::auth::{CampusId, RecordStore, Role, UserId};
use crate::cache::{BoundedTtlCache, CacheOptions, CacheStats};
use crate::error::LookupError;

pub struct CampusAdminLookup {
    store: Arc<dyn RecordStore>,
    /// Global mutex: a hit's sliding reschedule never races a sweep or delete
    cache: Mutex<BoundedTtlCache<CampusId, Vec<UserId>>>,
}

impl CampusAdminLookup {
    pub fn new(store: Arc<dyn RecordStore>, options: CacheOptions) -> Self {
        Self {
            store,
            cache: Mutex::new(BoundedTtlCache::new(options)),
        }
    }

    /// Returns the ids of every campus admin of `campus_id`.
    ///
    /// The cache lock is released while the record store is queried, so
    /// concurrent misses for the same campus may both reach the store; the
    /// later answer wins.
    pub async fn admins_of(&self, campus_id: &str) -> Result<Vec<UserId>, LookupError> {
        let key = campus_id.to_string();

        let cached = self.cache.lock().await.get(&key);
        if let Some(admins) = cached {
            debug!(campus_id, admins = admins.len(), "Campus admin cache hit");
            return Ok(admins);
        }

        let admins = self
            .store
            .find_user_ids_by_campus_and_role(campus_id, Role::CampusAdmin)
            .await
            .map_err(|e| {
                warn!(campus_id, error = %e, "Campus admin lookup failed");
                e
            })?;

        debug!(campus_id, admins = admins.len(), "Campus admin cache warmed");
        self.cache.lock().await.set(key, admins.clone());
        Ok(admins)
    }

    /// Drops the cached admins of `campus_id`; returns whether anything was cached.
    pub async fn invalidate(&self, campus_id: &str) -> bool {
        self.cache.lock().await.delete(&campus_id.to_string())
    }

    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }

    /// Removes expired entries; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.cache.lock().await.purge_expired()
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn find_user_ids_by_campus_and_role(
            &self,
            campus_id: &str,
            role: Role,
        ) -> Result<Vec<UserId>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(LookupError::Unavailable("store offline".into()));
            }
            assert_eq!(role, Role::CampusAdmin);
            Ok(vec![format!("{}-admin", campus_id)])
        }
    }

    fn lookup(store: Arc<CountingStore>) -> CampusAdminLookup {
        CampusAdminLookup::new(
            store,
            CacheOptions::new(2, Duration::from_millis(1000), Duration::from_millis(5000)),
        )
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let store = Arc::new(CountingStore::default());
        let lookup = lookup(store.clone());

        assert_eq!(lookup.admins_of("north").await.unwrap(), vec!["north-admin"]);
        assert_eq!(lookup.admins_of("north").await.unwrap(), vec!["north-admin"]);

        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        let stats = lookup.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_store_failure_propagates_and_is_not_cached() {
        let store = Arc::new(CountingStore::default());
        store.failing.store(true, Ordering::SeqCst);
        let lookup = lookup(store.clone());

        let result = lookup.admins_of("north").await;
        assert_eq!(result, Err(LookupError::Unavailable("store offline".into())));

        store.failing.store(false, Ordering::SeqCst);
        assert!(lookup.admins_of("north").await.is_ok());
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_requery() {
        let store = Arc::new(CountingStore::default());
        let lookup = lookup(store.clone());

        lookup.admins_of("north").await.unwrap();
        assert!(lookup.invalidate("north").await);
        assert!(!lookup.invalidate("north").await);
        lookup.admins_of("north").await.unwrap();

        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_capacity_evicts_earliest_campus() {
        let store = Arc::new(CountingStore::default());
        let lookup = lookup(store.clone());

        for campus in ["a", "b", "c"] {
            lookup.admins_of(campus).await.unwrap();
        }
        // "a" was evicted, "c" is still cached
        lookup.admins_of("c").await.unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        lookup.admins_of("a").await.unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
        assert_eq!(lookup.stats().await.evictions, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sliding_expiry_requeries_store() {
        let store = Arc::new(CountingStore::default());
        let lookup = lookup(store.clone());

        lookup.admins_of("north").await.unwrap();
        tokio::time::advance(Duration::from_millis(1000)).await;

        assert_eq!(lookup.purge_expired().await, 1);
        lookup.admins_of("north").await.unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = Arc::new(CountingStore::default());
        let lookup = lookup(store.clone());

        lookup.admins_of("north").await.unwrap();
        lookup.clear().await;

        assert_eq!(lookup.stats().await.total_entries, 0);
    }
}
