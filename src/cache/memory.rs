//! In-process cache provider with a byte budget
//!
//! Layout: `path -> (options hash -> entry)` behind one `RwLock`, plus an
//! atomic byte counter. An insert reserves its growth over the entry it
//! replaces while holding the write lock; bytes are released exactly once, by
//! whichever of replace/delete/eviction takes the entry out of the map.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use super::{cache_relative_path, CacheError, CacheProvider, EvictionPolicy, Sweeper};
use crate::resource::Resource;

#[derive(Debug, Clone)]
struct Entry {
    body: Bytes,
    mime_type: Option<String>,
    modified_at: SystemTime,
    stored_at: Instant,
    /// Bytes reserved on the counter for this entry
    size: u64,
}

struct Store {
    entries: RwLock<HashMap<String, HashMap<String, Entry>>>,
    used_bytes: AtomicU64,
    limit_bytes: u64,
    life_time: Duration,
}

impl Store {
    fn reserve(&self, size: u64) -> Result<(), CacheError> {
        let limit = self.limit_bytes;
        self.used_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(size).filter(|total| *total <= limit)
            })
            .map(|_| ())
            .map_err(|_| CacheError::CapacityExceeded {
                requested: size,
                limit,
            })
    }

    fn release(&self, size: u64) {
        self.used_bytes.fetch_sub(size, Ordering::AcqRel);
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) > self.life_time
    }

    /// Remove every entry older than the lifetime, returning how many went
    fn evict_expired(&self) -> usize {
        let now = Instant::now();

        let expired: Vec<(String, String, Instant)> = {
            let entries = self.entries.read();
            entries
                .iter()
                .flat_map(|(path, family)| {
                    family
                        .iter()
                        .filter(move |(_, entry)| self.is_expired(entry, now))
                        .map(move |(hash, entry)| (path.clone(), hash.clone(), entry.stored_at))
                })
                .collect()
        };

        if expired.is_empty() {
            return 0;
        }

        let mut removed = 0;
        let mut entries = self.entries.write();
        for (path, hash, stored_at) in &expired {
            let Some(family) = entries.get_mut(path) else {
                continue;
            };
            // Skip entries replaced since the read pass.
            if family.get(hash).map(|e| e.stored_at) != Some(*stored_at) {
                continue;
            }
            if let Some(entry) = family.remove(hash) {
                self.release(entry.size);
                removed += 1;
            }
            if family.is_empty() {
                entries.remove(path);
            }
        }

        tracing::debug!(
            evicted = removed,
            remaining_paths = entries.len(),
            used_bytes = self.used_bytes.load(Ordering::Acquire),
            "Evicted expired memory cache entries"
        );
        removed
    }
}

pub struct MemoryCache {
    store: Arc<Store>,
    sweeper: Sweeper,
}

impl MemoryCache {
    /// Create the cache and start its eviction task on the current runtime
    pub fn new(limit_bytes: u64, policy: EvictionPolicy) -> Self {
        let store = Arc::new(Store {
            entries: RwLock::new(HashMap::new()),
            used_bytes: AtomicU64::new(0),
            limit_bytes,
            life_time: policy.life_time,
        });

        let sweep_store = Arc::clone(&store);
        let sweeper = Sweeper::spawn("memory", policy.clean_interval, move || {
            let store = Arc::clone(&sweep_store);
            async move {
                store.evict_expired();
            }
        });

        Self { store, sweeper }
    }

    /// Bytes currently accounted to cached entries
    pub fn used_bytes(&self) -> u64 {
        self.store.used_bytes.load(Ordering::Acquire)
    }

    pub fn limit_bytes(&self) -> u64 {
        self.store.limit_bytes
    }

    /// Number of cached derivatives across all paths
    pub fn len(&self) -> usize {
        self.store.entries.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run one eviction pass now
    pub fn evict_expired(&self) -> usize {
        self.store.evict_expired()
    }
}

fn family_key(relative: &str) -> String {
    format!("/{}", relative)
}

#[async_trait]
impl CacheProvider for MemoryCache {
    async fn get(&self, resource: &Resource) -> Result<Resource, CacheError> {
        let Some(hash) = resource.options_hash() else {
            return Err(CacheError::Miss);
        };
        let key = family_key(cache_relative_path(resource.path())?);

        let entries = self.store.entries.read();
        let entry = entries
            .get(&key)
            .and_then(|family| family.get(hash))
            .filter(|entry| !self.store.is_expired(entry, Instant::now()))
            .ok_or(CacheError::Miss)?;

        let mut cached = Resource::new(key.as_str())
            .with_body(entry.body.clone())
            .with_modified_at(entry.modified_at);
        if let Some(options) = resource.options() {
            cached = cached.with_options(Arc::clone(options));
        }
        if let Some(mime_type) = &entry.mime_type {
            cached = cached.with_mime_type(mime_type.as_str());
        }
        Ok(cached)
    }

    async fn set(&self, resource: &Resource) -> Result<(), CacheError> {
        let Some(hash) = resource.options_hash() else {
            return Err(CacheError::MissingOptions {
                path: resource.path().to_string(),
            });
        };
        let key = family_key(cache_relative_path(resource.path())?);
        let size = resource.size() as u64;

        let entry = Entry {
            body: resource.body().clone(),
            mime_type: resource.mime_type().map(str::to_string),
            modified_at: resource.modified_at(),
            stored_at: Instant::now(),
            size,
        };

        // A replacement only needs the difference from the entry it displaces.
        let mut entries = self.store.entries.write();
        let old_size = entries
            .get(&key)
            .and_then(|family| family.get(hash))
            .map_or(0, |old| old.size);
        if size > old_size {
            self.store.reserve(size - old_size)?;
        }

        entries
            .entry(key)
            .or_default()
            .insert(hash.to_string(), entry);
        drop(entries);

        if old_size > size {
            self.store.release(old_size - size);
        }
        Ok(())
    }

    async fn del(&self, path: &str) -> Result<(), CacheError> {
        let key = family_key(cache_relative_path(path)?);
        let removed = self.store.entries.write().remove(&key);

        if let Some(family) = removed {
            let freed: u64 = family.values().map(|entry| entry.size).sum();
            self.store.release(freed);
            tracing::debug!(
                path = %key,
                derivatives = family.len(),
                freed_bytes = freed,
                "Removed memory cache family"
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    fn shutdown(&self) {
        self.sweeper.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_optimizer::Options;

    fn policy(life_time_ms: u64, interval_ms: u64) -> EvictionPolicy {
        EvictionPolicy {
            life_time: Duration::from_millis(life_time_ms),
            clean_interval: Duration::from_millis(interval_ms),
        }
    }

    fn derivative(path: &str, query: &str, body: &[u8]) -> Resource {
        Resource::new(path)
            .with_options(Arc::new(Options::from_query(query).unwrap()))
            .with_body(body.to_vec())
            .with_mime_type("image/png")
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = MemoryCache::new(1024, policy(60_000, 60_000));
        let resource = derivative("/a.jpg", "w=10", b"abc");

        cache.set(&resource).await.unwrap();
        let cached = cache.get(&resource).await.unwrap();

        assert_eq!(cached.body().as_ref(), b"abc");
        assert_eq!(cached.mime_type(), Some("image/png"));
        assert_eq!(cache.used_bytes(), 3);
    }

    #[tokio::test]
    async fn test_get_unknown_is_miss() {
        let cache = MemoryCache::new(1024, policy(60_000, 60_000));
        cache.set(&derivative("/a.jpg", "w=10", b"abc")).await.unwrap();

        let other_options = derivative("/a.jpg", "w=11", b"");
        assert!(cache.get(&other_options).await.unwrap_err().is_miss());
        let other_path = derivative("/b.jpg", "w=10", b"");
        assert!(cache.get(&other_path).await.unwrap_err().is_miss());
    }

    #[tokio::test]
    async fn test_get_without_options_is_miss() {
        let cache = MemoryCache::new(1024, policy(60_000, 60_000));
        cache.set(&derivative("/a.jpg", "", b"abc")).await.unwrap();

        let bare = Resource::new("/a.jpg");
        assert!(cache.get(&bare).await.unwrap_err().is_miss());
        assert!(matches!(
            cache.set(&bare).await.unwrap_err(),
            CacheError::MissingOptions { .. }
        ));
    }

    #[tokio::test]
    async fn test_budget_rejects_overflow() {
        let cache = MemoryCache::new(5, policy(60_000, 60_000));
        cache.set(&derivative("/a.jpg", "w=1", b"abc")).await.unwrap();

        let err = cache
            .set(&derivative("/a.jpg", "w=2", b"abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::CapacityExceeded { .. }));
        assert_eq!(cache.used_bytes(), 3);
    }

    #[tokio::test]
    async fn test_replace_counts_bytes_once() {
        let cache = MemoryCache::new(1024, policy(60_000, 60_000));
        for _ in 0..5 {
            cache.set(&derivative("/a.jpg", "w=1", b"abcd")).await.unwrap();
        }
        assert_eq!(cache.used_bytes(), 4);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_reserves_only_growth() {
        let cache = MemoryCache::new(6, policy(60_000, 60_000));
        cache.set(&derivative("/a.jpg", "w=1", b"abcd")).await.unwrap();

        cache.set(&derivative("/a.jpg", "w=1", b"abcdef")).await.unwrap();
        assert_eq!(cache.used_bytes(), 6);

        cache.set(&derivative("/a.jpg", "w=1", b"ab")).await.unwrap();
        assert_eq!(cache.used_bytes(), 2);

        let err = cache
            .set(&derivative("/a.jpg", "w=1", b"abcdefg"))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::CapacityExceeded { .. }));
        assert_eq!(cache.used_bytes(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_sets_respect_budget() {
        let cache = Arc::new(MemoryCache::new(10, policy(60_000, 60_000)));
        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache
                    .set(&derivative("/a.jpg", &format!("w={}", i), b"123456"))
                    .await
                    .is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(cache.used_bytes(), 6);
    }

    #[tokio::test]
    async fn test_del_removes_whole_family() {
        let cache = MemoryCache::new(1024, policy(60_000, 60_000));
        cache.set(&derivative("/a.jpg", "w=1", b"aa")).await.unwrap();
        cache.set(&derivative("/a.jpg", "w=2", b"bbb")).await.unwrap();
        cache.set(&derivative("/b.jpg", "w=1", b"c")).await.unwrap();

        cache.del("a.jpg").await.unwrap();

        assert!(cache.get(&derivative("/a.jpg", "w=1", b"")).await.is_err());
        assert!(cache.get(&derivative("/a.jpg", "w=2", b"")).await.is_err());
        assert!(cache.get(&derivative("/b.jpg", "w=1", b"")).await.is_ok());
        assert_eq!(cache.used_bytes(), 1);

        cache.del("/a.jpg").await.unwrap();
        assert_eq!(cache.used_bytes(), 1);
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let cache = MemoryCache::new(1024, policy(60_000, 60_000));
        let hostile = derivative("/../../etc/x.jpg", "w=1", b"x");

        assert!(matches!(
            cache.set(&hostile).await.unwrap_err(),
            CacheError::InvalidPath { .. }
        ));
        assert!(matches!(
            cache.get(&hostile).await.unwrap_err(),
            CacheError::InvalidPath { .. }
        ));
        assert!(matches!(
            cache.del("/../etc").await.unwrap_err(),
            CacheError::InvalidPath { .. }
        ));
        assert_eq!(cache.used_bytes(), 0);
    }

    #[tokio::test]
    async fn test_manual_eviction_releases_recorded_size() {
        let cache = MemoryCache::new(1024, policy(20, 60_000));
        cache.set(&derivative("/a.jpg", "w=1", b"abcdef")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.evict_expired(), 1);
        assert_eq!(cache.used_bytes(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.evict_expired(), 0);
    }

    #[tokio::test]
    async fn test_background_eviction() {
        let cache = MemoryCache::new(1024, policy(100, 20));
        let resource = derivative("/a.jpg", "w=1", b"abc");
        cache.set(&resource).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get(&resource).await.is_ok());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.get(&resource).await.unwrap_err().is_miss());
        assert!(cache.is_empty());
        assert_eq!(cache.used_bytes(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_eviction() {
        let cache = MemoryCache::new(1024, policy(10, 10));
        cache.shutdown();
        cache.set(&derivative("/a.jpg", "w=1", b"abc")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used_bytes(), 3);
    }
}
