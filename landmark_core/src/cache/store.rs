//! Generic cache store implementation

use super::{
    CacheConfig, CacheEntry, CacheSetOptions, CacheSlot, CacheSnapshot, CacheStats, estimate_size,
};
use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, trace, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::interval;

/// Values a [`CacheStore`] can hold
pub trait Cacheable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    total_size_bytes: u64,
    hit_count: u64,
    miss_count: u64,
    eviction_count: u64,
}

impl<V> Default for CacheState<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            total_size_bytes: 0,
            hit_count: 0,
            miss_count: 0,
            eviction_count: 0,
        }
    }
}

impl<V> CacheState<V> {
    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let removed = self.entries.remove(key)?;
        self.total_size_bytes = self.total_size_bytes.saturating_sub(removed.size_bytes);
        Some(removed)
    }

    fn remove_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Drop the least valuable entries until `incoming` more bytes fit
    fn evict_for_memory(&mut self, incoming: u64, max_bytes: u64) {
        if self.total_size_bytes + incoming <= max_bytes {
            return;
        }

        let mut candidates: Vec<(i32, u64, String)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.priority, entry.access_count, key.clone()))
            .collect();
        candidates.sort();

        for (_, _, key) in candidates {
            if self.total_size_bytes + incoming <= max_bytes {
                break;
            }
            if self.remove(&key).is_some() {
                self.eviction_count += 1;
                trace!("Evicted '{key}' to free memory");
            }
        }
    }

    /// Drop one entry: lowest priority, then fewest accesses, then earliest effective time
    fn evict_one(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by(|(_, a), (_, b)| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| a.access_count.cmp(&b.access_count))
                    .then_with(|| a.effective_time().cmp(&b.effective_time()))
            })
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            self.remove(&key);
            self.eviction_count += 1;
            trace!("Evicted '{key}' to respect entry limit");
        }
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len(),
            hit_count: self.hit_count,
            miss_count: self.miss_count,
            eviction_count: self.eviction_count,
            total_size_bytes: self.total_size_bytes,
            oldest_entry: self.entries.values().map(|e| e.created_at).min(),
            newest_entry: self.entries.values().map(|e| e.created_at).max(),
        }
    }
}

impl<V: Clone> CacheState<V> {
    fn snapshot(&self) -> CacheSnapshot<V> {
        CacheSnapshot {
            saved_at: Utc::now(),
            entries: self
                .entries
                .iter()
                .map(|(key, entry)| (key.clone(), entry.clone()))
                .collect(),
            hit_count: self.hit_count,
            miss_count: self.miss_count,
            eviction_count: self.eviction_count,
        }
    }
}

struct Inner<V> {
    state: RwLock<CacheState<V>>,
    config: CacheConfig,
    slot: Option<Arc<dyn CacheSlot>>,
}

impl<V: Cacheable> Inner<V> {
    /// Mirror state to the slot. Callers hold the write guard so snapshots
    /// are written in mutation order.
    async fn persist(&self, state: &CacheState<V>) {
        let Some(slot) = &self.slot else {
            return;
        };
        match serde_json::to_string(&state.snapshot()) {
            Ok(data) => {
                if let Err(e) = slot.save(&data).await {
                    warn!("Failed to persist cache snapshot: {e}");
                }
            }
            Err(e) => warn!("Failed to serialize cache snapshot: {e}"),
        }
    }

    async fn purge_expired(&self) -> usize {
        let mut state = self.state.write().await;
        let removed = state.remove_expired(Utc::now());
        if removed > 0 {
            debug!("Cache sweep removed {removed} expired entries");
            self.persist(&state).await;
        }
        removed
    }
}

/// Bounded, TTL-aware key/value store
///
/// Cloning is cheap and clones share state.
pub struct CacheStore<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Cacheable> CacheStore<V> {
    /// Create an in-memory store
    pub fn new(config: CacheConfig) -> Self {
        Self::build(config, None, CacheState::default())
    }

    /// Create a store mirrored to `slot`, restoring a fresh snapshot if one exists
    pub async fn with_slot(config: CacheConfig, slot: Arc<dyn CacheSlot>) -> Self {
        let state = Self::restore(&config, slot.as_ref()).await;
        Self::build(config, Some(slot), state)
    }

    fn build(config: CacheConfig, slot: Option<Arc<dyn CacheSlot>>, state: CacheState<V>) -> Self {
        let inner = Arc::new(Inner {
            state: RwLock::new(state),
            config,
            slot,
        });
        Self::spawn_sweeper(&inner);
        Self { inner }
    }

    fn spawn_sweeper(inner: &Arc<Inner<V>>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No tokio runtime, expired entries are only removed on read");
            return;
        };

        let period = inner.config.sweep_interval.max(Duration::from_millis(1));
        let weak: Weak<Inner<V>> = Arc::downgrade(inner);
        handle.spawn(async move {
            let mut ticker = interval(period);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.purge_expired().await;
            }
        });
    }

    async fn restore(config: &CacheConfig, slot: &dyn CacheSlot) -> CacheState<V> {
        let data = match slot.load().await {
            Ok(Some(data)) => data,
            Ok(None) => return CacheState::default(),
            Err(e) => {
                warn!("Failed to read cache snapshot: {e}");
                return CacheState::default();
            }
        };

        let snapshot: CacheSnapshot<V> = match serde_json::from_str(&data) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Discarding unreadable cache snapshot: {e}");
                if let Err(e) = slot.discard().await {
                    warn!("Failed to discard unreadable cache snapshot: {e}");
                }
                return CacheState::default();
            }
        };

        let now = Utc::now();
        let window = TimeDelta::from_std(config.freshness_window).unwrap_or(TimeDelta::MAX);
        if now.signed_duration_since(snapshot.saved_at) > window {
            debug!("Cache snapshot from {} is stale, discarding", snapshot.saved_at);
            if let Err(e) = slot.discard().await {
                warn!("Failed to discard stale cache snapshot: {e}");
            }
            return CacheState::default();
        }

        let mut state = CacheState {
            hit_count: snapshot.hit_count,
            miss_count: snapshot.miss_count,
            eviction_count: snapshot.eviction_count,
            ..CacheState::default()
        };
        for (key, entry) in snapshot.entries {
            if entry.is_expired_at(now) {
                continue;
            }
            state.total_size_bytes += entry.size_bytes;
            state.entries.insert(key, entry);
        }
        debug!("Restored {} cache entries from snapshot", state.entries.len());
        state
    }

    /// Store a value, evicting as needed to stay within bounds
    ///
    /// A value whose estimated size alone exceeds the memory ceiling is not
    /// stored.
    pub async fn set(&self, key: &str, value: V, options: CacheSetOptions) {
        let config = &self.inner.config;
        let size_bytes = estimate_size(&value);
        if size_bytes > config.max_memory_bytes {
            warn!(
                "Not caching '{key}': {size_bytes} bytes exceeds the {} byte ceiling",
                config.max_memory_bytes
            );
            return;
        }

        let now = Utc::now();
        let ttl = TimeDelta::from_std(options.ttl.unwrap_or(config.default_ttl))
            .unwrap_or(TimeDelta::MAX);
        let expires_at = now
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut state = self.inner.state.write().await;
        state.remove(key);
        state.evict_for_memory(size_bytes, config.max_memory_bytes);
        while config.max_entries > 0 && state.entries.len() >= config.max_entries {
            state.evict_one();
        }

        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: now,
                expires_at,
                access_count: 0,
                last_accessed: now,
                priority: options.priority.unwrap_or(config.default_priority),
                size_bytes,
            },
        );
        state.total_size_bytes += size_bytes;
        trace!("Cached '{key}' ({size_bytes} bytes, expires {expires_at})");

        self.inner.persist(&state).await;
    }

    /// Look up a live value. Expired entries are removed and count as misses.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Utc::now();
        let mut guard = self.inner.state.write().await;
        let state = &mut *guard;

        let Some(entry) = state.entries.get_mut(key) else {
            state.miss_count += 1;
            return None;
        };

        if entry.is_expired_at(now) {
            state.remove(key);
            state.miss_count += 1;
            trace!("Cache entry '{key}' expired");
            self.inner.persist(state).await;
            return None;
        }

        entry.access_count += 1;
        entry.last_accessed = now;
        let value = entry.value.clone();
        state.hit_count += 1;
        self.inner.persist(state).await;
        Some(value)
    }

    /// Whether a live entry exists. Does not touch statistics.
    pub async fn has(&self, key: &str) -> bool {
        let now = Utc::now();
        let state = self.inner.state.read().await;
        state
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
    }

    /// Remove an entry, returning whether one was present
    pub async fn delete(&self, key: &str) -> bool {
        let mut state = self.inner.state.write().await;
        let removed = state.remove(key).is_some();
        if removed {
            self.inner.persist(&state).await;
        }
        removed
    }

    /// Remove everything and reset statistics
    pub async fn clear(&self) {
        let mut state = self.inner.state.write().await;
        *state = CacheState::default();
        self.inner.persist(&state).await;
    }

    /// Return the cached value or compute, cache and return it
    ///
    /// Failed computations are not cached.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        supplier: F,
        options: CacheSetOptions,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }
        let value = supplier().await?;
        self.set(key, value.clone(), options).await;
        Ok(value)
    }

    /// Remove every expired entry now, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        self.inner.purge_expired().await
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.state.read().await.stats()
    }

    pub async fn len(&self) -> usize {
        self.inner.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }
}
