//! Bounded key/value cache with per-entry TTL and priority
//!
//! The store is generic over any serializable value. Capacity is bounded by
//! entry count and by estimated memory; entries expire lazily on read and
//! proactively on a periodic sweep. State can optionally be mirrored to a
//! [`CacheSlot`] so it survives restarts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod persistence;
pub mod store;

pub use persistence::{CACHE_FILE_NAME, CacheSlot, CacheSnapshot, FileSlot, MemorySlot};
pub use store::CacheStore;

/// Estimate used when a value cannot be serialized for sizing
pub const FALLBACK_ENTRY_SIZE: u64 = 1024;

/// Cache store configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of live entries
    pub max_entries: usize,
    /// Maximum aggregate estimated size of all entries
    pub max_memory_bytes: u64,
    /// TTL used when `set` is called without one
    pub default_ttl: Duration,
    /// Priority used when `set` is called without one
    pub default_priority: i32,
    /// How often the background sweep removes expired entries
    pub sweep_interval: Duration,
    /// Persisted snapshots older than this are discarded on load
    pub freshness_window: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            max_memory_bytes: 50 * 1024 * 1024,
            default_ttl: Duration::from_secs(24 * 3600),
            default_priority: 1,
            sweep_interval: Duration::from_secs(300),
            freshness_window: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

/// Per-insert overrides
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheSetOptions {
    pub ttl: Option<Duration>,
    pub priority: Option<i32>,
}

impl CacheSetOptions {
    pub fn new(ttl: Duration, priority: i32) -> Self {
        Self {
            ttl: Some(ttl),
            priority: Some(priority),
        }
    }
}

/// A stored value plus its bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
    /// Higher means more valuable
    pub priority: i32,
    pub size_bytes: u64,
}

impl<V> CacheEntry<V> {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Last access shifted back one hour per priority level
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.last_accessed
            .checked_sub_signed(chrono::TimeDelta::hours(i64::from(self.priority)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
    pub total_size_bytes: u64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

impl CacheStats {
    /// Hits over total lookups, 0.0 when nothing has been looked up
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hit_count + self.miss_count;
        if lookups == 0 {
            0.0
        } else {
            self.hit_count as f64 / lookups as f64
        }
    }
}

/// Estimate the footprint of a value by its serialized length
pub fn estimate_size<V: Serialize>(value: &V) -> u64 {
    serde_json::to_vec(value)
        .map(|bytes| bytes.len() as u64)
        .unwrap_or(FALLBACK_ENTRY_SIZE)
}
