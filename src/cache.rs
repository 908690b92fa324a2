//! Lookaside cache of adapter output keyed by [`SourceQuery`].
//!
//! One coarse mutex guards the map; it is held only for the duration of a
//! map operation and never across a network call. Expiry and failure caching
//! are explicit knobs:
//!
//! - `ttl`: entries older than this are treated as missing (`None` keeps
//!   entries for the process lifetime)
//! - `cache_failures`: whether a failed call is remembered as a failed entry
//!   or left uncached so the next request tries again

use crate::models::{FeedItem, SourceQuery, SourceStatus};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime in seconds; absent means entries never expire.
    pub ttl_secs: Option<u64>,
    pub cache_failures: bool,
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

/// A cached adapter outcome.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub items: Vec<FeedItem>,
    pub status: SourceStatus,
    stored_at: Instant,
}

impl CacheEntry {
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }
}

#[derive(Debug, Default)]
pub struct ResultCache {
    entries: Mutex<HashMap<SourceQuery, CacheEntry>>,
    ttl: Option<Duration>,
    cache_failures: bool,
}

impl ResultCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: config.ttl(),
            cache_failures: config.cache_failures,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SourceQuery, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live entry. Expired entries are evicted on the way.
    pub fn get(&self, query: &SourceQuery) -> Option<CacheEntry> {
        let mut entries = self.lock();
        let entry = entries.get(query)?;
        if let Some(ttl) = self.ttl {
            if entry.age() >= ttl {
                debug!(source = %query.source, keyword = %query.keyword, "Cache entry expired");
                entries.remove(query);
                return None;
            }
        }
        Some(entry.clone())
    }

    /// Store an outcome, overwriting any previous entry for the query.
    ///
    /// Returns whether the outcome was stored; failures are dropped unless
    /// `cache_failures` is set.
    pub fn put(&self, query: SourceQuery, items: Vec<FeedItem>, status: SourceStatus) -> bool {
        if status.is_failure() && !self.cache_failures {
            return false;
        }
        let entry = CacheEntry {
            items,
            status,
            stored_at: Instant::now(),
        };
        self.lock().insert(query, entry);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
