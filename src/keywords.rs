//! Keyword usage tracker with optional JSON persistence.
//!
//! Counts live behind a single mutex that is held only for one map operation.
//! When a [`KeywordStore`] is attached, the flat `{keyword: count}` map is
//! loaded at startup and rewritten after every increment. Writes are
//! serialized by their own async lock, and each write snapshots the counts
//! while holding it so an older snapshot can never land after a newer one.

use serde_json::to_string_pretty;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Default file name for persisted counts.
pub const DEFAULT_KEYWORDS_FILE: &str = "searched_keywords.json";

/// Backing file for keyword counts.
#[derive(Debug)]
pub struct KeywordStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl KeywordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Read persisted counts. A missing or unreadable file yields an empty map.
    pub async fn load(&self) -> HashMap<String, u64> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No keyword file yet; starting empty");
                return HashMap::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read keyword file; starting empty");
                return HashMap::new();
            }
        };

        match serde_json::from_str::<HashMap<String, u64>>(&raw) {
            Ok(counts) => {
                info!(path = %self.path.display(), keywords = counts.len(), "Loaded keyword counts");
                counts
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Keyword file is corrupt; starting empty");
                HashMap::new()
            }
        }
    }

    async fn save(&self, counts: &HashMap<String, u64>) -> std::io::Result<()> {
        let body = to_string_pretty(counts).map_err(std::io::Error::other)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }
}

#[derive(Debug, Default)]
pub struct KeywordTracker {
    counts: Mutex<HashMap<String, u64>>,
    store: Option<KeywordStore>,
}

impl KeywordTracker {
    /// In-memory tracker with no persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker seeded from, and writing back to, `store`.
    pub async fn with_store(store: KeywordStore) -> Self {
        let counts = store.load().await;
        Self {
            counts: Mutex::new(counts),
            store: Some(store),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bump the count for `keyword` and return the new value.
    pub fn increment(&self, keyword: &str) -> u64 {
        let mut counts = self.lock();
        let count = counts.entry(keyword.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Increment and persist. Persistence failures are logged, never returned.
    #[instrument(level = "debug", skip(self))]
    pub async fn record(&self, keyword: &str) -> u64 {
        let count = self.increment(keyword);
        if let Some(store) = &self.store {
            let _guard = store.write_lock.lock().await;
            let snapshot = self.counts();
            match store.save(&snapshot).await {
                Ok(()) => debug!(path = %store.path.display(), "Saved keyword counts"),
                Err(e) => warn!(path = %store.path.display(), error = %e, "Failed to save keyword counts"),
            }
        }
        count
    }

    /// Write the current counts to the store, if any.
    pub async fn flush(&self) -> std::io::Result<()> {
        match &self.store {
            Some(store) => {
                let _guard = store.write_lock.lock().await;
                store.save(&self.counts()).await
            }
            None => Ok(()),
        }
    }

    pub fn count(&self, keyword: &str) -> u64 {
        self.lock().get(keyword).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> HashMap<String, u64> {
        self.lock().clone()
    }

    /// Keywords, most searched first. Ties are ordered by keyword text.
    pub fn top_keywords(&self) -> Vec<String> {
        let mut pairs: Vec<(String, u64)> = self.counts().into_iter().collect();
        pairs.sort_by(|(ka, ca), (kb, cb)| cb.cmp(ca).then_with(|| ka.cmp(kb)));
        pairs.into_iter().map(|(k, _)| k).collect()
    }
}
