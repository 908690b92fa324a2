//! Fan-out dispatcher: one concurrent unit of work per registered source.
//!
//! For each source the dispatcher consults the result cache first; a hit is
//! used as-is and never reaches the supervisor. A miss runs the adapter under
//! [`supervise`] and caches the outcome whether it completed or timed out.
//! Each source's items are stored and cached newest first.
//! Adapter failures are logged and degrade to an empty contribution with a
//! `failed` status; they never abort sibling sources. `aggregate` joins on
//! every unit before merging, so there is no early return.

use crate::adapters::Source;
use crate::cache::ResultCache;
use crate::error::AdapterErrorKind;
use crate::merge::MergeConfig;
use crate::models::{AggregationResult, SourceQuery, SourceResult, SourceStatus};
use crate::supervisor::supervise;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

type SharedResults = Arc<Mutex<BTreeMap<String, SourceResult>>>;

pub struct Dispatcher {
    sources: Vec<Source>,
    cache: Arc<ResultCache>,
    merge: MergeConfig,
}

impl Dispatcher {
    pub fn new(sources: Vec<Source>, cache: Arc<ResultCache>, merge: MergeConfig) -> Self {
        Self {
            sources,
            cache,
            merge,
        }
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn source(&self, label: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.label == label)
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Query every source for `keyword` and merge the results.
    #[instrument(level = "info", skip(self), fields(sources = self.sources.len()))]
    pub async fn aggregate(&self, keyword: &str) -> AggregationResult {
        let t0 = Instant::now();
        let results: SharedResults = Arc::new(Mutex::new(BTreeMap::new()));

        let handles: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = source.clone();
                let cache = Arc::clone(&self.cache);
                let results = Arc::clone(&results);
                let keyword = keyword.to_string();
                tokio::spawn(async move { run_source(source, cache, keyword, results).await })
            })
            .collect();

        let joined = join_all(handles).await;

        let mut sources = std::mem::take(&mut *results.lock().unwrap_or_else(PoisonError::into_inner));
        for (source, outcome) in self.sources.iter().zip(joined) {
            if let Err(e) = outcome {
                error!(source = %source.label, error = %e, "Source task panicked");
                sources.insert(
                    source.label.clone(),
                    SourceResult {
                        items: Vec::new(),
                        status: SourceStatus::Failed {
                            kind: AdapterErrorKind::Upstream,
                        },
                        cached: false,
                    },
                );
            }
        }

        let mut result = AggregationResult::new(keyword);
        result.sources = sources;
        result.combined = self.merge.merge(&result);

        info!(
            combined = result.combined.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Aggregation finished"
        );
        result
    }
}

async fn run_source(source: Source, cache: Arc<ResultCache>, keyword: String, results: SharedResults) {
    let query = SourceQuery::new(source.label.as_str(), keyword.as_str(), None);

    let outcome = match cache.get(&query) {
        Some(entry) => {
            debug!(source = %source.label, count = entry.items.len(), "Cache hit");
            SourceResult {
                items: entry.items,
                status: entry.status,
                cached: true,
            }
        }
        None => {
            debug!(source = %source.label, "Cache miss");
            let (items, status) = match supervise(
                &source.label,
                Arc::clone(&source.adapter),
                &keyword,
                None,
                source.deadline,
            )
            .await
            {
                Ok(out) => (out.items, SourceStatus::from(out.status)),
                Err(e) => {
                    warn!(source = %source.label, kind = %e.kind(), error = %e, "Source failed; contributing no items");
                    (Vec::new(), SourceStatus::Failed { kind: e.kind() })
                }
            };
            cache.put(query, items.clone(), status);
            SourceResult {
                items,
                status,
                cached: false,
            }
        }
    };

    results
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(source.label, outcome);
}
