//! Merge per-source results into one recency-ranked sequence.
//!
//! Concatenates the named sources, sorts newest first (stable, unknown
//! timestamps last) and truncates the oldest tail. Deduplication on
//! normalized link is available but off unless configured.

use crate::models::{AggregationResult, FeedItem, sort_by_recency};
use crate::utils::normalize_link;
use itertools::Itertools;
use serde::Deserialize;
use tracing::debug;

/// Default cap on the combined sequence.
pub const DEFAULT_MAX_RESULTS: usize = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Source labels folded into the combined view. Empty means all sources.
    pub combine: Vec<String>,
    pub max_results: Option<usize>,
    pub dedupe: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            combine: Vec::new(),
            max_results: Some(DEFAULT_MAX_RESULTS),
            dedupe: false,
        }
    }
}

impl MergeConfig {
    /// Merge using this config's `combine` list.
    pub fn merge(&self, result: &AggregationResult) -> Vec<FeedItem> {
        merge(result, &self.combine, self)
    }
}

/// Combine the sequences of `sources` from `result`.
///
/// Labels missing from `result` contribute nothing. An empty `sources`
/// slice selects every source.
pub fn merge(result: &AggregationResult, sources: &[String], config: &MergeConfig) -> Vec<FeedItem> {
    let mut combined: Vec<FeedItem> = result
        .sources
        .iter()
        .filter(|(label, _)| sources.is_empty() || sources.contains(label))
        .flat_map(|(_, r)| r.items.iter().cloned())
        .collect();

    sort_by_recency(&mut combined);

    if config.dedupe {
        let before = combined.len();
        // Sorted first, so the newest copy of a link survives. Items without a
        // link never collapse into each other.
        combined = combined
            .into_iter()
            .enumerate()
            .unique_by(|(i, item)| {
                if item.link.is_empty() {
                    format!("#{i}")
                } else {
                    normalize_link(&item.link)
                }
            })
            .map(|(_, item)| item)
            .collect();
        debug!(removed = before - combined.len(), "Deduplicated merged items");
    }

    if let Some(max) = config.max_results {
        combined.truncate(max);
    }
    combined
}
