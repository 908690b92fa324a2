//! Data models shared by adapters, the dispatcher and the merger.
//!
//! - [`FeedItem`]: one normalized piece of content from any source
//! - [`SourceQuery`]: cache key for one adapter invocation
//! - [`SourceStatus`] / [`SourceResult`]: what a single source contributed
//! - [`AggregationResult`]: everything one search produced
//!
//! # Ordering
//!
//! Items are ranked newest first. An item without a timestamp sorts after
//! every dated item so the order stays total.

use crate::error::AdapterErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A single item of content normalized from an upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Headline or post text.
    pub title: String,
    /// Link to the full content.
    pub link: String,
    /// Publication time. `None` means unknown and sorts last.
    pub published: Option<DateTime<Utc>>,
    /// Summary or body text.
    pub description: String,
    /// Human-readable source label (feed title, outlet name, platform).
    pub source: String,
    /// Optional preview image.
    pub thumbnail: Option<String>,
}

impl FeedItem {
    /// Compare two items newest first, unknown timestamps last.
    pub fn recency_cmp(&self, other: &Self) -> Ordering {
        // None < Some in std, so comparing other against self yields
        // newest-first with undated items sinking to the end.
        other.published.cmp(&self.published)
    }

    /// Render the item as a single crawl result line.
    ///
    /// `"<title> (<link>)"`, followed by `" [Thumbnail: <url>]"` when the
    /// item carries a thumbnail.
    pub fn to_crawl_line(&self) -> String {
        match &self.thumbnail {
            Some(thumb) => format!("{} ({}) [Thumbnail: {}]", self.title, self.link, thumb),
            None => format!("{} ({})", self.title, self.link),
        }
    }
}

/// Sort a sequence in place, newest first. Stable, so equal timestamps keep
/// their relative order.
pub fn sort_by_recency(items: &mut [FeedItem]) {
    items.sort_by(FeedItem::recency_cmp);
}

/// Identity of one adapter invocation, used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceQuery {
    /// Registry label of the source.
    pub source: String,
    pub keyword: String,
    pub page: Option<u32>,
}

impl SourceQuery {
    pub fn new(source: impl Into<String>, keyword: impl Into<String>, page: Option<u32>) -> Self {
        Self {
            source: source.into(),
            keyword: keyword.into(),
            page,
        }
    }
}

/// Outcome of one supervised adapter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SourceStatus {
    /// The adapter finished before its deadline.
    Completed,
    /// The deadline expired; items are whatever was buffered at that point.
    TimedOut,
    /// The adapter reported an error; it contributes no items.
    Failed { kind: AdapterErrorKind },
}

impl SourceStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, SourceStatus::Failed { .. })
    }
}

/// What one source contributed to an aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    pub items: Vec<FeedItem>,
    pub status: SourceStatus,
    /// True when the items came from the result cache.
    pub cached: bool,
}

/// Result of one `aggregate` call: per-source sequences plus the merged view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub keyword: String,
    pub sources: BTreeMap<String, SourceResult>,
    /// Merged, recency-ranked sequence across the combined sources.
    pub combined: Vec<FeedItem>,
}

impl AggregationResult {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ..Default::default()
        }
    }

    /// Items contributed by `label`, if that source ran.
    pub fn items(&self, label: &str) -> Option<&[FeedItem]> {
        self.sources.get(label).map(|r| r.items.as_slice())
    }

    pub fn status(&self, label: &str) -> Option<SourceStatus> {
        self.sources.get(label).map(|r| r.status)
    }
}
