//! Source adapters: turn a keyword into normalized [`FeedItem`]s.
//!
//! Every upstream source is one variant of the closed [`Adapter`] enum. The
//! registry built at startup pairs each adapter with a label and a deadline
//! ([`Source`]); the dispatcher only ever talks to [`Adapter::fetch`].
//!
//! # Supported Sources
//!
//! | Variant | Module | Method | Notes |
//! |---------|--------|--------|-------|
//! | NewsAPI | [`newsapi`] | REST | Paginated, keyword as `q` parameter |
//! | RSS feeds | [`feeds`] | RSS 2.0 polling | Fixed or `%s`-templated URLs, local keyword filter |
//! | YouTube | [`youtube`] | REST | Data API video search |
//! | Browser | [`browser`] | Rendered HTML scraping | Slow; emits partial output page by page |
//! | Simulated | [`simulated`] | Scripted | Deterministic delays and failures for tests and demos |
//!
//! # Partial output and cancellation
//!
//! Each call receives a [`FetchContext`]. Adapters that work in steps push
//! items into it as they go so the crawl supervisor can return what was
//! collected when a deadline expires, and they check the context's
//! cancellation token between steps. A request already in flight is not
//! interrupted; its side effects may outlive the caller's deadline.

use crate::error::AdapterError;
use crate::models::FeedItem;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub mod browser;
pub mod feeds;
pub mod newsapi;
pub mod simulated;
pub mod youtube;

pub use browser::BrowserAdapter;
pub use feeds::FeedAdapter;
pub use newsapi::NewsApiAdapter;
pub use simulated::SimulatedAdapter;
pub use youtube::YouTubeAdapter;

/// User agent sent with every upstream request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Build the HTTP client shared by one adapter.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build configured HTTP client; using defaults");
            reqwest::Client::new()
        })
}

/// Per-call state shared between an adapter and whoever supervises it.
#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    partial: Arc<Mutex<Vec<FeedItem>>>,
    cancel: CancellationToken,
}

impl FetchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer items produced so far.
    pub fn emit(&self, items: impl IntoIterator<Item = FeedItem>) {
        self.partial
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(items);
    }

    /// Copy of everything buffered up to now.
    pub fn snapshot(&self) -> Vec<FeedItem> {
        self.partial
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// The closed set of upstream source types.
pub enum Adapter {
    NewsApi(NewsApiAdapter),
    Feeds(FeedAdapter),
    YouTube(YouTubeAdapter),
    Browser(BrowserAdapter),
    Simulated(SimulatedAdapter),
}

impl Adapter {
    /// Short name of the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Adapter::NewsApi(_) => "news_api",
            Adapter::Feeds(_) => "feeds",
            Adapter::YouTube(_) => "youtube",
            Adapter::Browser(_) => "browser",
            Adapter::Simulated(_) => "simulated",
        }
    }

    /// Whether the adapter understands a page number.
    pub fn supports_pages(&self) -> bool {
        matches!(self, Adapter::NewsApi(_))
    }

    /// Fetch items for `keyword`. Adapters without paging ignore `page`.
    pub async fn fetch(
        &self,
        keyword: &str,
        page: Option<u32>,
        ctx: &FetchContext,
    ) -> Result<Vec<FeedItem>, AdapterError> {
        match self {
            Adapter::NewsApi(a) => a.fetch(keyword, page).await,
            Adapter::Feeds(a) => a.fetch(keyword, ctx).await,
            Adapter::YouTube(a) => a.fetch(keyword).await,
            Adapter::Browser(a) => a.fetch(keyword, ctx).await,
            Adapter::Simulated(a) => a.fetch(keyword, ctx).await,
        }
    }
}

/// A registered source: label, adapter and its supervision deadline.
#[derive(Clone)]
pub struct Source {
    pub label: String,
    pub adapter: Arc<Adapter>,
    pub deadline: Duration,
}

impl Source {
    pub fn new(label: impl Into<String>, adapter: Adapter, deadline: Duration) -> Self {
        Self {
            label: label.into(),
            adapter: Arc::new(adapter),
            deadline,
        }
    }
}
