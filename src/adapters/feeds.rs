//! RSS feed polling adapter.
//!
//! Polls a fixed list of feed URLs and keeps the items whose title or
//! description contains the keyword (case-insensitive). A URL containing `%s`
//! is a template: the URL-encoded keyword is substituted before fetching, so
//! search-style feeds such as Google News work alongside plain ones.
//!
//! Feeds are fetched concurrently. One feed failing is logged and skipped;
//! the adapter only fails when every feed failed.

use crate::adapters::{FetchContext, http_client};
use crate::error::AdapterError;
use crate::models::FeedItem;
use crate::utils::expand_template;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Feeds polled when no list is configured.
pub const DEFAULT_FEEDS: &[&str] = &[
    "https://feeds.bbci.co.uk/news/rss.xml",
    "https://rss.nytimes.com/services/xml/rss/nyt/HomePage.xml",
    "https://feeds.skynews.com/feeds/rss/home.xml",
    "https://www.theguardian.com/world/rss",
    "https://www.aljazeera.com/xml/rss/all.xml",
    "https://www.npr.org/rss/rss.php?id=1001",
    "https://news.google.com/rss/search?q=%s&hl=en-US&gl=US&ceid=US:en",
];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const PARALLEL_FEEDS: usize = 4;

pub struct FeedAdapter {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl FeedAdapter {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            client: http_client(REQUEST_TIMEOUT),
            urls,
        }
    }

    pub fn with_default_feeds() -> Self {
        Self::new(DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect())
    }

    #[instrument(level = "info", skip_all, fields(%keyword, feeds = self.urls.len()))]
    pub async fn fetch(&self, keyword: &str, ctx: &FetchContext) -> Result<Vec<FeedItem>, AdapterError> {
        let outcomes: Vec<Result<Vec<FeedItem>, AdapterError>> = stream::iter(self.urls.iter().cloned())
            .map(|template| async move {
                let url = expand_template(&template, keyword);
                if ctx.is_cancelled() {
                    debug!(%url, "Skipping feed after cancellation");
                    return Ok(Vec::new());
                }
                match self.fetch_feed(&url, keyword).await {
                    Ok(items) => {
                        debug!(%url, count = items.len(), "Fetched feed");
                        ctx.emit(items.iter().cloned());
                        Ok(items)
                    }
                    Err(e) => {
                        error!(%url, error = %e, kind = %e.kind(), "Feed fetch failed");
                        Err(e)
                    }
                }
            })
            .buffer_unordered(PARALLEL_FEEDS)
            .collect()
            .await;

        let total = outcomes.len();
        let mut items = Vec::new();
        let mut failures = 0usize;
        let mut last_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(batch) => items.extend(batch),
                Err(e) => {
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error.filter(|_| failures == total) {
            return Err(e);
        }

        info!(count = items.len(), "Processed articles from RSS feeds");
        Ok(items)
    }

    async fn fetch_feed(&self, url: &str, keyword: &str) -> Result<Vec<FeedItem>, AdapterError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(AdapterError::status(status, &String::from_utf8_lossy(&body)));
        }
        let channel = rss::Channel::read_from(body.as_ref())?;
        Ok(matching_items(&channel, keyword))
    }
}

/// Keep the channel items mentioning `keyword` in title or description.
///
/// Pure function so tests can exercise filtering without a network. An empty
/// keyword matches everything.
pub fn matching_items(channel: &rss::Channel, keyword: &str) -> Vec<FeedItem> {
    let needle = keyword.to_lowercase();
    let feed_title = channel.title().to_string();

    channel
        .items()
        .iter()
        .filter(|item| {
            let title = item.title().unwrap_or_default().to_lowercase();
            let description = item.description().unwrap_or_default().to_lowercase();
            title.contains(&needle) || description.contains(&needle)
        })
        .map(|item| FeedItem {
            title: item.title().unwrap_or("(untitled)").to_string(),
            link: item.link().unwrap_or_default().to_string(),
            published: item.pub_date().and_then(parse_feed_date),
            description: item.description().unwrap_or_default().to_string(),
            source: feed_title.clone(),
            thumbnail: item.enclosure().map(|e| e.url().to_string()),
        })
        .collect()
}

/// RSS dates are RFC 2822; some feeds use RFC 3339 instead.
fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .or_else(|_| DateTime::parse_from_rfc3339(raw.trim()))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Adapter;
    use crate::error::AdapterErrorKind;
    use crate::supervisor::{CrawlStatus, supervise};
    use crate::test_support::{Route, StubServer};
    use std::sync::Arc;

    const WORLD_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>World News</title>
    <link>https://world.example</link>
    <description>All the news</description>
    <item>
      <title>Rust adopted by kernel team</title>
      <link>https://world.example/rust-kernel</link>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
      <description>Systems programming news</description>
      <enclosure url="https://world.example/img.jpg" length="100" type="image/jpeg"/>
    </item>
    <item>
      <title>Election results</title>
      <link>https://world.example/election</link>
      <pubDate>Tue, 02 Jan 2024 12:00:00 +0000</pubDate>
      <description>Voters chose RUST as national metal</description>
    </item>
    <item>
      <title>Weather</title>
      <link>https://world.example/weather</link>
      <description>Sunny</description>
    </item>
  </channel>
</rss>"#;

    const TECH_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Tech Daily</title>
    <link>https://tech.example</link>
    <description>Tech</description>
    <item>
      <title>New rust release</title>
      <link>https://tech.example/release</link>
      <pubDate>not-a-real-date</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_matching_items_filters_case_insensitively() {
        let channel = rss::Channel::read_from(WORLD_FEED.as_bytes()).unwrap();
        let items = matching_items(&channel, "Rust");

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Rust adopted by kernel team");
        assert_eq!(items[0].source, "World News");
        assert_eq!(items[0].thumbnail.as_deref(), Some("https://world.example/img.jpg"));
        assert!(items[0].published.is_some());
        assert_eq!(items[1].title, "Election results");
        assert!(items[1].thumbnail.is_none());
    }

    #[test]
    fn test_empty_keyword_matches_everything() {
        let channel = rss::Channel::read_from(WORLD_FEED.as_bytes()).unwrap();
        assert_eq!(matching_items(&channel, "").len(), 3);
    }

    #[test]
    fn test_invalid_date_is_unknown() {
        let channel = rss::Channel::read_from(TECH_FEED.as_bytes()).unwrap();
        let items = matching_items(&channel, "rust");
        assert_eq!(items.len(), 1);
        assert!(items[0].published.is_none());
    }

    #[tokio::test]
    async fn test_fetch_skips_failing_feed_and_expands_templates() {
        let server = StubServer::start(vec![
            Route::ok("/world", WORLD_FEED),
            Route::ok("/search", TECH_FEED),
            Route::ok("/broken", "oops").with_status(500),
        ])
        .await;
        let adapter = FeedAdapter::new(vec![
            server.url("/world.xml"),
            server.url("/broken.xml"),
            server.url("/search?q=%s"),
        ]);

        let ctx = FetchContext::new();
        let items = adapter.fetch("rust lang", &ctx).await.unwrap();
        // "rust lang" matches nothing in the world feed and nothing in tech.
        assert!(items.is_empty());

        let items = adapter.fetch("rust", &ctx).await.unwrap();
        assert_eq!(items.len(), 3);

        let targets: Vec<String> = server.requests().into_iter().map(|r| r.target).collect();
        assert!(targets.iter().any(|t| t == "/search?q=rust%20lang"));
        assert!(targets.iter().any(|t| t == "/search?q=rust"));
    }

    #[tokio::test]
    async fn test_slow_feed_yields_partial_output_under_deadline() {
        let server = StubServer::start(vec![
            Route::ok("/world", WORLD_FEED),
            Route::ok("/slow", TECH_FEED).with_delay(Duration::from_secs(5)),
        ])
        .await;
        let adapter = Arc::new(Adapter::Feeds(FeedAdapter::new(vec![
            server.url("/world.xml"),
            server.url("/slow.xml"),
        ])));

        let t0 = std::time::Instant::now();
        let out = supervise("rss", adapter, "rust", None, Duration::from_secs(1)).await.unwrap();
        assert!(t0.elapsed() < Duration::from_secs(3));

        assert_eq!(out.status, CrawlStatus::TimedOut);
        let titles: Vec<_> = out.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Election results", "Rust adopted by kernel team"]);
        assert!(server.requests().iter().all(|r| r.method == "GET"));
    }

    #[tokio::test]
    async fn test_fetch_fails_when_every_feed_fails() {
        let server = StubServer::start(vec![Route::ok("/", "<not rss").with_status(200)]).await;
        let adapter = FeedAdapter::new(vec![server.url("/a.xml"), server.url("/b.xml")]);

        let err = adapter.fetch("rust", &FetchContext::new()).await.unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Parse);
    }
}
