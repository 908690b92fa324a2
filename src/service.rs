//! Request boundary: search, paginated fetch and crawl over one service
//! object that owns the registry, the result cache and the keyword tracker.
//!
//! Nothing here is process-global; each `Service` is built explicitly at
//! startup and a fresh one can be created per test.

use crate::adapters::{FetchContext, Source};
use crate::cache::ResultCache;
use crate::config::{AppConfig, Secrets};
use crate::dispatcher::Dispatcher;
use crate::error::{AdapterErrorKind, BoundaryError, ConfigError};
use crate::keywords::{KeywordStore, KeywordTracker};
use crate::models::{AggregationResult, FeedItem, sort_by_recency};
use crate::supervisor::{CrawlStatus, Supervised, supervise};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Body of a crawl request.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlRequest {
    pub keyword: String,
}

/// Body of a crawl response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlResponse {
    pub results: Vec<String>,
    pub status: CrawlStatus,
}

pub struct Service {
    dispatcher: Dispatcher,
    tracker: KeywordTracker,
    crawl_deadline: Duration,
}

impl Service {
    pub fn new(dispatcher: Dispatcher, tracker: KeywordTracker, crawl_deadline: Duration) -> Self {
        Self {
            dispatcher,
            tracker,
            crawl_deadline,
        }
    }

    /// Build the registry, cache and tracker described by `config`.
    pub async fn start(
        config: &AppConfig,
        secrets: &Secrets,
        keywords_file: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let sources = config.build_sources(secrets)?;
        let labels: Vec<&str> = sources.iter().map(|s| s.label.as_str()).collect();
        info!(?labels, crawl_deadline_secs = config.crawl_deadline_secs, "Source registry ready");

        let cache = Arc::new(ResultCache::new(&config.cache));
        let dispatcher = Dispatcher::new(sources, cache, config.merge.clone());
        let tracker = match keywords_file {
            Some(path) => KeywordTracker::with_store(KeywordStore::new(path)).await,
            None => KeywordTracker::new(),
        };
        Ok(Self::new(dispatcher, tracker, config.crawl_deadline()))
    }

    /// Persist keyword counts one last time and report cache occupancy.
    pub async fn shutdown(self) {
        if let Err(e) = self.tracker.flush().await {
            warn!(error = %e, "Failed to flush keyword counts on shutdown");
        }
        info!(cached_queries = self.dispatcher.cache().len(), "Service stopped");
    }

    fn source(&self, label: &str) -> Result<&Source, BoundaryError> {
        self.dispatcher
            .source(label)
            .ok_or_else(|| BoundaryError::UnknownSource(label.to_string()))
    }

    /// Record the keyword, then fan out to every source.
    #[instrument(level = "info", skip(self))]
    pub async fn search(&self, keyword: &str) -> Result<AggregationResult, BoundaryError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(BoundaryError::BadRequest("keyword is required".into()));
        }
        let count = self.tracker.record(keyword).await;
        info!(count, "Keyword recorded");
        Ok(self.dispatcher.aggregate(keyword).await)
    }

    /// Fetch one page from a paginated source, bypassing cache and fan-out.
    ///
    /// Upstream failures are logged and produce an empty page.
    #[instrument(level = "info", skip(self))]
    pub async fn paginated_fetch(
        &self,
        source: &str,
        keyword: &str,
        page: u32,
    ) -> Result<Vec<FeedItem>, BoundaryError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(BoundaryError::BadRequest("keyword is required".into()));
        }
        if page == 0 {
            return Err(BoundaryError::BadRequest("page numbers start at 1".into()));
        }
        let source = self.source(source)?;
        if !source.adapter.supports_pages() {
            return Err(BoundaryError::BadRequest(format!(
                "source {} does not support pagination",
                source.label
            )));
        }

        match source.adapter.fetch(keyword, Some(page), &FetchContext::new()).await {
            Ok(mut items) => {
                sort_by_recency(&mut items);
                info!(count = items.len(), "Fetched page");
                Ok(items)
            }
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "Paginated fetch failed; returning empty page");
                Ok(Vec::new())
            }
        }
    }

    /// Run one source under the crawl deadline and render its items as text.
    ///
    /// An adapter that hits its own HTTP timeout is reported like a deadline
    /// expiry (timed out, no results). Upstream and parse failures surface as
    /// [`BoundaryError::Source`].
    #[instrument(level = "info", skip(self))]
    pub async fn crawl(&self, source: &str, keyword: &str) -> Result<CrawlResponse, BoundaryError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(BoundaryError::BadRequest("keyword is required".into()));
        }
        let source = self.source(source)?;

        let out = match supervise(
            &source.label,
            Arc::clone(&source.adapter),
            keyword,
            None,
            self.crawl_deadline,
        )
        .await
        {
            Ok(out) => out,
            Err(e) if e.kind() == AdapterErrorKind::Timeout => {
                warn!(error = %e, "Source request timed out; reporting an empty timed-out crawl");
                Supervised {
                    items: Vec::new(),
                    status: CrawlStatus::TimedOut,
                }
            }
            Err(e) => {
                return Err(BoundaryError::Source {
                    label: source.label.clone(),
                    source: e,
                });
            }
        };

        Ok(CrawlResponse {
            results: out.items.iter().map(FeedItem::to_crawl_line).collect(),
            status: out.status,
        })
    }

    /// Crawl from a raw JSON request body, producing a status code and a JSON
    /// response body. Timed-out crawls are still successes.
    pub async fn handle_crawl(&self, source: &str, body: &str) -> (StatusCode, String) {
        let result = match serde_json::from_str::<CrawlRequest>(body) {
            Ok(request) => self.crawl(source, &request.keyword).await,
            Err(e) => Err(BoundaryError::BadRequest(format!("invalid request body: {e}"))),
        };

        match result {
            Ok(response) => match serde_json::to_string(&response) {
                Ok(json) => (StatusCode::OK, json),
                Err(e) => {
                    error!(error = %e, "Failed to encode crawl response");
                    (StatusCode::INTERNAL_SERVER_ERROR, error_body("internal server error"))
                }
            },
            Err(e) => {
                let status = e.status_code();
                if status.is_server_error() {
                    error!(source, error = %e, "Crawl failed");
                } else {
                    warn!(source, error = %e, "Rejected crawl request");
                }
                (status, error_body(&e.to_string()))
            }
        }
    }

    pub fn top_keywords(&self) -> Vec<String> {
        self.tracker.top_keywords()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

fn error_body(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{Adapter, NewsApiAdapter, SimulatedAdapter};
    use crate::cache::CacheConfig;
    use crate::error::AdapterError;
    use crate::merge::MergeConfig;
    use crate::models::tests::{at, make_item};
    use crate::test_support::{Route, StubServer};

    fn service(sources: Vec<Source>) -> Service {
        let dispatcher = Dispatcher::new(
            sources,
            Arc::new(ResultCache::new(&CacheConfig::default())),
            MergeConfig::default(),
        );
        Service::new(dispatcher, KeywordTracker::new(), Duration::from_secs(2))
    }

    fn simulated(label: &str, adapter: SimulatedAdapter) -> Source {
        Source::new(label, Adapter::Simulated(adapter), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_records_keyword_and_aggregates() {
        let svc = service(vec![simulated("a", SimulatedAdapter::new(vec![make_item("A", at(2025, 1, 1))]))]);

        for _ in 0..3 {
            svc.search("go").await.unwrap();
        }
        let result = svc.search("rust").await.unwrap();

        assert_eq!(result.keyword, "rust");
        assert_eq!(result.combined.len(), 1);
        assert_eq!(svc.top_keywords(), vec!["go", "rust"]);
    }

    #[tokio::test]
    async fn test_search_rejects_blank_keyword() {
        let svc = service(vec![]);
        let err = svc.search("   ").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(svc.top_keywords().is_empty());
    }

    #[tokio::test]
    async fn test_paginated_fetch_requests_the_page() {
        let body = r#"{"status":"ok","articles":[
            {"title":"Page two story","url":"https://n.example/2","publishedAt":"2025-05-01T10:00:00Z","source":{"name":"Wire"}}
        ]}"#;
        let server = StubServer::start(vec![Route::ok("page=2", body)]).await;
        let news = NewsApiAdapter::new("k").with_base_url(server.url("/v2/everything"));
        let svc = service(vec![Source::new("news", Adapter::NewsApi(news), Duration::from_secs(5))]);

        let items = svc.paginated_fetch("news", "ai", 2).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Page two story");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].target.contains("page=2"));
        assert!(svc.dispatcher().cache().is_empty());
    }

    #[tokio::test]
    async fn test_paginated_fetch_upstream_failure_is_empty_page() {
        let server = StubServer::start(vec![Route::ok("everything", "boom").with_status(500)]).await;
        let news = NewsApiAdapter::new("k").with_base_url(server.url("/v2/everything"));
        let svc = service(vec![Source::new("news", Adapter::NewsApi(news), Duration::from_secs(5))]);

        assert!(svc.paginated_fetch("news", "ai", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_paginated_fetch_rejects_bad_requests() {
        let svc = service(vec![simulated("sim", SimulatedAdapter::new(vec![]))]);

        let err = svc.paginated_fetch("news", "ai", 1).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = svc.paginated_fetch("sim", "ai", 1).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = svc.paginated_fetch("sim", "ai", 0).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crawl_formats_lines() {
        let mut item = make_item("Launch", at(2025, 1, 1));
        item.thumbnail = Some("https://i.example/t.jpg".into());
        let svc = service(vec![simulated("yt", SimulatedAdapter::new(vec![item, make_item("Plain", None)]))]);

        let response = svc.crawl("yt", "rocket").await.unwrap();
        assert_eq!(response.status, CrawlStatus::Completed);
        assert_eq!(
            response.results,
            vec![
                "Launch (https://example.com/launch) [Thumbnail: https://i.example/t.jpg]",
                "Plain (https://example.com/plain)",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_crawl_timeout_is_success_with_partial_results() {
        let slow = SimulatedAdapter::new(vec![
            make_item("First", None),
            make_item("Second", None),
            make_item("Third", None),
        ])
        .with_delay(Duration::from_secs(3))
        .incremental();
        let svc = service(vec![simulated("twitter", slow)]);

        // Crawl deadline is 2s; items land at 1s, 2s, 3s.
        let (status, body) = svc.handle_crawl("twitter", r#"{"keyword":"rust"}"#).await;
        assert_eq!(status, StatusCode::OK);
        let response: CrawlResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(response.status, CrawlStatus::TimedOut);
        assert!(!response.results.is_empty());
        assert!(response.results[0].starts_with("First ("));
    }

    #[tokio::test]
    async fn test_handle_crawl_status_codes() {
        let failing = SimulatedAdapter::new(vec![]).failing(AdapterError::Parse("bad html".into()));
        let svc = service(vec![simulated("broken", failing)]);

        let (status, _) = svc.handle_crawl("broken", "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = svc.handle_crawl("broken", r#"{"keyword":""}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = svc.handle_crawl("missing", r#"{"keyword":"x"}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("unknown source"));

        let (status, _) = svc.handle_crawl("broken", r#"{"keyword":"x"}"#).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_crawl_request_timeout_is_timed_out_not_server_error() {
        let stalled = SimulatedAdapter::new(vec![make_item("Never", None)])
            .failing(AdapterError::Timeout("operation timed out".into()));
        let svc = service(vec![simulated("twitter", stalled)]);

        let (status, body) = svc.handle_crawl("twitter", r#"{"keyword":"rust"}"#).await;
        assert_eq!(status, StatusCode::OK);
        let response: CrawlResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(response.status, CrawlStatus::TimedOut);
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn test_start_from_config() {
        let yaml = "crawl_deadline_secs: 5\nsources:\n  - {label: demo, kind: simulated, titles: [One]}\n";
        let config = AppConfig::from_yaml(yaml).unwrap();
        let svc = Service::start(&config, &Secrets::default(), None).await.unwrap();

        assert_eq!(svc.dispatcher().sources().len(), 1);
        let result = svc.search("anything").await.unwrap();
        assert_eq!(result.items("demo").unwrap().len(), 1);
        svc.shutdown().await;
    }
}
