//! NewsAPI `/v2/everything` adapter.
//!
//! REST polling with the keyword as the `q` parameter. Results come back
//! newest first; a page number selects one page of the upstream listing and
//! is never merged with other pages.

use crate::adapters::http_client;
use crate::error::AdapterError;
use crate::models::{FeedItem, sort_by_recency};
use crate::utils::truncate_for_log;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2/everything";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    articles: Vec<ApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiArticle {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
    source: Option<ApiSource>,
    url_to_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiSource {
    name: Option<String>,
}

pub struct NewsApiAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    language: String,
}

impl NewsApiAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: http_client(REQUEST_TIMEOUT),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            language: "en".to_string(),
        }
    }

    /// Point the adapter at a different endpoint (mirrors, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the request URL for one keyword and optional page.
    pub fn request_url(&self, keyword: &str, page: Option<u32>) -> Result<Url, AdapterError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AdapterError::Upstream(format!("bad base url {}: {e}", self.base_url)))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", keyword)
                .append_pair("language", &self.language)
                .append_pair("sortBy", "publishedAt");
            if let Some(page) = page {
                query.append_pair("page", &page.to_string());
            }
            query.append_pair("apiKey", &self.api_key);
        }
        Ok(url)
    }

    #[instrument(level = "info", skip_all, fields(%keyword, ?page))]
    pub async fn fetch(&self, keyword: &str, page: Option<u32>) -> Result<Vec<FeedItem>, AdapterError> {
        let t0 = Instant::now();
        let url = self.request_url(keyword, page)?;

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "NewsAPI returned an error status");
            return Err(AdapterError::status(status, &body));
        }

        let items = parse_response(&body).inspect_err(|e| {
            warn!(error = %e, body_preview = %truncate_for_log(&body, 300), "Failed to decode NewsAPI response");
        })?;

        info!(
            count = items.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched NewsAPI articles"
        );
        Ok(items)
    }
}

/// Decode a NewsAPI response body into items, newest first.
pub fn parse_response(body: &str) -> Result<Vec<FeedItem>, AdapterError> {
    let response: ApiResponse = serde_json::from_str(body)?;

    let mut items: Vec<FeedItem> = response
        .articles
        .into_iter()
        .filter_map(|article| {
            let Some(link) = article.url else {
                debug!(title = ?article.title, "Skipping article without url");
                return None;
            };
            let published = article
                .published_at
                .as_deref()
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                .map(|dt| dt.with_timezone(&Utc));

            Some(FeedItem {
                title: article.title.unwrap_or_default(),
                link,
                published,
                description: article.description.unwrap_or_default(),
                source: article
                    .source
                    .and_then(|s| s.name)
                    .unwrap_or_else(|| "NewsAPI".to_string()),
                thumbnail: article.url_to_image.filter(|u| !u.is_empty()),
            })
        })
        .collect();

    sort_by_recency(&mut items);
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterErrorKind;
    use crate::test_support::{Route, StubServer};

    const BODY: &str = r#"{
        "status": "ok",
        "totalResults": 3,
        "articles": [
            {
                "source": {"id": null, "name": "Wired"},
                "title": "Older story",
                "description": "first",
                "url": "https://wired.com/older",
                "urlToImage": null,
                "publishedAt": "2025-03-01T10:00:00Z"
            },
            {
                "source": {"id": "bbc-news", "name": "BBC News"},
                "title": "Newer story",
                "description": null,
                "url": "https://bbc.co.uk/newer",
                "urlToImage": "https://bbc.co.uk/img.jpg",
                "publishedAt": "2025-03-02T08:30:00Z"
            },
            {
                "source": {"id": null, "name": "Blog"},
                "title": "No date",
                "description": "x",
                "url": "https://blog.example/none",
                "publishedAt": "yesterday"
            }
        ]
    }"#;

    #[test]
    fn test_parse_response_sorts_and_maps_fields() {
        let items = parse_response(BODY).unwrap();
        assert_eq!(items.len(), 3);

        assert_eq!(items[0].title, "Newer story");
        assert_eq!(items[0].source, "BBC News");
        assert_eq!(items[0].thumbnail.as_deref(), Some("https://bbc.co.uk/img.jpg"));
        assert_eq!(items[0].description, "");

        assert_eq!(items[1].title, "Older story");
        assert!(items[1].thumbnail.is_none());

        assert_eq!(items[2].title, "No date");
        assert!(items[2].published.is_none());
    }

    #[test]
    fn test_parse_response_rejects_garbage() {
        let err = parse_response("<html>rate limited</html>").unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Parse);
    }

    #[test]
    fn test_request_url_carries_page() {
        let adapter = NewsApiAdapter::new("secret");
        let url = adapter.request_url("rust lang", Some(2)).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("q".into(), "rust lang".into())));
        assert!(pairs.contains(&("page".into(), "2".into())));
        assert!(pairs.contains(&("sortBy".into(), "publishedAt".into())));
        assert!(pairs.contains(&("apiKey".into(), "secret".into())));

        let url = adapter.request_url("rust", None).unwrap();
        assert!(!url.query_pairs().any(|(k, _)| k == "page"));
    }

    #[tokio::test]
    async fn test_fetch_sends_page_parameter() {
        let server = StubServer::start(vec![Route::ok("page=2", BODY)]).await;
        let adapter = NewsApiAdapter::new("k").with_base_url(server.url("/v2/everything"));

        let items = adapter.fetch("ai", Some(2)).await.unwrap();
        assert_eq!(items.len(), 3);

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].target.contains("page=2"));
        assert!(requests[0].target.contains("q=ai"));
    }

    #[tokio::test]
    async fn test_fetch_maps_error_status_to_upstream() {
        let server = StubServer::start(vec![Route::ok("/", r#"{"status":"error"}"#).with_status(401)]).await;
        let adapter = NewsApiAdapter::new("bad").with_base_url(server.url("/v2/everything"));

        let err = adapter.fetch("ai", None).await.unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Upstream);
        assert!(err.to_string().contains("401"));
    }
}
