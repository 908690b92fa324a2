//! YouTube Data API video search adapter.

use crate::adapters::http_client;
use crate::error::AdapterError;
use crate::models::{FeedItem, sort_by_recency};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/search";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RESULTS: u32 = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: VideoId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    #[serde(default)]
    description: String,
    published_at: Option<String>,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

pub struct YouTubeAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl YouTubeAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: http_client(REQUEST_TIMEOUT),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[instrument(level = "info", skip_all, fields(%keyword))]
    pub async fn fetch(&self, keyword: &str) -> Result<Vec<FeedItem>, AdapterError> {
        let max_results = MAX_RESULTS.to_string();
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("part", "id,snippet"),
                ("q", keyword),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ],
        )
        .map_err(|e| AdapterError::Upstream(format!("bad base url {}: {e}", self.base_url)))?;

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "YouTube search returned an error status");
            return Err(AdapterError::status(status, &body));
        }

        let items = parse_response(&body)?;
        info!(count = items.len(), "Fetched YouTube videos");
        Ok(items)
    }
}

/// Decode a search response into items, newest first. Results without a
/// video id (channels, playlists) are dropped.
pub fn parse_response(body: &str) -> Result<Vec<FeedItem>, AdapterError> {
    let response: SearchResponse = serde_json::from_str(body)?;

    let mut items: Vec<FeedItem> = response
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id?;
            let snippet = item.snippet;
            Some(FeedItem {
                title: snippet.title,
                link: format!("https://www.youtube.com/watch?v={video_id}"),
                published: snippet
                    .published_at
                    .as_deref()
                    .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
                description: snippet.description,
                source: "YouTube".to_string(),
                thumbnail: snippet.thumbnails.and_then(|t| t.default).map(|t| t.url),
            })
        })
        .collect();

    sort_by_recency(&mut items);
    Ok(items)
}
