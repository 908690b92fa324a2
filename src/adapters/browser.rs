//! Browser-driven scraping adapter.
//!
//! Pages are rendered by a Browserless-style service (`POST {endpoint}/content`
//! with `{"url": ...}` returns the rendered HTML), so sites that need a real
//! browser session can be searched the same way as plain HTML pages.
//!
//! A scrape visits its page templates in order (for example a login landing
//! page followed by a search page). Items found on each page are pushed into
//! the [`FetchContext`] before moving on, which lets the crawl supervisor
//! return what was collected so far when the deadline hits. Cancellation is
//! checked between pages only; a render already in flight runs to completion.
//!
//! Zero matching elements is a legitimate result, not an error.

use crate::adapters::{FetchContext, http_client};
use crate::error::{AdapterError, ConfigError};
use crate::models::FeedItem;
use crate::utils::{expand_template, truncate_for_log};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Rendering a page can take a while; the supervisor deadline is the real bound.
const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector is valid"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex is valid"));

/// Settings for one scraped site.
#[derive(Debug, Clone)]
pub struct ScrapeTarget {
    /// Label stamped on every item as its source, e.g. "Twitter".
    pub platform: String,
    /// Page URL templates visited in order; `%s` becomes the keyword.
    pub pages: Vec<String>,
    /// CSS selector matching one post/result element.
    pub item_selector: String,
    /// Only links matching this pattern are kept, e.g. `/status/`.
    pub link_pattern: Option<String>,
}

pub struct BrowserAdapter {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    platform: String,
    pages: Vec<String>,
    item_selector: Selector,
    link_pattern: Option<Regex>,
}

impl BrowserAdapter {
    /// Build an adapter for `target`, rendering through `endpoint`.
    pub fn new(endpoint: &str, token: Option<&str>, target: ScrapeTarget) -> Result<Self, ConfigError> {
        if target.pages.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "browser source {} has no pages",
                target.platform
            )));
        }
        let item_selector = Selector::parse(&target.item_selector).map_err(|e| {
            ConfigError::Invalid(format!("bad item selector {:?}: {e}", target.item_selector))
        })?;
        let link_pattern = target
            .link_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| ConfigError::Invalid(format!("bad link pattern: {e}")))?;

        Ok(Self {
            client: http_client(RENDER_TIMEOUT),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            platform: target.platform,
            pages: target.pages,
            item_selector,
            link_pattern,
        })
    }

    #[instrument(level = "info", skip_all, fields(platform = %self.platform, %keyword))]
    pub async fn fetch(&self, keyword: &str, ctx: &FetchContext) -> Result<Vec<FeedItem>, AdapterError> {
        let mut items = Vec::new();

        for (step, template) in self.pages.iter().enumerate() {
            if ctx.is_cancelled() {
                info!(step, collected = items.len(), "Scrape cancelled between pages");
                break;
            }

            let page_url = expand_template(template, keyword);
            let t0 = Instant::now();
            let html = self.render(&page_url).await?;
            debug!(
                step,
                %page_url,
                bytes = html.len(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Rendered page"
            );

            let found = self.extract_items(&html, &page_url);
            info!(step, count = found.len(), "Extracted items from page");
            ctx.emit(found.iter().cloned());
            items.extend(found);
        }

        Ok(items)
    }

    /// Render `page_url` through the browser service and return its HTML.
    async fn render(&self, page_url: &str) -> Result<String, AdapterError> {
        let mut endpoint = format!("{}/content", self.endpoint);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={}", urlencoding::encode(token)));
        }

        let resp = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({ "url": page_url }))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                body_preview = %truncate_for_log(&body, 200),
                "Browser service refused render"
            );
            return Err(AdapterError::status(status, &body));
        }
        Ok(body)
    }

    /// Pull result elements out of rendered HTML.
    ///
    /// Each element becomes one item: its collapsed text is both title and
    /// description, its first link (resolved against the page URL) is the
    /// item link. Elements without a link, or whose link does not match the
    /// configured pattern, are dropped.
    pub fn extract_items(&self, html: &str, page_url: &str) -> Vec<FeedItem> {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();

        document
            .select(&self.item_selector)
            .filter_map(|element| {
                let href = element
                    .select(&LINK_SELECTOR)
                    .filter_map(|a| a.value().attr("href"))
                    .find(|href| self.link_pattern.as_ref().is_none_or(|re| re.is_match(href)))?;

                let link = match &base {
                    Some(base) => base.join(href).map(|u| u.to_string()).unwrap_or_else(|_| href.to_string()),
                    None => href.to_string(),
                };

                let text = element.text().collect::<Vec<_>>().join(" ");
                let text = WHITESPACE.replace_all(text.trim(), " ").into_owned();

                Some(FeedItem {
                    title: text.clone(),
                    link,
                    published: None,
                    description: text,
                    source: self.platform.clone(),
                    thumbnail: None,
                })
            })
            .collect()
    }
}
