//! YAML configuration: source registry, cache and merge knobs, crawl deadline.
//!
//! ```yaml
//! crawl_deadline_secs: 45
//! cache:
//!   ttl_secs: 600
//!   cache_failures: false
//! merge:
//!   combine: [news, rss]
//!   max_results: 100
//!   dedupe: false
//! sources:
//!   - label: news
//!     kind: news_api
//!     deadline_secs: 20
//!   - label: rss
//!     kind: feeds
//!     urls:
//!       - https://feeds.bbci.co.uk/news/rss.xml
//!       - https://news.google.com/rss/search?q=%s&hl=en-US&gl=US&ceid=US:en
//!   - label: twitter
//!     kind: browser
//!     platform: Twitter
//!     pages: ["https://twitter.com/search?q=%s"]
//!     item_selector: "div[data-testid='tweet']"
//!     link_pattern: /status/
//! ```
//!
//! API keys and the rendering endpoint normally come from the environment
//! ([`Secrets`]); a source entry may override them.

use crate::adapters::browser::ScrapeTarget;
use crate::adapters::feeds::DEFAULT_FEEDS;
use crate::adapters::{
    Adapter, BrowserAdapter, FeedAdapter, NewsApiAdapter, SimulatedAdapter, Source, YouTubeAdapter,
};
use crate::cache::CacheConfig;
use crate::error::ConfigError;
use crate::merge::MergeConfig;
use crate::models::FeedItem;
use crate::utils::slugify;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_CRAWL_DEADLINE_SECS: u64 = 45;
pub const DEFAULT_SOURCE_DEADLINE_SECS: u64 = 20;

/// Credentials and endpoints supplied outside the config file.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub news_api_key: Option<String>,
    pub youtube_api_key: Option<String>,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Deadline for the crawl boundary operation.
    pub crawl_deadline_secs: u64,
    pub cache: CacheConfig,
    pub merge: MergeConfig,
    pub sources: Vec<SourceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            crawl_deadline_secs: DEFAULT_CRAWL_DEADLINE_SECS,
            cache: CacheConfig::default(),
            merge: MergeConfig::default(),
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub label: String,
    #[serde(default = "default_source_deadline")]
    pub deadline_secs: u64,
    #[serde(flatten)]
    pub kind: SourceKind,
}

fn default_source_deadline() -> u64 {
    DEFAULT_SOURCE_DEADLINE_SECS
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    NewsApi {
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        base_url: Option<String>,
    },
    Feeds {
        #[serde(default)]
        urls: Vec<String>,
    },
    #[serde(rename = "youtube")]
    YouTube {
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        base_url: Option<String>,
    },
    Browser {
        platform: String,
        pages: Vec<String>,
        item_selector: String,
        #[serde(default)]
        link_pattern: Option<String>,
        #[serde(default)]
        endpoint: Option<String>,
    },
    Simulated {
        #[serde(default)]
        titles: Vec<String>,
        #[serde(default)]
        delay_ms: u64,
        #[serde(default)]
        incremental: bool,
    },
}

impl AppConfig {
    /// Load and validate a YAML config file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw)?;
        info!(path, sources = config.sources.len(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Registry used when no config file is given: NewsAPI and YouTube when
    /// their keys are present, the built-in feed list, and a Twitter scrape
    /// when a rendering endpoint is configured.
    pub fn default_registry(secrets: &Secrets) -> Self {
        let mut sources = Vec::new();
        if secrets.news_api_key.is_some() {
            sources.push(SourceConfig {
                label: "news".into(),
                deadline_secs: DEFAULT_SOURCE_DEADLINE_SECS,
                kind: SourceKind::NewsApi {
                    api_key: None,
                    base_url: None,
                },
            });
        } else {
            warn!("NEWS_API_KEY not set; news source disabled");
        }
        sources.push(SourceConfig {
            label: "rss".into(),
            deadline_secs: DEFAULT_SOURCE_DEADLINE_SECS,
            kind: SourceKind::Feeds {
                urls: DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect(),
            },
        });
        if secrets.youtube_api_key.is_some() {
            sources.push(SourceConfig {
                label: "youtube".into(),
                deadline_secs: DEFAULT_SOURCE_DEADLINE_SECS,
                kind: SourceKind::YouTube {
                    api_key: None,
                    base_url: None,
                },
            });
        }
        if secrets.browserless_url.is_some() {
            sources.push(SourceConfig {
                label: "twitter".into(),
                deadline_secs: DEFAULT_CRAWL_DEADLINE_SECS,
                kind: SourceKind::Browser {
                    platform: "Twitter".into(),
                    pages: vec!["https://twitter.com/search?q=%s".into()],
                    item_selector: "div[data-testid='tweet']".into(),
                    link_pattern: Some("/status/".into()),
                    endpoint: None,
                },
            });
        }

        let combine = ["news", "rss"]
            .into_iter()
            .filter(|label| sources.iter().any(|s| s.label == *label))
            .map(String::from)
            .collect();

        Self {
            merge: MergeConfig {
                combine,
                ..MergeConfig::default()
            },
            sources,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crawl_deadline_secs == 0 {
            return Err(ConfigError::Invalid("crawl_deadline_secs must be positive".into()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.label.trim().is_empty() {
                return Err(ConfigError::Invalid("source label must not be empty".into()));
            }
            if !seen.insert(source.label.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate source label {:?}", source.label)));
            }
            if source.deadline_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "source {:?} has a zero deadline",
                    source.label
                )));
            }
        }

        if let Some(missing) = self.merge.combine.iter().find(|l| !seen.contains(l.as_str())) {
            return Err(ConfigError::Invalid(format!(
                "combine list names unknown source {missing:?}"
            )));
        }
        Ok(())
    }

    pub fn crawl_deadline(&self) -> Duration {
        Duration::from_secs(self.crawl_deadline_secs)
    }

    /// Instantiate every configured adapter.
    pub fn build_sources(&self, secrets: &Secrets) -> Result<Vec<Source>, ConfigError> {
        self.sources
            .iter()
            .map(|source| {
                let adapter = build_adapter(source, secrets)?;
                Ok(Source::new(
                    source.label.clone(),
                    adapter,
                    Duration::from_secs(source.deadline_secs),
                ))
            })
            .collect()
    }
}

fn build_adapter(source: &SourceConfig, secrets: &Secrets) -> Result<Adapter, ConfigError> {
    let missing = |what: &str| ConfigError::Invalid(format!("source {:?} needs {what}", source.label));

    let adapter = match &source.kind {
        SourceKind::NewsApi { api_key, base_url } => {
            let key = api_key
                .as_ref()
                .or(secrets.news_api_key.as_ref())
                .ok_or_else(|| missing("a NewsAPI key"))?;
            let mut adapter = NewsApiAdapter::new(key.as_str());
            if let Some(base_url) = base_url {
                adapter = adapter.with_base_url(base_url.as_str());
            }
            Adapter::NewsApi(adapter)
        }
        SourceKind::Feeds { urls } if urls.is_empty() => Adapter::Feeds(FeedAdapter::with_default_feeds()),
        SourceKind::Feeds { urls } => Adapter::Feeds(FeedAdapter::new(urls.clone())),
        SourceKind::YouTube { api_key, base_url } => {
            let key = api_key
                .as_ref()
                .or(secrets.youtube_api_key.as_ref())
                .ok_or_else(|| missing("a YouTube API key"))?;
            let mut adapter = YouTubeAdapter::new(key.as_str());
            if let Some(base_url) = base_url {
                adapter = adapter.with_base_url(base_url.as_str());
            }
            Adapter::YouTube(adapter)
        }
        SourceKind::Browser {
            platform,
            pages,
            item_selector,
            link_pattern,
            endpoint,
        } => {
            let endpoint = endpoint
                .as_ref()
                .or(secrets.browserless_url.as_ref())
                .ok_or_else(|| missing("a rendering endpoint"))?;
            let target = ScrapeTarget {
                platform: platform.clone(),
                pages: pages.clone(),
                item_selector: item_selector.clone(),
                link_pattern: link_pattern.clone(),
            };
            Adapter::Browser(BrowserAdapter::new(
                endpoint,
                secrets.browserless_token.as_deref(),
                target,
            )?)
        }
        SourceKind::Simulated {
            titles,
            delay_ms,
            incremental,
        } => {
            let items = titles
                .iter()
                .map(|title| FeedItem {
                    title: title.clone(),
                    link: format!("https://example.invalid/{}", slugify(title)),
                    published: None,
                    description: String::new(),
                    source: source.label.clone(),
                    thumbnail: None,
                })
                .collect();
            let mut adapter = SimulatedAdapter::new(items).with_delay(Duration::from_millis(*delay_ms));
            if *incremental {
                adapter = adapter.incremental();
            }
            Adapter::Simulated(adapter)
        }
    };
    Ok(adapter)
}
