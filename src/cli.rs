//! Command-line interface definitions for Feed Fanout.
//!
//! All secrets can be provided via flags or environment variables.

use crate::config::Secrets;
use clap::{Parser, Subcommand};

/// Command-line arguments for the Feed Fanout application.
///
/// # Examples
///
/// ```sh
/// # Search every configured source and write the result as JSON
/// feed_fanout -j ./json search "climate change"
///
/// # Fetch page 2 from the NewsAPI source
/// feed_fanout page news ai --page 2
///
/// # Crawl one source, reading {"keyword": ...} from stdin
/// echo '{"keyword":"rust"}' | feed_fanout crawl twitter
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output directory for search result JSON files
    #[arg(short, long, global = true)]
    pub json_output_dir: Option<String>,

    /// File holding persisted keyword counts
    #[arg(short, long, global = true, default_value = crate::keywords::DEFAULT_KEYWORDS_FILE)]
    pub keywords_file: String,

    /// NewsAPI key
    #[arg(long, env = "NEWS_API_KEY", global = true, hide_env_values = true)]
    pub news_api_key: Option<String>,

    /// YouTube Data API key
    #[arg(long, env = "YOUTUBE_API_KEY", global = true, hide_env_values = true)]
    pub youtube_api_key: Option<String>,

    /// Base URL of the headless browser rendering service
    #[arg(long, env = "BROWSERLESS_URL", global = true)]
    pub browserless_url: Option<String>,

    /// Token for the rendering service
    #[arg(long, env = "BROWSERLESS_TOKEN", global = true, hide_env_values = true)]
    pub browserless_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Search every source for a keyword and print the merged result
    Search { keyword: String },

    /// Fetch one page from a paginated source
    Page {
        source: String,
        keyword: String,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },

    /// Crawl a single source under the crawl deadline
    Crawl {
        source: String,
        /// Keyword to crawl; when omitted a JSON request body is read from stdin
        keyword: Option<String>,
    },

    /// Print keywords, most searched first
    Top,
}

impl Cli {
    pub fn secrets(&self) -> Secrets {
        Secrets {
            news_api_key: self.news_api_key.clone(),
            youtube_api_key: self.youtube_api_key.clone(),
            browserless_url: self.browserless_url.clone(),
            browserless_token: self.browserless_token.clone(),
        }
    }
}
