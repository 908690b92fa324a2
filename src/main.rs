//! # Feed Fanout
//!
//! A keyword-driven content aggregator that queries several heterogeneous
//! upstream sources concurrently, merges their items into one recency-ranked
//! view and shields the caller from slow or failing sources.
//!
//! ## Features
//!
//! - Fans out to NewsAPI, RSS feeds, YouTube search and browser-rendered
//!   scrapes in parallel, one task per source
//! - Bounds every source call with a deadline and returns partial results
//!   when it expires
//! - Caches per-source results with optional TTL
//! - Tracks and persists how often each keyword is searched
//!
//! ## Usage
//!
//! ```sh
//! feed_fanout -j ./json search "climate change"
//! feed_fanout page news ai --page 2
//! echo '{"keyword":"rust"}' | feed_fanout crawl twitter
//! feed_fanout top
//! ```
//!
//! ## Architecture
//!
//! 1. **Registry**: adapters are built once at startup from config and env
//! 2. **Dispatch**: each source runs as its own task behind the result cache
//! 3. **Supervision**: every adapter call races a deadline
//! 4. **Merge**: per-source sequences are combined, sorted and capped

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod adapters;
mod cache;
mod cli;
mod config;
mod dispatcher;
mod error;
mod keywords;
mod merge;
mod models;
mod outputs;
mod service;
mod supervisor;
#[cfg(test)]
mod test_support;
mod utils;

use cli::{Cli, Command};
use config::AppConfig;
use outputs::json;
use service::Service;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("feed_fanout starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.json_output_dir, ?args.command, "Parsed CLI arguments");

    // Early check: ensure JSON output dir is writable
    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir,
                error = %e,
                "JSON output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    let secrets = args.secrets();
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => {
            info!("No config file given; using the default source registry");
            AppConfig::default_registry(&secrets)
        }
    };

    let service = Service::start(&config, &secrets, Some(PathBuf::from(&args.keywords_file))).await?;

    let outcome = run(&service, &args).await;
    service.shutdown().await;

    let elapsed = start_time.elapsed();
    info!(elapsed_ms = elapsed.as_millis() as u64, "feed_fanout finished");
    outcome
}

async fn run(service: &Service, args: &Cli) -> Result<(), Box<dyn Error>> {
    match &args.command {
        Command::Search { keyword } => {
            let result = service.search(keyword).await?;
            for (label, source) in &result.sources {
                info!(
                    source = %label,
                    count = source.items.len(),
                    status = ?source.status,
                    cached = source.cached,
                    "Source result"
                );
            }
            if let Some(dir) = &args.json_output_dir {
                if let Err(e) = json::write_results(&result, dir).await {
                    error!(error = %e, "Failed to write search results");
                }
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Page { source, keyword, page } => {
            let items = service.paginated_fetch(source, keyword, *page).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        Command::Crawl { source, keyword } => {
            let body = match keyword {
                Some(keyword) => serde_json::json!({ "keyword": keyword }).to_string(),
                None => {
                    let mut body = String::new();
                    tokio::io::stdin().read_to_string(&mut body).await?;
                    body
                }
            };
            let (status, response) = service.handle_crawl(source, &body).await;
            println!("{response}");
            if !status.is_success() {
                return Err(format!("crawl failed with status {status}").into());
            }
        }
        Command::Top => {
            println!("{}", serde_json::to_string_pretty(&service.top_keywords())?);
        }
    }
    Ok(())
}
