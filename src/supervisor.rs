//! Crawl supervisor: bound the wall-clock cost of one adapter call.
//!
//! The adapter runs as its own tokio task and is raced against a deadline.
//! When the deadline wins, the supervisor cancels the call's token, takes
//! whatever the adapter had buffered in its [`FetchContext`] and returns it
//! as a partial result. The task itself is detached rather than aborted:
//! killing a scraping session mid-navigation can leave remote state (a login
//! session, a half-submitted form) inconsistent, so its side effects may
//! outlive the request.

use crate::adapters::{Adapter, FetchContext};
use crate::error::AdapterError;
use crate::models::{FeedItem, SourceStatus, sort_by_recency};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::{info, instrument, warn};

/// How a supervised call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Completed,
    TimedOut,
}

impl From<CrawlStatus> for SourceStatus {
    fn from(status: CrawlStatus) -> Self {
        match status {
            CrawlStatus::Completed => SourceStatus::Completed,
            CrawlStatus::TimedOut => SourceStatus::TimedOut,
        }
    }
}

/// Output of a supervised call that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub struct Supervised {
    pub items: Vec<FeedItem>,
    pub status: CrawlStatus,
}

/// Run one adapter call under `deadline`.
///
/// Items come back newest first whether the call completed or not.
///
/// - Completed before the deadline: the adapter's full output.
/// - Deadline expired: the buffered partial output (possibly empty) with
///   [`CrawlStatus::TimedOut`]. This is not an error.
/// - Adapter failed before the deadline: its error. A panicking adapter task
///   is reported as an upstream error.
#[instrument(level = "info", skip_all, fields(source = %label, kind = adapter.kind(), %keyword, ?page))]
pub async fn supervise(
    label: &str,
    adapter: Arc<Adapter>,
    keyword: &str,
    page: Option<u32>,
    deadline: Duration,
) -> Result<Supervised, AdapterError> {
    let t0 = Instant::now();
    let ctx = FetchContext::new();
    let task_ctx = ctx.clone();
    let task_keyword = keyword.to_string();

    let mut handle =
        tokio::spawn(async move { adapter.fetch(&task_keyword, page, &task_ctx).await });

    match timeout(deadline, &mut handle).await {
        Ok(Ok(Ok(mut items))) => {
            sort_by_recency(&mut items);
            info!(
                count = items.len(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Adapter completed"
            );
            Ok(Supervised {
                items,
                status: CrawlStatus::Completed,
            })
        }
        Ok(Ok(Err(e))) => Err(e),
        Ok(Err(join_error)) => Err(AdapterError::Upstream(format!(
            "adapter task aborted: {join_error}"
        ))),
        Err(_) => {
            ctx.cancel();
            let mut items = ctx.snapshot();
            sort_by_recency(&mut items);
            warn!(
                deadline_ms = deadline.as_millis() as u64,
                partial = items.len(),
                "Adapter timed out; returning partial results and leaving the call to finish in the background"
            );
            Ok(Supervised {
                items,
                status: CrawlStatus::TimedOut,
            })
        }
    }
}
