//! Scripted adapter with deterministic timing.
//!
//! Stands in for a slow interactive source: it waits, then yields a fixed
//! set of items (optionally one at a time, buffering each into the fetch
//! context), or fails with a configured error. Every call is counted so
//! tests can tell cache hits from adapter invocations.

use crate::adapters::FetchContext;
use crate::error::AdapterError;
use crate::models::FeedItem;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default)]
pub struct SimulatedAdapter {
    items: Vec<FeedItem>,
    delay: Duration,
    incremental: bool,
    failure: Option<AdapterError>,
    calls: Arc<AtomicUsize>,
}

impl SimulatedAdapter {
    pub fn new(items: Vec<FeedItem>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    /// Total time one call takes before returning.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Spread the delay across items and buffer each one as it is "found".
    pub fn incremental(mut self) -> Self {
        self.incremental = true;
        self
    }

    /// Fail every call with `error` after the delay.
    pub fn failing(mut self, error: AdapterError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Shared counter of `fetch` invocations; stays valid after the adapter
    /// is moved into a registry.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    #[instrument(level = "debug", skip_all, fields(%keyword))]
    pub async fn fetch(&self, keyword: &str, ctx: &FetchContext) -> Result<Vec<FeedItem>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.incremental && !self.items.is_empty() {
            let step = self.delay / self.items.len() as u32;
            let mut produced = Vec::with_capacity(self.items.len());
            for item in &self.items {
                tokio::time::sleep(step).await;
                if ctx.is_cancelled() {
                    debug!(produced = produced.len(), "Simulated source noticed cancellation");
                    return Ok(produced);
                }
                ctx.emit([item.clone()]);
                produced.push(item.clone());
            }
            return self.finish(produced);
        }

        tokio::time::sleep(self.delay).await;
        self.finish(self.items.clone())
    }

    fn finish(&self, items: Vec<FeedItem>) -> Result<Vec<FeedItem>, AdapterError> {
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::make_item;

    #[tokio::test(start_paused = true)]
    async fn test_counts_calls_and_returns_items() {
        let adapter = SimulatedAdapter::new(vec![make_item("A", None)]).with_delay(Duration::from_millis(50));
        let counter = adapter.call_counter();

        let items = adapter.fetch("x", &FetchContext::new()).await.unwrap();
        assert_eq!(items.len(), 1);
        adapter.fetch("x", &FetchContext::new()).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_incremental_emits_into_context() {
        let adapter = SimulatedAdapter::new(vec![make_item("A", None), make_item("B", None)])
            .with_delay(Duration::from_secs(2))
            .incremental();
        let ctx = FetchContext::new();

        let items = adapter.fetch("x", &ctx).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(ctx.snapshot().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_returned() {
        let adapter = SimulatedAdapter::new(vec![make_item("A", None)])
            .failing(AdapterError::Upstream("connection reset".into()));
        let err = adapter.fetch("x", &FetchContext::new()).await.unwrap_err();
        assert_eq!(err, AdapterError::Upstream("connection reset".into()));
    }
}
