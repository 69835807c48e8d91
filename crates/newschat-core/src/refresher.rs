//! Background task that keeps the headline cache fresh.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheStore, Snapshot};
use crate::news::{ContentSource, HeadlineItem};

/// Periodically fetches headlines and installs them in the cache.
///
/// A failed fetch never touches the cache: sessions keep reading the last
/// good snapshot until a later fetch succeeds.
#[derive(Debug)]
pub struct CacheRefresher<S> {
    source: S,
    cache: Arc<CacheStore>,
    region: String,
    interval: Duration,
}

impl<S: ContentSource> CacheRefresher<S> {
    pub fn new(
        source: S,
        cache: Arc<CacheStore>,
        region: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            region: region.into(),
            interval,
        }
    }

    /// Fetches once and replaces the snapshot on success.
    ///
    /// Returns the number of headlines installed.
    pub async fn refresh_once(&self) -> Result<usize> {
        let articles = self.source.fetch_headlines(&self.region).await?;
        let items: Vec<HeadlineItem> = articles.into_iter().map(HeadlineItem::from).collect();
        let count = items.len();
        self.cache.replace(Snapshot::from(items));
        Ok(count)
    }

    /// Runs until `shutdown` is cancelled. The first fetch happens
    /// immediately, then once per interval.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            region = %self.region,
            interval_secs = self.interval.as_secs(),
            "News cache refresher started"
        );

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                () = shutdown.cancelled() => break,
                result = self.refresh_once() => match result {
                    Ok(count) => tracing::info!(region = %self.region, count, "News cache updated"),
                    Err(err) => tracing::error!(
                        region = %self.region,
                        error = format!("{err:#}"),
                        "Failed to refresh news cache; keeping previous snapshot"
                    ),
                },
            }
        }

        tracing::info!("News cache refresher stopped");
    }
}
