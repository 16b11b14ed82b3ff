//! The background task that keeps the store populated.
//!
//! A pass walks the configured sources one at a time, pausing briefly between
//! them. After every source, success or failure, the union of the latest
//! items from all sources is written to the store and subscribers are
//! notified, so readers see a pass fill in progressively.
//!
//! Per-source results are kept between passes: a source that fails to
//! download keeps contributing its previous items until it recovers, while a
//! source that answers with a broken document contributes nothing.

use crate::aggregate::AggregationStore;
use crate::broadcast::{Broadcaster, Update};
use crate::feed::FeedFetcher;
use crate::model::{CanonicalItem, FeedSource};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Pacing of the refresh loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSettings {
    /// Sleep between the end of one pass and the start of the next.
    pub interval: Duration,
    /// Pause between two sources within a pass.
    pub source_delay: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            source_delay: Duration::from_secs(1),
        }
    }
}

/// What the loop is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    /// Sleeping between passes (also the state before the first pass).
    Idle,
    /// Working on source `index` of `total` (zero-based).
    Fetching { index: usize, total: usize },
}

/// Counters for one completed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub sources: usize,
    /// Sources whose download failed this pass.
    pub failed: usize,
    /// Items parsed this pass across all successful sources.
    pub fetched_items: usize,
    /// Store size after the final merge.
    pub total_items: usize,
}

pub struct RefreshLoop {
    sources: Arc<Vec<FeedSource>>,
    fetcher: Arc<FeedFetcher>,
    store: Arc<AggregationStore>,
    broadcaster: Broadcaster,
    settings: RefreshSettings,
    /// Last successful result per source, indexed like `sources`.
    latest: Vec<Option<Vec<CanonicalItem>>>,
    phase: watch::Sender<RefreshPhase>,
}

impl RefreshLoop {
    pub fn new(
        sources: Vec<FeedSource>,
        fetcher: Arc<FeedFetcher>,
        store: Arc<AggregationStore>,
        broadcaster: Broadcaster,
        settings: RefreshSettings,
    ) -> Self {
        let (phase, _) = watch::channel(RefreshPhase::Idle);
        Self {
            latest: vec![None; sources.len()],
            sources: Arc::new(sources),
            fetcher,
            store,
            broadcaster,
            settings,
            phase,
        }
    }

    /// Receiver that observes phase transitions.
    pub fn phases(&self) -> watch::Receiver<RefreshPhase> {
        self.phase.subscribe()
    }

    /// Runs one pass over every source.
    pub async fn run_pass(&mut self) -> PassSummary {
        let sources = Arc::clone(&self.sources);
        let total = sources.len();
        let started = Instant::now();
        let mut summary = PassSummary {
            sources: total,
            ..PassSummary::default()
        };
        tracing::info!(sources = total, "Refresh pass started");

        for (index, source) in sources.iter().enumerate() {
            if index > 0 && !self.settings.source_delay.is_zero() {
                tokio::time::sleep(self.settings.source_delay).await;
            }
            self.phase
                .send_replace(RefreshPhase::Fetching { index, total });

            match self.fetcher.try_fetch(source).await {
                Ok(items) => {
                    summary.fetched_items += items.len();
                    self.latest[index] = Some(items);
                }
                Err(_) => {
                    // Already recorded by the fetcher; keep serving the previous items
                    summary.failed += 1;
                }
            }

            summary.total_items = self.merge(&source.url);
        }

        self.phase.send_replace(RefreshPhase::Idle);
        tracing::info!(
            sources = total,
            failed = summary.failed,
            items = summary.total_items,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Refresh pass finished"
        );
        summary
    }

    /// Writes the union of all per-source results to the store and notifies
    /// subscribers. Returns the store size.
    fn merge(&self, source_url: &str) -> usize {
        let union: Vec<CanonicalItem> = self
            .latest
            .iter()
            .flatten()
            .flat_map(|items| items.iter().cloned())
            .collect();
        let total_items = union.len();
        self.store.replace_all(union);

        let update = Update {
            source: source_url.to_owned(),
            total_items,
            visible_items: self.store.visible_items().len(),
            at: Utc::now(),
        };
        let report = self.broadcaster.broadcast(&update);
        tracing::debug!(
            source = %source_url,
            items = total_items,
            delivered = report.delivered,
            skipped = report.skipped,
            "Merged source into store"
        );
        total_items
    }

    /// Runs passes forever, sleeping `interval` in between.
    pub async fn run(mut self) {
        loop {
            self.run_pass().await;
            tokio::time::sleep(self.settings.interval).await;
        }
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
