use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use salesignal_common::{
    CorrelationRecord, MarketContext, PipelineError, PipelineSettings, SaleEvent, SaleKey,
    SocialSummary,
};

use crate::collector::{SocialSignalCollector, TimeWindow};
use crate::pacing::pause;
use crate::sentiment::SentimentAggregator;
use crate::sink::RecordSink;
use crate::stats::RunStats;
use crate::traits::{PostSearcher, SaleRange, SaleSource, TextScorer};

/// Where an event was when it stopped short of `Merged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Collecting,
    Scoring,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Pending => f.write_str("pending"),
            Stage::Collecting => f.write_str("collecting"),
            Stage::Scoring => f.write_str("scoring"),
        }
    }
}

/// Terminal state of one sale event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Merged(CorrelationRecord),
    Skipped { stage: Stage, reason: String },
    /// The key was already merged this run.
    Duplicate(SaleKey),
    /// Cancellation was raised while the event was in flight.
    Discarded { stage: Stage },
}

#[derive(Debug, Clone)]
pub struct SkippedEvent {
    pub key: SaleKey,
    pub stage: Stage,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct RunOutcome {
    pub records: Vec<CorrelationRecord>,
    pub skipped: Vec<SkippedEvent>,
    pub stats: RunStats,
    pub cancelled: bool,
}

/// Sequences collect → score → merge per sale, one sale at a time.
pub struct CorrelationOrchestrator {
    sales: Arc<dyn SaleSource>,
    collector: SocialSignalCollector,
    aggregator: SentimentAggregator,
    sink: Box<dyn RecordSink>,
    settings: PipelineSettings,
    cancelled: Arc<AtomicBool>,
    merged: HashSet<SaleKey>,
    stats: RunStats,
}

impl CorrelationOrchestrator {
    pub fn new(
        sales: Arc<dyn SaleSource>,
        searcher: Arc<dyn PostSearcher>,
        scorers: Vec<Arc<dyn TextScorer>>,
        sink: Box<dyn RecordSink>,
        settings: PipelineSettings,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        let collector = SocialSignalCollector::new(searcher, settings.search_limit)
            .with_max_strategies(settings.max_strategies)
            .with_search_delay(settings.search_delay)
            .with_cancellation(cancelled.clone());
        Self {
            sales,
            collector,
            aggregator: SentimentAggregator::new(scorers),
            sink,
            settings,
            cancelled,
            merged: HashSet::new(),
            stats: RunStats::default(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Run every collection in order. Returns the records merged so far if
    /// cancelled; a credential rejection ends the run with an error.
    pub async fn run(&mut self, collections: &[String]) -> Result<RunOutcome, PipelineError> {
        let mut outcome = RunOutcome::default();
        let range = SaleRange {
            after: self.settings.sales_after,
            before: self.settings.sales_before,
        };

        for (ci, collection) in collections.iter().enumerate() {
            if self.is_cancelled() {
                break;
            }
            if ci > 0 && !pause(self.settings.collection_delay, &self.cancelled).await {
                break;
            }

            let market = match self.sales.market_context(collection).await {
                Ok(market) => market,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(collection = collection.as_str(), error = %e, "Collection stats unavailable");
                    MarketContext::default()
                }
            };

            let sales = match self
                .sales
                .recent_sales(collection, self.settings.sales_per_collection, range)
                .await
            {
                Ok(sales) => sales,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(collection = collection.as_str(), error = %e, "Failed to fetch sales, skipping collection");
                    self.stats.collections_failed += 1;
                    continue;
                }
            };
            self.stats.collections_processed += 1;
            self.stats.sales_fetched += sales.len() as u32;
            info!(collection = collection.as_str(), sales = sales.len(), "Processing collection");

            for (ei, sale) in sales.iter().enumerate() {
                if self.is_cancelled() {
                    break;
                }
                if ei > 0 && !pause(self.settings.event_delay, &self.cancelled).await {
                    break;
                }

                match self.process_event(sale, &market).await? {
                    EventOutcome::Merged(record) => outcome.records.push(record),
                    EventOutcome::Skipped { stage, reason } => outcome.skipped.push(SkippedEvent {
                        key: sale.key(),
                        stage,
                        reason,
                    }),
                    EventOutcome::Duplicate(key) => outcome.skipped.push(SkippedEvent {
                        key,
                        stage: Stage::Pending,
                        reason: "duplicate".to_string(),
                    }),
                    EventOutcome::Discarded { .. } => break,
                }
            }
        }

        self.sink.flush()?;
        outcome.cancelled = self.is_cancelled();
        outcome.stats = self.stats.clone();
        if outcome.cancelled {
            info!(merged = outcome.records.len(), "Run cancelled, returning merged records");
        }
        Ok(outcome)
    }

    /// Process one sale to a terminal state. May be called again for a sale
    /// that was skipped; a sale already merged comes back as `Duplicate`.
    ///
    /// Only credential rejections and output failures are returned as errors.
    pub async fn process_event(
        &mut self,
        sale: &SaleEvent,
        market: &MarketContext,
    ) -> Result<EventOutcome, PipelineError> {
        let key = sale.key();
        if self.merged.contains(&key) {
            info!(key = %key, "Sale already merged, skipping duplicate");
            self.stats.events_skipped += 1;
            self.stats.events_duplicate += 1;
            return Ok(EventOutcome::Duplicate(key));
        }

        // Collecting
        let window = TimeWindow::ending_at(sale.sold_at, self.settings.window_hours);
        let posts = match self
            .collector
            .collect(sale, window, self.settings.max_posts_per_sale)
            .await
        {
            Ok(posts) => posts,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => return Ok(self.skip(&key, Stage::Collecting, e)),
        };
        if self.is_cancelled() {
            return Ok(self.discard(&key, Stage::Collecting));
        }

        // Scoring
        let sentiment = match self.aggregator.score(&posts).await {
            Ok(sentiment) => sentiment,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => return Ok(self.skip(&key, Stage::Scoring, e)),
        };
        if self.is_cancelled() {
            return Ok(self.discard(&key, Stage::Scoring));
        }

        // Merged
        let social = SocialSummary::from_posts(&posts, sale.sold_at);
        let record = CorrelationRecord::new(sale, social, sentiment, market.clone());
        self.sink.append(&record)?;
        self.sink.append_posts(sale, &posts)?;
        self.merged.insert(key.clone());

        self.stats.events_merged += 1;
        self.stats.posts_collected += posts.len() as u32;
        self.stats.posts_scored += record.sentiment.analyzed_count as u32;
        if posts.is_empty() {
            self.stats.zero_post_events += 1;
        }
        self.stats.record_tier(record.sentiment.tier);

        info!(
            key = %key,
            posts = record.social.post_count,
            score = record.sentiment.score,
            "Merged record"
        );
        Ok(EventOutcome::Merged(record))
    }

    fn skip(&mut self, key: &SaleKey, stage: Stage, err: PipelineError) -> EventOutcome {
        warn!(key = %key, stage = %stage, error = %err, "Skipping sale");
        self.stats.events_skipped += 1;
        EventOutcome::Skipped {
            stage,
            reason: err.to_string(),
        }
    }

    fn discard(&mut self, key: &SaleKey, stage: Stage) -> EventOutcome {
        info!(key = %key, stage = %stage, "Run cancelled, discarding in-flight sale");
        self.stats.events_discarded += 1;
        EventOutcome::Discarded { stage }
    }
}
