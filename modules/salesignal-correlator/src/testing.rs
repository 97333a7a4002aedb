// In-memory test doubles for the pipeline seams.
//
// - MockSaleSource (SaleSource): collection slug → sales / stats
// - MockSearcher (PostSearcher): query → posts, records every query
// - MockScorer (TextScorer): canned responses, optional failure
// - MemorySink (RecordSink): shared Vec of records and posts
//
// Plus helpers for building SaleEvent / SocialPost fixtures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use salesignal_common::{
    CorrelationRecord, MarketContext, PipelineError, Price, SaleEvent, SaleKey, SocialPost,
};

use crate::collector::TimeWindow;
use crate::sink::RecordSink;
use crate::traits::{PostSearcher, SaleRange, SaleSource, TextScorer};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// 2024-06-10T18:00:00Z.
pub fn sale_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 10, 18, 0, 0).unwrap()
}

/// A 1.5 ETH sale with no NFT name.
pub fn sale(collection: &str, token: &str) -> SaleEvent {
    SaleEvent {
        collection: collection.to_string(),
        collection_name: None,
        token_id: token.to_string(),
        price: Price::new(1_500_000_000_000_000_000, 18),
        sold_at: sale_time(),
        buyer: Some("0xbuyer".to_string()),
        seller: Some("0xseller".to_string()),
        transaction: Some(format!("0xtx{token}")),
        nft_name: None,
        payment_symbol: Some("ETH".to_string()),
        contract_address: Some(format!("0x{collection}")),
        opensea_url: Some(format!(
            "https://opensea.io/assets/ethereum/0x{collection}/{token}"
        )),
    }
}

/// A post `minutes_before` the standard sale time.
pub fn post(id: Option<&str>, author: &str, text: &str, minutes_before: i64) -> SocialPost {
    SocialPost {
        id: id.map(str::to_string),
        author_id: author.to_string(),
        author_handle: None,
        text: text.to_string(),
        created_at: sale_time() - Duration::minutes(minutes_before),
        reposts: 1,
        favorites: 2,
        replies: 0,
        search_term: String::new(),
    }
}

// ---------------------------------------------------------------------------
// MockSaleSource
// ---------------------------------------------------------------------------

/// Returns `CollaboratorUnavailable` for unregistered collections.
#[derive(Default)]
pub struct MockSaleSource {
    sales: HashMap<String, Vec<SaleEvent>>,
    markets: HashMap<String, MarketContext>,
    unauthorized: bool,
}

impl MockSaleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_sales(mut self, collection: &str, sales: Vec<SaleEvent>) -> Self {
        self.sales.insert(collection.to_string(), sales);
        self
    }

    pub fn on_market(mut self, collection: &str, market: MarketContext) -> Self {
        self.markets.insert(collection.to_string(), market);
        self
    }

    /// Every call fails with `AuthenticationFailure`.
    pub fn unauthorized(mut self) -> Self {
        self.unauthorized = true;
        self
    }
}

#[async_trait]
impl SaleSource for MockSaleSource {
    async fn recent_sales(
        &self,
        collection: &str,
        count: usize,
        _range: SaleRange,
    ) -> Result<Vec<SaleEvent>, PipelineError> {
        if self.unauthorized {
            return Err(PipelineError::auth("mock-sales", "403 Forbidden"));
        }
        self.sales
            .get(collection)
            .map(|s| s.iter().take(count).cloned().collect())
            .ok_or_else(|| {
                PipelineError::unavailable("mock-sales", format!("no sales registered for {collection}"))
            })
    }

    async fn market_context(&self, collection: &str) -> Result<MarketContext, PipelineError> {
        if self.unauthorized {
            return Err(PipelineError::auth("mock-sales", "403 Forbidden"));
        }
        Ok(self.markets.get(collection).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

enum SearchReply {
    Posts(Vec<SocialPost>),
    Unavailable,
    Unauthorized,
}

/// Query → posts. Unregistered queries return no posts. Ignores the window,
/// like a provider that does not filter by time.
#[derive(Default)]
pub struct MockSearcher {
    replies: HashMap<String, SearchReply>,
    queries: Mutex<Vec<String>>,
    cancel_after_first: Option<Arc<AtomicBool>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_search(mut self, query: &str, posts: Vec<SocialPost>) -> Self {
        self.replies.insert(query.to_string(), SearchReply::Posts(posts));
        self
    }

    pub fn failing(mut self, query: &str) -> Self {
        self.replies.insert(query.to_string(), SearchReply::Unavailable);
        self
    }

    pub fn unauthorized(mut self, query: &str) -> Self {
        self.replies.insert(query.to_string(), SearchReply::Unauthorized);
        self
    }

    /// Raise `flag` once the first search has been answered.
    pub fn cancel_after_first(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_after_first = Some(flag);
        self
    }

    /// Every query received, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PostSearcher for MockSearcher {
    async fn search(
        &self,
        query: &str,
        _window: &TimeWindow,
        limit: u32,
    ) -> Result<Vec<SocialPost>, PipelineError> {
        if let Ok(mut q) = self.queries.lock() {
            q.push(query.to_string());
        }
        if let Some(flag) = &self.cancel_after_first {
            flag.store(true, Ordering::Relaxed);
        }
        match self.replies.get(query) {
            Some(SearchReply::Posts(posts)) => {
                Ok(posts.iter().take(limit as usize).cloned().collect())
            }
            Some(SearchReply::Unavailable) => {
                Err(PipelineError::unavailable("mock-search", format!("search failed for {query}")))
            }
            Some(SearchReply::Unauthorized) => Err(PipelineError::auth("mock-search", "401 Unauthorized")),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockScorer
// ---------------------------------------------------------------------------

/// Answers with a fixed response, optionally after failing a set number of
/// times. Without a response every call fails.
pub struct MockScorer {
    name: String,
    response: Option<String>,
    unauthorized: bool,
    failures_left: AtomicUsize,
    inputs: Mutex<Vec<String>>,
}

impl MockScorer {
    pub fn responding(response: &str) -> Self {
        Self {
            name: "mock-scorer".to_string(),
            response: Some(response.to_string()),
            unauthorized: false,
            failures_left: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Fails the first `failures` calls, then responds.
    pub fn flaky(response: &str, failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            ..Self::responding(response)
        }
    }

    pub fn failing() -> Self {
        Self {
            name: "mock-scorer".to_string(),
            response: None,
            unauthorized: false,
            failures_left: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            unauthorized: true,
            ..Self::failing()
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Every batch text received, in order.
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().map(|i| i.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextScorer for MockScorer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, _instruction: &str, input: &str) -> Result<String, PipelineError> {
        if let Ok(mut i) = self.inputs.lock() {
            i.push(input.to_string());
        }
        if self.unauthorized {
            return Err(PipelineError::auth("mock-scorer", "401 Unauthorized"));
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PipelineError::unavailable("mock-scorer", "model overloaded"));
        }
        self.response
            .clone()
            .ok_or_else(|| PipelineError::unavailable("mock-scorer", "model overloaded"))
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Clones share storage, so a test can keep one handle and give the other
/// to the orchestrator.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<CorrelationRecord>>>,
    posts: Arc<Mutex<Vec<(SaleKey, SocialPost)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CorrelationRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn posts(&self) -> Vec<(SaleKey, SocialPost)> {
        self.posts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: &CorrelationRecord) -> Result<(), PipelineError> {
        self.records
            .lock()
            .map_err(|e| PipelineError::Sink(e.to_string()))?
            .push(record.clone());
        Ok(())
    }

    fn append_posts(&mut self, sale: &SaleEvent, posts: &[SocialPost]) -> Result<(), PipelineError> {
        let key = sale.key();
        let mut stored = self
            .posts
            .lock()
            .map_err(|e| PipelineError::Sink(e.to_string()))?;
        stored.extend(posts.iter().map(|p| (key.clone(), p.clone())));
        Ok(())
    }
}
