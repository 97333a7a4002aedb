// Seams between the pipeline and its external services.
//
// SaleSource   : marketplace sales + collection stats (OpenSea)
// PostSearcher : windowed keyword search over social posts (Apify tweet scraper)
// TextScorer   : one LLM completion per call (OpenRouter, one model each)
//
// Adapters validate loose provider JSON into SaleEvent / SocialPost here, so
// everything past this file works with normalized values. Items that fail
// normalization are logged and dropped; credential rejections surface as
// PipelineError::AuthenticationFailure.

use async_trait::async_trait;
use tracing::warn;

use ai_client::{AiError, OpenRouter};
use apify_client::{ApifyClient, ApifyError, Tweet, TweetSearchInput};
use opensea_client::{AssetEvent, EventRange, OpenSeaClient, OpenSeaError};
use salesignal_common::time::normalize;
use salesignal_common::{
    MarketContext, NormalizationError, PipelineError, Price, SaleEvent, SocialPost,
};

use crate::collector::TimeWindow;

/// Optional epoch-second bounds on which sales to fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaleRange {
    pub after: Option<i64>,
    pub before: Option<i64>,
}

#[async_trait]
pub trait SaleSource: Send + Sync {
    /// Up to `count` recent sales for a collection slug.
    async fn recent_sales(
        &self,
        collection: &str,
        count: usize,
        range: SaleRange,
    ) -> Result<Vec<SaleEvent>, PipelineError>;

    /// Collection-level floor / volume / owners.
    async fn market_context(&self, collection: &str) -> Result<MarketContext, PipelineError>;
}

#[async_trait]
pub trait PostSearcher: Send + Sync {
    /// Posts matching `query`. Providers may ignore the window; callers
    /// re-filter.
    async fn search(
        &self,
        query: &str,
        window: &TimeWindow,
        limit: u32,
    ) -> Result<Vec<SocialPost>, PipelineError>;
}

#[async_trait]
pub trait TextScorer: Send + Sync {
    /// Identifies the scorer in logs (model ID for LLM scorers).
    fn name(&self) -> &str;

    async fn complete(&self, instruction: &str, input: &str) -> Result<String, PipelineError>;
}

// ---------------------------------------------------------------------------
// OpenSea
// ---------------------------------------------------------------------------

const OPENSEA: &str = "opensea";

fn opensea_error(err: OpenSeaError) -> PipelineError {
    if err.is_auth() {
        PipelineError::auth(OPENSEA, err)
    } else {
        PipelineError::unavailable(OPENSEA, err)
    }
}

/// Validate one marketplace event into a `SaleEvent`.
pub fn sale_from_event(collection: &str, event: AssetEvent) -> Result<SaleEvent, NormalizationError> {
    let nft = event
        .nft
        .ok_or_else(|| NormalizationError("sale event without nft".to_string()))?;
    let payment = event
        .payment
        .ok_or_else(|| NormalizationError("sale event without payment".to_string()))?;
    let timestamp = event
        .event_timestamp
        .ok_or_else(|| NormalizationError("sale event without timestamp".to_string()))?;
    let sold_at = normalize(&timestamp)?;
    let price = Price::parse(&payment.quantity, payment.decimals)
        .ok_or_else(|| NormalizationError(format!("bad payment quantity {}", payment.quantity)))?;
    let token_id = nft
        .identifier
        .filter(|id| !id.is_empty())
        .ok_or_else(|| NormalizationError("sale event without token identifier".to_string()))?;

    Ok(SaleEvent {
        collection: nft.collection.unwrap_or_else(|| collection.to_string()),
        collection_name: None,
        token_id,
        price,
        sold_at,
        buyer: event.buyer,
        seller: event.seller,
        transaction: event.transaction,
        nft_name: nft.name,
        payment_symbol: payment.symbol,
        contract_address: nft.contract.filter(|c| !c.is_empty()),
        opensea_url: nft.opensea_url.filter(|u| !u.is_empty()),
    })
}

#[async_trait]
impl SaleSource for OpenSeaClient {
    async fn recent_sales(
        &self,
        collection: &str,
        count: usize,
        range: SaleRange,
    ) -> Result<Vec<SaleEvent>, PipelineError> {
        let range = EventRange {
            after: range.after,
            before: range.before,
        };
        let events = self
            .collection_sales(collection, count, range)
            .await
            .map_err(opensea_error)?;

        let mut sales = Vec::with_capacity(events.len());
        for event in events {
            match sale_from_event(collection, event) {
                Ok(sale) => sales.push(sale),
                Err(e) => warn!(collection, error = %e, "Dropping malformed sale event"),
            }
        }
        Ok(sales)
    }

    async fn market_context(&self, collection: &str) -> Result<MarketContext, PipelineError> {
        let stats = self
            .collection_stats(collection)
            .await
            .map_err(opensea_error)?;
        Ok(MarketContext {
            floor_price: stats.total.floor_price,
            total_volume: stats.total.volume,
            num_owners: stats.total.num_owners,
        })
    }
}

// ---------------------------------------------------------------------------
// Apify tweet search
// ---------------------------------------------------------------------------

const APIFY: &str = "apify";

fn apify_error(err: ApifyError) -> PipelineError {
    if err.is_auth() {
        PipelineError::auth(APIFY, err)
    } else {
        PipelineError::unavailable(APIFY, err)
    }
}

/// Validate one scraped tweet into a `SocialPost`.
pub fn post_from_tweet(term: &str, tweet: Tweet) -> Result<SocialPost, NormalizationError> {
    let text = tweet
        .content()
        .map(str::to_string)
        .ok_or_else(|| NormalizationError("tweet without text".to_string()))?;
    let created_at = match &tweet.created_at {
        Some(value) => normalize(value)?,
        None => return Err(NormalizationError("tweet without created_at".to_string())),
    };

    Ok(SocialPost {
        author_id: author_id(&tweet, &text),
        author_handle: tweet.handle().map(str::to_string),
        reposts: tweet.retweets(),
        favorites: tweet.likes(),
        replies: tweet.replies(),
        id: tweet.id,
        text,
        created_at,
        search_term: term.to_string(),
    })
}

/// Author id, handle, or a per-post stand-in so unattributed posts are not
/// all counted as one author.
fn author_id(tweet: &Tweet, text: &str) -> String {
    match (tweet.author_key(), tweet.id.as_deref()) {
        (Some(author), _) => author.to_string(),
        (None, Some(id)) => format!("anonymous:{id}"),
        (None, None) => format!("anonymous:{}", crate::collector::fingerprint(text)),
    }
}

#[async_trait]
impl PostSearcher for ApifyClient {
    async fn search(
        &self,
        query: &str,
        window: &TimeWindow,
        limit: u32,
    ) -> Result<Vec<SocialPost>, PipelineError> {
        let input = TweetSearchInput::windowed(query, window.start, window.end, limit);
        let tweets = self.search_tweets(&input).await.map_err(apify_error)?;

        let mut posts = Vec::with_capacity(tweets.len());
        for tweet in tweets {
            match post_from_tweet(query, tweet) {
                Ok(post) => posts.push(post),
                Err(e) => warn!(term = query, error = %e, "Dropping malformed tweet"),
            }
        }
        Ok(posts)
    }
}

// ---------------------------------------------------------------------------
// OpenRouter
// ---------------------------------------------------------------------------

const OPENROUTER: &str = "openrouter";

#[async_trait]
impl TextScorer for OpenRouter {
    fn name(&self) -> &str {
        self.model()
    }

    async fn complete(&self, instruction: &str, input: &str) -> Result<String, PipelineError> {
        self.chat_completion(instruction, input)
            .await
            .map_err(|e: AiError| {
                if e.is_auth() {
                    PipelineError::auth(OPENROUTER, e)
                } else {
                    PipelineError::unavailable(OPENROUTER, e)
                }
            })
    }
}
