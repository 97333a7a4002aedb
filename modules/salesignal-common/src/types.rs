use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::time::canonical;

// --- Sales ---

/// Sale price in base units (wei for ETH) with its decimal exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount: u128,
    pub decimals: u32,
}

impl Price {
    pub fn new(amount: u128, decimals: u32) -> Self {
        Self { amount, decimals }
    }

    /// Parse a base-unit decimal string such as `"1500000000000000000"`.
    pub fn parse(quantity: &str, decimals: u32) -> Option<Self> {
        quantity.trim().parse::<u128>().ok().map(|amount| Self { amount, decimals })
    }

    /// Human-scale value (ETH rather than wei). Whole and fractional parts
    /// are split in integer space so common prices convert exactly.
    pub fn decimal_value(&self) -> f64 {
        match 10u128.checked_pow(self.decimals) {
            Some(scale) => {
                let whole = self.amount / scale;
                let frac = self.amount % scale;
                whole as f64 + frac as f64 / scale as f64
            }
            None => self.amount as f64 / 10f64.powi(self.decimals as i32),
        }
    }
}

/// A completed marketplace sale. Read-only once retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleEvent {
    /// Collection slug, e.g. `boredapeyachtclub`.
    pub collection: String,
    pub collection_name: Option<String>,
    pub token_id: String,
    pub price: Price,
    pub sold_at: DateTime<Utc>,
    pub buyer: Option<String>,
    pub seller: Option<String>,
    pub transaction: Option<String>,
    pub nft_name: Option<String>,
    pub payment_symbol: Option<String>,
    pub contract_address: Option<String>,
    pub opensea_url: Option<String>,
}

impl SaleEvent {
    /// `"<slug> #<token>"`, used wherever the sale has no usable name.
    pub fn synthesized_name(&self) -> String {
        format!("{} #{}", self.collection, self.token_id)
    }

    /// The NFT's own name when present and non-blank, otherwise the
    /// synthesized one.
    pub fn display_name(&self) -> String {
        match self.nft_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.synthesized_name(),
        }
    }

    /// Collection display name, derived from the slug when the source gave
    /// none (`mutant-ape-yacht-club` -> `Mutant Ape Yacht Club`).
    pub fn collection_display_name(&self) -> String {
        match self.collection_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => title_case_slug(&self.collection),
        }
    }

    pub fn key(&self) -> SaleKey {
        SaleKey {
            collection: self.collection.clone(),
            name: self.display_name(),
            sold_at: canonical(&self.sold_at),
        }
    }
}

fn title_case_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Composite key joining a sale to independently computed results.
/// Reproducible from the `SaleEvent` alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SaleKey {
    pub collection: String,
    pub name: String,
    pub sold_at: String,
}

impl fmt::Display for SaleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.collection, self.name, self.sold_at)
    }
}

/// Collection-level market context from the sale source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub floor_price: Option<f64>,
    pub total_volume: Option<f64>,
    pub num_owners: Option<u64>,
}

// --- Social ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: Option<String>,
    pub author_id: String,
    pub author_handle: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub reposts: u64,
    pub favorites: u64,
    pub replies: u64,
    /// Search term that surfaced the post.
    pub search_term: String,
}

impl SocialPost {
    pub fn engagement(&self) -> u64 {
        self.reposts + self.favorites + self.replies
    }
}

/// Aggregate social activity around one sale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialSummary {
    pub post_count: usize,
    pub unique_authors: usize,
    pub total_engagement: u64,
    pub avg_engagement: f64,
    pub posts_last_1h: usize,
    pub posts_last_6h: usize,
}

impl SocialSummary {
    /// Summarize posts relative to the sale instant. The hour buckets count
    /// posts in `[sold_at - N hours, sold_at]`.
    pub fn from_posts(posts: &[SocialPost], sold_at: DateTime<Utc>) -> Self {
        if posts.is_empty() {
            return Self::default();
        }

        let authors: HashSet<&str> = posts.iter().map(|p| p.author_id.as_str()).collect();
        let total_engagement: u64 = posts.iter().map(SocialPost::engagement).sum();
        let within = |hours: i64| {
            let start = sold_at - Duration::hours(hours);
            posts
                .iter()
                .filter(|p| p.created_at >= start && p.created_at <= sold_at)
                .count()
        };

        Self {
            post_count: posts.len(),
            unique_authors: authors.len(),
            total_engagement,
            avg_engagement: total_engagement as f64 / posts.len() as f64,
            posts_last_1h: within(1),
            posts_last_6h: within(6),
        }
    }
}

// --- Sentiment ---

/// Which parser in the fallback chain produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseTier {
    Structured,
    Pattern,
    LooseNumeric,
    KeywordHeuristic,
}

impl ParseTier {
    pub fn confidence(self) -> f64 {
        match self {
            ParseTier::Structured => 0.9,
            ParseTier::Pattern => 0.8,
            ParseTier::LooseNumeric => 0.6,
            ParseTier::KeywordHeuristic => 0.4,
        }
    }
}

impl fmt::Display for ParseTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseTier::Structured => "structured",
            ParseTier::Pattern => "pattern",
            ParseTier::LooseNumeric => "loose_numeric",
            ParseTier::KeywordHeuristic => "keyword_heuristic",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    /// In [-1.0, 1.0].
    pub score: f64,
    /// In [0.0, 1.0].
    pub confidence: f64,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub min_score: f64,
    pub max_score: f64,
    pub analyzed_count: usize,
    pub model_count: usize,
    pub tier: Option<ParseTier>,
}

impl SentimentResult {
    /// No posts were scored. Every numeric field is zero.
    pub fn empty() -> Self {
        Self {
            score: 0.0,
            confidence: 0.0,
            positive: 0,
            negative: 0,
            neutral: 0,
            min_score: 0.0,
            max_score: 0.0,
            analyzed_count: 0,
            model_count: 0,
            tier: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.analyzed_count == 0
    }
}

impl Default for SentimentResult {
    fn default() -> Self {
        Self::empty()
    }
}

// --- Output ---

/// One row of the training dataset. Built once per sale, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    pub collection: String,
    pub collection_name: String,
    pub nft_name: String,
    pub token_id: String,
    /// Base-unit amount as a string; u128 does not survive most JSON readers.
    pub price_raw: String,
    pub price_decimals: u32,
    pub price: f64,
    pub payment_symbol: Option<String>,
    pub sold_at: String,
    pub buyer: Option<String>,
    pub seller: Option<String>,
    pub transaction: Option<String>,
    pub asset_contract_address: Option<String>,
    pub opensea_url: Option<String>,
    #[serde(flatten)]
    pub social: SocialSummary,
    #[serde(flatten)]
    pub sentiment: SentimentResult,
    #[serde(flatten)]
    pub market: MarketContext,
}

impl CorrelationRecord {
    pub fn new(
        sale: &SaleEvent,
        social: SocialSummary,
        sentiment: SentimentResult,
        market: MarketContext,
    ) -> Self {
        let key = sale.key();
        Self {
            collection: key.collection,
            collection_name: sale.collection_display_name(),
            nft_name: key.name,
            token_id: sale.token_id.clone(),
            price_raw: sale.price.amount.to_string(),
            price_decimals: sale.price.decimals,
            price: sale.price.decimal_value(),
            payment_symbol: sale.payment_symbol.clone(),
            sold_at: key.sold_at,
            buyer: sale.buyer.clone(),
            seller: sale.seller.clone(),
            transaction: sale.transaction.clone(),
            asset_contract_address: sale.contract_address.clone(),
            opensea_url: sale.opensea_url.clone(),
            social,
            sentiment,
            market,
        }
    }

    /// Sale fields only; social and sentiment columns are zero.
    pub fn zero_filled(sale: &SaleEvent, market: MarketContext) -> Self {
        Self::new(sale, SocialSummary::default(), SentimentResult::empty(), market)
    }

    pub fn key(&self) -> SaleKey {
        SaleKey {
            collection: self.collection.clone(),
            name: self.nft_name.clone(),
            sold_at: self.sold_at.clone(),
        }
    }
}
