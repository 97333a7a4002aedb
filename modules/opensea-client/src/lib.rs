pub mod error;
pub mod types;

pub use error::{OpenSeaError, Result};
pub use types::{AssetEvent, CollectionStats, EventsPage, Nft, Payment, StatsTotal};

use std::time::Duration;

const BASE_URL: &str = "https://api.opensea.io/api/v2";

/// OpenSea caps `limit` at 100 per page.
pub const MAX_PAGE_SIZE: usize = 100;

/// Time filter for event queries, in epoch seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventRange {
    pub after: Option<i64>,
    pub before: Option<i64>,
}

pub struct OpenSeaClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenSeaClient {
    /// Without a key, requests go out unauthenticated and are heavily
    /// rate limited.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("salesignal/0.1")
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.api_key {
            Some(key) => req.header("X-API-KEY", key),
            None => req,
        }
    }

    /// Fetch one page of sale events.
    pub async fn events_page(
        &self,
        slug: &str,
        limit: usize,
        range: EventRange,
        cursor: Option<&str>,
    ) -> Result<EventsPage> {
        let url = format!("{}/events/collection/{}", self.base_url, slug);
        let mut query: Vec<(&str, String)> = vec![
            ("event_type", "sale".to_string()),
            ("limit", limit.clamp(1, MAX_PAGE_SIZE).to_string()),
        ];
        if let Some(after) = range.after {
            query.push(("after", after.to_string()));
        }
        if let Some(before) = range.before {
            query.push(("before", before.to_string()));
        }
        if let Some(cursor) = cursor {
            query.push(("next", cursor.to_string()));
        }

        let resp = self.get(&url).query(&query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OpenSeaError::from_status(slug, status.as_u16(), body));
        }

        let page: EventsPage = resp.json().await?;
        Ok(page)
    }

    /// Fetch up to `count` sale events, following the `next` cursor.
    pub async fn collection_sales(
        &self,
        slug: &str,
        count: usize,
        range: EventRange,
    ) -> Result<Vec<AssetEvent>> {
        let mut events = Vec::with_capacity(count.min(MAX_PAGE_SIZE));
        let mut cursor: Option<String> = None;

        while events.len() < count {
            let want = (count - events.len()).min(MAX_PAGE_SIZE);
            let page = self
                .events_page(slug, want, range, cursor.as_deref())
                .await?;
            let fetched = page.asset_events.len();
            events.extend(page.asset_events);

            tracing::debug!(collection = slug, fetched, total = events.len(), "Fetched sale page");

            match page.next {
                Some(next) if fetched > 0 && !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        events.truncate(count);
        tracing::info!(collection = slug, count = events.len(), "Fetched sale events");
        Ok(events)
    }

    pub async fn collection_stats(&self, slug: &str) -> Result<CollectionStats> {
        let url = format!("{}/collections/{}/stats", self.base_url, slug);
        let resp = self.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OpenSeaError::from_status(slug, status.as_u16(), body));
        }

        let stats: CollectionStats = resp.json().await?;
        Ok(stats)
    }
}
