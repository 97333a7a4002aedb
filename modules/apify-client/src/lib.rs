pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{PublicMetrics, RunData, RunState, Tweet, TweetAuthor, TweetSearchInput};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for kaitoeasyapi/twitter-x-data-tweet-scraper-pay-per-result-cheapest,
/// in the `user~name` form the REST API expects.
const TWEET_SEARCH_SCRAPER: &str =
    "kaitoeasyapi~twitter-x-data-tweet-scraper-pay-per-result-cheapest";

/// How long to wait on a single actor run.
#[derive(Debug, Clone, Copy)]
struct PollSettings {
    /// Give up on the run after this long.
    timeout: Duration,
    /// Server-side long-poll per status request (`waitForFinish`, max 60).
    long_poll_secs: u64,
    /// Pause after a status response that is still running, or after a
    /// failed status request.
    interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            long_poll_secs: 60,
            interval: Duration::from_secs(10),
        }
    }
}

/// Decode each item on its own so one drifted record does not sink the batch.
fn decode_items<T: DeserializeOwned>(dataset_id: &str, items: Vec<serde_json::Value>) -> Vec<T> {
    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(dataset_id, index, error = %e, "Dropping undecodable dataset item");
                None
            }
        })
        .collect();
    if decoded.len() < total {
        tracing::warn!(dataset_id, total, kept = decoded.len(), "Dataset had undecodable items");
    }
    decoded
}

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    poll: PollSettings,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
            poll: PollSettings::default(),
        }
    }

    /// Start an actor run. Returns immediately with run metadata.
    pub async fn start_run<I: Serialize + ?Sized>(&self, actor: &str, input: &I) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", self.base_url, actor);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::from_status(status.as_u16(), body));
        }

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// One status request, long-polling up to `wait_secs` on the server.
    pub async fn run_status(&self, run_id: &str, wait_secs: u64) -> Result<RunData> {
        let url = format!(
            "{}/actor-runs/{}?waitForFinish={}",
            self.base_url, run_id, wait_secs
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::from_status(status.as_u16(), body));
        }

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Drive a run to a terminal state: `Succeeded`, `Failed`, or `TimedOut`.
    ///
    /// Transient status-request failures are logged and retried until the
    /// deadline; credential rejections end the poll immediately.
    pub async fn poll_run(&self, run_id: &str) -> Result<RunState> {
        let deadline = Instant::now() + self.poll.timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(run_id, timeout_secs = self.poll.timeout.as_secs(), "Run poll timed out");
                return Ok(RunState::TimedOut);
            }
            let wait_secs = self.poll.long_poll_secs.min(remaining.as_secs());

            match self.run_status(run_id, wait_secs).await {
                Ok(run) => {
                    let state = RunState::from_run(run);
                    if state.is_terminal() {
                        return Ok(state);
                    }
                    tracing::debug!(run_id, "Run still in progress");
                }
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => {
                    tracing::warn!(run_id, error = %e, "Run status check failed, retrying");
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(self.poll.interval.min(remaining)).await;
        }
    }

    /// Fetch dataset items from a completed run. Items that do not decode as
    /// `T` are logged and dropped; the rest are returned.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json", self.base_url, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::from_status(status.as_u16(), body));
        }

        let items: Vec<serde_json::Value> = resp.json().await?;
        Ok(decode_items(dataset_id, items))
    }

    /// Keyword tweet search end-to-end: start run, poll, fetch results.
    pub async fn search_tweets(&self, input: &TweetSearchInput) -> Result<Vec<Tweet>> {
        tracing::info!(
            query = input.search_terms.first().map(String::as_str).unwrap_or_default(),
            max_items = input.max_items,
            "Starting tweet search"
        );

        let run = self.start_run(TWEET_SEARCH_SCRAPER, input).await?;
        tracing::info!(run_id = %run.id, "Apify run started, polling for completion");

        let completed = match self.poll_run(&run.id).await? {
            RunState::Succeeded(completed) => completed,
            RunState::Failed(status) => return Err(ApifyError::RunFailed(status)),
            RunState::TimedOut | RunState::Running => {
                return Err(ApifyError::TimedOut {
                    run_id: run.id,
                    waited_secs: self.poll.timeout.as_secs(),
                })
            }
        };
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        let tweets: Vec<Tweet> = self
            .get_dataset_items(&completed.default_dataset_id)
            .await?;
        tracing::info!(count = tweets.len(), "Fetched tweets");

        Ok(tweets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn one_bad_item_does_not_drop_the_batch() {
        let items = vec![
            json!({"id": "1", "text": "apes strong today", "likeCount": 4}),
            json!({"id": "2", "text": 17}),
            json!({"id": "3", "text": "floor dipping", "likeCount": "12"}),
        ];
        let tweets: Vec<Tweet> = decode_items("ds1", items);
        let ids: Vec<_> = tweets.iter().filter_map(|t| t.id.as_deref()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(tweets[1].likes(), 12);
    }
}
