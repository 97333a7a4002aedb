use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Where an actor run stands. `poll_run` only ever hands back the three
/// terminal states; `Running` is what it loops on.
#[derive(Debug, Clone)]
pub enum RunState {
    Running,
    Succeeded(RunData),
    Failed(String),
    TimedOut,
}

impl RunState {
    /// Map an Apify run status string onto the state machine.
    pub fn from_run(run: RunData) -> Self {
        match run.status.as_str() {
            "SUCCEEDED" => RunState::Succeeded(run),
            "FAILED" | "ABORTED" | "TIMED-OUT" | "TIMING-OUT" | "ABORTING" => {
                RunState::Failed(run.status)
            }
            // READY, RUNNING, and anything Apify adds later
            _ => RunState::Running,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Running)
    }
}

// --- Tweet search ---

/// Timestamp layout accepted by the search operators `since:` / `until:`.
const SEARCH_TIME_FORMAT: &str = "%Y-%m-%d_%H:%M:%S_UTC";

/// Input for the kaitoeasyapi tweet-scraper actor (keyword search).
#[derive(Debug, Clone, Serialize)]
pub struct TweetSearchInput {
    #[serde(rename = "searchTerms")]
    pub search_terms: Vec<String>,
    pub lang: String,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
    #[serde(rename = "queryType")]
    pub query_type: String,
    #[serde(rename = "twitterContent")]
    pub twitter_content: String,
}

impl TweetSearchInput {
    /// Keyword search bounded to `[since, until]` via search operators.
    pub fn windowed(term: &str, since: DateTime<Utc>, until: DateTime<Utc>, max_items: u32) -> Self {
        let query = format!(
            "{term} since:{} until:{}",
            since.format(SEARCH_TIME_FORMAT),
            until.format(SEARCH_TIME_FORMAT)
        );
        Self {
            search_terms: vec![query],
            lang: "en".to_string(),
            max_items,
            query_type: "Latest".to_string(),
            twitter_content: term.to_string(),
        }
    }
}

/// Author info nested inside a Tweet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetAuthor {
    #[serde(default, alias = "userId", deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(rename = "userName", alias = "username", alias = "screen_name")]
    pub user_name: Option<String>,
    pub name: Option<String>,
}

/// Engagement block some actors nest under `public_metrics`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicMetrics {
    #[serde(default, deserialize_with = "lenient_count")]
    pub retweet_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub like_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub reply_count: Option<u64>,
}

/// A single tweet from the Apify dataset. Field names drift between actor
/// versions, so the common spellings are all accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    #[serde(default, alias = "tweetId", deserialize_with = "string_or_number")]
    pub id: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "full_text")]
    pub full_text: Option<String>,
    pub url: Option<String>,
    /// Left untyped: epoch numbers and several text layouts show up here.
    #[serde(rename = "createdAt", alias = "created_at")]
    pub created_at: Option<serde_json::Value>,
    pub author: Option<TweetAuthor>,
    #[serde(rename = "authorId", default, deserialize_with = "string_or_number")]
    pub author_id: Option<String>,
    #[serde(
        rename = "likeCount",
        alias = "favoriteCount",
        default,
        deserialize_with = "lenient_count"
    )]
    pub like_count: Option<u64>,
    #[serde(rename = "retweetCount", default, deserialize_with = "lenient_count")]
    pub retweet_count: Option<u64>,
    #[serde(rename = "replyCount", default, deserialize_with = "lenient_count")]
    pub reply_count: Option<u64>,
    pub public_metrics: Option<PublicMetrics>,
}

impl Tweet {
    /// Returns whichever text field is populated, preferring `full_text`.
    pub fn content(&self) -> Option<&str> {
        self.full_text.as_deref().or(self.text.as_deref())
    }

    /// Author id, falling back to the top-level `authorId` then the handle.
    pub fn author_key(&self) -> Option<&str> {
        let author = self.author.as_ref();
        author
            .and_then(|a| a.id.as_deref())
            .or(self.author_id.as_deref())
            .or(author.and_then(|a| a.user_name.as_deref()))
            .filter(|s| !s.is_empty())
    }

    pub fn handle(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.user_name.as_deref())
    }

    pub fn retweets(&self) -> u64 {
        self.retweet_count
            .or_else(|| self.metrics().and_then(|m| m.retweet_count))
            .unwrap_or(0)
    }

    pub fn likes(&self) -> u64 {
        self.like_count
            .or_else(|| self.metrics().and_then(|m| m.like_count))
            .unwrap_or(0)
    }

    pub fn replies(&self) -> u64 {
        self.reply_count
            .or_else(|| self.metrics().and_then(|m| m.reply_count))
            .unwrap_or(0)
    }

    fn metrics(&self) -> Option<&PublicMetrics> {
        self.public_metrics.as_ref()
    }
}

/// Accept `"123"`, `123`, or null for identifier fields.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accept `12`, `"12"`, `12.0`, or null for counters; anything else is unknown.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Some(serde_json::Value::String(s)) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    })
}
