use std::env;
use std::time::Duration;

use tracing::info;
use typed_builder::TypedBuilder;

use crate::error::PipelineError;

const DEFAULT_SENTIMENT_MODEL: &str = "anthropic/claude-3-haiku";

/// Credentials and provider choices loaded from environment variables.
/// Built once in the binary and passed down; library code never reads
/// the environment itself.
#[derive(Debug, Clone)]
pub struct Config {
    pub opensea_api_key: Option<String>,
    pub apify_api_key: String,
    pub openrouter_api_key: String,
    /// OpenRouter model IDs; more than one enables consensus scoring.
    pub sentiment_models: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                PipelineError::Config(format!("{key} environment variable is required"))
            })
        };

        let apify_api_key = match get("APIFY_API_KEY").or_else(|| get("APIFY")) {
            Some(key) => key,
            None => {
                return Err(PipelineError::Config(
                    "APIFY_API_KEY environment variable is required".to_string(),
                ))
            }
        };

        let sentiment_models: Vec<String> = get("SENTIMENT_MODELS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            opensea_api_key: get("OPENSEA_API_KEY"),
            apify_api_key,
            openrouter_api_key: required("OPENROUTER_API_KEY")?,
            sentiment_models: if sentiment_models.is_empty() {
                vec![DEFAULT_SENTIMENT_MODEL.to_string()]
            } else {
                sentiment_models
            },
        })
    }

    /// Log which credentials are present without printing them.
    pub fn log_redacted(&self) {
        info!(
            opensea_api_key = %redact(self.opensea_api_key.as_deref()),
            apify_api_key = %redact(Some(&self.apify_api_key)),
            openrouter_api_key = %redact(Some(&self.openrouter_api_key)),
            sentiment_models = ?self.sentiment_models,
            "Loaded configuration"
        );
    }
}

fn redact(value: Option<&str>) -> String {
    match value {
        None => "(unset)".to_string(),
        Some(v) => {
            let prefix: String = v.chars().take(4).collect();
            format!("{prefix}…({} chars)", v.chars().count())
        }
    }
}

/// Preset scale for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Three collections, three sales, 30 posts per search.
    Test,
    /// Six collections, 1000 sales, 50 posts per search.
    Full,
}

impl RunMode {
    pub fn collections(self) -> Vec<String> {
        let slugs: &[&str] = match self {
            RunMode::Test => &["boredapeyachtclub", "pudgypenguins", "azuki"],
            RunMode::Full => &[
                "boredapeyachtclub",
                "cryptopunks",
                "pudgypenguins",
                "azuki",
                "clonex",
                "doodles-official",
            ],
        };
        slugs.iter().map(|s| s.to_string()).collect()
    }

    pub fn total_sales(self) -> usize {
        match self {
            RunMode::Test => 3,
            RunMode::Full => 1000,
        }
    }

    pub fn posts_per_search(self) -> u32 {
        match self {
            RunMode::Test => 30,
            RunMode::Full => 50,
        }
    }

    /// Settings for this mode over `collection_count` collections. Sales
    /// are split evenly, at least one per collection.
    pub fn settings(self, collection_count: usize) -> PipelineSettings {
        let per_collection = (self.total_sales() / collection_count.max(1)).max(1);
        PipelineSettings::builder()
            .sales_per_collection(per_collection)
            .search_limit(self.posts_per_search())
            .max_posts_per_sale(Some(self.posts_per_search() as usize))
            .build()
    }
}

/// Tuning for one pipeline run.
#[derive(Debug, Clone, TypedBuilder)]
pub struct PipelineSettings {
    /// Social window length before each sale.
    #[builder(default = 24)]
    pub window_hours: i64,
    /// Cap on posts kept per sale; `None` keeps whatever the searches return.
    #[builder(default)]
    pub max_posts_per_sale: Option<usize>,
    /// How many keyword strategies to try per sale.
    #[builder(default = 3)]
    pub max_strategies: usize,
    /// Per-search result ceiling sent to the search provider.
    #[builder(default = 15)]
    pub search_limit: u32,
    #[builder(default = Duration::from_secs(2))]
    pub search_delay: Duration,
    #[builder(default = Duration::from_secs(8))]
    pub event_delay: Duration,
    #[builder(default = Duration::from_secs(180))]
    pub collection_delay: Duration,
    #[builder(default = 1)]
    pub sales_per_collection: usize,
    /// Only sales after this epoch second.
    #[builder(default)]
    pub sales_after: Option<i64>,
    /// Only sales before this epoch second.
    #[builder(default)]
    pub sales_before: Option<i64>,
}

impl PipelineSettings {
    /// Zero every pause. Used by tests and `--dry-delays`.
    pub fn without_delays(mut self) -> Self {
        self.search_delay = Duration::ZERO;
        self.event_delay = Duration::ZERO;
        self.collection_delay = Duration::ZERO;
        self
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}
