use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ai_client::OpenRouter;
use apify_client::ApifyClient;
use opensea_client::OpenSeaClient;
use salesignal::sink::JsonlSink;
use salesignal::traits::TextScorer;
use salesignal::CorrelationOrchestrator;
use salesignal_common::{Config, RunMode};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// 3 collections, 3 sales, 30 posts per search
    Test,
    /// 6 collections, 1000 sales, 50 posts per search
    Full,
}

impl From<Mode> for RunMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Test => RunMode::Test,
            Mode::Full => RunMode::Full,
        }
    }
}

/// Correlate NFT sales with social sentiment around each sale.
#[derive(Parser, Debug)]
#[command(name = "salesignal", version)]
struct Cli {
    #[arg(long, value_enum, default_value = "test")]
    mode: Mode,

    /// Collection slugs, overriding the mode's list.
    #[arg(long, value_delimiter = ',')]
    collections: Vec<String>,

    /// Output directory for the JSONL files.
    #[arg(long, default_value = "nft_data")]
    output: PathBuf,

    /// Also write every collected post to raw_posts.jsonl.
    #[arg(long)]
    export_posts: bool,

    /// Only sales on or after this date (YYYY-MM-DD).
    #[arg(long)]
    since: Option<NaiveDate>,

    /// Only sales before this date (YYYY-MM-DD).
    #[arg(long)]
    until: Option<NaiveDate>,

    /// Hours of social activity to search before each sale (1 to 720).
    #[arg(
        long,
        default_value_t = 24,
        value_parser = clap::value_parser!(i64).range(1..=MAX_WINDOW_HOURS)
    )]
    window_hours: i64,

    /// Skip all rate-limit pauses.
    #[arg(long)]
    dry_delays: bool,
}

const MAX_WINDOW_HOURS: i64 = 24 * 30;

fn epoch_start(date: NaiveDate) -> Option<i64> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("salesignal=info".parse()?))
        .init();

    let cli = Cli::parse();
    let run_id = uuid::Uuid::new_v4();
    info!(%run_id, mode = ?cli.mode, "Salesignal starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    let mode = RunMode::from(cli.mode);
    let collections = if cli.collections.is_empty() {
        mode.collections()
    } else {
        cli.collections.clone()
    };

    let mut settings = mode.settings(collections.len());
    settings.window_hours = cli.window_hours;
    settings.sales_after = cli.since.and_then(epoch_start);
    settings.sales_before = cli.until.and_then(epoch_start);
    if cli.dry_delays {
        settings = settings.without_delays();
    }

    let opensea = OpenSeaClient::new(config.opensea_api_key.clone())?;
    if !opensea.has_api_key() {
        warn!("No OPENSEA_API_KEY set, requests will be heavily rate limited");
    }
    let apify = ApifyClient::new(config.apify_api_key.clone());

    let first_model = config.sentiment_models.first().cloned().unwrap_or_default();
    let base = OpenRouter::new(config.openrouter_api_key.clone(), first_model)?
        .with_app_name("salesignal");
    let scorers: Vec<Arc<dyn TextScorer>> = config
        .sentiment_models
        .iter()
        .map(|model| Arc::new(base.for_model(model.as_str())) as Arc<dyn TextScorer>)
        .collect();

    let sink = JsonlSink::create(&cli.output, cli.export_posts)?;

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing up");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let mut orchestrator = CorrelationOrchestrator::new(
        Arc::new(opensea),
        Arc::new(apify),
        scorers,
        Box::new(sink),
        settings,
        cancelled,
    );

    let outcome = orchestrator.run(&collections).await?;
    for skipped in &outcome.skipped {
        info!(key = %skipped.key, stage = %skipped.stage, reason = skipped.reason.as_str(), "Skipped");
    }
    info!(
        %run_id,
        merged = outcome.records.len(),
        skipped = outcome.skipped.len(),
        cancelled = outcome.cancelled,
        output = %cli.output.display(),
        "Run finished"
    );
    println!("{}", outcome.stats);

    Ok(())
}
