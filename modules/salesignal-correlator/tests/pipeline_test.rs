//! End-to-end orchestration against in-memory collaborators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Duration;
use tokio_test::{assert_err, assert_ok};

use salesignal::collector::{SocialSignalCollector, TimeWindow};
use salesignal::testing::{post, sale, sale_time, MemorySink, MockSaleSource, MockScorer, MockSearcher};
use salesignal::traits::{PostSearcher, TextScorer};
use salesignal::{CorrelationOrchestrator, EventOutcome, SentimentAggregator, Stage};
use salesignal_common::{MarketContext, ParseTier, PipelineError, PipelineSettings};

const STRUCTURED: &str =
    r#"{"labels": ["positive", "negative", "neutral"], "score": 0.4}
SCORE: 0.4"#;

fn settings() -> PipelineSettings {
    PipelineSettings::builder()
        .sales_per_collection(5)
        .build()
        .without_delays()
}

fn orchestrator(
    sales: MockSaleSource,
    searcher: Arc<MockSearcher>,
    scorer: MockScorer,
    sink: MemorySink,
    cancelled: Arc<AtomicBool>,
) -> CorrelationOrchestrator {
    CorrelationOrchestrator::new(
        Arc::new(sales),
        searcher as Arc<dyn PostSearcher>,
        vec![Arc::new(scorer) as Arc<dyn TextScorer>],
        Box::new(sink),
        settings(),
        cancelled,
    )
}

fn ape_posts() -> Vec<salesignal_common::SocialPost> {
    vec![
        post(Some("1"), "alice", "BAYC floor is about to moon, LFG", 30),
        post(Some("2"), "bob", "another rug pull incoming, dump it", 90),
        post(Some("3"), "carol", "just looking at apes this afternoon", 400),
    ]
}

#[tokio::test]
async fn collector_tries_first_three_strategies_in_order() {
    let searcher = Arc::new(MockSearcher::new());
    let collector = SocialSignalCollector::new(searcher.clone(), 15);
    let s = sale("boredapeyachtclub", "8817");

    let posts = assert_ok!(
        collector
            .collect(&s, TimeWindow::ending_at(s.sold_at, 24), None)
            .await
    );

    assert!(posts.is_empty());
    assert_eq!(
        searcher.queries(),
        vec!["boredapeyachtclub #8817", "Boredapeyachtclub", "#Boredapeyachtclub"]
    );
}

#[tokio::test]
async fn collector_dedups_refilters_and_truncates() {
    let mut late = post(Some("late"), "dave", "posted after the sale happened", 0);
    late.created_at = sale_time() + Duration::minutes(5);
    let mut early = post(Some("early"), "erin", "posted two days before the sale", 0);
    early.created_at = sale_time() - Duration::hours(48);
    let edge = post(Some("edge"), "frank", "posted exactly at the window start", 24 * 60);

    let searcher = Arc::new(
        MockSearcher::new()
            .on_search(
                "boredapeyachtclub #8817",
                vec![
                    post(Some("A"), "alice", "first copy of A", 10),
                    post(Some("A"), "alice", "second copy of A", 11),
                    late,
                    early,
                    edge,
                ],
            )
            .on_search(
                "Boredapeyachtclub",
                vec![post(None, "bob", "hello world this is a test post", 20)],
            ),
    );
    let collector = SocialSignalCollector::new(searcher.clone(), 15);
    let s = sale("boredapeyachtclub", "8817");
    let window = TimeWindow::ending_at(s.sold_at, 24);

    let posts = assert_ok!(collector.collect(&s, window, None).await);
    let texts: Vec<&str> = posts.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "first copy of A",
            "posted exactly at the window start",
            "hello world this is a test post"
        ]
    );
    assert!(posts.iter().all(|p| window.contains(p.created_at)));
    assert_eq!(posts[2].search_term, "Boredapeyachtclub");

    let capped = assert_ok!(collector.collect(&s, window, Some(1)).await);
    assert_eq!(capped.len(), 1);
}

#[tokio::test]
async fn collector_stops_searching_once_ceiling_is_reached() {
    let searcher = Arc::new(MockSearcher::new().on_search("boredapeyachtclub #8817", ape_posts()));
    let collector = SocialSignalCollector::new(searcher.clone(), 15);
    let s = sale("boredapeyachtclub", "8817");

    let posts = assert_ok!(
        collector
            .collect(&s, TimeWindow::ending_at(s.sold_at, 24), Some(2))
            .await
    );

    assert_eq!(posts.len(), 2);
    assert_eq!(searcher.queries(), vec!["boredapeyachtclub #8817"]);
}

#[tokio::test]
async fn collector_survives_failed_strategy_but_not_auth() {
    let searcher = Arc::new(
        MockSearcher::new()
            .failing("boredapeyachtclub #8817")
            .on_search("Boredapeyachtclub", ape_posts()),
    );
    let collector = SocialSignalCollector::new(searcher, 15);
    let s = sale("boredapeyachtclub", "8817");
    let window = TimeWindow::ending_at(s.sold_at, 24);
    let posts = assert_ok!(collector.collect(&s, window, None).await);
    assert_eq!(posts.len(), 3);

    let locked = Arc::new(MockSearcher::new().unauthorized("boredapeyachtclub #8817"));
    let collector = SocialSignalCollector::new(locked, 15);
    let err = assert_err!(collector.collect(&s, window, None).await);
    assert!(matches!(err, PipelineError::AuthenticationFailure { .. }));
}

#[tokio::test]
async fn empty_posts_give_empty_sentiment() {
    let scorer = Arc::new(MockScorer::responding("SCORE: 0.9"));
    let aggregator = SentimentAggregator::new(vec![scorer.clone() as Arc<dyn TextScorer>]);

    let result = assert_ok!(aggregator.score(&[]).await);
    assert_eq!(result.analyzed_count, 0);
    assert_eq!(result.score, 0.0);
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.min_score, 0.0);
    assert_eq!(result.max_score, 0.0);
    assert_eq!(result.positive + result.negative + result.neutral, 0);
    assert!(result.tier.is_none());
    assert!(scorer.inputs().is_empty());
}

#[tokio::test]
async fn posts_too_short_to_score_skip_the_scorer() {
    let scorer = Arc::new(MockScorer::responding("SCORE: 0.9"));
    let aggregator = SentimentAggregator::new(vec![scorer.clone() as Arc<dyn TextScorer>]);
    let posts = vec![
        post(Some("1"), "alice", "gm", 5),
        post(Some("2"), "bob", "  lfg!!   ", 6),
        post(Some("3"), "carol", "wagmi", 7),
    ];

    let result = assert_ok!(aggregator.score(&posts).await);
    assert!(result.is_empty());
    assert!(result.tier.is_none());
    assert!(scorer.inputs().is_empty());
}

#[tokio::test]
async fn pattern_response_scores_at_pattern_tier() {
    let aggregator = SentimentAggregator::new(vec![
        Arc::new(MockScorer::responding("The mood is upbeat.\nSCORE: 0.7")) as Arc<dyn TextScorer>,
    ]);
    let result = assert_ok!(aggregator.score(&ape_posts()).await);
    assert_eq!(result.score, 0.7);
    assert_eq!(result.tier, Some(ParseTier::Pattern));
    assert_eq!(result.confidence, 0.8);
    assert_eq!(result.analyzed_count, 3);
    assert_eq!(result.positive + result.negative + result.neutral, 3);
}

#[tokio::test]
async fn consensus_averages_models_and_tolerates_one_failure() {
    let aggregator = SentimentAggregator::new(vec![
        Arc::new(MockScorer::responding(STRUCTURED).named("a")) as Arc<dyn TextScorer>,
        Arc::new(MockScorer::responding("SCORE: -0.2").named("b")) as Arc<dyn TextScorer>,
        Arc::new(MockScorer::failing().named("c")) as Arc<dyn TextScorer>,
    ]);
    let result = assert_ok!(aggregator.score(&ape_posts()).await);
    assert_eq!(result.model_count, 2);
    assert!((result.score - 0.1).abs() < 1e-9);
    assert_eq!(result.min_score, -0.2);
    assert_eq!(result.max_score, 0.4);
    assert_eq!((result.positive, result.negative, result.neutral), (1, 1, 1));
    assert!((-1.0..=1.0).contains(&result.score));
}

#[tokio::test]
async fn run_merges_one_record_per_sale() {
    let searcher = Arc::new(MockSearcher::new().on_search("boredapeyachtclub #1", ape_posts()));
    let sink = MemorySink::new();
    let sales = MockSaleSource::new()
        .on_sales("boredapeyachtclub", vec![sale("boredapeyachtclub", "1"), sale("boredapeyachtclub", "2")])
        .on_market(
            "boredapeyachtclub",
            MarketContext {
                floor_price: Some(11.5),
                total_volume: Some(1_000_000.0),
                num_owners: Some(5500),
            },
        );
    let mut orch = orchestrator(
        sales,
        searcher,
        MockScorer::responding(STRUCTURED),
        sink.clone(),
        Arc::new(AtomicBool::new(false)),
    );

    let outcome = assert_ok!(orch.run(&["boredapeyachtclub".to_string()]).await);

    assert_eq!(outcome.records.len(), 2);
    assert!(outcome.skipped.is_empty());
    assert_eq!(sink.records(), outcome.records);
    let exported = sink.posts();
    assert_eq!(exported.len(), 3);
    assert!(exported.iter().all(|(key, _)| *key == outcome.records[0].key()));

    let first = &outcome.records[0];
    assert_eq!(first.nft_name, "boredapeyachtclub #1");
    assert_eq!(first.price, 1.5);
    assert_eq!(first.social.post_count, 3);
    assert_eq!(first.social.unique_authors, 3);
    assert_eq!(first.social.posts_last_1h, 1);
    assert_eq!(first.social.posts_last_6h, 2);
    assert_eq!(first.sentiment.tier, Some(ParseTier::Structured));
    assert_eq!(first.market.floor_price, Some(11.5));

    // no posts for token 2: zero-filled social and sentiment
    let second = &outcome.records[1];
    assert_eq!(second.social.post_count, 0);
    assert_eq!(second.sentiment.analyzed_count, 0);
    assert_eq!(outcome.stats.events_merged, 2);
    assert_eq!(outcome.stats.zero_post_events, 1);
}

#[tokio::test]
async fn scoring_failure_skips_event_and_run_continues() {
    let searcher = Arc::new(MockSearcher::new().on_search("azuki #1", ape_posts()));
    let sales = MockSaleSource::new().on_sales("azuki", vec![sale("azuki", "1"), sale("azuki", "2")]);
    let mut orch = orchestrator(
        sales,
        searcher,
        MockScorer::failing(),
        MemorySink::new(),
        Arc::new(AtomicBool::new(false)),
    );

    let outcome = assert_ok!(orch.run(&["azuki".to_string()]).await);

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].token_id, "2");
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].stage, Stage::Scoring);
    assert_eq!(outcome.stats.events_skipped, 1);
}

#[tokio::test]
async fn missing_collection_is_skipped() {
    let sales = MockSaleSource::new().on_sales("azuki", vec![sale("azuki", "7")]);
    let mut orch = orchestrator(
        sales,
        Arc::new(MockSearcher::new()),
        MockScorer::responding("SCORE: 0.1"),
        MemorySink::new(),
        Arc::new(AtomicBool::new(false)),
    );

    let outcome = assert_ok!(orch.run(&["nope".to_string(), "azuki".to_string()]).await);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.stats.collections_failed, 1);
    assert_eq!(outcome.stats.collections_processed, 1);
}

#[tokio::test]
async fn authentication_failure_ends_the_run() {
    let mut orch = orchestrator(
        MockSaleSource::new().unauthorized(),
        Arc::new(MockSearcher::new()),
        MockScorer::responding("SCORE: 0.1"),
        MemorySink::new(),
        Arc::new(AtomicBool::new(false)),
    );
    let err = assert_err!(orch.run(&["azuki".to_string()]).await);
    assert!(matches!(err, PipelineError::AuthenticationFailure { .. }));

    let searcher = Arc::new(MockSearcher::new().on_search("azuki #1", ape_posts()));
    let mut orch = orchestrator(
        MockSaleSource::new().on_sales("azuki", vec![sale("azuki", "1")]),
        searcher,
        MockScorer::unauthorized(),
        MemorySink::new(),
        Arc::new(AtomicBool::new(false)),
    );
    let err = assert_err!(orch.run(&["azuki".to_string()]).await);
    assert!(matches!(err, PipelineError::AuthenticationFailure { .. }));
}

#[tokio::test]
async fn duplicate_sale_is_not_merged_twice() {
    let sink = MemorySink::new();
    let mut orch = orchestrator(
        MockSaleSource::new(),
        Arc::new(MockSearcher::new()),
        MockScorer::responding("SCORE: 0.1"),
        sink.clone(),
        Arc::new(AtomicBool::new(false)),
    );
    let s = sale("azuki", "1");
    let market = MarketContext::default();

    let first = assert_ok!(orch.process_event(&s, &market).await);
    assert!(matches!(first, EventOutcome::Merged(_)));
    let second = assert_ok!(orch.process_event(&s.clone(), &market).await);
    assert_eq!(second, EventOutcome::Duplicate(s.key()));
    assert_eq!(sink.records().len(), 1);
}

#[tokio::test]
async fn skipped_event_can_be_resubmitted() {
    let searcher = Arc::new(MockSearcher::new().on_search("azuki #1", ape_posts()));
    let sink = MemorySink::new();
    let mut orch = orchestrator(
        MockSaleSource::new(),
        searcher,
        MockScorer::flaky("SCORE: 0.3", 1),
        sink.clone(),
        Arc::new(AtomicBool::new(false)),
    );
    let s = sale("azuki", "1");

    let outcome = assert_ok!(orch.process_event(&s, &MarketContext::default()).await);
    assert!(matches!(outcome, EventOutcome::Skipped { stage: Stage::Scoring, .. }));
    assert!(sink.records().is_empty());

    let outcome = assert_ok!(orch.process_event(&s, &MarketContext::default()).await);
    assert!(matches!(outcome, EventOutcome::Merged(_)));
    assert_eq!(sink.records().len(), 1);
    assert_eq!(sink.records()[0].sentiment.score, 0.3);
}

#[tokio::test]
async fn cancellation_discards_in_flight_event_and_keeps_merged() {
    let cancelled = Arc::new(AtomicBool::new(false));
    // Token 1 merges with no posts; the flag goes up before token 2 starts.
    let searcher = Arc::new(MockSearcher::new());
    let sales = MockSaleSource::new().on_sales("azuki", vec![sale("azuki", "1"), sale("azuki", "2")]);
    let sink = MemorySink::new();
    let mut orch = orchestrator(
        sales,
        searcher.clone(),
        MockScorer::responding("SCORE: 0.2"),
        sink.clone(),
        cancelled.clone(),
    );

    let merged = assert_ok!(orch.process_event(&sale("azuki", "1"), &MarketContext::default()).await);
    assert!(matches!(merged, EventOutcome::Merged(_)));

    cancelled.store(true, Ordering::Relaxed);
    let discarded = assert_ok!(orch.process_event(&sale("azuki", "2"), &MarketContext::default()).await);
    assert!(matches!(discarded, EventOutcome::Discarded { .. }));
    assert_eq!(sink.records().len(), 1);

    let outcome = assert_ok!(orch.run(&["azuki".to_string()]).await);
    assert!(outcome.cancelled);
    assert!(outcome.records.is_empty());
}

#[tokio::test]
async fn cancel_raised_mid_search_discards_the_event() {
    let cancelled = Arc::new(AtomicBool::new(false));
    let searcher = Arc::new(
        MockSearcher::new()
            .on_search("azuki #1", ape_posts())
            .cancel_after_first(cancelled.clone()),
    );
    let sink = MemorySink::new();
    let mut orch = orchestrator(
        MockSaleSource::new().on_sales("azuki", vec![sale("azuki", "1"), sale("azuki", "2")]),
        searcher.clone(),
        MockScorer::responding("SCORE: 0.2"),
        sink.clone(),
        cancelled,
    );

    let outcome = assert_ok!(orch.run(&["azuki".to_string()]).await);
    assert!(outcome.cancelled);
    assert!(outcome.records.is_empty());
    assert!(sink.records().is_empty());
    assert_eq!(outcome.stats.events_discarded, 1);
    assert_eq!(searcher.queries(), vec!["azuki #1"]);
}

#[tokio::test]
async fn composite_key_is_stable() {
    let s = sale("boredapeyachtclub", "8817");
    assert_eq!(s.key().to_string(), s.clone().key().to_string());
    assert_eq!(s.key().to_string(), "boredapeyachtclub|boredapeyachtclub #8817|2024-06-10T18:00:00Z");
}
