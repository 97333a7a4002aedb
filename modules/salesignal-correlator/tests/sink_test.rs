use std::fs;

use salesignal::merge::{merge_records, SaleResult};
use salesignal::sink::{JsonlSink, RecordSink, FEATURES_FILE, POSTS_FILE};
use salesignal::testing::{post, sale};
use salesignal_common::{
    CorrelationRecord, MarketContext, ParseTier, SentimentResult, SocialSummary,
};

fn scored(score: f64) -> SentimentResult {
    SentimentResult {
        score,
        confidence: 0.8,
        positive: 1,
        negative: 0,
        neutral: 0,
        min_score: score,
        max_score: score,
        analyzed_count: 1,
        model_count: 1,
        tier: Some(ParseTier::Pattern),
    }
}

#[test]
fn jsonl_sink_writes_one_line_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let s = sale("azuki", "1");
    {
        let mut sink = JsonlSink::create(dir.path(), false).unwrap();
        sink.append(&CorrelationRecord::zero_filled(&s, MarketContext::default()))
            .unwrap();
        sink.append(&CorrelationRecord::zero_filled(&sale("azuki", "2"), MarketContext::default()))
            .unwrap();
        sink.append_posts(&s, &[post(Some("1"), "a", "ignored without export", 5)])
            .unwrap();
        assert_eq!(sink.records_written(), 2);
        assert_eq!(sink.posts_written(), 0);
    }

    let body = fs::read_to_string(dir.path().join(FEATURES_FILE)).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["collection"], "azuki");
    assert_eq!(first["nft_name"], "azuki #1");
    assert_eq!(first["sold_at"], "2024-06-10T18:00:00Z");
    assert_eq!(first["analyzed_count"], 0);
    assert_eq!(first["price"], 1.5);
    assert_eq!(first["asset_contract_address"], "0xazuki");
    assert_eq!(first["opensea_url"], "https://opensea.io/assets/ethereum/0xazuki/1");
    assert!(!dir.path().join(POSTS_FILE).exists());
}

#[test]
fn post_export_tags_rows_with_sale_key() {
    let dir = tempfile::tempdir().unwrap();
    let s = sale("azuki", "1");
    {
        let mut sink = JsonlSink::create(dir.path(), true).unwrap();
        sink.append_posts(
            &s,
            &[
                post(Some("1"), "a", "azuki floor looking strong", 5),
                post(None, "b", "who is buying these", 50),
            ],
        )
        .unwrap();
        sink.flush().unwrap();
    }

    let body = fs::read_to_string(dir.path().join(POSTS_FILE)).unwrap();
    let rows: Vec<serde_json::Value> = body
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["sale_nft_name"], "azuki #1");
    assert_eq!(rows[0]["text"], "azuki floor looking strong");
    assert_eq!(rows[0]["hours_before_sale"], 0.08);
    assert_eq!(rows[1]["hours_before_sale"], 0.83);
    assert_eq!(rows[1]["id"], serde_json::Value::Null);
}

#[test]
fn reopening_appends() {
    let dir = tempfile::tempdir().unwrap();
    for token in ["1", "2"] {
        let mut sink = JsonlSink::create(dir.path(), false).unwrap();
        sink.append(&CorrelationRecord::zero_filled(&sale("azuki", token), MarketContext::default()))
            .unwrap();
    }
    let body = fs::read_to_string(dir.path().join(FEATURES_FILE)).unwrap();
    assert_eq!(body.lines().count(), 2);
}

#[test]
fn merge_attaches_results_and_zero_fills_the_rest() {
    let sales = vec![
        (sale("azuki", "1"), MarketContext::default()),
        (sale("azuki", "2"), MarketContext::default()),
    ];
    let stray = sale("doodles-official", "9").key();
    let results = vec![
        SaleResult {
            key: sales[0].0.key(),
            social: SocialSummary {
                post_count: 4,
                ..Default::default()
            },
            sentiment: scored(0.6),
        },
        SaleResult {
            key: stray.clone(),
            social: SocialSummary::default(),
            sentiment: scored(-0.3),
        },
    ];

    let outcome = merge_records(&sales, results);

    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[0].social.post_count, 4);
    assert_eq!(outcome.records[0].sentiment.score, 0.6);
    assert_eq!(outcome.records[1].sentiment.analyzed_count, 0);
    assert_eq!(outcome.records[1].social.post_count, 0);
    assert_eq!(outcome.zero_filled, 1);
    assert_eq!(outcome.unmatched, vec![stray]);
    for (record, (sale, _)) in outcome.records.iter().zip(&sales) {
        assert_eq!(record.key(), sale.key());
    }
}

#[test]
fn merge_keeps_first_of_repeated_sales() {
    let s = sale("azuki", "1");
    let sales = vec![
        (s.clone(), MarketContext::default()),
        (s.clone(), MarketContext::default()),
    ];
    let outcome = merge_records(&sales, Vec::new());
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.zero_filled, 1);
}
