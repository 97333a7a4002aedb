//! Fallback chain for reading a score out of a model response.
//!
//! Parsers run in `ResponseParser::CHAIN` order and the first match wins.
//! The keyword heuristic always matches, so the chain never comes up empty.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use salesignal_common::ParseTier;

static LABELED_SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:SENTIMENT_SCORE|SCORE)\s*[:=]\s*([-+]?\d+(?:\.\d+)?)")
        .expect("valid regex")
});

/// `1.` / `2)` at the start of a line, as echoed from the numbered batch.
static LIST_ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+[.)](?:\s|$)").expect("valid regex"));

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d*\.?\d+").expect("valid regex"));

const POSITIVE_WORDS: &[&str] = &[
    "positive",
    "bullish",
    "optimistic",
    "good",
    "strong",
    "moon",
    "pump",
    "lfg",
    "hodl",
    "diamond hands",
];

const NEGATIVE_WORDS: &[&str] = &[
    "negative",
    "bearish",
    "pessimistic",
    "bad",
    "weak",
    "dump",
    "crash",
    "rug pull",
    "fud",
    "paper hands",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Positive,
    Negative,
    Neutral,
}

impl Label {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "positive" | "bullish" | "pos" => Some(Label::Positive),
            "negative" | "bearish" | "neg" => Some(Label::Negative),
            "neutral" | "mixed" | "neu" => Some(Label::Neutral),
            _ => None,
        }
    }
}

/// What one parser extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    /// Clamped to [-1, 1].
    pub score: f64,
    pub tier: ParseTier,
    /// Per-post labels, only ever set by the structured parser.
    pub labels: Option<Vec<Label>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseParser {
    Structured,
    Pattern,
    LooseNumeric,
    KeywordHeuristic,
}

impl ResponseParser {
    pub const CHAIN: [ResponseParser; 4] = [
        ResponseParser::Structured,
        ResponseParser::Pattern,
        ResponseParser::LooseNumeric,
        ResponseParser::KeywordHeuristic,
    ];

    pub fn tier(self) -> ParseTier {
        match self {
            ResponseParser::Structured => ParseTier::Structured,
            ResponseParser::Pattern => ParseTier::Pattern,
            ResponseParser::LooseNumeric => ParseTier::LooseNumeric,
            ResponseParser::KeywordHeuristic => ParseTier::KeywordHeuristic,
        }
    }

    pub fn try_parse(self, response: &str) -> Option<Parsed> {
        let (score, labels) = match self {
            ResponseParser::Structured => {
                let (score, labels) = parse_structured(response)?;
                (score, Some(labels))
            }
            ResponseParser::Pattern => (parse_labeled(response)?, None),
            ResponseParser::LooseNumeric => (parse_loose_number(response)?, None),
            ResponseParser::KeywordHeuristic => (keyword_score(response), None),
        };
        Some(Parsed {
            score: clamp_score(score),
            tier: self.tier(),
            labels,
        })
    }
}

/// Run the chain. Always produces a result.
pub fn parse_response(response: &str) -> Parsed {
    ResponseParser::CHAIN
        .iter()
        .find_map(|p| p.try_parse(response))
        .unwrap_or(Parsed {
            score: 0.0,
            tier: ParseTier::KeywordHeuristic,
            labels: None,
        })
}

pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(-1.0, 1.0)
    }
}

#[derive(Debug, Deserialize)]
struct StructuredResponse {
    #[serde(alias = "overall", alias = "overall_score", alias = "sentiment_score")]
    score: Option<f64>,
    #[serde(default, alias = "sentiments")]
    labels: Vec<String>,
}

fn parse_structured(response: &str) -> Option<(f64, Vec<Label>)> {
    let json = ai_client::extract_json_object(response)?;
    let parsed: StructuredResponse = serde_json::from_str(json).ok()?;
    let score = parsed.score.filter(|s| s.is_finite())?;
    // Unknown labels void the whole list rather than shifting ordinals.
    let labels: Vec<Label> = parsed
        .labels
        .iter()
        .map(|l| Label::parse(l))
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default();
    Some((score, labels))
}

fn parse_labeled(response: &str) -> Option<f64> {
    LABELED_SCORE
        .captures(response)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|s| s.is_finite())
}

/// First number in the response that already lies in [-1, 1], ignoring
/// list ordinals.
fn parse_loose_number(response: &str) -> Option<f64> {
    let body = LIST_ORDINAL.replace_all(response, "");
    NUMBER
        .find_iter(&body)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .find(|n| (-1.0..=1.0).contains(n))
}

fn keyword_counts(text: &str) -> (usize, usize) {
    let lower = text.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    (positive, negative)
}

/// +0.5 for a positive-keyword majority, -0.5 for negative, 0.0 on a tie.
pub fn keyword_score(text: &str) -> f64 {
    let (positive, negative) = keyword_counts(text);
    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => 0.5,
        std::cmp::Ordering::Less => -0.5,
        std::cmp::Ordering::Equal => 0.0,
    }
}

pub fn keyword_label(text: &str) -> Label {
    let score = keyword_score(text);
    if score > 0.0 {
        Label::Positive
    } else if score < 0.0 {
        Label::Negative
    } else {
        Label::Neutral
    }
}
