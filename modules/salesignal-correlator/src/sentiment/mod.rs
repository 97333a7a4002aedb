//! Batch sentiment scoring.
//!
//! All eligible posts for a sale go to each scorer as one numbered batch.
//! Every scorer is one pass; passes are averaged. Per-post granularity is
//! categorical only (positive / negative / neutral).

pub mod parser;

use std::sync::Arc;

use tracing::{debug, info, warn};

use salesignal_common::{ParseTier, PipelineError, SentimentResult, SocialPost};

use crate::traits::TextScorer;
use parser::{keyword_label, parse_response, Label, Parsed};

/// Posts shorter than this (after trimming) carry no usable signal.
pub const MIN_TEXT_CHARS: usize = 10;

/// Combined batch text budget, in bytes.
pub const BATCH_BUDGET: usize = 8_000;

pub const INSTRUCTION: &str = "\
You are an NFT and crypto market sentiment analyst. You will receive numbered \
social media posts about one NFT collection.

Classify each post as \"positive\", \"negative\", or \"neutral\", then give one \
overall sentiment score between -1.0 (very bearish) and 1.0 (very bullish).

Positive signals: moon, diamond hands, HODL, LFG, pump, bullish.
Negative signals: rug pull, paper hands, dump, FUD, crash, bearish.

Respond with a JSON object only, labels in post order:
{\"labels\": [\"positive\", \"neutral\", ...], \"score\": 0.0}

Then, on its own line, repeat the overall score as: SCORE: X.X";

/// Numbered batch text plus how many posts made it in.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub text: String,
    pub included: usize,
}

/// Number posts from 1 and pack them until `budget` bytes. A post that does
/// not fit is left out along with everything after it; the first post is
/// always included, truncated if it alone exceeds the budget.
pub fn build_batch(posts: &[&SocialPost], budget: usize) -> Batch {
    let mut text = String::new();
    let mut included = 0;

    for (i, post) in posts.iter().enumerate() {
        let body = post.text.split_whitespace().collect::<Vec<_>>().join(" ");
        let line = format!("{}. {}\n", i + 1, body);

        if text.len() + line.len() <= budget {
            text.push_str(&line);
            included += 1;
        } else {
            if included == 0 {
                text.push_str(ai_client::truncate_to_char_boundary(&line, budget));
                included = 1;
            }
            break;
        }
    }

    Batch { text, included }
}

/// Posts with enough text to score.
pub fn eligible(posts: &[SocialPost]) -> Vec<&SocialPost> {
    posts
        .iter()
        .filter(|p| p.text.trim().chars().count() >= MIN_TEXT_CHARS)
        .collect()
}

pub struct SentimentAggregator {
    scorers: Vec<Arc<dyn TextScorer>>,
    budget: usize,
}

impl SentimentAggregator {
    /// One pass per scorer. More than one scorer averages the passes.
    pub fn new(scorers: Vec<Arc<dyn TextScorer>>) -> Self {
        Self {
            scorers,
            budget: BATCH_BUDGET,
        }
    }

    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget.max(1);
        self
    }

    /// Score `posts` as a batch.
    ///
    /// Returns the empty result when nothing is eligible. Fails only when
    /// every pass fails, or on a credential rejection.
    pub async fn score(&self, posts: &[SocialPost]) -> Result<SentimentResult, PipelineError> {
        let candidates = eligible(posts);
        if candidates.is_empty() {
            return Ok(SentimentResult::empty());
        }

        let batch = build_batch(&candidates, self.budget);
        let scored = &candidates[..batch.included];
        debug!(
            eligible = candidates.len(),
            included = batch.included,
            chars = batch.text.len(),
            "Built sentiment batch"
        );

        let mut passes: Vec<Parsed> = Vec::with_capacity(self.scorers.len());
        let mut last_error: Option<PipelineError> = None;
        for scorer in &self.scorers {
            match scorer.complete(INSTRUCTION, &batch.text).await {
                Ok(response) => {
                    let parsed = parse_response(&response);
                    debug!(scorer = scorer.name(), score = parsed.score, tier = %parsed.tier, "Scoring pass complete");
                    passes.push(parsed);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(scorer = scorer.name(), error = %e, "Scoring pass failed");
                    last_error = Some(e);
                }
            }
        }

        if passes.is_empty() {
            return Err(last_error.unwrap_or_else(|| PipelineError::CollaboratorUnavailable {
                collaborator: "scorer",
                message: "no scorers configured".to_string(),
            }));
        }

        let result = combine(&passes, scored);
        info!(
            analyzed = result.analyzed_count,
            score = result.score,
            confidence = result.confidence,
            models = result.model_count,
            "Sentiment scored"
        );
        Ok(result)
    }
}

/// Fold passes into one result. Labels come from the first structured pass
/// with exactly one label per scored post; otherwise each post is labeled
/// by keyword heuristic on its own text.
pub fn combine(passes: &[Parsed], scored: &[&SocialPost]) -> SentimentResult {
    if passes.is_empty() || scored.is_empty() {
        return SentimentResult::empty();
    }

    let n = passes.len() as f64;
    let scores: Vec<f64> = passes.iter().map(|p| parser::clamp_score(p.score)).collect();
    let score = parser::clamp_score(scores.iter().sum::<f64>() / n);
    let confidence = passes.iter().map(|p| p.tier.confidence()).sum::<f64>() / n;
    let min_score = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let labels: Vec<Label> = passes
        .iter()
        .filter_map(|p| p.labels.as_ref())
        .find(|labels| labels.len() == scored.len())
        .cloned()
        .unwrap_or_else(|| scored.iter().map(|p| keyword_label(&p.text)).collect());

    SentimentResult {
        score,
        confidence,
        positive: labels.iter().filter(|l| **l == Label::Positive).count(),
        negative: labels.iter().filter(|l| **l == Label::Negative).count(),
        neutral: labels.iter().filter(|l| **l == Label::Neutral).count(),
        min_score,
        max_score,
        analyzed_count: scored.len(),
        model_count: passes.len(),
        tier: weakest_tier(passes),
    }
}

/// The least confident tier among the passes.
fn weakest_tier(passes: &[Parsed]) -> Option<ParseTier> {
    passes
        .iter()
        .map(|p| p.tier)
        .min_by(|a, b| a.confidence().total_cmp(&b.confidence()))
}
