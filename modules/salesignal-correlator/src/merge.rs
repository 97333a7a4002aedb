//! Re-attach independently computed social/sentiment results to sales.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use salesignal_common::{
    CorrelationRecord, MarketContext, SaleEvent, SaleKey, SentimentResult, SocialSummary,
};

/// Social and sentiment output computed for one sale, keyed by the sale's
/// composite key.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleResult {
    pub key: SaleKey,
    pub social: SocialSummary,
    pub sentiment: SentimentResult,
}

#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// One per sale, in sale order.
    pub records: Vec<CorrelationRecord>,
    /// Results whose key matched no sale. Never turned into records.
    pub unmatched: Vec<SaleKey>,
    /// Sales with no result, emitted zero-filled.
    pub zero_filled: usize,
}

/// Join `results` onto `sales` by composite key. Sales without a result get
/// a zero-filled record; repeated sales and repeated results keep the first.
pub fn merge_records(
    sales: &[(SaleEvent, MarketContext)],
    results: Vec<SaleResult>,
) -> MergeOutcome {
    let mut by_key: HashMap<SaleKey, SaleResult> = HashMap::with_capacity(results.len());
    for result in results {
        by_key.entry(result.key.clone()).or_insert(result);
    }

    let mut outcome = MergeOutcome::default();
    let mut emitted = HashSet::new();
    for (sale, market) in sales {
        let key = sale.key();
        if !emitted.insert(key.clone()) {
            continue;
        }
        let record = match by_key.remove(&key) {
            Some(result) => {
                CorrelationRecord::new(sale, result.social, result.sentiment, market.clone())
            }
            None => {
                outcome.zero_filled += 1;
                CorrelationRecord::zero_filled(sale, market.clone())
            }
        };
        outcome.records.push(record);
    }

    let mut unmatched: Vec<SaleKey> = by_key.into_keys().collect();
    unmatched.sort();
    for key in &unmatched {
        warn!(key = %key, "Result has no matching sale");
    }
    outcome.unmatched = unmatched;
    outcome
}
