use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use salesignal_common::{PipelineError, SaleEvent, SocialPost};

use crate::keywords;
use crate::pacing::pause;
use crate::traits::PostSearcher;

/// Characters of normalized text used to fingerprint posts without an ID.
const FINGERPRINT_CHARS: usize = 100;

/// Closed interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `hours` leading up to (and including) `end`. Negative hours give
    /// the single instant `end`; spans past chrono's range start at its
    /// minimum.
    pub fn ending_at(end: DateTime<Utc>, hours: i64) -> Self {
        let start = chrono::Duration::try_hours(hours.max(0))
            .and_then(|span| end.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start, end }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Trimmed, whitespace-collapsed, lower-cased, first 100 characters.
pub fn fingerprint(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .take(FINGERPRINT_CHARS)
        .collect()
}

/// First-occurrence-wins dedup by post ID, falling back to the text
/// fingerprint for posts without one.
#[derive(Debug, Default)]
pub struct Deduplicator {
    ids: HashSet<String>,
    fingerprints: HashSet<String>,
}

impl Deduplicator {
    /// Returns `true` if the post is new and should be kept.
    pub fn admit(&mut self, post: &SocialPost) -> bool {
        let print = fingerprint(&post.text);
        match post.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => {
                if !self.ids.insert(id.to_string()) {
                    return false;
                }
                self.fingerprints.insert(print);
                true
            }
            None => self.fingerprints.insert(print),
        }
    }
}

/// Drop repeats, keeping the first occurrence of each.
pub fn dedup(posts: Vec<SocialPost>) -> Vec<SocialPost> {
    let mut seen = Deduplicator::default();
    posts.into_iter().filter(|p| seen.admit(p)).collect()
}

/// Runs the keyword search plan for a sale and returns the surviving posts.
pub struct SocialSignalCollector {
    searcher: Arc<dyn PostSearcher>,
    max_strategies: usize,
    search_limit: u32,
    search_delay: Duration,
    cancelled: Arc<AtomicBool>,
}

impl SocialSignalCollector {
    pub fn new(searcher: Arc<dyn PostSearcher>, search_limit: u32) -> Self {
        Self {
            searcher,
            max_strategies: 3,
            search_limit,
            search_delay: Duration::ZERO,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_max_strategies(mut self, max: usize) -> Self {
        self.max_strategies = max.max(1);
        self
    }

    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = delay;
        self
    }

    pub fn with_cancellation(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Search the first few strategies for `sale`, dedup, keep posts inside
    /// `window`, and cap at `max_results` when given.
    ///
    /// A failing strategy is logged and skipped. Only credential failures
    /// propagate.
    pub async fn collect(
        &self,
        sale: &SaleEvent,
        window: TimeWindow,
        max_results: Option<usize>,
    ) -> Result<Vec<SocialPost>, PipelineError> {
        let strategies: Vec<String> = keywords::build(sale)
            .into_iter()
            .take(self.max_strategies)
            .collect();

        let mut seen = Deduplicator::default();
        let mut gathered: Vec<SocialPost> = Vec::new();
        let mut failed = 0usize;

        for (i, term) in strategies.iter().enumerate() {
            if max_results.is_some_and(|max| gathered.len() >= max) {
                debug!(term = term.as_str(), "Post ceiling reached, skipping remaining strategies");
                break;
            }
            if i > 0 && !pause(self.search_delay, &self.cancelled).await {
                break;
            }
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }

            match self.searcher.search(term, &window, self.search_limit).await {
                Ok(posts) => {
                    let found = posts.len();
                    let before = gathered.len();
                    for mut post in posts {
                        post.search_term = term.clone();
                        if seen.admit(&post) {
                            gathered.push(post);
                        }
                    }
                    debug!(term = term.as_str(), found, new = gathered.len() - before, "Search complete");
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    failed += 1;
                    warn!(term = term.as_str(), error = %e, "Search strategy failed, trying next");
                }
            }
        }

        let gathered_count = gathered.len();
        let mut posts: Vec<SocialPost> = gathered
            .into_iter()
            .filter(|p| window.contains(p.created_at))
            .collect();
        if let Some(max) = max_results {
            posts.truncate(max);
        }

        info!(
            collection = sale.collection.as_str(),
            token = sale.token_id.as_str(),
            strategies = strategies.len(),
            failed,
            gathered = gathered_count,
            kept = posts.len(),
            "Collected social posts"
        );
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(id: Option<&str>, text: &str) -> SocialPost {
        SocialPost {
            id: id.map(String::from),
            author_id: "a".into(),
            author_handle: None,
            text: text.into(),
            created_at: Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap(),
            reposts: 0,
            favorites: 0,
            replies: 0,
            search_term: String::new(),
        }
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let posts = dedup(vec![
            post(Some("A"), "first"),
            post(Some("A"), "second"),
            post(None, "hello world this is a test post"),
        ]);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].text, "first");
    }

    #[test]
    fn fingerprint_normalizes_whitespace_and_case() {
        assert_eq!(fingerprint("  Hello\n\tWORLD  "), "hello world");
        let long = "x".repeat(300);
        assert_eq!(fingerprint(&long).chars().count(), 100);
    }

    #[test]
    fn id_less_posts_dedup_by_fingerprint() {
        let posts = dedup(vec![
            post(None, "Floor is going up"),
            post(None, "floor   is going UP"),
            post(None, "floor is going down"),
        ]);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].text, "Floor is going up");
    }

    #[test]
    fn window_is_inclusive() {
        let end = Utc.with_ymd_and_hms(2024, 6, 10, 18, 0, 0).unwrap();
        let window = TimeWindow::ending_at(end, 24);
        assert!(window.contains(end));
        assert!(window.contains(end - chrono::Duration::hours(24)));
        assert!(!window.contains(end + chrono::Duration::seconds(1)));
        assert!(!window.contains(end - chrono::Duration::hours(24) - chrono::Duration::seconds(1)));
    }

    #[test]
    fn out_of_range_hours_do_not_panic() {
        let end = Utc.with_ymd_and_hms(2024, 6, 10, 18, 0, 0).unwrap();
        let empty = TimeWindow::ending_at(end, -5);
        assert_eq!(empty.start, end);
        assert!(empty.contains(end));

        let huge = TimeWindow::ending_at(end, i64::MAX);
        assert_eq!(huge.start, DateTime::<Utc>::MIN_UTC);
        assert!(huge.contains(end - chrono::Duration::days(365 * 100)));
    }
}
