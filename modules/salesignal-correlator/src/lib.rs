pub mod collector;
pub mod keywords;
pub mod merge;
pub mod orchestrator;
pub mod pacing;
pub mod sentiment;
pub mod sink;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use collector::{SocialSignalCollector, TimeWindow};
pub use orchestrator::{CorrelationOrchestrator, EventOutcome, RunOutcome, Stage};
pub use sentiment::SentimentAggregator;
pub use stats::RunStats;
