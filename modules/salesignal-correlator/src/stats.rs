use std::collections::BTreeMap;

use salesignal_common::ParseTier;

/// Stats from a correlation run.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub collections_processed: u32,
    pub collections_failed: u32,
    pub sales_fetched: u32,
    pub events_merged: u32,
    pub events_skipped: u32,
    pub events_duplicate: u32,
    pub events_discarded: u32,
    pub posts_collected: u32,
    pub posts_scored: u32,
    pub zero_post_events: u32,
    pub tiers: BTreeMap<String, u32>,
}

impl RunStats {
    pub fn record_tier(&mut self, tier: Option<ParseTier>) {
        let key = tier.map_or_else(|| "none".to_string(), |t| t.to_string());
        *self.tiers.entry(key).or_default() += 1;
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Correlation Run Complete ===")?;
        writeln!(f, "Collections:        {}", self.collections_processed)?;
        writeln!(f, "Collections failed: {}", self.collections_failed)?;
        writeln!(f, "Sales fetched:      {}", self.sales_fetched)?;
        writeln!(f, "Records merged:     {}", self.events_merged)?;
        writeln!(f, "Events skipped:     {}", self.events_skipped)?;
        writeln!(f, "  Duplicates:       {}", self.events_duplicate)?;
        writeln!(f, "  Discarded:        {}", self.events_discarded)?;
        writeln!(f, "Posts collected:    {}", self.posts_collected)?;
        writeln!(f, "Posts scored:       {}", self.posts_scored)?;
        writeln!(f, "Sales w/o posts:    {}", self.zero_post_events)?;
        if !self.tiers.is_empty() {
            writeln!(f, "\nParse tiers:")?;
            for (tier, count) in &self.tiers {
                writeln!(f, "  {tier:<18} {count}")?;
            }
        }
        Ok(())
    }
}
