//! Search terms for a sale, most specific first.
//!
//! The collector only searches the first few terms, so the order here is the
//! search plan. Output must be identical for identical input.

use std::collections::HashSet;

use salesignal_common::SaleEvent;

/// Last-resort term when nothing more specific is found.
pub const FALLBACK_TERM: &str = "NFT";

/// Slug fragment (dashes removed) → extra terms. First match wins, so the
/// more specific fragments come first.
const ALIASES: &[(&str, &[&str])] = &[
    ("boredapekennel", &["BAKC", "#BAKC", "Bored Ape Kennel Club"]),
    ("boredape", &["BAYC", "#BAYC", "Bored Ape Yacht Club"]),
    ("mutantape", &["MAYC", "#MAYC", "Mutant Ape Yacht Club"]),
    ("pudgypenguin", &["Pudgy Penguins", "#PudgyPenguins", "Pudgy"]),
    ("cryptopunk", &["CryptoPunks", "#CryptoPunks", "Punks"]),
    ("azuki", &["Azuki", "#Azuki"]),
    ("doodles", &["Doodles", "#Doodles"]),
    ("clonex", &["CloneX", "#CloneX", "RTFKT"]),
    ("moonbird", &["Moonbirds", "#Moonbirds"]),
    ("otherdeed", &["Otherdeed", "#Otherside"]),
];

const GENERIC_NAMES: &[&str] = &["nft", "unnamed", "untitled", "unknown", "null"];

pub fn build(sale: &SaleEvent) -> Vec<String> {
    let mut terms = Vec::new();

    let name = sale.display_name();
    if is_generic(&name) {
        terms.push(sale.synthesized_name());
    } else {
        terms.push(name);
    }

    let collection_name = sale.collection_display_name();
    let hashtag = hashtag(&collection_name);
    terms.push(collection_name);
    if let Some(tag) = hashtag {
        terms.push(tag);
    }

    if let Some(aliases) = aliases_for(&sale.collection) {
        terms.extend(aliases.iter().map(|a| a.to_string()));
    }

    terms.push(FALLBACK_TERM.to_string());

    dedup_case_insensitive(terms)
}

/// Names that say nothing about the item: bare numbers, `#1234`, or
/// placeholders.
fn is_generic(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty()
        || trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || c == '#' || c.is_whitespace())
        || GENERIC_NAMES.contains(&trimmed.to_lowercase().as_str())
}

fn hashtag(name: &str) -> Option<String> {
    let stripped: String = name.chars().filter(|c| c.is_alphanumeric()).collect();
    (!stripped.is_empty()).then(|| format!("#{stripped}"))
}

fn aliases_for(slug: &str) -> Option<&'static [&'static str]> {
    let compact: String = slug
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    ALIASES
        .iter()
        .find(|(fragment, _)| compact.contains(fragment))
        .map(|(_, aliases)| *aliases)
}

fn dedup_case_insensitive(terms: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .collect()
}
