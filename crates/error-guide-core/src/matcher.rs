//! Keyword relevance matcher over the flattened error corpus.
//!
//! # Scoring Algorithm
//!
//! 1. Lowercase the query and split it on whitespace into query words.
//! 2. Build a search text per record: title, error, symptoms, category,
//!    and solution summaries, lowercased and space-joined.
//! 3. Base score = number of distinct query words found as substrings
//!    of the search text (a word inside a longer corpus word counts).
//! 4. `+5` when the record has an error string and the lowercased query
//!    contains all of it.
//! 5. `+3` when the record id appears in the lowercased query.
//! 6. Stable sort by score descending, so ties keep corpus order.
//!
//! [`Matcher::top_matches`] then keeps up to 10 records with a positive
//! score, falling back to the unfiltered top 5 when fewer than 3 qualify
//! so that a grounded prompt always has some context.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::ErrorRecord;

/// Score added when the query contains the record's full error string.
pub const ERROR_MATCH_BOOST: u32 = 5;
/// Score added when the query contains the record id.
pub const ID_MATCH_BOOST: u32 = 3;
/// Maximum number of positively scored records returned.
pub const MAX_MATCHES: usize = 10;
/// Below this many positive matches, fall back to the unfiltered top.
pub const MIN_MATCHES: usize = 3;
/// Size of the unfiltered fallback.
pub const FALLBACK_MATCHES: usize = 5;

/// A corpus record paired with its relevance score for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub record: ErrorRecord,
    pub score: u32,
}

/// Immutable corpus plus precomputed lowercase search texts.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    records: Vec<ErrorRecord>,
    search_texts: Vec<String>,
}

impl Matcher {
    /// Build a matcher over `records`. An empty corpus is valid.
    pub fn new(records: Vec<ErrorRecord>) -> Self {
        let search_texts = records.iter().map(search_text).collect();
        Self {
            records,
            search_texts,
        }
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Score every record and return them all, best first.
    pub fn rank(&self, query: &str) -> Vec<ScoredCandidate> {
        let query = query.to_lowercase();
        let mut seen = HashSet::new();
        let words: Vec<&str> = query
            .split_whitespace()
            .filter(|w| seen.insert(*w))
            .collect();

        let mut scored: Vec<ScoredCandidate> = self
            .records
            .iter()
            .zip(&self.search_texts)
            .map(|(record, text)| ScoredCandidate {
                score: score_record(record, text, &query, &words),
                record: record.clone(),
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored
    }

    /// Positively scored records only, at most [`MAX_MATCHES`], no fallback.
    pub fn strict_matches(&self, query: &str) -> Vec<ScoredCandidate> {
        self.rank(query)
            .into_iter()
            .filter(|c| c.score > 0)
            .take(MAX_MATCHES)
            .collect()
    }

    /// Records to ground a prompt with.
    ///
    /// Up to [`MAX_MATCHES`] records with a positive score; if fewer than
    /// [`MIN_MATCHES`] qualify, the first [`FALLBACK_MATCHES`] of the full
    /// ranking instead, even at score zero.
    pub fn top_matches(&self, query: &str) -> Vec<ScoredCandidate> {
        let ranked = self.rank(query);
        let positive = ranked.iter().take_while(|c| c.score > 0).count();
        if positive >= MIN_MATCHES {
            ranked.into_iter().take(positive.min(MAX_MATCHES)).collect()
        } else {
            ranked.into_iter().take(FALLBACK_MATCHES).collect()
        }
    }
}

/// Lowercased concatenation of every searchable field of a record.
pub fn search_text(record: &ErrorRecord) -> String {
    [
        record.title.as_str(),
        record.error.as_str(),
        &record.symptoms.join(" "),
        record.category.as_str(),
        &record.solutions.join(" "),
    ]
    .join(" ")
    .to_lowercase()
}

/// Score a record against an already lowercased query.
///
/// `words` must be the distinct whitespace-separated words of `query`.
pub fn score_record(record: &ErrorRecord, text: &str, query: &str, words: &[&str]) -> u32 {
    let mut score = words.iter().filter(|w| text.contains(*w)).count() as u32;
    if !record.error.is_empty() && query.contains(&record.error.to_lowercase()) {
        score += ERROR_MATCH_BOOST;
    }
    if !record.id.is_empty() && query.contains(record.id.as_str()) {
        score += ID_MATCH_BOOST;
    }
    score
}
