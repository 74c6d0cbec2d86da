//! Keyword search and ranked matching over the corpus.
//!
//! Two retrieval paths share the corpus:
//!
//! - **Keyword search** ([`search_errors`]): a record matches when every
//!   whitespace-separated term is a substring of its title, symptoms,
//!   cause, and solution titles. Results keep corpus order.
//! - **Ranked matching** ([`match_errors`]): the relevance matcher's top
//!   matches, scored and sorted, as used to ground chat answers.
//!
//! `run_search` and `run_match` print Markdown/plain results for the CLI.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use error_guide_core::models::ErrorEntry;
use error_guide_core::{ErrorDatabase, ScoredCandidate};

use crate::config::Config;
use crate::corpus::KnowledgeBase;
use crate::error::GuideError;

/// One keyword-search hit: the full entry tagged with its category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub category: String,
    #[serde(rename = "categoryId")]
    pub category_id: String,
    #[serde(flatten)]
    pub entry: ErrorEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub count: usize,
    pub results: Vec<SearchHit>,
}

/// All-terms keyword search. An empty query is a validation error.
pub fn search_errors(db: &ErrorDatabase, query: &str) -> Result<SearchResponse, GuideError> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return Err(GuideError::validation("Missing query parameter: q"));
    }
    let terms: Vec<&str> = q.split_whitespace().collect();

    let results: Vec<SearchHit> = db
        .categories
        .iter()
        .flat_map(|cat| cat.errors.iter().map(move |err| (cat, err)))
        .filter(|(_, err)| {
            let text = err.keyword_text();
            terms.iter().all(|t| text.contains(t))
        })
        .map(|(cat, err)| SearchHit {
            category: cat.name.clone(),
            category_id: cat.id.clone(),
            entry: err.clone(),
        })
        .collect();

    Ok(SearchResponse {
        query: q,
        count: results.len(),
        results,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResponse {
    pub query: String,
    pub count: usize,
    pub matches: Vec<ScoredCandidate>,
}

/// Ranked matches for `query`. `strict` disables the low-recall fallback.
pub fn match_errors(kb: &KnowledgeBase, query: &str, strict: bool) -> MatchResponse {
    let matches = if strict {
        kb.matcher.strict_matches(query)
    } else {
        kb.matcher.top_matches(query)
    };
    MatchResponse {
        query: query.to_string(),
        count: matches.len(),
        matches,
    }
}

/// Render one entry as Markdown, shared by search output and the full
/// reference export.
pub fn render_entry_markdown(entry: &ErrorEntry, heading: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", heading, entry.title));
    out.push_str(&format!("- Severity: {}\n", entry.severity_label()));
    if let Some(t) = &entry.solve_time {
        out.push_str(&format!("- Solve Time: {}min\n", t));
    }
    if let Some(e) = entry.error.as_deref().filter(|e| !e.is_empty()) {
        out.push_str(&format!("- Error: `{}`\n", e));
    }
    out.push('\n');

    if !entry.symptoms.is_empty() {
        out.push_str("**Symptoms:**\n");
        for s in &entry.symptoms {
            out.push_str(&format!("- {}\n", s));
        }
        out.push('\n');
    }
    if !entry.cause.is_empty() {
        out.push_str(&format!("**Cause:** {}\n\n", entry.cause));
    }
    if !entry.solutions.is_empty() {
        out.push_str("**Solutions:**\n\n");
        for sol in &entry.solutions {
            out.push_str(&format!(
                "{}# Method {}: {} (trust: {})\n",
                heading,
                sol.method,
                sol.title,
                sol.trust_stars()
            ));
            out.push_str("```bash\n");
            out.push_str(&sol.steps.join("\n"));
            out.push_str("\n```\n\n");
        }
    }
    out
}

pub fn run_search(config: &Config, query: &str) -> Result<()> {
    let kb = KnowledgeBase::load(config);
    let response = search_errors(&kb.db, query)?;

    if response.results.is_empty() {
        println!("No results found for: \"{}\"", response.query);
        return Ok(());
    }

    println!(
        "# Search Results: \"{}\" ({} found)\n",
        response.query, response.count
    );
    for hit in &response.results {
        let mut md = render_entry_markdown(&hit.entry, "##");
        // category line goes right under the heading
        if let Some(pos) = md.find('\n') {
            md.insert_str(pos + 1, &format!("- Category: {}\n", hit.category));
        }
        print!("{}", md);
    }
    Ok(())
}

pub fn run_match(config: &Config, query: &str, strict: bool, json: bool) -> Result<()> {
    let kb = KnowledgeBase::load(config);
    let response = match_errors(&kb, query, strict);

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.matches.is_empty() {
        println!("No matches.");
        return Ok(());
    }

    for (i, c) in response.matches.iter().enumerate() {
        println!("{}. [{}] {} / {}", i + 1, c.score, c.record.category, c.record.title);
        println!("    id: {}", c.record.id);
        if !c.record.error.is_empty() {
            println!("    error: {}", c.record.error);
        }
        println!("    url: {}", c.record.url);
        println!();
    }
    Ok(())
}
