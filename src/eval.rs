//! Matcher evaluation harness.
//!
//! Generates probe questions for every corpus record and checks whether
//! strict matching retrieves the record for its own probes. The probes
//! mimic how users ask: the title, each symptom, the literal error, the
//! id, and short natural-language rephrasings of the title.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

use error_guide_core::{ErrorRecord, Matcher};

use crate::config::Config;
use crate::corpus::KnowledgeBase;

/// Every record gets at least this many probes before deduplication.
pub const MIN_QUESTIONS: usize = 8;
/// Failures printed by `run_eval`; the JSON report keeps all of them.
pub const SHOWN_FAILURES: usize = 30;

// Rephrasing suffixes: "fix", "error", "doesn't work", "problem".
const SUFFIX_FIX: &str = " 해결";
const SUFFIX_ERROR: &str = " 오류";
const SUFFIX_BROKEN: &str = " 안돼요";
const SUFFIX_PROBLEM: &str = " 문제";

/// Probe questions for one record, deduplicated in first-seen order.
pub fn generate_questions(record: &ErrorRecord) -> Vec<String> {
    let mut questions: Vec<String> = vec![record.title.clone()];
    questions.extend(record.symptoms.iter().cloned());
    if !record.error.is_empty() {
        questions.push(record.error.clone());
    }
    questions.push(record.id.clone());

    let title = &record.title;
    let unparenthesized: String = title
        .chars()
        .map(|c| if matches!(c, '(' | ')' | '（' | '）') { ' ' } else { c })
        .collect();
    let head = title.split(['(', '/']).next().unwrap_or("").trim();
    questions.push(format!("{}{}", unparenthesized.trim(), SUFFIX_FIX));
    questions.push(format!("{}{}", head, SUFFIX_ERROR));
    questions.push(format!("{}{}", head, SUFFIX_BROKEN));

    // beginner style: the first two longer words
    let beginner = title
        .split(|c: char| c.is_whitespace() || c == '(' || c == '/')
        .filter(|w| w.chars().count() > 2)
        .take(2)
        .collect::<Vec<_>>()
        .join(" ");
    if beginner.chars().count() > 3 {
        questions.push(beginner);
    }

    if questions.len() < MIN_QUESTIONS {
        let subset = title
            .split_whitespace()
            .filter(|w| w.chars().count() > 1)
            .take(3)
            .collect::<Vec<_>>()
            .join(" ");
        while questions.len() < MIN_QUESTIONS {
            questions.push(format!("{} {}", record.category, subset));
            if questions.len() < MIN_QUESTIONS {
                questions.push(format!("{}{}", subset, SUFFIX_PROBLEM));
            }
        }
    }

    let mut seen = HashSet::new();
    questions.retain(|q| seen.insert(q.clone()));
    questions
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalSummary {
    pub total: usize,
    pub pass: usize,
    pub fail: usize,
    pub pass_rate: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NeverMatched {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalFailure {
    pub target_id: String,
    pub target_title: String,
    pub query: String,
    /// Up to three `id(score)` entries.
    pub top_matches: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalReport {
    pub summary: EvalSummary,
    pub records: usize,
    pub never_matched: Vec<NeverMatched>,
    pub failures: Vec<EvalFailure>,
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Run every record's probes through strict matching.
pub fn evaluate(matcher: &Matcher) -> EvalReport {
    let mut total = 0;
    let mut pass = 0;
    let mut failures = Vec::new();
    let mut never_matched = Vec::new();

    for record in matcher.records() {
        let mut any_passed = false;
        for q in generate_questions(record) {
            total += 1;
            let matches = matcher.strict_matches(&q);
            if matches.iter().any(|m| m.record.id == record.id) {
                pass += 1;
                any_passed = true;
            } else {
                failures.push(EvalFailure {
                    target_id: record.id.clone(),
                    target_title: record.title.clone(),
                    query: q,
                    top_matches: matches
                        .iter()
                        .take(3)
                        .map(|m| format!("{}({})", m.record.id, m.score))
                        .collect(),
                });
            }
        }
        if !any_passed {
            never_matched.push(NeverMatched {
                id: record.id.clone(),
                title: record.title.clone(),
            });
        }
    }

    EvalReport {
        summary: EvalSummary {
            total,
            pass,
            fail: total - pass,
            pass_rate: format!("{:.1}%", percent(pass, total)),
        },
        records: matcher.len(),
        never_matched,
        failures,
    }
}

pub fn run_eval(config: &Config, report_path: Option<&Path>) -> Result<()> {
    let kb = KnowledgeBase::load(config);
    let report = evaluate(&kb.matcher);
    let s = &report.summary;

    println!("=== MATCHER EVALUATION ===");
    println!("Total probes: {}", s.total);
    println!("Pass: {} ({:.1}%)", s.pass, percent(s.pass, s.total));
    println!("Fail: {} ({:.1}%)", s.fail, percent(s.fail, s.total));
    println!("Errors tested: {}", report.records);
    println!("Errors never matched: {}", report.never_matched.len());

    if !report.never_matched.is_empty() {
        println!("\n=== NEVER MATCHED ===");
        for e in &report.never_matched {
            println!("  {}: {}", e.id, e.title);
        }
    }

    if !report.failures.is_empty() {
        println!("\n=== FAILED PROBES (first {}) ===", SHOWN_FAILURES);
        for f in report.failures.iter().take(SHOWN_FAILURES) {
            let query: String = f.query.chars().take(60).collect();
            println!(
                "  [{}] \"{}\" → top: {}",
                f.target_id,
                query,
                f.top_matches.join(", ")
            );
        }
    }

    if let Some(path) = report_path {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!("\nReport written to {}", path.display());
    }
    Ok(())
}
