//! Grounded prompt construction.
//!
//! The system prompt embeds the top matcher candidates as evidence ahead
//! of the user's question. When the corpus is empty the evidence block is
//! replaced by a "no data available" notice and the model answers from
//! general knowledge.

use error_guide_core::ScoredCandidate;
use std::fmt::Write;

pub const NO_DATA_NOTICE: &str = "No error database data is available.";

/// Build the system prompt for one chat turn.
pub fn build_system_prompt(candidates: &[ScoredCandidate], answer_language: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are an assistant that helps users resolve installation and runtime errors.\n");
    prompt.push_str(
        "Use the error records below to find the error that matches the user's question \
         and explain the fix step by step. If the user only describes symptoms, infer the \
         closest matching record. Link the record's page when you use it.\n",
    );
    let _ = writeln!(prompt, "Answer in {}. Keep answers concise.", answer_language);
    prompt.push('\n');
    prompt.push_str("=== Error records ===\n");
    prompt.push_str(&render_evidence(candidates));
    prompt
}

/// Render candidates as a compact evidence block.
pub fn render_evidence(candidates: &[ScoredCandidate]) -> String {
    if candidates.is_empty() {
        return format!("{}\n", NO_DATA_NOTICE);
    }

    let mut out = String::new();
    for (i, c) in candidates.iter().enumerate() {
        let r = &c.record;
        let _ = writeln!(out, "[{}] {} ({})", i + 1, r.title, r.id);
        let _ = writeln!(out, "Category: {}", r.category);
        if !r.error.is_empty() {
            let _ = writeln!(out, "Error: {}", r.error);
        }
        if !r.symptoms.is_empty() {
            let _ = writeln!(out, "Symptoms: {}", r.symptoms.join("; "));
        }
        for s in &r.solutions {
            let _ = writeln!(out, "Solution: {}", s);
        }
        let _ = writeln!(out, "Page: {}", r.url);
        out.push('\n');
    }
    out
}
