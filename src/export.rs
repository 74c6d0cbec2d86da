//! Export the corpus as static artifacts.
//!
//! Writes three files into the output directory:
//!
//! - `error-index.json`: the flattened matcher projection, one object per
//!   error, for client-side search.
//! - `llms.txt`: a short index of the guide in the llms.txt format.
//! - `llms-full.txt`: the full Markdown reference with every symptom,
//!   cause, and solution.

use anyhow::Result;
use std::path::Path;

use error_guide_core::ErrorDatabase;

use crate::config::Config;
use crate::corpus::load_database;
use crate::search::render_entry_markdown;

pub const INDEX_FILE: &str = "error-index.json";
pub const LLMS_FILE: &str = "llms.txt";
pub const LLMS_FULL_FILE: &str = "llms-full.txt";

pub fn render_index_json(db: &ErrorDatabase) -> Result<String> {
    Ok(serde_json::to_string_pretty(&db.flatten())?)
}

fn totals_line(db: &ErrorDatabase) -> String {
    format!(
        "{} errors, {} solutions",
        db.error_count(),
        db.solution_count()
    )
}

pub fn render_llms_txt(db: &ErrorDatabase) -> String {
    let mut out = String::from("# Error Guide\n\n");
    out.push_str(&format!(
        "> Installation and setup error guide. {}.\n\n",
        totals_line(db)
    ));
    out.push_str("## Docs\n");
    out.push_str(&format!(
        "- [Full reference]({}): every error and solution\n\n",
        LLMS_FULL_FILE
    ));
    out.push_str("## Categories\n");
    for cat in &db.categories {
        out.push_str(&format!("- {}\n", cat.name));
    }
    out
}

pub fn render_llms_full(db: &ErrorDatabase) -> String {
    let mut out = String::from("# Error Guide - Full Reference\n\n");
    let mut header = format!("> {}", totals_line(db));
    if !db.metadata.version.is_empty() {
        header.push_str(&format!(" | v{}", db.metadata.version));
    }
    if !db.metadata.last_updated.is_empty() {
        header.push_str(&format!(" | {}", db.metadata.last_updated));
    }
    out.push_str(&header);
    out.push_str("\n\n");

    for cat in &db.categories {
        out.push_str(&format!("## {}\n\n", cat.name));
        for entry in &cat.errors {
            out.push_str(&render_entry_markdown(entry, "###"));
        }
    }
    out
}

/// Load the corpus and write all export artifacts into `out_dir`.
///
/// Unlike the server, export refuses to run on an unreadable corpus.
pub fn run_export(config: &Config, out_dir: &Path) -> Result<()> {
    let db = load_database(&config.corpus.path)?;
    std::fs::create_dir_all(out_dir)?;

    std::fs::write(out_dir.join(INDEX_FILE), render_index_json(&db)?)?;
    std::fs::write(out_dir.join(LLMS_FILE), render_llms_txt(&db))?;
    std::fs::write(out_dir.join(LLMS_FULL_FILE), render_llms_full(&db))?;

    eprintln!(
        "Exported {} errors to {} ({}, {}, {})",
        db.error_count(),
        out_dir.display(),
        INDEX_FILE,
        LLMS_FILE,
        LLMS_FULL_FILE
    );
    Ok(())
}
