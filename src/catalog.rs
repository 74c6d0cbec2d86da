//! Category listing and single-error lookup.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use error_guide_core::models::ErrorEntry;
use error_guide_core::ErrorDatabase;

use crate::config::Config;
use crate::corpus::KnowledgeBase;
use crate::error::GuideError;
use crate::search::render_entry_markdown;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryList {
    pub version: String,
    pub total_errors: usize,
    pub total_solutions: usize,
    pub categories: Vec<CategorySummary>,
}

/// One category with its full entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryErrors {
    pub category: String,
    #[serde(rename = "categoryId")]
    pub category_id: String,
    pub errors: Vec<ErrorEntry>,
}

/// A single entry located by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub category: String,
    #[serde(rename = "categoryId")]
    pub category_id: String,
    pub url: String,
    #[serde(flatten)]
    pub entry: ErrorEntry,
}

/// Category ids, names, and sizes, with corpus totals computed from the
/// loaded data.
pub fn list_categories(db: &ErrorDatabase) -> CategoryList {
    CategoryList {
        version: db.metadata.version.clone(),
        total_errors: db.error_count(),
        total_solutions: db.solution_count(),
        categories: db
            .categories
            .iter()
            .map(|c| CategorySummary {
                id: c.id.clone(),
                name: c.name.clone(),
                count: c.errors.len(),
            })
            .collect(),
    }
}

pub fn get_category(db: &ErrorDatabase, id: &str) -> Result<CategoryErrors, GuideError> {
    let cat = db
        .category(id)
        .ok_or_else(|| GuideError::not_found(format!("Category not found: {}", id)))?;
    Ok(CategoryErrors {
        category: cat.name.clone(),
        category_id: cat.id.clone(),
        errors: cat.errors.clone(),
    })
}

pub fn get_error(db: &ErrorDatabase, id: &str) -> Result<ErrorDetail, GuideError> {
    let (cat, entry) = db
        .find_error(id)
        .ok_or_else(|| GuideError::not_found(format!("Error not found: {}", id)))?;
    Ok(ErrorDetail {
        category: cat.name.clone(),
        category_id: cat.id.clone(),
        url: format!("pages/{}.html#error-{}", cat.slug(), entry.id),
        entry: entry.clone(),
    })
}

pub fn run_categories(config: &Config) -> Result<()> {
    let kb = KnowledgeBase::load(config);
    let list = list_categories(&kb.db);

    if list.categories.is_empty() {
        println!("No categories.");
        return Ok(());
    }

    println!(
        "{:<16} {:>6}  NAME",
        "ID", "ERRORS"
    );
    for c in &list.categories {
        println!("{:<16} {:>6}  {}", c.id, c.count, c.name);
    }
    println!();
    println!(
        "{} errors, {} solutions",
        list.total_errors, list.total_solutions
    );
    Ok(())
}

pub fn run_get(config: &Config, id: &str, json: bool) -> Result<()> {
    let kb = KnowledgeBase::load(config);
    let detail = get_error(&kb.db, id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    println!("--- Error ---");
    println!("id:       {}", detail.entry.id);
    println!("category: {}", detail.category);
    println!("url:      {}", detail.url);
    println!();
    print!("{}", render_entry_markdown(&detail.entry, "#"));
    Ok(())
}
