//! Corpus data models.
//!
//! [`ErrorDatabase`] mirrors the structured `errors.json` document the
//! guide is authored in. [`ErrorRecord`] is the flattened, read-only
//! projection the relevance matcher works on; [`ErrorDatabase::flatten`]
//! produces it in category order, then error order.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of solutions carried into each flattened record.
pub const SOLUTIONS_PER_RECORD: usize = 2;

/// Root of the structured error corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDatabase {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub total_errors: usize,
    #[serde(default)]
    pub total_solutions: usize,
}

/// A named group of errors (e.g. "Windows", "Network").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

/// A single documented error with its symptoms and ranked solutions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    pub id: String,
    pub title: String,
    /// Literal error code or message, when the error has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solve_time: Option<SolveTime>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub cause: String,
    #[serde(default)]
    pub solutions: Vec<Solution>,
}

fn default_severity() -> String {
    "medium".to_string()
}

/// Estimated time to resolve, in minutes or as free text ("5-10").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SolveTime {
    Minutes(u32),
    Text(String),
}

impl fmt::Display for SolveTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveTime::Minutes(m) => write!(f, "{}", m),
            SolveTime::Text(t) => f.write_str(t),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    #[serde(default)]
    pub method: u32,
    pub title: String,
    /// Confidence from 0 to 3.
    #[serde(default)]
    pub trust_level: u8,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl Solution {
    /// One-line summary: `"<title>: <step> → <step> → …"`.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.title, self.steps.join(" → "))
    }

    /// Trust level as three stars, e.g. `★★☆`.
    pub fn trust_stars(&self) -> String {
        let filled = usize::from(self.trust_level.min(3));
        format!("{}{}", "★".repeat(filled), "☆".repeat(3 - filled))
    }
}

impl ErrorEntry {
    /// Display label for `severity`; unknown values read as medium.
    pub fn severity_label(&self) -> &'static str {
        match self.severity.as_str() {
            "high" => "High",
            "low" => "Low",
            _ => "Medium",
        }
    }

    /// Lowercased text searched by keyword search: title, symptoms,
    /// cause, and solution titles.
    pub fn keyword_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.title.as_str()];
        parts.extend(self.symptoms.iter().map(String::as_str));
        parts.push(self.cause.as_str());
        parts.extend(self.solutions.iter().map(|s| s.title.as_str()));
        parts.join(" ").to_lowercase()
    }
}

impl Category {
    /// URL slug for the category page. Falls back to `"unknown"`.
    pub fn slug(&self) -> &str {
        if self.id.is_empty() {
            "unknown"
        } else {
            &self.id
        }
    }
}

/// Flattened, matcher-facing view of one error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: String,
    pub title: String,
    /// Empty when the error has no literal code/message.
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub category: String,
    #[serde(default)]
    pub solutions: Vec<String>,
    pub url: String,
}

impl ErrorDatabase {
    /// An empty database, used when the corpus cannot be loaded.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse the structured `errors.json` document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid error database JSON")
    }

    pub fn is_empty(&self) -> bool {
        self.categories.iter().all(|c| c.errors.is_empty())
    }

    /// Total number of errors across all categories.
    pub fn error_count(&self) -> usize {
        self.categories.iter().map(|c| c.errors.len()).sum()
    }

    /// Total number of solutions across all errors.
    pub fn solution_count(&self) -> usize {
        self.categories
            .iter()
            .flat_map(|c| c.errors.iter())
            .map(|e| e.solutions.len())
            .sum()
    }

    /// Look up a category by its id.
    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Look up an error by id, returning it with its owning category.
    pub fn find_error(&self, id: &str) -> Option<(&Category, &ErrorEntry)> {
        self.categories
            .iter()
            .find_map(|c| c.errors.iter().find(|e| e.id == id).map(|e| (c, e)))
    }

    /// Project the database into matcher records, preserving order.
    pub fn flatten(&self) -> Vec<ErrorRecord> {
        let mut records = Vec::with_capacity(self.error_count());
        for cat in &self.categories {
            for err in &cat.errors {
                records.push(ErrorRecord {
                    id: err.id.clone(),
                    title: err.title.clone(),
                    error: err.error.clone().unwrap_or_default(),
                    symptoms: err.symptoms.clone(),
                    category: cat.name.clone(),
                    solutions: err
                        .solutions
                        .iter()
                        .take(SOLUTIONS_PER_RECORD)
                        .map(Solution::summary)
                        .collect(),
                    url: format!("pages/{}.html#error-{}", cat.slug(), err.id),
                });
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "metadata": { "version": "2.1", "lastUpdated": "2025-02-01", "totalErrors": 2, "totalSolutions": 3 },
        "categories": [
            {
                "id": "windows",
                "name": "Windows",
                "errors": [
                    {
                        "id": "win-1",
                        "title": "PowerShell execution policy blocked",
                        "severity": "high",
                        "solveTime": 5,
                        "symptoms": ["cannot run scripts"],
                        "cause": "Default policy is Restricted",
                        "solutions": [
                            { "method": 1, "title": "Set-ExecutionPolicy", "trustLevel": 3, "steps": ["Open PowerShell", "Set-ExecutionPolicy RemoteSigned"] },
                            { "method": 2, "title": "Bypass once", "trustLevel": 2, "steps": ["powershell -ExecutionPolicy Bypass"] },
                            { "method": 3, "title": "Use cmd", "trustLevel": 1, "steps": ["cmd /c install.cmd"] }
                        ]
                    }
                ]
            },
            {
                "name": "Common",
                "errors": [
                    {
                        "id": "com-1",
                        "title": "npm permission denied",
                        "error": "EACCES",
                        "solveTime": "5-10",
                        "symptoms": [],
                        "cause": "Global prefix owned by root",
                        "solutions": []
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_and_counts() {
        let db = ErrorDatabase::from_json(SAMPLE).unwrap();
        assert_eq!(db.categories.len(), 2);
        assert_eq!(db.error_count(), 2);
        assert_eq!(db.solution_count(), 3);
        assert_eq!(db.metadata.last_updated, "2025-02-01");
        assert!(!db.is_empty());
    }

    #[test]
    fn test_solve_time_accepts_number_or_text() {
        let db = ErrorDatabase::from_json(SAMPLE).unwrap();
        let (_, win) = db.find_error("win-1").unwrap();
        let (_, com) = db.find_error("com-1").unwrap();
        assert_eq!(win.solve_time, Some(SolveTime::Minutes(5)));
        assert_eq!(com.solve_time.as_ref().unwrap().to_string(), "5-10");
        assert_eq!(com.severity, "medium");
    }

    #[test]
    fn test_flatten_projection() {
        let db = ErrorDatabase::from_json(SAMPLE).unwrap();
        let records = db.flatten();
        assert_eq!(records.len(), 2);

        let win = &records[0];
        assert_eq!(win.id, "win-1");
        assert_eq!(win.error, "");
        assert_eq!(win.category, "Windows");
        assert_eq!(win.url, "pages/windows.html#error-win-1");
        assert_eq!(win.solutions.len(), SOLUTIONS_PER_RECORD);
        assert_eq!(
            win.solutions[0],
            "Set-ExecutionPolicy: Open PowerShell → Set-ExecutionPolicy RemoteSigned"
        );

        let com = &records[1];
        assert_eq!(com.error, "EACCES");
        assert_eq!(com.url, "pages/unknown.html#error-com-1");
        assert!(com.solutions.is_empty());
    }

    #[test]
    fn test_lookups() {
        let db = ErrorDatabase::from_json(SAMPLE).unwrap();
        assert_eq!(db.category("windows").unwrap().name, "Windows");
        assert!(db.category("linux").is_none());
        let (cat, err) = db.find_error("com-1").unwrap();
        assert_eq!(cat.name, "Common");
        assert_eq!(err.title, "npm permission denied");
        assert!(db.find_error("nope").is_none());
    }

    #[test]
    fn test_display_helpers() {
        let db = ErrorDatabase::from_json(SAMPLE).unwrap();
        let (_, win) = db.find_error("win-1").unwrap();
        let (_, com) = db.find_error("com-1").unwrap();
        assert_eq!(win.severity_label(), "High");
        assert_eq!(com.severity_label(), "Medium");
        assert_eq!(win.solutions[0].trust_stars(), "★★★");
        assert_eq!(win.solutions[2].trust_stars(), "★☆☆");
    }

    #[test]
    fn test_keyword_text_covers_cause_and_solution_titles() {
        let db = ErrorDatabase::from_json(SAMPLE).unwrap();
        let (_, win) = db.find_error("win-1").unwrap();
        let text = win.keyword_text();
        assert!(text.contains("restricted"));
        assert!(text.contains("bypass once"));
        assert!(!text.contains("remotesigned"));
    }

    #[test]
    fn test_empty_database() {
        let db = ErrorDatabase::empty();
        assert!(db.is_empty());
        assert!(db.flatten().is_empty());
        let parsed = ErrorDatabase::from_json("{}").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(ErrorDatabase::from_json("not json").is_err());
    }
}
