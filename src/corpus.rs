//! Corpus loading.
//!
//! The error database is read once at startup. A missing or malformed
//! file is not fatal: the service starts in degraded mode with an empty
//! corpus, where matching returns nothing and prompts say no data is
//! available.

use std::path::Path;

use error_guide_core::{ErrorDatabase, Matcher};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{GuideError, Result};

/// The loaded corpus in both its structured and flattened forms.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    pub db: ErrorDatabase,
    pub matcher: Matcher,
}

impl KnowledgeBase {
    pub fn new(db: ErrorDatabase) -> Self {
        let matcher = Matcher::new(db.flatten());
        Self { db, matcher }
    }

    /// Load the corpus named in the config, degrading to empty on failure.
    pub fn load(config: &Config) -> Self {
        Self::new(load_or_empty(&config.corpus.path))
    }

    pub fn is_degraded(&self) -> bool {
        self.matcher.is_empty()
    }
}

/// Read and parse `errors.json`.
pub fn load_database(path: &Path) -> Result<ErrorDatabase> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| GuideError::CorpusLoad(format!("{}: {}", path.display(), e)))?;
    ErrorDatabase::from_json(&json)
        .map_err(|e| GuideError::CorpusLoad(format!("{}: {:#}", path.display(), e)))
}

/// Like [`load_database`], but logs and returns an empty database on error.
pub fn load_or_empty(path: &Path) -> ErrorDatabase {
    match load_database(path) {
        Ok(db) => {
            info!(
                path = %path.display(),
                categories = db.categories.len(),
                errors = db.error_count(),
                "corpus loaded"
            );
            db
        }
        Err(e) => {
            warn!(error = %e, "continuing with an empty corpus");
            ErrorDatabase::empty()
        }
    }
}
