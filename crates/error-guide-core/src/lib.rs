//! # Error Guide Core
//!
//! Pure logic shared by the Error Guide server, CLI, and tooling:
//! corpus models and their flattened matcher projection, the keyword
//! relevance matcher, and the bounded TTL response cache.
//!
//! This crate performs no network or filesystem I/O and pulls in no
//! async runtime. Callers load the corpus and hand it over as values.

pub mod cache;
pub mod matcher;
pub mod models;

pub use cache::{normalize_query, ResponseCache};
pub use matcher::{Matcher, ScoredCandidate};
pub use models::{ErrorDatabase, ErrorRecord};
