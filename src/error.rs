//! Error taxonomy shared by the chat, catalog, feedback, and webhook paths.
//!
//! Corpus load failures never reach a caller as errors: they are logged
//! and replaced by an empty corpus (see [`crate::corpus`]). Everything else
//! is propagated with its message intact and mapped to an HTTP status at
//! the server boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuideError {
    /// The corpus file is missing or unparseable.
    #[error("corpus unavailable: {0}")]
    CorpusLoad(String),

    /// A required request field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// A completion provider failed or returned something unusable.
    #[error("{0}")]
    Provider(String),

    #[error("{0}")]
    NotFound(String),

    /// Webhook signature did not verify.
    #[error("{0}")]
    Unauthorized(String),

    /// The document store rejected or failed a request.
    #[error("{0}")]
    Upstream(String),
}

impl GuideError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GuideError::Validation(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        GuideError::Provider(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        GuideError::NotFound(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        GuideError::Upstream(msg.into())
    }
}

/// The request URL is stripped: some vendors carry credentials in it.
impl From<reqwest::Error> for GuideError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            GuideError::Provider(format!("request timed out: {}", e))
        } else {
            GuideError::Provider(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, GuideError>;
