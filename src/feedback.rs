//! Answer feedback collection.
//!
//! A feedback submission records whether a chat answer helped. Records
//! are written to a [`FeedbackSink`]: Firestore when configured,
//! otherwise the structured log.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::error::{GuideError, Result};
use crate::firestore::{bool_value, string_value, FirestoreClient};

pub const MAX_QUESTION_CHARS: usize = 500;
pub const MAX_ANSWER_CHARS: usize = 2000;

/// Inbound feedback body. `helpful` is kept loosely typed so a non-boolean
/// value is a validation error rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub helpful: Option<Value>,
}

/// A validated, truncated feedback record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub question: String,
    pub answer: String,
    pub helpful: bool,
    pub timestamp: String,
}

impl FeedbackRecord {
    pub fn from_request(req: FeedbackRequest) -> Result<Self> {
        let question = req.question.filter(|q| !q.is_empty());
        let helpful = req.helpful.as_ref().and_then(Value::as_bool);
        let (Some(question), Some(helpful)) = (question, helpful) else {
            return Err(GuideError::validation("question and helpful required"));
        };

        Ok(Self {
            question: truncate_chars(&question, MAX_QUESTION_CHARS),
            answer: truncate_chars(req.answer.as_deref().unwrap_or(""), MAX_ANSWER_CHARS),
            helpful,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        })
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn record(&self, feedback: &FeedbackRecord) -> Result<()>;
}

/// Writes each record to the log at `info`.
pub struct LogFeedbackSink;

#[async_trait]
impl FeedbackSink for LogFeedbackSink {
    async fn record(&self, feedback: &FeedbackRecord) -> Result<()> {
        info!(
            helpful = feedback.helpful,
            question = %feedback.question,
            answer_chars = feedback.answer.chars().count(),
            "feedback received"
        );
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Default)]
pub struct MemoryFeedbackSink {
    records: Mutex<Vec<FeedbackRecord>>,
}

impl MemoryFeedbackSink {
    pub fn records(&self) -> Vec<FeedbackRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl FeedbackSink for MemoryFeedbackSink {
    async fn record(&self, feedback: &FeedbackRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(feedback.clone());
        Ok(())
    }
}

/// Creates one document per record in the `feedback` collection.
pub struct FirestoreFeedbackSink {
    client: Arc<FirestoreClient>,
}

impl FirestoreFeedbackSink {
    pub fn new(client: Arc<FirestoreClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedbackSink for FirestoreFeedbackSink {
    async fn record(&self, feedback: &FeedbackRecord) -> Result<()> {
        let mut fields = Map::new();
        fields.insert("question".into(), string_value(&feedback.question));
        fields.insert("answer".into(), string_value(&feedback.answer));
        fields.insert("helpful".into(), bool_value(feedback.helpful));
        fields.insert("timestamp".into(), string_value(&feedback.timestamp));
        self.client.create_document("feedback", None, fields).await
    }
}

/// Validate and store one submission.
pub async fn submit_feedback(sink: &dyn FeedbackSink, req: FeedbackRequest) -> Result<()> {
    let record = FeedbackRecord::from_request(req)?;
    sink.record(&record).await
}
