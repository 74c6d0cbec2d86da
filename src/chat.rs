//! Chat orchestration: validate, consult the cache, ground, complete.
//!
//! Single-turn requests (empty history after truncation) read and write
//! the response cache keyed by the normalized message. Multi-turn requests
//! always go to the provider and are never cached. Provider failures are
//! returned to the caller and never stored.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use error_guide_core::{normalize_query, ResponseCache};

use crate::config::Config;
use crate::corpus::KnowledgeBase;
use crate::error::{GuideError, Result};
use crate::prompt::build_system_prompt;
use crate::provider::{ChatTurn, CompletionRequest, Providers};

/// Inbound chat request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, rename = "apiKey")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub provider: String,
    /// Present and `true` only when the answer came from the cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

pub struct ChatService {
    kb: Arc<KnowledgeBase>,
    cache: Arc<ResponseCache>,
    providers: Arc<Providers>,
    history_limit: usize,
    answer_language: String,
}

impl ChatService {
    pub fn new(
        kb: Arc<KnowledgeBase>,
        cache: Arc<ResponseCache>,
        providers: Arc<Providers>,
        config: &Config,
    ) -> Self {
        Self {
            kb,
            cache,
            providers,
            history_limit: config.chat.history_limit,
            answer_language: config.chat.answer_language.clone(),
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let message = req.message.trim();
        if message.is_empty() {
            return Err(GuideError::validation("message required"));
        }

        let (kind, provider) = self.providers.select(req.provider.as_deref())?;
        let api_key = req
            .api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.providers.env_api_key(kind))
            .ok_or_else(|| GuideError::validation("apiKey required"))?;

        let history = recent_turns(&req.history, self.history_limit);
        let single_turn = history.is_empty();
        let key = normalize_query(message);

        if single_turn {
            if let Some(answer) = self.cache.get(&key) {
                debug!(provider = %kind, "chat cache hit");
                return Ok(ChatResponse {
                    answer,
                    provider: kind.name().to_string(),
                    cached: Some(true),
                });
            }
        }

        let candidates = self.kb.matcher.top_matches(message);
        let system = build_system_prompt(&candidates, &self.answer_language);

        let answer = provider
            .complete(&CompletionRequest {
                api_key: &api_key,
                system: &system,
                user: message,
                history,
            })
            .await?;

        info!(
            provider = %kind,
            candidates = candidates.len(),
            turns = history.len(),
            "chat answered"
        );

        if single_turn {
            self.cache.put(&key, &answer);
        }

        Ok(ChatResponse {
            answer,
            provider: kind.name().to_string(),
            cached: None,
        })
    }
}

/// The last `limit` turns of `history`.
pub fn recent_turns(history: &[ChatTurn], limit: usize) -> &[ChatTurn] {
    &history[history.len().saturating_sub(limit)..]
}
