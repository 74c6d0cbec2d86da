//! Completion provider abstraction.
//!
//! Defines the [`CompletionProvider`] trait and the closed set of vendors
//! behind it ([`ProviderKind`]). The HTTP variants differ only in endpoint,
//! request envelope, auth header, and the JSON path of the answer text:
//!
//! | Provider | Endpoint | Auth | Answer path |
//! |----------|----------|------|-------------|
//! | `openai` | `/v1/chat/completions` | `Authorization: Bearer` | `choices[0].message.content` |
//! | `anthropic` | `/v1/messages` | `x-api-key` | `content[0].text` |
//! | `gemini` | `/v1beta/models/{model}:generateContent` | `x-goog-api-key` | `candidates[0].content.parts[0].text` |
//! | `groq` | `/openai/v1/chat/completions` | `Authorization: Bearer` | `choices[0].message.content` |
//!
//! Any non-2xx status, vendor `error` object, or missing answer field is
//! reported as [`GuideError::Provider`]. There are no retries and no
//! fallback between vendors; a request names one provider, or gets the
//! configured default.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::error::{GuideError, Result};

/// The supported LLM vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    Groq,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::Groq,
    ];

    /// Wire name used in requests, responses, and config.
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Groq => "groq",
        }
    }

    /// Parse a provider name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// Resolve an optional, possibly unknown name to a provider.
    pub fn resolve(name: Option<&str>, default: ProviderKind) -> ProviderKind {
        name.and_then(Self::parse).unwrap_or(default)
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-haiku-20241022",
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::Groq => "llama-3.3-70b-versatile",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
            ProviderKind::Groq => "https://api.groq.com",
        }
    }

    pub fn default_key_env(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One prior turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Everything a provider needs for one completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub api_key: &'a str,
    pub system: &'a str,
    pub user: &'a str,
    pub history: &'a [ChatTurn],
}

/// A backend that turns a grounded prompt into an answer.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn complete(&self, req: &CompletionRequest<'_>) -> Result<String>;
}

// ============ HTTP Provider ============

/// Generation settings shared by all HTTP providers.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f64,
}

/// A vendor HTTP API described by its [`ProviderKind`].
pub struct HttpProvider {
    kind: ProviderKind,
    model: String,
    base_url: String,
    settings: GenerationSettings,
    client: reqwest::Client,
}

/// A fully assembled vendor request, before it is sent.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

impl HttpProvider {
    pub fn new(
        kind: ProviderKind,
        model: impl Into<String>,
        base_url: impl Into<String>,
        settings: GenerationSettings,
        client: reqwest::Client,
    ) -> Self {
        Self {
            kind,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            settings,
            client,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the vendor-specific URL, headers, and JSON body.
    pub fn prepare(&self, req: &CompletionRequest<'_>) -> PreparedRequest {
        let max_tokens = self.settings.max_tokens;
        let temperature = self.settings.temperature;

        match self.kind {
            ProviderKind::OpenAi | ProviderKind::Groq => {
                let path = if self.kind == ProviderKind::Groq {
                    "/openai/v1/chat/completions"
                } else {
                    "/v1/chat/completions"
                };
                let mut messages = vec![json!({ "role": "system", "content": req.system })];
                messages.extend(req.history.iter().map(|t| {
                    json!({ "role": role_name(t.role), "content": t.content })
                }));
                messages.push(json!({ "role": "user", "content": req.user }));
                PreparedRequest {
                    url: format!("{}{}", self.base_url, path),
                    headers: vec![("Authorization", format!("Bearer {}", req.api_key))],
                    body: json!({
                        "model": self.model,
                        "messages": messages,
                        "max_tokens": max_tokens,
                        "temperature": temperature,
                    }),
                }
            }
            ProviderKind::Anthropic => {
                let mut messages: Vec<Value> = req
                    .history
                    .iter()
                    .map(|t| json!({ "role": role_name(t.role), "content": t.content }))
                    .collect();
                messages.push(json!({ "role": "user", "content": req.user }));
                PreparedRequest {
                    url: format!("{}/v1/messages", self.base_url),
                    headers: vec![
                        ("x-api-key", req.api_key.to_string()),
                        ("anthropic-version", "2023-06-01".to_string()),
                    ],
                    body: json!({
                        "model": self.model,
                        "system": req.system,
                        "messages": messages,
                        "max_tokens": max_tokens,
                    }),
                }
            }
            ProviderKind::Gemini => {
                let mut contents: Vec<Value> = req
                    .history
                    .iter()
                    .map(|t| {
                        let role = match t.role {
                            Role::User => "user",
                            Role::Assistant => "model",
                        };
                        json!({ "role": role, "parts": [{ "text": t.content }] })
                    })
                    .collect();
                contents.push(json!({ "role": "user", "parts": [{ "text": req.user }] }));
                PreparedRequest {
                    url: format!(
                        "{}/v1beta/models/{}:generateContent",
                        self.base_url, self.model
                    ),
                    headers: vec![("x-goog-api-key", req.api_key.to_string())],
                    body: json!({
                        "system_instruction": { "parts": [{ "text": req.system }] },
                        "contents": contents,
                        "generationConfig": {
                            "maxOutputTokens": max_tokens,
                            "temperature": temperature,
                        },
                    }),
                }
            }
        }
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// JSON pointer to the answer text in a successful response.
fn answer_pointer(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi | ProviderKind::Groq => "/choices/0/message/content",
        ProviderKind::Anthropic => "/content/0/text",
        ProviderKind::Gemini => "/candidates/0/content/parts/0/text",
    }
}

/// Extract the answer, or the vendor's error message, from a response.
pub fn parse_response(kind: ProviderKind, status: u16, body: &str) -> Result<String> {
    let json: Option<Value> = serde_json::from_str(body).ok();

    if let Some(msg) = json.as_ref().and_then(vendor_error) {
        return Err(GuideError::provider(msg));
    }

    if !(200..300).contains(&status) {
        let detail = body.trim();
        return Err(GuideError::provider(if detail.is_empty() {
            format!("{} API error {}", kind, status)
        } else {
            format!("{} API error {}: {}", kind, status, detail)
        }));
    }

    json.as_ref()
        .and_then(|v| v.pointer(answer_pointer(kind)))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GuideError::provider(format!("{} returned a malformed response", kind)))
}

fn vendor_error(body: &Value) -> Option<String> {
    let err = body.get("error")?;
    if err.is_null() {
        return None;
    }
    Some(
        err.get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string()),
    )
}

#[async_trait]
impl CompletionProvider for HttpProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn complete(&self, req: &CompletionRequest<'_>) -> Result<String> {
        let prepared = self.prepare(req);
        debug!(provider = %self.kind, model = %self.model, "calling completion provider");

        let mut builder = self.client.post(&prepared.url).json(&prepared.body);
        for (name, value) in &prepared.headers {
            builder = builder.header(*name, value);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        parse_response(self.kind, status, &body)
    }
}

// ============ Provider Set ============

/// Dispatch table from [`ProviderKind`] to provider, with a default entry.
pub struct Providers {
    providers: HashMap<ProviderKind, Arc<dyn CompletionProvider>>,
    key_envs: HashMap<ProviderKind, String>,
    default: ProviderKind,
}

impl Providers {
    /// An empty set whose default is `default`.
    pub fn new(default: ProviderKind) -> Self {
        Self {
            providers: HashMap::new(),
            key_envs: HashMap::new(),
            default,
        }
    }

    /// HTTP providers for every vendor, configured from `[chat]` and
    /// `[providers.*]`, sharing one client with the chat timeout.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.chat.timeout_secs))
            .build()?;
        let settings = GenerationSettings {
            max_tokens: config.chat.max_tokens,
            temperature: config.chat.temperature,
        };

        let mut set = Self::new(config.default_provider());
        for kind in ProviderKind::ALL {
            let overrides = config.providers.get(kind);
            let model = overrides
                .model
                .clone()
                .unwrap_or_else(|| kind.default_model().to_string());
            let base_url = overrides
                .base_url
                .clone()
                .unwrap_or_else(|| kind.default_base_url().to_string());
            let key_env = overrides
                .api_key_env
                .clone()
                .unwrap_or_else(|| kind.default_key_env().to_string());

            set.register(Arc::new(HttpProvider::new(
                kind,
                model,
                base_url,
                settings.clone(),
                client.clone(),
            )));
            set.key_envs.insert(kind, key_env);
        }
        Ok(set)
    }

    pub fn register(&mut self, provider: Arc<dyn CompletionProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn default_kind(&self) -> ProviderKind {
        self.default
    }

    /// Pick a provider by name; unknown or missing names get the default.
    pub fn select(&self, name: Option<&str>) -> Result<(ProviderKind, Arc<dyn CompletionProvider>)> {
        let kind = ProviderKind::resolve(name, self.default);
        self.providers
            .get(&kind)
            .or_else(|| self.providers.get(&self.default))
            .map(|p| (p.kind(), p.clone()))
            .ok_or_else(|| GuideError::provider(format!("provider '{}' is not configured", kind)))
    }

    /// API key for `kind` from its configured environment variable.
    pub fn env_api_key(&self, kind: ProviderKind) -> Option<String> {
        let var = self
            .key_envs
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_key_env());
        std::env::var(var).ok().filter(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(kind: ProviderKind) -> HttpProvider {
        HttpProvider::new(
            kind,
            kind.default_model(),
            "http://mock/",
            GenerationSettings {
                max_tokens: 1000,
                temperature: 0.3,
            },
            reqwest::Client::new(),
        )
    }

    fn history() -> Vec<ChatTurn> {
        vec![
            ChatTurn {
                role: Role::User,
                content: "npm fails".to_string(),
            },
            ChatTurn {
                role: Role::Assistant,
                content: "Which error?".to_string(),
            },
        ]
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(ProviderKind::parse("openai"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::parse(" Anthropic "), Some(ProviderKind::Anthropic));
        assert_eq!(ProviderKind::parse("GEMINI"), Some(ProviderKind::Gemini));
        assert_eq!(ProviderKind::parse("groq"), Some(ProviderKind::Groq));
        assert_eq!(ProviderKind::parse("bard"), None);
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let d = ProviderKind::Groq;
        assert_eq!(ProviderKind::resolve(None, d), d);
        assert_eq!(ProviderKind::resolve(Some("unknown"), d), d);
        assert_eq!(ProviderKind::resolve(Some("openai"), d), ProviderKind::OpenAi);
    }

    #[test]
    fn test_openai_envelope() {
        let h = history();
        let req = CompletionRequest {
            api_key: "sk-test",
            system: "SYS",
            user: "hello",
            history: &h,
        };
        let p = provider(ProviderKind::OpenAi).prepare(&req);
        assert_eq!(p.url, "http://mock/v1/chat/completions");
        assert_eq!(p.headers, vec![("Authorization", "Bearer sk-test".to_string())]);
        let msgs = p.body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[2]["role"], "assistant");
        assert_eq!(msgs[3]["content"], "hello");
        assert_eq!(p.body["model"], "gpt-4o-mini");
        assert_eq!(p.body["max_tokens"], 1000);
    }

    #[test]
    fn test_groq_uses_openai_compatible_path() {
        let req = CompletionRequest {
            api_key: "gsk",
            system: "S",
            user: "U",
            history: &[],
        };
        let p = provider(ProviderKind::Groq).prepare(&req);
        assert_eq!(p.url, "http://mock/openai/v1/chat/completions");
        assert_eq!(p.body["model"], "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_anthropic_envelope() {
        let h = history();
        let req = CompletionRequest {
            api_key: "ak",
            system: "SYS",
            user: "hello",
            history: &h,
        };
        let p = provider(ProviderKind::Anthropic).prepare(&req);
        assert_eq!(p.url, "http://mock/v1/messages");
        assert!(p.headers.contains(&("x-api-key", "ak".to_string())));
        assert!(p
            .headers
            .contains(&("anthropic-version", "2023-06-01".to_string())));
        assert_eq!(p.body["system"], "SYS");
        assert_eq!(p.body["messages"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_gemini_envelope() {
        let h = history();
        let req = CompletionRequest {
            api_key: "gk",
            system: "SYS",
            user: "hello",
            history: &h,
        };
        let p = provider(ProviderKind::Gemini).prepare(&req);
        assert_eq!(
            p.url,
            "http://mock/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(p.headers, vec![("x-goog-api-key", "gk".to_string())]);
        assert_eq!(p.body["system_instruction"]["parts"][0]["text"], "SYS");
        let contents = p.body["contents"].as_array().unwrap();
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "hello");
        assert_eq!(p.body["generationConfig"]["maxOutputTokens"], 1000);
    }

    #[test]
    fn test_parse_success_paths() {
        let openai = r#"{"choices":[{"message":{"content":"A1"}}]}"#;
        let anthropic = r#"{"content":[{"type":"text","text":"A2"}]}"#;
        let gemini = r#"{"candidates":[{"content":{"parts":[{"text":"A3"}]}}]}"#;
        assert_eq!(parse_response(ProviderKind::OpenAi, 200, openai).unwrap(), "A1");
        assert_eq!(parse_response(ProviderKind::Groq, 200, openai).unwrap(), "A1");
        assert_eq!(parse_response(ProviderKind::Anthropic, 200, anthropic).unwrap(), "A2");
        assert_eq!(parse_response(ProviderKind::Gemini, 200, gemini).unwrap(), "A3");
    }

    #[test]
    fn test_parse_vendor_error_message() {
        let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#;
        match parse_response(ProviderKind::Groq, 401, body) {
            Err(GuideError::Provider(msg)) => assert_eq!(msg, "Invalid API Key"),
            other => panic!("unexpected: {:?}", other),
        }
        // vendor error reported even on a 200
        assert!(parse_response(ProviderKind::OpenAi, 200, body).is_err());
    }

    #[test]
    fn test_parse_non_2xx_without_error_field() {
        let err = parse_response(ProviderKind::Anthropic, 503, "upstream overloaded").unwrap_err();
        assert_eq!(err.to_string(), "anthropic API error 503: upstream overloaded");
    }

    #[test]
    fn test_parse_malformed_success() {
        let err = parse_response(ProviderKind::Gemini, 200, r#"{"candidates":[]}"#).unwrap_err();
        assert!(err.to_string().contains("malformed"));
        assert!(parse_response(ProviderKind::OpenAi, 200, "not json").is_err());
    }

    #[test]
    fn test_select_falls_back_to_default() {
        let mut set = Providers::new(ProviderKind::Groq);
        set.register(Arc::new(provider(ProviderKind::Groq)));
        set.register(Arc::new(provider(ProviderKind::OpenAi)));

        let (kind, _) = set.select(Some("openai")).unwrap();
        assert_eq!(kind, ProviderKind::OpenAi);
        let (kind, _) = set.select(Some("mystery")).unwrap();
        assert_eq!(kind, ProviderKind::Groq);
        let (kind, _) = set.select(None).unwrap();
        assert_eq!(kind, ProviderKind::Groq);
        // known but unregistered → default
        let (kind, _) = set.select(Some("gemini")).unwrap();
        assert_eq!(kind, ProviderKind::Groq);
    }

    #[test]
    fn test_select_with_nothing_registered() {
        let set = Providers::new(ProviderKind::Groq);
        assert!(set.select(None).is_err());
    }

    #[test]
    fn test_from_config_registers_every_vendor() {
        let set = Providers::from_config(&Config::minimal()).unwrap();
        for kind in ProviderKind::ALL {
            let (selected, _) = set.select(Some(kind.name())).unwrap();
            assert_eq!(selected, kind);
        }
    }

    #[tokio::test]
    async fn test_send_failure_does_not_leak_key() {
        for kind in ProviderKind::ALL {
            let p = HttpProvider::new(
                kind,
                kind.default_model(),
                "http://127.0.0.1:1",
                GenerationSettings {
                    max_tokens: 10,
                    temperature: 0.0,
                },
                reqwest::Client::new(),
            );
            let req = CompletionRequest {
                api_key: "SERVER_SECRET_KEY",
                system: "S",
                user: "U",
                history: &[],
            };
            let err = p.complete(&req).await.unwrap_err();
            assert!(matches!(err, GuideError::Provider(_)));
            assert!(
                !err.to_string().contains("SERVER_SECRET_KEY"),
                "{} leaked its key: {}",
                kind,
                err
            );
        }
    }
}
