//! TOML configuration parsing and validation.
//!
//! Every section except `[corpus]` is optional and falls back to the
//! defaults below. [`load_config`] reads and validates a file;
//! [`Config::minimal`] builds an in-memory default for tests and for
//! commands that can run without a config file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::provider::ProviderKind;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub firestore: Option<FirestoreConfig>,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Path to the structured `errors.json` document.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            capacity: default_capacity(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    3600
}
fn default_capacity() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_answer_language")]
    pub answer_language: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            history_limit: default_history_limit(),
            answer_language: default_answer_language(),
        }
    }
}

fn default_provider() -> String {
    "groq".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f64 {
    0.3
}
fn default_history_limit() -> usize {
    5
}
fn default_answer_language() -> String {
    "Korean".to_string()
}

/// Per-provider overrides. Unset fields use the provider's defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProviderSettings {
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Scheme and host of the API, e.g. `https://api.openai.com`.
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderSettings,
    #[serde(default)]
    pub anthropic: ProviderSettings,
    #[serde(default)]
    pub gemini: ProviderSettings,
    #[serde(default)]
    pub groq: ProviderSettings,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Groq => &self.groq,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    #[serde(default = "default_firestore_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_firestore_url")]
    pub base_url: String,
}

fn default_firestore_key_env() -> String {
    "FIRESTORE_API_KEY".to_string()
}
fn default_firestore_url() -> String {
    "https://firestore.googleapis.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Environment variable holding the shared signing secret. When the
    /// variable is unset, signatures are not checked.
    #[serde(default = "default_webhook_secret_env")]
    pub secret_env: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret_env: default_webhook_secret_env(),
        }
    }
}

fn default_webhook_secret_env() -> String {
    "CREEM_WEBHOOK_SECRET".to_string()
}

impl WebhookConfig {
    /// The signing secret, if configured and non-empty.
    pub fn secret(&self) -> Option<String> {
        std::env::var(&self.secret_env)
            .ok()
            .filter(|s| !s.is_empty())
    }
}

impl Config {
    /// Default configuration pointing at `data/errors.json`.
    pub fn minimal() -> Self {
        Self {
            corpus: CorpusConfig {
                path: PathBuf::from("data/errors.json"),
            },
            cache: CacheConfig::default(),
            chat: ChatConfig::default(),
            providers: ProvidersConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            firestore: None,
            webhook: WebhookConfig::default(),
        }
    }

    /// The provider used when a request names none or an unknown one.
    pub fn default_provider(&self) -> ProviderKind {
        ProviderKind::parse(&self.chat.default_provider).unwrap_or(ProviderKind::Groq)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Relative corpus paths resolve against the config file's directory
    if config.corpus.path.is_relative() {
        if let Some(dir) = path.parent() {
            config.corpus.path = dir.join(&config.corpus.path);
        }
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.cache.capacity == 0 {
        bail!("cache.capacity must be > 0");
    }
    if config.cache.ttl_secs == 0 {
        bail!("cache.ttl_secs must be > 0");
    }
    if config.chat.timeout_secs == 0 {
        bail!("chat.timeout_secs must be > 0");
    }
    if !(0.0..=2.0).contains(&config.chat.temperature) {
        bail!("chat.temperature must be in [0.0, 2.0]");
    }
    if ProviderKind::parse(&config.chat.default_provider).is_none() {
        bail!(
            "Unknown chat.default_provider: '{}'. Must be one of: {}.",
            config.chat.default_provider,
            ProviderKind::ALL
                .iter()
                .map(|k| k.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    if let Some(fs) = &config.firestore {
        if fs.project_id.trim().is_empty() {
            bail!("firestore.project_id must not be empty");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("guide.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let (dir, path) = write_config("[corpus]\npath = \"errors.json\"\n");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.corpus.path, dir.path().join("errors.json"));
        assert_eq!(cfg.cache.ttl_secs, 3600);
        assert_eq!(cfg.cache.capacity, 500);
        assert_eq!(cfg.chat.timeout_secs, 30);
        assert_eq!(cfg.chat.history_limit, 5);
        assert_eq!(cfg.default_provider(), ProviderKind::Groq);
        assert!(cfg.firestore.is_none());
    }

    #[test]
    fn test_full_file() {
        let (_dir, path) = write_config(
            r#"
[corpus]
path = "/srv/guide/errors.json"

[cache]
ttl_secs = 60
capacity = 10

[chat]
default_provider = "anthropic"
timeout_secs = 5
answer_language = "English"

[providers.openai]
model = "gpt-4o"
base_url = "http://localhost:9999"

[server]
bind = "0.0.0.0:8080"

[firestore]
project_id = "guide-prod"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.corpus.path, PathBuf::from("/srv/guide/errors.json"));
        assert_eq!(cfg.cache.capacity, 10);
        assert_eq!(cfg.default_provider(), ProviderKind::Anthropic);
        assert_eq!(cfg.providers.openai.model.as_deref(), Some("gpt-4o"));
        assert!(cfg.providers.groq.model.is_none());
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        let fs = cfg.firestore.unwrap();
        assert_eq!(fs.api_key_env, "FIRESTORE_API_KEY");
        assert_eq!(fs.base_url, "https://firestore.googleapis.com");
    }

    #[test]
    fn test_rejects_unknown_default_provider() {
        let (_dir, path) =
            write_config("[corpus]\npath = \"e.json\"\n[chat]\ndefault_provider = \"bard\"\n");
        let err = load_config(&path).unwrap_err().to_string();
        assert!(err.contains("default_provider"), "{}", err);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let (_dir, path) = write_config("[corpus]\npath = \"e.json\"\n[cache]\ncapacity = 0\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_missing_corpus_section_is_error() {
        let (_dir, path) = write_config("[server]\nbind = \"127.0.0.1:1\"\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = load_config(Path::new("/nonexistent/guide.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
