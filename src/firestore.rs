//! Minimal Firestore REST client.
//!
//! Covers the three document operations the feedback and subscription
//! paths need: create a document, find the first document whose field
//! equals a string, and patch selected fields of an existing document.
//! Requests authenticate with an API key sent in the `x-goog-api-key`
//! header, never in the URL, so transport errors cannot echo it.
//!
//! Field maps use Firestore's typed-value JSON encoding
//! (`{ "field": { "stringValue": "..." } }`); see [`string_value`] and
//! [`bool_value`].

use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::FirestoreConfig;
use crate::error::{GuideError, Result};

const API_KEY_HEADER: &str = "x-goog-api-key";

pub fn string_value(s: &str) -> Value {
    json!({ "stringValue": s })
}

pub fn bool_value(b: bool) -> Value {
    json!({ "booleanValue": b })
}

pub struct FirestoreClient {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    api_key: Option<String>,
}

impl FirestoreClient {
    /// Client whose API key is read from `config.api_key_env`.
    pub fn new(config: &FirestoreConfig, timeout: Duration) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        Self::with_api_key(config, timeout, api_key)
    }

    pub fn with_api_key(
        config: &FirestoreConfig,
        timeout: Duration,
        api_key: Option<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            api_key,
        })
    }

    /// `projects/{id}/databases/(default)/documents`
    pub fn documents_path(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    /// Create a document in `collection`. Without `doc_id` Firestore
    /// assigns one.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: Option<&str>,
        fields: Map<String, Value>,
    ) -> Result<()> {
        let url = self.url(&format!("{}/{}", self.documents_path(), collection));
        let query: Vec<(&str, &str)> = doc_id.into_iter().map(|id| ("documentId", id)).collect();

        debug!(collection, doc_id = ?doc_id, "firestore create");
        let response = self
            .request(reqwest::Method::POST, &url)
            .query(&query)
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .map_err(upstream)?;
        check(response).await.map(|_| ())
    }

    /// Full resource name of the first document in `collection` whose
    /// `field` equals `value`.
    pub async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<String>> {
        let url = self.url(&format!("{}:runQuery", self.documents_path()));
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field },
                        "op": "EQUAL",
                        "value": string_value(value),
                    }
                },
                "limit": 1
            }
        });

        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await
            .map_err(upstream)?;
        let results = check(response).await?;

        Ok(results
            .pointer("/0/document/name")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Patch only the fields named in `fields` on the document `name`.
    pub async fn patch_document(&self, name: &str, fields: Map<String, Value>) -> Result<()> {
        let query: Vec<(&str, &str)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", k.as_str()))
            .collect();

        let response = self
            .request(reqwest::Method::PATCH, &self.url(name))
            .query(&query)
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .map_err(upstream)?;
        check(response).await.map(|_| ())
    }
}

fn upstream(e: reqwest::Error) -> GuideError {
    GuideError::upstream(format!("firestore request failed: {}", e.without_url()))
}

/// Map non-2xx responses to [`GuideError::Upstream`] and parse the body.
async fn check(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await.map_err(upstream)?;
    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or(text);
        return Err(GuideError::upstream(format!(
            "firestore returned {}: {}",
            status.as_u16(),
            message
        )));
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text)
        .map_err(|e| GuideError::upstream(format!("firestore returned invalid JSON: {}", e)))
}
