//! Payment webhook: verifies the signature, filters events, and marks the
//! paying customer as a pro user.
//!
//! # Flow
//!
//! 1. When a secret is configured, the hex HMAC-SHA256 of the raw body
//!    must equal the `x-creem-signature` (or `x-webhook-signature`)
//!    header.
//! 2. The event name is read from `event`, then `type`. Events outside
//!    [`HANDLED_EVENTS`] are acknowledged and skipped.
//! 3. The customer email is taken from the first of [`EMAIL_POINTERS`]
//!    that holds a non-empty string.
//! 4. [`SubscriptionStore::activate_pro`] sets the pro flag.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::error::{GuideError, Result};
use crate::firestore::{bool_value, string_value, FirestoreClient};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADERS: [&str; 2] = ["x-creem-signature", "x-webhook-signature"];

pub const HANDLED_EVENTS: [&str; 4] = [
    "subscription.created",
    "subscription.active",
    "payment.completed",
    "checkout.completed",
];

/// Where payment providers put the customer email, in lookup order.
pub const EMAIL_POINTERS: [&str; 4] = [
    "/data/customer/email",
    "/data/customer_email",
    "/data/object/customer/email",
    "/customer_email",
];

pub const PRO_SOURCE: &str = "creem";

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

pub fn event_name(body: &Value) -> Option<&str> {
    body.get("event")
        .and_then(Value::as_str)
        .or_else(|| body.get("type").and_then(Value::as_str))
}

pub fn extract_email(body: &Value) -> Option<&str> {
    EMAIL_POINTERS
        .iter()
        .filter_map(|p| body.pointer(p).and_then(Value::as_str))
        .find(|e| !e.is_empty())
}

/// Document id for a user created from an email: characters outside
/// `[A-Za-z0-9@._-]` become `_`.
pub fn sanitize_doc_id(email: &str) -> String {
    email
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Whether an activation patched an existing user or created one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Updated,
    Created,
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn activate_pro(&self, email: &str) -> Result<Activation>;
}

fn pro_fields(email: &str, now: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("pro".into(), bool_value(true));
    fields.insert("email".into(), string_value(email));
    fields.insert("proActivatedAt".into(), string_value(now));
    fields.insert("proSource".into(), string_value(PRO_SOURCE));
    fields
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Users live in the `users` collection, looked up by their `email` field.
pub struct FirestoreSubscriptionStore {
    client: Arc<FirestoreClient>,
}

impl FirestoreSubscriptionStore {
    pub fn new(client: Arc<FirestoreClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SubscriptionStore for FirestoreSubscriptionStore {
    async fn activate_pro(&self, email: &str) -> Result<Activation> {
        let now = now_iso();
        match self.client.find_by_field("users", "email", email).await? {
            Some(name) => {
                let mut fields = pro_fields(email, &now);
                // existing users keep their stored email
                fields.remove("email");
                self.client.patch_document(&name, fields).await?;
                Ok(Activation::Updated)
            }
            None => {
                let id = sanitize_doc_id(email);
                self.client
                    .create_document("users", Some(&id), pro_fields(email, &now))
                    .await?;
                Ok(Activation::Created)
            }
        }
    }
}

/// A user document held by [`MemorySubscriptionStore`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDoc {
    pub email: String,
    pub pro: bool,
    pub pro_activated_at: Option<String>,
    pub pro_source: Option<String>,
}

/// In-process user table keyed by document id.
#[derive(Default)]
pub struct MemorySubscriptionStore {
    users: Mutex<HashMap<String, UserDoc>>,
}

impl MemorySubscriptionStore {
    pub fn insert_user(&self, doc_id: &str, email: &str) {
        self.lock().insert(
            doc_id.to_string(),
            UserDoc {
                email: email.to_string(),
                pro: false,
                pro_activated_at: None,
                pro_source: None,
            },
        );
    }

    pub fn user(&self, doc_id: &str) -> Option<UserDoc> {
        self.lock().get(doc_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, UserDoc>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn activate_pro(&self, email: &str) -> Result<Activation> {
        let now = now_iso();
        let mut users = self.lock();
        if let Some(user) = users.values_mut().find(|u| u.email == email) {
            user.pro = true;
            user.pro_activated_at = Some(now);
            user.pro_source = Some(PRO_SOURCE.to_string());
            return Ok(Activation::Updated);
        }
        users.insert(
            sanitize_doc_id(email),
            UserDoc {
                email: email.to_string(),
                pro: true,
                pro_activated_at: Some(now),
                pro_source: Some(PRO_SOURCE.to_string()),
            },
        );
        Ok(Activation::Created)
    }
}

/// Result of a webhook delivery that passed verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WebhookOutcome {
    Skipped {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        skipped: Option<String>,
    },
    Activated { ok: bool, email: String, event: String },
}

pub struct WebhookService {
    secret: Option<String>,
    store: Arc<dyn SubscriptionStore>,
}

impl WebhookService {
    pub fn new(secret: Option<String>, store: Arc<dyn SubscriptionStore>) -> Self {
        Self { secret, store }
    }

    pub async fn handle(&self, signature: Option<&str>, raw_body: &[u8]) -> Result<WebhookOutcome> {
        if let Some(secret) = &self.secret {
            let sig = signature.unwrap_or("");
            if !verify_signature(secret, raw_body, sig) {
                warn!("webhook signature mismatch");
                return Err(GuideError::Unauthorized("Invalid signature".to_string()));
            }
        }

        let body: Value = serde_json::from_slice(raw_body)
            .map_err(|e| GuideError::validation(format!("invalid JSON body: {}", e)))?;

        let event = event_name(&body);
        let Some(event) = event.filter(|e| HANDLED_EVENTS.contains(e)) else {
            info!(event = ?event, "webhook event skipped");
            return Ok(WebhookOutcome::Skipped {
                ok: true,
                skipped: event.map(str::to_string),
            });
        };

        let email = extract_email(&body)
            .ok_or_else(|| GuideError::validation("No customer email found"))?;

        let activation = self.store.activate_pro(email).await?;
        info!(event, email, ?activation, "pro activated");

        Ok(WebhookOutcome::Activated {
            ok: true,
            email: email.to_string(),
            event: event.to_string(),
        })
    }
}
