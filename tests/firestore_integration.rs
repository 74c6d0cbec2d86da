//! Firestore client, feedback sink, and subscription store against a
//! local mock of the Firestore REST API.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use error_guide::config::FirestoreConfig;
use error_guide::error::GuideError;
use error_guide::feedback::{FeedbackRecord, FeedbackSink, FirestoreFeedbackSink};
use error_guide::firestore::{string_value, FirestoreClient};
use error_guide::webhook::{Activation, FirestoreSubscriptionStore, SubscriptionStore};

const API_KEY: &str = "FIRESTORE_SECRET_KEY";
const DOCUMENTS: &str = "projects/guide-test/databases/(default)/documents";

// ─── Mock Firestore ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    api_key: Option<String>,
    body: Value,
}

impl Recorded {
    fn query_values(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

#[derive(Clone, Default)]
struct MockFirestore {
    requests: Arc<Mutex<Vec<Recorded>>>,
    /// email → document name
    users: Arc<Mutex<HashMap<String, String>>>,
}

impl MockFirestore {
    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle(
    State(mock): State<MockFirestore>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    mock.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    if path.contains("/documents/locked") {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": {
                    "code": 403,
                    "message": "Missing or insufficient permissions.",
                    "status": "PERMISSION_DENIED"
                }
            })),
        )
            .into_response();
    }

    if method == Method::POST && path.ends_with(":runQuery") {
        let email = body
            .pointer("/structuredQuery/where/fieldFilter/value/stringValue")
            .and_then(Value::as_str)
            .unwrap_or("");
        let found = mock.users.lock().unwrap().get(email).cloned();
        return match found {
            Some(name) => Json(json!([{ "document": { "name": name, "fields": {} }, "readTime": "t" }])),
            None => Json(json!([{ "readTime": "t" }])),
        }
        .into_response();
    }

    if method == Method::POST && path.ends_with("/documents/users") {
        let id = query
            .iter()
            .find(|(k, _)| k == "documentId")
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| "generated".to_string());
        let name = format!("{}/users/{}", DOCUMENTS, id);
        if let Some(email) = body.pointer("/fields/email/stringValue").and_then(Value::as_str) {
            mock.users
                .lock()
                .unwrap()
                .insert(email.to_string(), name.clone());
        }
        return Json(json!({ "name": name, "fields": body["fields"] })).into_response();
    }

    if method == Method::POST && path.ends_with("/documents/feedback") {
        return Json(json!({ "name": format!("{}/feedback/abc", DOCUMENTS) })).into_response();
    }

    if method == Method::PATCH {
        // empty 200 body
        return StatusCode::OK.into_response();
    }

    StatusCode::NOT_FOUND.into_response()
}

async fn start_mock() -> (MockFirestore, String) {
    let mock = MockFirestore::default();
    let app = Router::new().fallback(handle).with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (mock, format!("http://{}", addr))
}

fn client(base_url: &str) -> Arc<FirestoreClient> {
    let cfg = FirestoreConfig {
        project_id: "guide-test".to_string(),
        api_key_env: "ERRGUIDE_TEST_UNSET_FIRESTORE_KEY".to_string(),
        base_url: base_url.to_string(),
    };
    Arc::new(
        FirestoreClient::with_api_key(&cfg, Duration::from_secs(5), Some(API_KEY.to_string()))
            .unwrap(),
    )
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_activation_creates_then_patches() {
    let (mock, base) = start_mock().await;
    let store = FirestoreSubscriptionStore::new(client(&base));

    let first = store.activate_pro("new+1@example.com").await.unwrap();
    assert_eq!(first, Activation::Created);
    let second = store.activate_pro("new+1@example.com").await.unwrap();
    assert_eq!(second, Activation::Updated);

    let requests = mock.requests();
    assert_eq!(requests.len(), 4, "{:#?}", requests);

    let query = &requests[0];
    assert_eq!(query.method, Method::POST);
    assert_eq!(query.path, format!("/v1/{}:runQuery", DOCUMENTS));
    assert_eq!(
        query.body["structuredQuery"]["from"][0]["collectionId"],
        "users"
    );
    assert_eq!(
        query.body["structuredQuery"]["where"]["fieldFilter"]["field"]["fieldPath"],
        "email"
    );

    let create = &requests[1];
    assert_eq!(create.path, format!("/v1/{}/users", DOCUMENTS));
    assert_eq!(create.query_values("documentId"), vec!["new_1@example.com"]);
    assert_eq!(create.body["fields"]["email"], string_value("new+1@example.com"));
    assert_eq!(create.body["fields"]["pro"], json!({ "booleanValue": true }));
    assert_eq!(create.body["fields"]["proSource"], string_value("creem"));

    let patch = &requests[3];
    assert_eq!(patch.method, Method::PATCH);
    assert_eq!(patch.path, format!("/v1/{}/users/new_1@example.com", DOCUMENTS));
    let mut mask = patch.query_values("updateMask.fieldPaths");
    mask.sort_unstable();
    assert_eq!(mask, vec!["pro", "proActivatedAt", "proSource"]);
    let fields = patch.body["fields"].as_object().unwrap();
    assert!(!fields.contains_key("email"));
    assert_eq!(fields["pro"], json!({ "booleanValue": true }));
}

#[tokio::test]
async fn test_key_travels_in_header_only() {
    let (mock, base) = start_mock().await;
    let c = client(&base);

    assert_eq!(c.find_by_field("users", "email", "nobody@example.com").await.unwrap(), None);
    let mut fields = Map::new();
    fields.insert("pro".into(), json!({ "booleanValue": true }));
    c.patch_document(&format!("{}/users/u1", DOCUMENTS), fields)
        .await
        .unwrap();

    for r in mock.requests() {
        assert_eq!(r.api_key.as_deref(), Some(API_KEY));
        assert!(r.query.iter().all(|(k, v)| k != "key" && v != API_KEY));
    }
}

#[tokio::test]
async fn test_feedback_sink_writes_document() {
    let (mock, base) = start_mock().await;
    let sink = FirestoreFeedbackSink::new(client(&base));

    sink.record(&FeedbackRecord {
        question: "npm EACCES".to_string(),
        answer: "change the prefix".to_string(),
        helpful: false,
        timestamp: "2026-10-19T00:00:00.000Z".to_string(),
    })
    .await
    .unwrap();

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, format!("/v1/{}/feedback", DOCUMENTS));
    assert!(requests[0].query_values("documentId").is_empty());
    let fields = &requests[0].body["fields"];
    assert_eq!(fields["question"], string_value("npm EACCES"));
    assert_eq!(fields["helpful"], json!({ "booleanValue": false }));
}

#[tokio::test]
async fn test_rejection_maps_to_upstream_with_vendor_message() {
    let (_mock, base) = start_mock().await;
    let err = client(&base)
        .create_document("locked", None, Map::new())
        .await
        .unwrap_err();

    match err {
        GuideError::Upstream(msg) => {
            assert_eq!(
                msg,
                "firestore returned 403: Missing or insufficient permissions."
            );
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_store_does_not_leak_key() {
    let err = client("http://127.0.0.1:1")
        .find_by_field("users", "email", "a@b.c")
        .await
        .unwrap_err();
    assert!(matches!(err, GuideError::Upstream(_)));
    assert!(!err.to_string().contains(API_KEY), "{}", err);
}
