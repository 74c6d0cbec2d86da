//! HTTP server.
//!
//! Serves the chat proxy, corpus lookups, feedback and webhook intake, and
//! the tool API from one axum router.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Grounded chat answer via a completion provider |
//! | `GET`  | `/api/search?q=` | All-terms keyword search |
//! | `GET`  | `/api/errors[?category=]` | Whole corpus, or one category |
//! | `POST` | `/api/feedback` | Record whether an answer helped |
//! | `POST` | `/api/webhook` | Payment webhook, activates pro users |
//! | `GET`  | `/tools/list` | List registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call a registered tool |
//! | `GET`  | `/health` | Status, version, and corpus size |
//!
//! # Error Contract
//!
//! Every error response is a flat JSON object:
//!
//! ```json
//! { "error": "message required" }
//! ```
//!
//! Status codes: 400 validation, 401 bad webhook signature, 404 unknown
//! category/error/tool, 500 provider or document-store failure.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the guide's static
//! pages can call the API from any host.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use error_guide_core::ResponseCache;

use crate::catalog::get_category;
use crate::chat::{ChatRequest, ChatResponse, ChatService};
use crate::config::Config;
use crate::corpus::KnowledgeBase;
use crate::error::GuideError;
use crate::feedback::{
    submit_feedback, FeedbackRequest, FeedbackSink, FirestoreFeedbackSink, LogFeedbackSink,
};
use crate::firestore::FirestoreClient;
use crate::provider::Providers;
use crate::search::{search_errors, SearchResponse};
use crate::traits::{validate_params, ToolContext, ToolInfo, ToolRegistry};
use crate::webhook::{
    FirestoreSubscriptionStore, MemorySubscriptionStore, SubscriptionStore, WebhookOutcome,
    WebhookService, SIGNATURE_HEADERS,
};

/// Shared application state passed to all route handlers.
///
/// Fields are public so embedders and tests can swap in their own
/// providers, sinks, and stores before calling [`router`].
#[derive(Clone)]
pub struct AppState {
    pub kb: Arc<KnowledgeBase>,
    pub chat: Arc<ChatService>,
    pub tools: Arc<ToolRegistry>,
    pub feedback: Arc<dyn FeedbackSink>,
    pub webhook: Arc<WebhookService>,
}

impl AppState {
    /// Wire up every service from the config.
    ///
    /// Without a `[firestore]` section, feedback goes to the log and
    /// subscriptions are held in memory.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let kb = Arc::new(KnowledgeBase::load(config));
        let cache = Arc::new(ResponseCache::new(
            Duration::from_secs(config.cache.ttl_secs),
            config.cache.capacity,
        ));
        let providers = Arc::new(Providers::from_config(config)?);
        let chat = Arc::new(ChatService::new(kb.clone(), cache, providers, config));

        let (feedback, store): (Arc<dyn FeedbackSink>, Arc<dyn SubscriptionStore>) =
            match &config.firestore {
                Some(fs) => {
                    let client = Arc::new(FirestoreClient::new(
                        fs,
                        Duration::from_secs(config.chat.timeout_secs),
                    )?);
                    (
                        Arc::new(FirestoreFeedbackSink::new(client.clone())),
                        Arc::new(FirestoreSubscriptionStore::new(client)),
                    )
                }
                None => {
                    warn!("no [firestore] config: feedback is logged, subscriptions kept in memory");
                    (
                        Arc::new(LogFeedbackSink),
                        Arc::new(MemorySubscriptionStore::default()),
                    )
                }
            };

        let secret = config.webhook.secret();
        if secret.is_none() {
            warn!(
                env = %config.webhook.secret_env,
                "webhook secret not set: signatures are not verified"
            );
        }

        Ok(Self {
            kb,
            chat,
            tools: Arc::new(ToolRegistry::with_builtins()),
            feedback,
            webhook: Arc::new(WebhookService::new(secret, store)),
        })
    }
}

/// Build the router with all routes and CORS.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/search", get(handle_search))
        .route("/api/errors", get(handle_errors))
        .route("/api/feedback", post(handle_feedback))
        .route("/api/webhook", post(handle_webhook))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    serve(state, &config.server.bind).await
}

/// Starts the server with extra tools registered after the built-ins.
pub async fn run_server_with_extensions(
    config: &Config,
    extra_tools: ToolRegistry,
) -> anyhow::Result<()> {
    let mut state = AppState::from_config(config)?;
    let mut registry = ToolRegistry::with_builtins();
    for tool in extra_tools.into_tools() {
        info!(tool = tool.name(), "registered custom tool");
        registry.register(tool);
    }
    state.tools = Arc::new(registry);
    serve(state, &config.server.bind).await
}

/// Serve a prepared state on `bind`.
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let records = state.kb.matcher.len();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(bind, records, "error guide listening on http://{}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

/// Internal error type that converts into a flat `{ "error": ... }` body.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

fn status_for(e: &GuideError) -> StatusCode {
    match e {
        GuideError::Validation(_) => StatusCode::BAD_REQUEST,
        GuideError::NotFound(_) => StatusCode::NOT_FOUND,
        GuideError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        GuideError::Provider(_) | GuideError::Upstream(_) | GuideError::CorpusLoad(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<GuideError> for AppError {
    fn from(e: GuideError) -> Self {
        Self::new(status_for(&e), e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), error = %self.message, "request failed");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Map a tool failure to a status. Wrapped [`GuideError`]s keep their
/// mapping; plain messages are classified by wording.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    if let Some(guide) = err.downcast_ref::<GuideError>() {
        return AppError::new(status_for(guide), format!("{}: {}", tool_name, guide));
    }

    let msg = err.to_string();
    let status = if msg.contains("not found") {
        StatusCode::NOT_FOUND
    } else if msg.contains("must not be empty")
        || msg.contains("missing required parameter")
        || msg.contains("must be")
    {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    AppError::new(status, format!("{}: {}", tool_name, msg))
}

// ============ POST /api/chat ============

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = payload?;
    Ok(Json(state.chat.chat(req).await?))
}

// ============ GET /api/search ============

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: Option<String>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let q = params.q.unwrap_or_default();
    Ok(Json(search_errors(&state.kb.db, &q)?))
}

// ============ GET /api/errors ============

#[derive(Debug, Deserialize)]
struct ErrorsParams {
    #[serde(default)]
    category: Option<String>,
}

async fn handle_errors(
    State(state): State<AppState>,
    Query(params): Query<ErrorsParams>,
) -> Result<Json<Value>, AppError> {
    match params.category.filter(|c| !c.is_empty()) {
        Some(id) => {
            let cat = get_category(&state.kb.db, &id)?;
            Ok(Json(to_json(&cat)?))
        }
        None => Ok(Json(to_json(&state.kb.db)?)),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value)
        .map_err(|e| AppError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

// ============ POST /api/feedback ============

async fn handle_feedback(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    // an unreadable body is reported the same as missing fields
    let req = payload.map(|Json(r)| r).unwrap_or_default();
    submit_feedback(state.feedback.as_ref(), req).await?;
    Ok(Json(json!({ "ok": true })))
}

// ============ POST /api/webhook ============

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>, AppError> {
    let signature = SIGNATURE_HEADERS
        .iter()
        .find_map(|h| headers.get(*h))
        .and_then(|v| v.to_str().ok());
    Ok(Json(state.webhook.handle(signature, &body).await?))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    records: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        records: state.kb.matcher.len(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state.tools.infos(),
    })
}

// ============ POST /tools/{name} ============

/// Looks up the tool, validates parameters against its schema, and runs
/// it. An empty or non-JSON body counts as `{}`.
async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let tool = state.tools.find(&name).ok_or_else(|| {
        AppError::new(
            StatusCode::NOT_FOUND,
            format!("no tool registered with name: {}", name),
        )
    })?;

    let params: Value = serde_json::from_slice(&body).unwrap_or_else(|_| json!({}));
    let params = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| AppError::new(StatusCode::BAD_REQUEST, e.to_string()))?;

    let ctx = ToolContext::new(state.kb.clone());
    let result = tool
        .execute(params, &ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(json!({ "result": result })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guide_error_status_mapping() {
        let cases = [
            (GuideError::validation("x"), StatusCode::BAD_REQUEST),
            (GuideError::not_found("x"), StatusCode::NOT_FOUND),
            (GuideError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (GuideError::provider("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (GuideError::upstream("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn test_classify_tool_error() {
        let e = classify_tool_error("get_error", GuideError::not_found("Error not found: x").into());
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        assert_eq!(e.message, "get_error: Error not found: x");

        let e = classify_tool_error("search_errors", anyhow::anyhow!("query must not be empty"));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);

        let e = classify_tool_error("custom", anyhow::anyhow!("boom"));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
