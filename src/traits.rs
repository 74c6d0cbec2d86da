//! Tool extension system.
//!
//! Every lookup the guide offers to agents is a [`Tool`]: a named,
//! schema-described operation over the loaded corpus. Tools live in a
//! [`ToolRegistry`] and are dispatched identically by the HTTP server
//! (`POST /tools/{name}`) and the MCP stdio bridge.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              ToolRegistry                │
//! │  ┌──────────────┐     ┌──────────────┐   │
//! │  │   Built-in   │     │    Custom    │   │
//! │  │ search/match │     │    (Rust)    │   │
//! │  │ categories   │     │    Tools     │   │
//! │  │ get_error    │     │              │   │
//! │  └──────────────┘     └──────────────┘   │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!     run_server() / run_mcp_stdio()
//! ```
//!
//! # Usage
//!
//! ```rust
//! use error_guide::traits::ToolRegistry;
//!
//! let tools = ToolRegistry::with_builtins();
//! assert_eq!(tools.len(), 5);
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::catalog::{get_category, get_error, list_categories};
use crate::corpus::KnowledgeBase;
use crate::search::{match_errors, search_errors};

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// An operation agents can discover and call.
///
/// # Lifecycle
///
/// 1. The tool is registered via [`ToolRegistry::register`].
/// 2. [`name`](Tool::name), [`description`](Tool::description), and
///    [`parameters_schema`](Tool::parameters_schema) feed the tool list.
/// 3. [`execute`](Tool::execute) runs on each call, with parameters
///    already checked by [`validate_params`].
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use serde_json::{json, Value};
/// use error_guide::traits::{Tool, ToolContext};
///
/// pub struct CountTool;
///
/// #[async_trait]
/// impl Tool for CountTool {
///     fn name(&self) -> &str { "count_errors" }
///     fn description(&self) -> &str { "Number of errors in the guide" }
///
///     fn parameters_schema(&self) -> Value {
///         json!({ "type": "object", "properties": {} })
///     }
///
///     async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
///         Ok(json!({ "count": ctx.knowledge_base().matcher.len() }))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores; also the route segment.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Built-in tools are flagged `"builtin": true` in the tool list.
    fn is_builtin(&self) -> bool {
        false
    }

    /// JSON Schema for the parameters object.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. The result is wrapped in `{ "result": ... }` over HTTP.
    ///
    /// Errors that wrap a [`GuideError`](crate::error::GuideError) keep
    /// its status mapping at the HTTP boundary.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Serializable tool description for `GET /tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            builtin: tool.is_builtin(),
            parameters: tool.parameters_schema(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Read access to the loaded corpus during tool execution.
#[derive(Clone)]
pub struct ToolContext {
    kb: Arc<KnowledgeBase>,
}

impl ToolContext {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter validation
// ═══════════════════════════════════════════════════════════════════════

/// Check tool arguments before a tool runs.
///
/// HTTP bodies and MCP calls hand tools loosely typed JSON. The guide's
/// schemas are flat objects of strings and booleans, so this handles the
/// subset they use: `required`, a scalar `type` per property, optional
/// `enum`, and `default` (e.g. `match_errors` gets `strict: false`).
/// Anything that is not an object counts as no arguments.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let mut args = params.as_object().cloned().unwrap_or_default();

    if let Some(missing) = required_names(schema).find(|name| !args.contains_key(*name)) {
        bail!("missing required parameter: {}", missing);
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    for (name, property) in properties.into_iter().flatten() {
        if !args.contains_key(name) {
            if let Some(default) = property.get("default") {
                args.insert(name.clone(), default.clone());
            }
            continue;
        }
        check_argument(name, property, &args[name])?;
    }

    Ok(Value::Object(args))
}

fn required_names(schema: &Value) -> impl Iterator<Item = &str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

fn check_argument(name: &str, property: &Value, value: &Value) -> Result<()> {
    if let Some(expected) = property.get("type").and_then(Value::as_str) {
        let actual = schema_type_of(value);
        let accepted = match expected {
            // integers are numbers too
            "number" => matches!(actual, "number" | "integer"),
            "string" | "integer" | "boolean" | "array" | "object" | "null" => expected == actual,
            _ => true,
        };
        if !accepted {
            bail!(
                "parameter '{}' must be of type '{}', got {}",
                name,
                expected,
                actual
            );
        }
    }

    if let Some(allowed) = property.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            let choices: Vec<String> = allowed.iter().map(Value::to_string).collect();
            bail!(
                "parameter '{}' must be one of {}, got {}",
                name,
                choices.join(" | "),
                value
            );
        }
    }
    Ok(())
}

/// JSON Schema type name of a value; whole numbers report `integer`.
fn schema_type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    let value = params[key].as_str().unwrap_or("").trim();
    if value.is_empty() {
        bail!("{} must not be empty", key);
    }
    Ok(value)
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

/// Keyword search where every term must appear.
pub struct SearchErrorsTool;

#[async_trait]
impl Tool for SearchErrorsTool {
    fn name(&self) -> &str {
        "search_errors"
    }

    fn description(&self) -> &str {
        "Find errors whose title, symptoms, cause, or solution titles contain every query term"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Space-separated search terms" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = required_str(&params, "query")?;
        let response = search_errors(&ctx.kb.db, query)?;
        Ok(serde_json::to_value(response)?)
    }
}

/// Relevance-ranked matching, as used to ground chat answers.
pub struct MatchErrorsTool;

#[async_trait]
impl Tool for MatchErrorsTool {
    fn name(&self) -> &str {
        "match_errors"
    }

    fn description(&self) -> &str {
        "Rank errors by relevance to a free-text problem description"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Problem description or error message" },
                "strict": {
                    "type": "boolean",
                    "description": "Only return records that share a keyword with the query",
                    "default": false
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = required_str(&params, "query")?;
        let strict = params["strict"].as_bool().unwrap_or(false);
        Ok(serde_json::to_value(match_errors(&ctx.kb, query, strict))?)
    }
}

pub struct ListCategoriesTool;

#[async_trait]
impl Tool for ListCategoriesTool {
    fn name(&self) -> &str {
        "list_categories"
    }

    fn description(&self) -> &str {
        "List error categories with their sizes"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        Ok(serde_json::to_value(list_categories(&ctx.kb.db))?)
    }
}

pub struct GetCategoryTool;

#[async_trait]
impl Tool for GetCategoryTool {
    fn name(&self) -> &str {
        "get_category"
    }

    fn description(&self) -> &str {
        "Retrieve every error in one category"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Category id, e.g. \"windows\"" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let id = required_str(&params, "id")?;
        Ok(serde_json::to_value(get_category(&ctx.kb.db, id)?)?)
    }
}

pub struct GetErrorTool;

#[async_trait]
impl Tool for GetErrorTool {
    fn name(&self) -> &str {
        "get_error"
    }

    fn description(&self) -> &str {
        "Retrieve one error with its full solutions by id"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Error id, e.g. \"win-1\"" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let id = required_str(&params, "id")?;
        Ok(serde_json::to_value(get_error(&ctx.kb.db, id)?)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry for built-in and custom tools, in registration order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry pre-loaded with the five corpus tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchErrorsTool));
        registry.register(Box::new(MatchErrorsTool));
        registry.register(Box::new(ListCategoriesTool));
        registry.register(Box::new(GetCategoryTool));
        registry.register(Box::new(GetErrorTool));
        registry
    }

    /// Register a tool. Lookups return the first tool with a given name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    /// Consume the registry, yielding its tools in registration order.
    pub fn into_tools(self) -> Vec<Box<dyn Tool>> {
        self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools.iter().map(|t| ToolInfo::of(t.as_ref())).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuideError;
    use error_guide_core::ErrorDatabase;

    fn ctx() -> ToolContext {
        let db = ErrorDatabase::from_json(
            r#"{"categories":[{"id":"net","name":"Network","errors":[
                {"id":"net-1","title":"npm install times out","error":"ETIMEDOUT",
                 "symptoms":["hangs at fetch"],"cause":"proxy","solutions":[]}
            ]}]}"#,
        )
        .unwrap();
        ToolContext::new(Arc::new(KnowledgeBase::new(db)))
    }

    async fn call(name: &str, params: Value) -> Result<Value> {
        let registry = ToolRegistry::with_builtins();
        let tool = registry.find(name).unwrap();
        let params = validate_params(&tool.parameters_schema(), &params)?;
        tool.execute(params, &ctx()).await
    }

    #[test]
    fn test_builtins_registered_in_order() {
        let names: Vec<String> = ToolRegistry::with_builtins()
            .infos()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(
            names,
            vec!["search_errors", "match_errors", "list_categories", "get_category", "get_error"]
        );
        assert!(ToolRegistry::new().is_empty());
    }

    #[test]
    fn test_validate_params() {
        let schema = MatchErrorsTool.parameters_schema();
        let err = validate_params(&schema, &json!({})).unwrap_err();
        assert!(err.to_string().contains("missing required parameter: query"));

        let err = validate_params(&schema, &json!({ "query": 3 })).unwrap_err();
        assert!(err.to_string().contains("must be of type 'string'"));

        let ok = validate_params(&schema, &json!({ "query": "npm" })).unwrap();
        assert_eq!(ok["strict"], false);

        let enum_schema = json!({
            "type": "object",
            "properties": { "mode": { "type": "string", "enum": ["a", "b"] } }
        });
        let err = validate_params(&enum_schema, &json!({ "mode": "c" })).unwrap_err();
        assert!(err.to_string().contains("must be one of \"a\" | \"b\""));
        assert!(validate_params(&enum_schema, &json!({ "mode": "b" })).is_ok());
    }

    #[test]
    fn test_validate_number_accepts_integers() {
        let schema = json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer" },
                "weight": { "type": "number" }
            }
        });
        assert!(validate_params(&schema, &json!({ "limit": 3, "weight": 2 })).is_ok());
        let err = validate_params(&schema, &json!({ "limit": 1.5 })).unwrap_err();
        assert!(err.to_string().contains("got number"));
        // non-object arguments count as none
        assert_eq!(validate_params(&schema, &json!("x")).unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_search_and_match_tools() {
        let result = call("search_errors", json!({ "query": "npm proxy" })).await.unwrap();
        assert_eq!(result["count"], 1);

        let result = call("match_errors", json!({ "query": "ETIMEDOUT", "strict": true }))
            .await
            .unwrap();
        assert_eq!(result["matches"][0]["id"], "net-1");
        assert!(result["matches"][0]["score"].as_u64().unwrap() >= 6);

        let err = call("search_errors", json!({ "query": "  " })).await.unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[tokio::test]
    async fn test_lookup_tools() {
        let list = call("list_categories", json!({})).await.unwrap();
        assert_eq!(list["categories"][0]["id"], "net");

        let cat = call("get_category", json!({ "id": "net" })).await.unwrap();
        assert_eq!(cat["errors"].as_array().unwrap().len(), 1);

        let err = call("get_error", json!({ "id": "nope" })).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GuideError>(),
            Some(GuideError::NotFound(_))
        ));
    }
}
