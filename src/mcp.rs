//! MCP JSON-RPC bridge over stdio.
//!
//! Exposes the [`ToolRegistry`] as MCP tools via `list_tools` /
//! `call_tool`, so editors and agents can query the guide by launching
//! `errguide mcp` as a subprocess. stdout carries the protocol stream;
//! logs go to stderr.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::transport::stdio;
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt};
use tracing::info;

use crate::config::Config;
use crate::corpus::KnowledgeBase;
use crate::traits::{validate_params, ToolContext, ToolRegistry};

/// Bridges the tool registry to the MCP protocol.
#[derive(Clone)]
pub struct McpBridge {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
}

impl McpBridge {
    pub fn new(tools: Arc<ToolRegistry>, kb: Arc<KnowledgeBase>) -> Self {
        Self {
            tools,
            ctx: ToolContext::new(kb),
        }
    }

    /// Convert a registry tool into an rmcp `Tool` descriptor.
    fn to_mcp_tool(tool: &dyn crate::traits::Tool) -> Tool {
        let input_schema: Arc<serde_json::Map<String, serde_json::Value>> =
            match tool.parameters_schema() {
                serde_json::Value::Object(map) => Arc::new(map),
                _ => Arc::new(serde_json::Map::new()),
            };

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            execution: None,
            icons: None,
            meta: None,
        }
    }

    /// Validate and run one tool, rendering the result as pretty JSON.
    pub async fn call(&self, name: &str, params: serde_json::Value) -> anyhow::Result<String> {
        let tool = self
            .tools
            .find(name)
            .ok_or_else(|| anyhow::anyhow!("no tool registered with name: {}", name))?;
        let params = validate_params(&tool.parameters_schema(), &params)?;
        let result = tool.execute(params, &self.ctx).await?;
        Ok(serde_json::to_string_pretty(&result)?)
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "error-guide".to_string(),
                title: Some("Error Guide".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Installation and runtime error guide. Use match_errors with the user's \
                 problem description or error message, then get_error for full solution steps."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        if self.tools.find(&request.name).is_none() {
            return Err(McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", request.name),
                None,
            ));
        }

        let params = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        match self.call(&request.name, params).await {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }
}

/// Serve the built-in tools over MCP stdio until the client disconnects.
pub async fn run_mcp_stdio(config: &Config) -> anyhow::Result<()> {
    let kb = Arc::new(KnowledgeBase::load(config));
    let bridge = McpBridge::new(Arc::new(ToolRegistry::with_builtins()), kb);

    info!("MCP server ready on stdio");
    let server = bridge.serve(stdio()).await?;
    server.waiting().await?;
    Ok(())
}
